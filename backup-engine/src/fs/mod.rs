//! File system helpers for the backup engine.

pub mod walker;
