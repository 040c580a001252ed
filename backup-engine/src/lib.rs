//! Backup engine library
//!
//! The collaborators behind the backup service: configuration loading, the
//! storage index, and the backup and purge engines.

pub mod backup;
pub mod config;
pub mod error;
pub mod fs;
pub mod manifest;
pub mod purge;
pub mod storage;

// Re-export commonly used types
pub use backup::{BackupEngine, BackupMode, BackupOutcome, LocalBackupEngine};
pub use config::{load_config, Config, ConfigOverrides};
pub use error::{EngineError, Result};
pub use purge::{LocalPurgeEngine, PurgeEngine, PurgeOutcome};
pub use storage::{BackupState, BackupSummary, ClusterBackup, LocalStorage, StorageIndex};
