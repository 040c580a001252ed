//! Manifest types for node backups.
//!
//! A manifest records every file of one node's backup with its size,
//! mtime and the storage object holding its content. Differential backups
//! share objects, so purging consults the remaining manifests before
//! deleting anything.

use crate::backup::BackupMode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MANIFEST_VERSION: u32 = 1;

/// Serialized as `meta/manifest.json` in each node backup directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub backup_name: String,
    pub fqdn: String,
    pub mode: BackupMode,
    pub files: BTreeMap<String, ManifestEntry>,
    pub total_files: usize,
    pub total_bytes: u64,
}

/// Metadata for a single file in the manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub size: u64,
    pub mtime: i64,
    /// Storage key of the object, relative to the storage base path
    pub object: String,
}

impl Manifest {
    pub fn new(backup_name: &str, fqdn: &str, mode: BackupMode) -> Self {
        Self {
            version: MANIFEST_VERSION,
            backup_name: backup_name.to_string(),
            fqdn: fqdn.to_string(),
            mode,
            files: BTreeMap::new(),
            total_files: 0,
            total_bytes: 0,
        }
    }

    pub fn insert(&mut self, relative_path: String, entry: ManifestEntry) {
        self.total_bytes += entry.size;
        if let Some(previous) = self.files.insert(relative_path, entry) {
            self.total_bytes -= previous.size;
        }
        self.total_files = self.files.len();
    }

    pub fn objects(&self) -> impl Iterator<Item = &str> {
        self.files.values().map(|e| e.object.as_str())
    }
}
