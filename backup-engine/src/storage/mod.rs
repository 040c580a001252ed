//! Storage index: persisted metadata about backups and per-node progress.

pub mod cluster_backup;
pub mod layout;

pub use cluster_backup::{BackupState, BackupSummary, ClusterBackup, NodeRecord, Tokenmap};
pub use layout::StorageLayout;

use crate::error::{EngineError, Result};
use crate::manifest::Manifest;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, warn};

/// Read access to backup metadata.
pub trait StorageIndex: Send + Sync {
    /// Snapshot of one backup across the cluster, `EngineError::NotFound` when unknown.
    fn get_cluster_backup(&self, name: &str) -> Result<ClusterBackup>;

    /// Every known backup, oldest first.
    fn list_backups(&self) -> Result<Vec<BackupSummary>>;
}

/// Storage index kept as JSON files under a local (or mounted) directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    layout: StorageLayout,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<std::path::PathBuf>) -> Self {
        Self {
            layout: StorageLayout::new(base_path),
        }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn write_tokenmap(&self, name: &str, tokenmap: &Tokenmap) -> Result<()> {
        write_json(&self.layout.tokenmap_path(name), tokenmap)
    }

    pub fn read_tokenmap(&self, name: &str) -> Result<Tokenmap> {
        Ok(read_json(&self.layout.tokenmap_path(name))?.unwrap_or_default())
    }

    pub fn write_node_record(&self, name: &str, record: &NodeRecord) -> Result<()> {
        write_json(&self.layout.node_record_path(name, &record.fqdn), record)
    }

    pub fn read_node_record(&self, name: &str, fqdn: &str) -> Result<Option<NodeRecord>> {
        read_json(&self.layout.node_record_path(name, fqdn))
    }

    pub fn read_node_records(&self, name: &str) -> Result<Vec<NodeRecord>> {
        let dir = self.layout.backup_index_dir(name);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(EngineError::NotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(fqdn) = layout::node_from_record_file(&file_name.to_string_lossy())
                .map(str::to_string)
            else {
                continue;
            };
            if let Some(record) = self.read_node_record(name, &fqdn)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    pub fn write_manifest(&self, manifest: &Manifest) -> Result<()> {
        write_json(
            &self.layout.manifest_path(&manifest.fqdn, &manifest.backup_name),
            manifest,
        )
    }

    pub fn read_manifest(&self, fqdn: &str, name: &str) -> Result<Option<Manifest>> {
        read_json(&self.layout.manifest_path(fqdn, name))
    }

    /// Manifests of every backup a node still holds.
    pub fn node_manifests(&self, fqdn: &str) -> Result<Vec<Manifest>> {
        let entries = match std::fs::read_dir(self.layout.node_root(fqdn)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut manifests = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(manifest) = self.read_manifest(fqdn, &name)? {
                manifests.push(manifest);
            }
        }
        Ok(manifests)
    }

    pub fn remove_node_backup(&self, fqdn: &str, name: &str) -> Result<()> {
        remove_dir_if_exists(&self.layout.node_backup_dir(fqdn, name))
    }

    pub fn remove_backup_index(&self, name: &str) -> Result<()> {
        remove_dir_if_exists(&self.layout.backup_index_dir(name))
    }
}

impl StorageIndex for LocalStorage {
    fn get_cluster_backup(&self, name: &str) -> Result<ClusterBackup> {
        layout::validate_name(name)?;
        let records = self.read_node_records(name)?;
        let tokenmap = self.read_tokenmap(name)?;
        ClusterBackup::new(name, tokenmap, records)
    }

    fn list_backups(&self) -> Result<Vec<BackupSummary>> {
        let entries = match std::fs::read_dir(self.layout.index_root()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut summaries = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            match self.get_cluster_backup(&name) {
                Ok(backup) => summaries.push(backup.summary()),
                Err(EngineError::NotFound(_)) => {
                    debug!(backup = %name, "Skipping index entry without node records");
                }
                Err(e) => {
                    warn!(backup = %name, "Skipping unreadable index entry: {}", e);
                }
            }
        }

        summaries.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.backup_name.cmp(&b.backup_name))
        });
        Ok(summaries)
    }
}

/// Writes through a temporary file so readers never see half a document.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
