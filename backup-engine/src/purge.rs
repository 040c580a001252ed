//! Purge engine: removes a backup from the index and from storage.

use crate::backup::BackupMode;
use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::manifest::Manifest;
use crate::storage::{layout, LocalStorage};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeOutcome {
    pub nodes: usize,
    pub objects_deleted: usize,
    pub bytes_freed: u64,
}

pub trait PurgeEngine: Send + Sync {
    /// Deletes the named backup. With `delete_objects` the stored file
    /// content goes too, except objects another backup still references.
    fn delete_backup(&self, name: &str, delete_objects: bool) -> Result<PurgeOutcome>;
}

pub struct LocalPurgeEngine {
    storage: LocalStorage,
}

impl LocalPurgeEngine {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            storage: LocalStorage::new(&config.storage.base_path),
        }
    }

    fn purge_node(&self, fqdn: &str, name: &str, delete_objects: bool, outcome: &mut PurgeOutcome) -> Result<()> {
        let manifest = self.storage.read_manifest(fqdn, name)?;

        if !delete_objects {
            let meta = self.storage.layout().manifest_path(fqdn, name);
            if let Some(meta_dir) = meta.parent() {
                remove_dir_if_exists(meta_dir)?;
            }
            return Ok(());
        }

        let Some(manifest) = manifest else {
            self.storage.remove_node_backup(fqdn, name)?;
            warn!(backup = %name, node = %fqdn, "No manifest found, only the node directory was removed");
            return Ok(());
        };

        // The manifest is removed last so a failed purge can be retried.
        match manifest.mode {
            BackupMode::Full => {
                self.storage.remove_node_backup(fqdn, name)?;
                outcome.objects_deleted += manifest.total_files;
                outcome.bytes_freed += manifest.total_bytes;
            }
            BackupMode::Differential => {
                self.purge_unreferenced(fqdn, &manifest, outcome)?;
                self.storage.remove_node_backup(fqdn, name)?;
            }
        }
        Ok(())
    }

    fn purge_unreferenced(&self, fqdn: &str, manifest: &Manifest, outcome: &mut PurgeOutcome) -> Result<()> {
        let remaining = self.storage.node_manifests(fqdn)?;
        let referenced: HashSet<&str> = remaining
            .iter()
            .filter(|m| m.backup_name != manifest.backup_name)
            .flat_map(|m| m.objects())
            .collect();
        let node_root = self.storage.layout().node_root(fqdn);

        for entry in manifest.files.values() {
            if referenced.contains(entry.object.as_str()) {
                continue;
            }
            let path = self.storage.layout().object_path(&entry.object);
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    outcome.objects_deleted += 1;
                    outcome.bytes_freed += entry.size;
                    prune_empty_parents(&path, &node_root);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

impl PurgeEngine for LocalPurgeEngine {
    fn delete_backup(&self, name: &str, delete_objects: bool) -> Result<PurgeOutcome> {
        layout::validate_name(name)?;
        let records = self.storage.read_node_records(name)?;
        if records.is_empty() {
            return Err(EngineError::NotFound(name.to_string()));
        }

        info!(backup = %name, nodes = records.len(), delete_objects, "Deleting backup");
        let mut outcome = PurgeOutcome::default();
        for record in &records {
            self.purge_node(&record.fqdn, name, delete_objects, &mut outcome)?;
            outcome.nodes += 1;
        }

        // The index entry goes only after every node is purged.
        self.storage.remove_backup_index(name)?;

        info!(
            backup = %name,
            objects = outcome.objects_deleted,
            bytes = outcome.bytes_freed,
            "Backup deleted"
        );
        Ok(outcome)
    }
}

fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Removes now-empty directories between `path` and `stop` (exclusive).
fn prune_empty_parents(path: &Path, stop: &Path) {
    let mut current = path.parent();
    while let Some(dir) = current {
        if dir == stop || !dir.starts_with(stop) {
            break;
        }
        if std::fs::remove_dir(dir).is_err() {
            break;
        }
        current = dir.parent();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::{BackupEngine, LocalBackupEngine};
    use crate::config::{GrpcConfig, LoggingConfig, StorageConfig};
    use crate::storage::StorageIndex;
    use std::fs;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> Arc<Config> {
        let data_dir = dir.path().join("data");
        fs::create_dir_all(&data_dir).unwrap();
        fs::write(data_dir.join("a.db"), b"aaaa").unwrap();
        Arc::new(Config {
            storage: StorageConfig {
                base_path: dir.path().join("storage"),
                fqdn: "n1".to_string(),
                data_dir,
                cluster_nodes: vec![],
            },
            logging: LoggingConfig::default(),
            grpc: GrpcConfig::default(),
        })
    }

    #[test]
    fn test_delete_unknown_backup_is_not_found() {
        let dir = TempDir::new().unwrap();
        let purge = LocalPurgeEngine::new(config(&dir));
        assert!(purge.delete_backup("does-not-exist", true).unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_keeps_shared_objects() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let engine = LocalBackupEngine::new(config.clone());
        let purge = LocalPurgeEngine::new(config.clone());

        engine.run_backup("first", None, BackupMode::Differential).unwrap();
        fs::write(config.storage.data_dir.join("b.db"), b"bb").unwrap();
        engine.run_backup("second", None, BackupMode::Differential).unwrap();

        // a.db is shared with "first", b.db only belongs to "second"
        let outcome = purge.delete_backup("second", true).unwrap();
        assert_eq!(outcome.nodes, 1);
        assert_eq!(outcome.objects_deleted, 1);
        assert_eq!(outcome.bytes_freed, 2);

        let storage = LocalStorage::new(&config.storage.base_path);
        assert!(storage.get_cluster_backup("second").unwrap_err().is_not_found());
        let first = storage.read_manifest("n1", "first").unwrap().unwrap();
        for object in first.objects() {
            assert!(storage.layout().object_path(object).is_file());
        }
    }

    #[test]
    fn test_delete_full_backup_removes_everything() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let engine = LocalBackupEngine::new(config.clone());
        let purge = LocalPurgeEngine::new(config.clone());

        engine.run_backup("nightly", None, BackupMode::Full).unwrap();
        let outcome = purge.delete_backup("nightly", true).unwrap();
        assert_eq!(outcome.objects_deleted, 1);
        assert_eq!(outcome.bytes_freed, 4);

        let storage = LocalStorage::new(&config.storage.base_path);
        assert!(!storage.layout().node_backup_dir("n1", "nightly").exists());
        assert!(storage.list_backups().unwrap().is_empty());
    }

    #[test]
    fn test_failed_delete_keeps_index_and_can_be_retried() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let engine = LocalBackupEngine::new(config.clone());
        let purge = LocalPurgeEngine::new(config.clone());
        let storage = LocalStorage::new(&config.storage.base_path);

        engine.run_backup("nightly", None, BackupMode::Differential).unwrap();
        let manifest = storage.read_manifest("n1", "nightly").unwrap().unwrap();
        let object = storage.layout().object_path(manifest.objects().next().unwrap());

        // A directory in place of the object makes its removal fail.
        fs::remove_file(&object).unwrap();
        fs::create_dir_all(object.join("blocker")).unwrap();
        assert!(purge.delete_backup("nightly", true).is_err());
        assert!(storage.get_cluster_backup("nightly").is_ok());
        assert!(storage.read_manifest("n1", "nightly").unwrap().is_some());

        fs::remove_dir_all(&object).unwrap();
        fs::write(&object, b"aaaa").unwrap();
        let outcome = purge.delete_backup("nightly", true).unwrap();
        assert_eq!(outcome.objects_deleted, 1);
        assert!(storage.get_cluster_backup("nightly").unwrap_err().is_not_found());
        assert!(!storage.layout().node_backup_dir("n1", "nightly").exists());
        assert!(!object.exists());
    }

    #[test]
    fn test_delete_without_objects_keeps_data() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let engine = LocalBackupEngine::new(config.clone());
        let purge = LocalPurgeEngine::new(config.clone());

        engine.run_backup("nightly", None, BackupMode::Full).unwrap();
        let outcome = purge.delete_backup("nightly", false).unwrap();
        assert_eq!(outcome.objects_deleted, 0);

        let storage = LocalStorage::new(&config.storage.base_path);
        assert!(storage.read_manifest("n1", "nightly").unwrap().is_none());
        assert!(storage.layout().node_backup_dir("n1", "nightly").join("data").exists());
    }
}
