//! On-disk layout of the backup storage.
//!
//! ```text
//! <base>/index/backup_index/<name>/tokenmap.json
//! <base>/index/backup_index/<name>/node_<fqdn>.json
//! <base>/<fqdn>/<name>/meta/manifest.json
//! <base>/<fqdn>/<name>/data/<path>                 full objects
//! <base>/<fqdn>/.objects/<size>_<mtime>/<path>     differential objects
//! ```

use crate::error::{EngineError, Result};
use std::path::{Path, PathBuf};

const NODE_RECORD_PREFIX: &str = "node_";
const JSON_SUFFIX: &str = ".json";

#[derive(Debug, Clone)]
pub struct StorageLayout {
    base: PathBuf,
}

impl StorageLayout {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn index_root(&self) -> PathBuf {
        self.base.join("index").join("backup_index")
    }

    pub fn backup_index_dir(&self, name: &str) -> PathBuf {
        self.index_root().join(name)
    }

    pub fn tokenmap_path(&self, name: &str) -> PathBuf {
        self.backup_index_dir(name).join("tokenmap.json")
    }

    pub fn node_record_path(&self, name: &str, fqdn: &str) -> PathBuf {
        self.backup_index_dir(name)
            .join(format!("{NODE_RECORD_PREFIX}{fqdn}{JSON_SUFFIX}"))
    }

    pub fn node_backup_dir(&self, fqdn: &str, name: &str) -> PathBuf {
        self.base.join(fqdn).join(name)
    }

    pub fn manifest_path(&self, fqdn: &str, name: &str) -> PathBuf {
        self.node_backup_dir(fqdn, name).join("meta").join("manifest.json")
    }

    pub fn node_root(&self, fqdn: &str) -> PathBuf {
        self.base.join(fqdn)
    }

    /// Key of an object private to one backup (full mode).
    pub fn full_object_key(&self, fqdn: &str, name: &str, relative: &Path) -> String {
        format!("{}/{}/data/{}", fqdn, name, relative.to_string_lossy())
    }

    /// Key of an object shared between backups of a node (differential mode).
    pub fn differential_object_key(&self, fqdn: &str, size: u64, mtime: i64, relative: &Path) -> String {
        format!("{}/.objects/{}_{}/{}", fqdn, size, mtime, relative.to_string_lossy())
    }

    pub fn object_path(&self, key: &str) -> PathBuf {
        self.base.join(key)
    }
}

/// Extracts the node name from a `node_<fqdn>.json` file name.
pub fn node_from_record_file(file_name: &str) -> Option<&str> {
    file_name
        .strip_prefix(NODE_RECORD_PREFIX)
        .and_then(|rest| rest.strip_suffix(JSON_SUFFIX))
        .filter(|fqdn| !fqdn.is_empty())
}

/// Backup and node names become path components, so they must be plain.
/// Leading dots are reserved for storage internals.
pub fn validate_name(name: &str) -> Result<()> {
    let invalid = name.trim().is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(EngineError::InvalidName(name.to_string()));
    }
    Ok(())
}
