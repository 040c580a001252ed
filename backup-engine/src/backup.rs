//! Backup engine: copies this node's data directory into the backup storage
//! and records its progress in the storage index.

use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::fs::walker::{walk_directory, FileInfo, WalkOptions};
use crate::manifest::{Manifest, ManifestEntry};
use crate::storage::{layout, LocalStorage, NodeRecord, Tokenmap};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

const DEFAULT_STAGGER_POLL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupMode {
    Full,
    #[default]
    Differential,
}

impl fmt::Display for BackupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackupMode::Full => f.write_str("full"),
            BackupMode::Differential => f.write_str("differential"),
        }
    }
}

impl FromStr for BackupMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(BackupMode::Full),
            "differential" => Ok(BackupMode::Differential),
            other => Err(EngineError::Config(format!("unknown backup mode {other:?}"))),
        }
    }
}

/// What a backup run stored
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupOutcome {
    pub files: usize,
    pub bytes: u64,
    /// Differential objects already present in storage
    pub reused_files: usize,
    pub reused_bytes: u64,
}

pub trait BackupEngine: Send + Sync {
    /// Runs one backup of this node to completion.
    ///
    /// With a `stagger` timeout the run first waits for every node ordered
    /// before this one to finish the same backup.
    fn run_backup(&self, name: &str, stagger: Option<Duration>, mode: BackupMode) -> Result<BackupOutcome>;
}

pub struct LocalBackupEngine {
    config: Arc<Config>,
    storage: LocalStorage,
    walk_options: WalkOptions,
    stagger_poll: Duration,
}

impl LocalBackupEngine {
    pub fn new(config: Arc<Config>) -> Self {
        let storage = LocalStorage::new(&config.storage.base_path);
        Self {
            config,
            storage,
            walk_options: WalkOptions::default(),
            stagger_poll: DEFAULT_STAGGER_POLL,
        }
    }

    pub fn with_stagger_poll(mut self, interval: Duration) -> Self {
        self.stagger_poll = interval;
        self
    }

    fn fqdn(&self) -> &str {
        &self.config.storage.fqdn
    }

    fn wait_for_turn(&self, name: &str, tokenmap: &Tokenmap, timeout: Duration) -> Result<()> {
        let predecessors: Vec<&String> = tokenmap
            .nodes
            .iter()
            .take_while(|n| n.as_str() != self.fqdn())
            .collect();
        let start = Instant::now();

        loop {
            let mut pending = None;
            for node in &predecessors {
                let finished = self
                    .storage
                    .read_node_record(name, node)?
                    .is_some_and(|r| r.is_finished());
                if !finished {
                    pending = Some(node.as_str());
                    break;
                }
            }

            let Some(node) = pending else {
                return Ok(());
            };

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Err(EngineError::StaggerTimeout {
                    name: name.to_string(),
                    node: node.to_string(),
                    waited_secs: elapsed.as_secs(),
                });
            }
            debug!(backup = %name, waiting_for = %node, "Staggered backup waiting");
            std::thread::sleep(self.stagger_poll.min(timeout - elapsed));
        }
    }

    fn store_files(&self, name: &str, mode: BackupMode, files: Vec<FileInfo>) -> Result<(Manifest, BackupOutcome)> {
        let layout = self.storage.layout();
        let fqdn = self.fqdn();
        let mut manifest = Manifest::new(name, fqdn, mode);
        let mut outcome = BackupOutcome::default();

        for file in files {
            let key = match mode {
                BackupMode::Full => layout.full_object_key(fqdn, name, &file.relative_path),
                BackupMode::Differential => {
                    layout.differential_object_key(fqdn, file.size, file.mtime, &file.relative_path)
                }
            };
            let dest = layout.object_path(&key);

            let reused = (mode == BackupMode::Differential && object_matches(&dest, file.size))
                || !copy_object(&file.path, &dest, name, file.size)?;
            if reused {
                outcome.reused_files += 1;
                outcome.reused_bytes += file.size;
            }

            outcome.files += 1;
            outcome.bytes += file.size;
            manifest.insert(
                file.relative_path.to_string_lossy().to_string(),
                ManifestEntry {
                    size: file.size,
                    mtime: file.mtime,
                    object: key,
                },
            );
        }

        Ok((manifest, outcome))
    }
}

impl BackupEngine for LocalBackupEngine {
    fn run_backup(&self, name: &str, stagger: Option<Duration>, mode: BackupMode) -> Result<BackupOutcome> {
        layout::validate_name(name)?;
        layout::validate_name(self.fqdn())?;

        if self.storage.read_node_record(name, self.fqdn())?.is_some() {
            return Err(EngineError::AlreadyExists {
                name: name.to_string(),
                fqdn: self.fqdn().to_string(),
            });
        }

        let tokenmap = Tokenmap {
            nodes: self.config.storage.expected_nodes(),
        };
        if let Some(timeout) = stagger {
            self.wait_for_turn(name, &tokenmap, timeout)?;
        }

        info!(backup = %name, %mode, node = %self.fqdn(), "Starting backup");
        self.storage.write_tokenmap(name, &tokenmap)?;
        let mut record = NodeRecord {
            fqdn: self.fqdn().to_string(),
            started: chrono::Utc::now().timestamp(),
            finished: None,
            mode,
        };
        self.storage.write_node_record(name, &record)?;

        let stored = walk_directory(&self.config.storage.data_dir, &self.walk_options)
            .and_then(|files| self.store_files(name, mode, files))
            .and_then(|(manifest, outcome)| {
                self.storage.write_manifest(&manifest)?;
                Ok(outcome)
            });

        match stored {
            Ok(outcome) => {
                record.finished = Some(chrono::Utc::now().timestamp());
                self.storage.write_node_record(name, &record)?;
                info!(
                    backup = %name,
                    files = outcome.files,
                    bytes = outcome.bytes,
                    reused = outcome.reused_files,
                    "Backup completed"
                );
                Ok(outcome)
            }
            Err(e) => {
                // The start record stays behind so the node reports as incomplete.
                error!(backup = %name, "Backup failed: {}", e);
                Err(e)
            }
        }
    }
}

fn object_matches(path: &Path, size: u64) -> bool {
    std::fs::metadata(path).is_ok_and(|m| m.is_file() && m.len() == size)
}

/// Copies `src` to `dest` through a temp file private to this backup run.
///
/// Returns `false` when another run stored the same object first.
fn copy_object(src: &Path, dest: &Path, backup: &str, size: u64) -> Result<bool> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut partial = dest.as_os_str().to_owned();
    partial.push(format!(".{backup}.partial"));
    std::fs::copy(src, &partial)?;
    match std::fs::rename(&partial, dest) {
        Ok(()) => Ok(true),
        Err(_) if object_matches(dest, size) => {
            let _ = std::fs::remove_file(&partial);
            Ok(false)
        }
        Err(e) => {
            let _ = std::fs::remove_file(&partial);
            Err(e.into())
        }
    }
}
