//! A backup viewed across every node of the cluster.

use crate::backup::BackupMode;
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Index record written by a node when it starts and finishes a backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub fqdn: String,
    pub started: i64,
    #[serde(default)]
    pub finished: Option<i64>,
    pub mode: BackupMode,
}

impl NodeRecord {
    pub fn is_finished(&self) -> bool {
        self.finished.is_some()
    }
}

/// Nodes expected to contribute to a backup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokenmap {
    pub nodes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupState {
    InProgress,
    Success,
    Failed,
}

/// Listing entry for one backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSummary {
    pub backup_name: String,
    pub start_time: i64,
    pub finish_time: Option<i64>,
    pub total_nodes: usize,
    pub finished_nodes: usize,
    pub nodes: Vec<String>,
    pub state: BackupState,
}

#[derive(Debug, Clone)]
pub struct ClusterBackup {
    name: String,
    expected: BTreeSet<String>,
    records: BTreeMap<String, NodeRecord>,
    started: i64,
    finished: Option<i64>,
}

impl ClusterBackup {
    /// Builds the cluster view; a backup without any node record does not exist.
    pub fn new(name: impl Into<String>, tokenmap: Tokenmap, records: Vec<NodeRecord>) -> Result<Self> {
        let name = name.into();
        let records: BTreeMap<String, NodeRecord> =
            records.into_iter().map(|r| (r.fqdn.clone(), r)).collect();

        let started = records
            .values()
            .map(|r| r.started)
            .min()
            .ok_or_else(|| EngineError::NotFound(name.clone()))?;

        let mut expected: BTreeSet<String> = tokenmap.nodes.into_iter().collect();
        expected.extend(records.keys().cloned());

        let all_finished = expected
            .iter()
            .all(|fqdn| records.get(fqdn).is_some_and(NodeRecord::is_finished));
        let finished = if all_finished {
            records.values().filter_map(|r| r.finished).max()
        } else {
            None
        };

        Ok(Self {
            name,
            expected,
            records,
            started,
            finished,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Earliest node start, seconds since the Unix epoch.
    pub fn started(&self) -> i64 {
        self.started
    }

    /// Latest node finish, present only once every expected node finished.
    pub fn finished(&self) -> Option<i64> {
        self.finished
    }

    pub fn expected_nodes(&self) -> impl Iterator<Item = &str> {
        self.expected.iter().map(String::as_str)
    }

    pub fn node_record(&self, fqdn: &str) -> Option<&NodeRecord> {
        self.records.get(fqdn)
    }

    pub fn complete_nodes(&self) -> Vec<String> {
        self.records
            .values()
            .filter(|r| r.is_finished())
            .map(|r| r.fqdn.clone())
            .collect()
    }

    pub fn incomplete_nodes(&self) -> Vec<String> {
        self.records
            .values()
            .filter(|r| !r.is_finished())
            .map(|r| r.fqdn.clone())
            .collect()
    }

    pub fn missing_nodes(&self) -> Vec<String> {
        self.expected
            .iter()
            .filter(|fqdn| !self.records.contains_key(*fqdn))
            .cloned()
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.finished.is_some()
    }

    pub fn summary(&self) -> BackupSummary {
        let finished_nodes = self.complete_nodes().len();
        let state = if self.is_complete() {
            BackupState::Success
        } else if finished_nodes + self.missing_nodes().len() == self.expected.len() {
            // nothing left running, yet some node never showed up
            BackupState::Failed
        } else {
            BackupState::InProgress
        };

        BackupSummary {
            backup_name: self.name.clone(),
            start_time: self.started,
            finish_time: self.finished,
            total_nodes: self.expected.len(),
            finished_nodes,
            nodes: self.expected.iter().cloned().collect(),
            state,
        }
    }
}
