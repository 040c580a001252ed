//! Error types shared by the storage index, backup and purge engines.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("backup {0} does not exist")]
    NotFound(String),

    #[error("backup {name} already exists for node {fqdn}")]
    AlreadyExists { name: String, fqdn: String },

    #[error("invalid backup name: {0:?}")]
    InvalidName(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("timed out after {waited_secs}s waiting for {node} to finish backup {name}")]
    StaggerTimeout {
        name: String,
        node: String,
        waited_secs: u64,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("file walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

impl EngineError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
