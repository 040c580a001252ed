//! Configuration management for the backup engines and the service host.
//!
//! Loaded once from a TOML file, then patched with command line overrides.

use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/cluster-backup/config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub grpc: GrpcConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root of the backup storage (index and node payloads)
    pub base_path: PathBuf,

    /// Identity of this node in the cluster
    #[serde(default = "default_fqdn")]
    pub fqdn: String,

    /// Directory whose content this node backs up
    pub data_dir: PathBuf,

    /// Nodes expected to contribute to every backup (defaults to this node alone)
    #[serde(default)]
    pub cluster_nodes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrpcConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum concurrent in-flight calls
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// How long shutdown waits for in-flight calls
    #[serde(default)]
    pub shutdown_grace_secs: u64,
}

/// Values taken from the command line that win over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub fqdn: Option<String>,
    pub base_path: Option<PathBuf>,
    pub log_level: Option<String>,
    pub port: Option<u16>,
}

fn default_fqdn() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_port() -> u16 {
    50051
}

fn default_max_workers() -> usize {
    10
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for GrpcConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            max_workers: default_max_workers(),
            shutdown_grace_secs: 0,
        }
    }
}

impl StorageConfig {
    /// Nodes expected in a backup, falling back to this node alone.
    pub fn expected_nodes(&self) -> Vec<String> {
        if self.cluster_nodes.is_empty() {
            vec![self.fqdn.clone()]
        } else {
            self.cluster_nodes.clone()
        }
    }
}

impl Config {
    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.storage.fqdn.trim().is_empty() {
            return Err(EngineError::Config("storage.fqdn must not be empty".into()));
        }
        if self.grpc.max_workers == 0 {
            return Err(EngineError::Config("grpc.max_workers must be at least 1".into()));
        }
        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(EngineError::Config(format!(
                "unknown logging.level {:?}",
                self.logging.level
            )));
        }
        Ok(())
    }

    fn apply(&mut self, overrides: &ConfigOverrides) {
        if let Some(fqdn) = &overrides.fqdn {
            self.storage.fqdn = fqdn.clone();
        }
        if let Some(base_path) = &overrides.base_path {
            self.storage.base_path = base_path.clone();
        }
        if let Some(level) = &overrides.log_level {
            self.logging.level = level.clone();
        }
        if let Some(port) = overrides.port {
            self.grpc.port = port;
        }
    }
}

/// Load the configuration file at `path` and apply `overrides` on top.
pub fn load_config(overrides: &ConfigOverrides, path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        EngineError::Config(format!("cannot read {}: {}", path.display(), e))
    })?;
    let mut config: Config = toml::from_str(&content)
        .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))?;
    config.apply(overrides);
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MINIMAL: &str = r#"
        [storage]
        base_path = "/var/lib/cluster-backup"
        fqdn = "node1.example.com"
        data_dir = "/var/lib/data"
    "#;

    #[test]
    fn test_defaults_applied() {
        let config = Config::from_toml(MINIMAL).unwrap();
        assert_eq!(config.grpc.port, 50051);
        assert_eq!(config.grpc.max_workers, 10);
        assert_eq!(config.grpc.shutdown_grace_secs, 0);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.storage.expected_nodes(), vec!["node1.example.com"]);
    }

    #[test]
    fn test_load_config_with_overrides() -> Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("config.toml");
        std::fs::write(&path, MINIMAL)?;

        let overrides = ConfigOverrides {
            fqdn: Some("node2.example.com".into()),
            log_level: Some("debug".into()),
            port: Some(6000),
            ..Default::default()
        };
        let config = load_config(&overrides, &path)?;
        assert_eq!(config.storage.fqdn, "node2.example.com");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.grpc.port, 6000);
        assert_eq!(config.storage.base_path, PathBuf::from("/var/lib/cluster-backup"));
        Ok(())
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = load_config(&ConfigOverrides::default(), Path::new("/nonexistent/config.toml"))
            .unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_rejects_unknown_log_level() {
        let content = format!("{}\n[logging]\nlevel = \"chatty\"\n", MINIMAL);
        assert!(Config::from_toml(&content).is_err());
    }

    #[test]
    fn test_cluster_nodes() {
        let content = r#"
            [storage]
            base_path = "/b"
            fqdn = "n1"
            data_dir = "/d"
            cluster_nodes = ["n1", "n2", "n3"]
        "#;
        let config = Config::from_toml(content).unwrap();
        assert_eq!(config.storage.expected_nodes(), vec!["n1", "n2", "n3"]);
    }
}
