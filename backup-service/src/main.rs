//! Backup Service - Main entry point

use anyhow::Context;
use backup_engine::config::DEFAULT_CONFIG_PATH;
use backup_engine::{load_config, ConfigOverrides, LocalBackupEngine, LocalPurgeEngine, LocalStorage};
use backup_service::{BackupServiceImpl, ProcessSettings, ServiceHost, WorkerPool};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Node name (overrides config)
    #[arg(long)]
    fqdn: Option<String>,

    /// Backup storage root (overrides config)
    #[arg(long, value_name = "DIR")]
    base_path: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _ = dotenvy::dotenv();

    let overrides = ConfigOverrides {
        fqdn: args.fqdn,
        base_path: args.base_path,
        log_level: args.log_level,
        port: args.port,
    };
    let config = load_config(&overrides, &args.config)
        .with_context(|| format!("failed to load configuration from {}", args.config.display()))?;
    let config = Arc::new(config);
    let settings = ProcessSettings::from_env(&config);

    let service = BackupServiceImpl::new(
        Arc::new(LocalBackupEngine::new(config.clone())),
        Arc::new(LocalPurgeEngine::new(config.clone())),
        Arc::new(LocalStorage::new(&config.storage.base_path)),
        WorkerPool::new(settings.host.max_workers),
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(ServiceHost::new(settings, service).run());

    // Collaborator calls still running past the grace period are not waited for.
    runtime.shutdown_background();
    result
}
