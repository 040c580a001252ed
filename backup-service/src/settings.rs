//! Process settings, fixed once at startup and handed to the service host.

use crate::logging::LogSettings;
use backup_engine::Config;
use std::time::Duration;

/// Seconds to wait before binding the listener.
pub const STARTUP_DELAY_ENV: &str = "DEBUG_SLEEP";

#[derive(Debug, Clone)]
pub struct HostSettings {
    pub port: u16,
    pub max_workers: usize,
    pub startup_delay: Duration,
    pub shutdown_grace: Duration,
}

#[derive(Debug, Clone)]
pub struct ProcessSettings {
    pub logging: LogSettings,
    pub host: HostSettings,
}

impl ProcessSettings {
    pub fn new(config: &Config, startup_delay: Duration) -> Self {
        Self {
            logging: LogSettings {
                level: config.logging.level.clone(),
            },
            host: HostSettings {
                port: config.grpc.port,
                max_workers: config.grpc.max_workers,
                startup_delay,
                shutdown_grace: Duration::from_secs(config.grpc.shutdown_grace_secs),
            },
        }
    }

    /// Builds settings from the configuration plus the process environment.
    pub fn from_env(config: &Config) -> Self {
        let delay = parse_delay(std::env::var(STARTUP_DELAY_ENV).ok().as_deref());
        Self::new(config, delay)
    }
}

fn parse_delay(value: Option<&str>) -> Duration {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or_default()
}
