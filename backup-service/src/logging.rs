//! Logging configuration using tracing.

use std::cmp::min;
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Transport crates that flood the log below debug level.
const NOISY_TARGETS: &[&str] = &["h2", "hyper", "hyper_util", "tower", "tonic"];

#[derive(Debug, Clone)]
pub struct LogSettings {
    pub level: String,
}

impl LogSettings {
    /// Filter directive: the configured level everywhere, with the noisy
    /// transport crates held at warn unless debugging.
    pub fn directive(&self) -> String {
        let level = self.level.parse::<Level>().unwrap_or(Level::INFO);
        let mut directive = level.to_string().to_lowercase();
        if level < Level::DEBUG {
            let noisy = min(level, Level::WARN).to_string().to_lowercase();
            for target in NOISY_TARGETS {
                directive.push_str(&format!(",{target}={noisy}"));
            }
        }
        directive
    }
}

/// Installs the process-wide subscriber. `RUST_LOG` wins when set.
pub fn init(settings: &LogSettings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(settings.directive()))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;

    Ok(())
}
