//! Structured logging setup.
//!
//! The library itself only emits `tracing` events; applications that want them printed call
//! [`init_logging`] once at startup. `RUST_LOG` overrides the configured level.

use crate::config::LoggingConfig;
use crate::error::{ArchiveError, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global `tracing` subscriber described by `config`.
///
/// Fails if the configuration is invalid, the log file cannot be opened, or a global subscriber
/// is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let errors = config.validate();
    if !errors.is_empty() {
        return Err(ArchiveError::ConfigError(errors.join("; ")));
    }

    let mut layers: Vec<BoxedLayer> = Vec::new();

    if config.log_to_console {
        let layer = tracing_subscriber::fmt::layer().with_target(true);
        let layer = if config.json_format {
            layer.json().with_filter(filter_for(config.log_level)).boxed()
        } else {
            layer.with_filter(filter_for(config.log_level)).boxed()
        };
        layers.push(layer);
    }

    if config.log_to_file {
        let path = config.log_file_path.as_deref().ok_or_else(|| {
            ArchiveError::ConfigError("log_file_path must be specified".to_string())
        })?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_target(true);
        let layer = if config.json_format {
            layer.json().with_filter(filter_for(config.log_level)).boxed()
        } else {
            layer.with_filter(filter_for(config.log_level)).boxed()
        };
        layers.push(layer);
    }

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| ArchiveError::ConfigError(format!("Failed to install subscriber: {e}")))?;

    tracing::info!(app = %config.app_name, level = %config.log_level, "Logging initialized");
    Ok(())
}

fn filter_for(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_rejected_before_install() {
        let config = LoggingConfig {
            log_to_console: false,
            log_to_file: false,
            ..LoggingConfig::default()
        };
        assert!(matches!(
            init_logging(&config),
            Err(ArchiveError::ConfigError(_))
        ));
    }
}
