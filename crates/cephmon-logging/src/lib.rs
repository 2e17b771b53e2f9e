//! Logging bootstrap for cephmon binaries.
//!
//! Poll failures are reported through `tracing` with structured fields
//! (`facet`, `kind`, `error`), so operators get the same context whether the
//! output goes to the console, JSON, or a rolling file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Re-export tracing macros for convenience.
pub use tracing::{debug, error, info, trace, warn};

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("failed to create log file appender in {dir}: {source}")]
    Appender {
        dir: PathBuf,
        #[source]
        source: rolling::InitError,
    },

    #[error("unknown log rotation {0:?}, expected hourly, daily or never")]
    Rotation(String),

    #[error("global subscriber already installed: {0}")]
    AlreadyInitialized(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level filter (trace, debug, info, warn, error). `RUST_LOG` wins
    /// when set.
    #[serde(default = "default_level")]
    pub level: String,

    /// Directory for log files. If None, no file logging.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    #[serde(default = "default_prefix")]
    pub file_prefix: String,

    /// Log rotation: "hourly", "daily", "never".
    #[serde(default = "default_rotation")]
    pub rotation: String,

    #[serde(default)]
    pub json_format: bool,

    #[serde(default = "default_true")]
    pub console_output: bool,
}

fn default_level() -> String {
    "info".into()
}

fn default_prefix() -> String {
    "cephmon".into()
}

fn default_rotation() -> String {
    "daily".into()
}

fn default_true() -> bool {
    true
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: default_level(),
            log_dir: None,
            file_prefix: default_prefix(),
            rotation: default_rotation(),
            json_format: false,
            console_output: true,
        }
    }
}

impl LogConfig {
    /// Parse `rotation` into an appender rotation.
    pub fn rotation(&self) -> Result<rolling::Rotation, LogError> {
        match self.rotation.as_str() {
            "hourly" => Ok(rolling::Rotation::HOURLY),
            "daily" => Ok(rolling::Rotation::DAILY),
            "never" => Ok(rolling::Rotation::NEVER),
            other => Err(LogError::Rotation(other.to_string())),
        }
    }
}

/// Install the global subscriber. Call once at startup and keep the returned
/// guard alive for as long as file logging should keep flushing.
pub fn init_logging(
    config: &LogConfig,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, LogError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(env_filter);

    let console_layer: Option<Box<dyn tracing_subscriber::Layer<_> + Send + Sync>> =
        match (config.console_output, config.json_format) {
            (false, _) => None,
            (true, true) => Some(Box::new(fmt::layer().json())),
            (true, false) => Some(Box::new(fmt::layer())),
        };

    let (file_layer, guard): (
        Option<Box<dyn tracing_subscriber::Layer<_> + Send + Sync>>,
        Option<tracing_appender::non_blocking::WorkerGuard>,
    ) = match config.log_dir {
        Some(ref log_dir) => {
            let file_appender = rolling::RollingFileAppender::builder()
                .rotation(config.rotation()?)
                .filename_prefix(&config.file_prefix)
                .filename_suffix("log")
                .build(log_dir)
                .map_err(|source| LogError::Appender {
                    dir: log_dir.clone(),
                    source,
                })?;

            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            let layer: Box<dyn tracing_subscriber::Layer<_> + Send + Sync> = if config.json_format
            {
                Box::new(fmt::layer().json().with_writer(non_blocking))
            } else {
                Box::new(fmt::layer().with_ansi(false).with_writer(non_blocking))
            };

            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    registry
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LogError::AlreadyInitialized(e.to_string()))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.file_prefix, "cephmon");
        assert!(config.console_output);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn test_rotation_parsing() {
        let mut config = LogConfig::default();
        assert_eq!(config.rotation().unwrap(), rolling::Rotation::DAILY);
        config.rotation = "hourly".into();
        assert_eq!(config.rotation().unwrap(), rolling::Rotation::HOURLY);
        config.rotation = "weekly".into();
        assert!(matches!(config.rotation(), Err(LogError::Rotation(_))));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: LogConfig = toml::from_str("level = \"debug\"\njson_format = true").unwrap();
        assert_eq!(config.level, "debug");
        assert!(config.json_format);
        assert_eq!(config.rotation, "daily");
    }
}
