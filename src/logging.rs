//! Tracing setup: stderr output plus an optional rolling log file

use std::path::PathBuf;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::result::{PulseError, Result};

const LOG_ENV: &str = "PULSE_LOG";
const LOG_DIR_ENV: &str = "PULSE_LOG_DIR";
const LOG_JSON_ENV: &str = "PULSE_LOG_JSON";
const LOG_FILE_PREFIX: &str = "pulse.log";

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Used when neither `PULSE_LOG` nor `RUST_LOG` is set
    pub stderr_level: Level,
    pub file_level: Level,
    /// `None` disables the file layer
    pub log_dir: Option<PathBuf>,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            stderr_level: Level::WARN,
            file_level: Level::INFO,
            log_dir: None,
            json: false,
        }
    }
}

impl LoggingConfig {
    pub fn from_env() -> Self {
        Self {
            log_dir: std::env::var_os(LOG_DIR_ENV).map(PathBuf::from),
            json: std::env::var(LOG_JSON_ENV).is_ok_and(|v| v == "1" || v == "true"),
            ..Default::default()
        }
    }

    pub fn with_file_level(mut self, level: Level) -> Self {
        self.file_level = level;
        self
    }

    pub fn with_log_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.log_dir = dir;
        self
    }

    fn stderr_filter(&self) -> EnvFilter {
        EnvFilter::try_from_env(LOG_ENV)
            .or_else(|_| EnvFilter::try_from_default_env())
            .unwrap_or_else(|_| EnvFilter::new(self.stderr_level.as_str()))
    }
}

/// Install the global subscriber. Keep the returned guard alive until exit so
/// buffered file output is flushed.
pub fn init_logging(config: LoggingConfig) -> Result<Option<WorkerGuard>> {
    let (file_layer, guard) = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| {
                PulseError::LoggingError(format!("cannot create {}: {e}", dir.display()).into())
            })?;

            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let level = LevelFilter::from_level(config.file_level);

            let layer = if config.json {
                fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(level)
                    .boxed()
            } else {
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(level)
                    .boxed()
            };
            (Some(layer), Some(guard))
        },
        None => (None, None),
    };

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(config.stderr_filter());

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| PulseError::LoggingError(e.to_string().into()))?;

    Ok(guard)
}
