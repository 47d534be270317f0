use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("invalid log filter {filter:?}: {reason}")]
    Filter { filter: String, reason: String },

    #[error("unknown log rotation {0:?} (expected hourly, daily or never)")]
    Rotation(String),

    #[error("cannot create log file appender: {0}")]
    Appender(#[from] tracing_appender::rolling::InitError),

    #[error("a global subscriber is already installed: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Filter directive (`info`, `cephfs_client=debug`, ...). `RUST_LOG`
    /// takes precedence when set.
    #[serde(default = "default_level")]
    pub level: String,

    /// Directory for log files. If None, no file logging.
    pub log_dir: Option<PathBuf>,

    #[serde(default = "default_prefix")]
    pub file_prefix: String,

    /// Log rotation: "hourly", "daily", "never".
    #[serde(default = "default_rotation")]
    pub rotation: String,

    #[serde(default)]
    pub json_format: bool,

    /// Whether to also output to console (stderr).
    #[serde(default = "default_true")]
    pub console_output: bool,
}

fn default_level() -> String {
    "info".into()
}

fn default_prefix() -> String {
    "cephfs".into()
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

fn parse_rotation(s: &str) -> Result<rolling::Rotation, LogError> {
    match s {
        "hourly" => Ok(rolling::Rotation::HOURLY),
        "daily" => Ok(rolling::Rotation::DAILY),
        "never" => Ok(rolling::Rotation::NEVER),
        other => Err(LogError::Rotation(other.to_string())),
    }
}

fn build_filter(level: &str) -> Result<EnvFilter, LogError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|e| LogError::Filter {
        filter: level.to_string(),
        reason: e.to_string(),
    })
}

type BoxedLayer<S> = Box<dyn tracing_subscriber::Layer<S> + Send + Sync>;

/// Install the global subscriber. Call once at program startup.
///
/// Returns the file writer's guard when file logging is enabled; it must be
/// held for the life of the program or buffered lines are lost.
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>, LogError> {
    let env_filter = build_filter(&config.level)?;
    let registry = tracing_subscriber::registry().with(env_filter);

    let console_layer: Option<BoxedLayer<_>> = if config.console_output {
        if config.json_format {
            Some(Box::new(fmt::layer().json().with_writer(std::io::stderr)))
        } else {
            Some(Box::new(fmt::layer().with_writer(std::io::stderr)))
        }
    } else {
        None
    };

    let (file_layer, guard): (Option<BoxedLayer<_>>, Option<WorkerGuard>) =
        if let Some(ref log_dir) = config.log_dir {
            let file_appender = rolling::RollingFileAppender::builder()
                .rotation(parse_rotation(&config.rotation)?)
                .filename_prefix(&config.file_prefix)
                .filename_suffix("log")
                .build(log_dir)?;

            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            let layer: BoxedLayer<_> = if config.json_format {
                Box::new(fmt::layer().json().with_ansi(false).with_writer(non_blocking))
            } else {
                Box::new(fmt::layer().with_ansi(false).with_writer(non_blocking))
            };
            (Some(layer), Some(guard))
        } else {
            (None, None)
        };

    registry.with(console_layer).with(file_layer).try_init()?;
    tracing::debug!(
        level = %config.level,
        log_dir = ?config.log_dir,
        json = config.json_format,
        "logging initialized"
    );

    Ok(guard)
}
