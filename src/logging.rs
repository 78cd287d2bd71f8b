//! Log setup: a human-readable console layer on stderr plus one debug-level
//! file per run, `etl_<YYYYMMDD_HHMMSS>.log`, in the configured directory.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::LoggingSettings;
use crate::error::{PipelineError, Result};

/// Keeps the file writer flushing until dropped. Hold it for the process
/// lifetime.
pub struct LogGuard {
    _guard: Option<WorkerGuard>,
    /// The log file of this run, if file logging is enabled.
    pub file: Option<PathBuf>,
}

/// Name of the log file for a run started at `started`.
pub fn log_file_name(started: NaiveDateTime) -> String {
    format!("etl_{}.log", started.format("%Y%m%d_%H%M%S"))
}

/// Install the global subscriber. `RUST_LOG` overrides the console level.
pub fn init(settings: &LoggingSettings, log_dir: &Path, started: NaiveDateTime) -> Result<LogGuard> {
    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level));
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(console_filter);

    if !settings.file_enabled {
        tracing_subscriber::registry()
            .with(console_layer)
            .try_init()
            .map_err(|e| PipelineError::Logging(e.to_string()))?;
        return Ok(LogGuard {
            _guard: None,
            file: None,
        });
    }

    fs::create_dir_all(log_dir).map_err(|e| {
        PipelineError::Logging(format!("cannot create log directory {}: {}", log_dir.display(), e))
    })?;
    let file_name = log_file_name(started);
    let file_appender = tracing_appender::rolling::never(log_dir, &file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| PipelineError::Logging(e.to_string()))?;

    Ok(LogGuard {
        _guard: Some(guard),
        file: Some(log_dir.join(file_name)),
    })
}
