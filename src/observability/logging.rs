//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once at startup
//! - Honour RUST_LOG, falling back to the configured level
//! - Optionally mirror events to a daily-rotated log file

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Rotated files kept on disk.
const MAX_LOG_FILES: usize = 7;

#[derive(Debug, Error)]
pub enum LogFileError {
    #[error("cannot create log directory {path:?}: {source}")]
    Dir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot open log file: {0}")]
    Appender(#[from] InitError),
}

/// Filter directive used when RUST_LOG is not set.
pub fn default_directive(level: &str) -> String {
    format!("origin_proxy={level},tower_http={level}")
}

/// `logs/proxy.log` → (`logs`, `proxy.log`). A bare file name lands in the
/// working directory.
fn split_log_path(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let prefix = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "proxy.log".to_string());
    (dir, prefix)
}

/// Non-blocking writer for `path`, rotated daily. Keep the guard alive for as
/// long as events should reach the file; dropping it flushes.
pub fn file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard), LogFileError> {
    let (dir, prefix) = split_log_path(path);
    std::fs::create_dir_all(&dir).map_err(|source| LogFileError::Dir {
        path: dir.clone(),
        source,
    })?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix)
        .max_log_files(MAX_LOG_FILES)
        .build(&dir)?;

    Ok(tracing_appender::non_blocking(appender))
}

/// Install the global subscriber. Calling it twice is a no-op.
///
/// Returns the file writer's guard when `log_file` is set; hold it until exit.
pub fn init_logging(config: &ObservabilityConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(&config.log_level)));

    let file = config
        .log_file
        .as_deref()
        .map(|path| (path, file_writer(Path::new(path))));

    let (file_layer, guard, file_error) = match file {
        Some((_, Ok((writer, guard)))) => (
            Some(fmt::layer().with_writer(writer).with_ansi(false)),
            Some(guard),
            None,
        ),
        Some((path, Err(e))) => (None, None, Some((path, e))),
        None => (None, None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init();

    if let Some((path, e)) = file_error {
        tracing::warn!(log_file = %path, error = %e, "File logging disabled, using stdout only");
    }

    guard
}
