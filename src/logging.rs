//! Tracing subscriber setup.
//!
//! stdout carries the bar protocol, so logs go to stderr or to a file.

use crate::error::{RelayError, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the global subscriber. `RUST_LOG` takes precedence over `level`.
///
/// With a log file the returned guard must be held until exit, otherwise
/// buffered lines are lost.
pub fn init(level: &str, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let registry = tracing_subscriber::registry().with(filter(level));

    let Some(path) = log_file else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| RelayError::Settings(format!("logging: {}", e)))?;
        return Ok(None);
    };

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let file_name = path
        .file_name()
        .ok_or_else(|| RelayError::Settings(format!("bad log file {}", path.display())))?;
    std::fs::create_dir_all(dir).map_err(|e| {
        RelayError::Settings(format!("cannot create log directory {}: {}", dir.display(), e))
    })?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
    registry
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
        .try_init()
        .map_err(|e| RelayError::Settings(format!("logging: {}", e)))?;
    Ok(Some(guard))
}

/// Fallback for errors that happen before settings are known
pub fn init_default() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(crate::config::DEFAULT_LOG_LEVEL))
        .with_writer(std::io::stderr)
        .try_init();
}
