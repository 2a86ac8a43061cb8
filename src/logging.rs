//! Logging initialization.
//!
//! The library itself only emits structured `tracing` events; this module
//! is the one-call setup a host uses to see them. Events go to stdout,
//! filtered by `RUST_LOG` (default `info`), and optionally to a
//! non-blocking daily-rolling file as well.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. Call once at startup.
///
/// With `log_dir` set, events are written to a daily-rolling
/// `glimpse.log` in that directory through a non-blocking writer; keep
/// the returned guard alive for as long as events should flush. Without
/// it, events go to stdout and no guard is returned.
///
/// # Errors
///
/// Returns a config error when a global subscriber is already installed.
pub fn init(log_dir: Option<&Path>) -> crate::error::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "glimpse.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .try_init()
                .map_err(|e| crate::error::JournalError::Config(e.to_string()))?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .try_init()
                .map_err(|e| crate::error::JournalError::Config(e.to_string()))?;
            Ok(None)
        }
    }
}
