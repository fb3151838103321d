//! File logging for the CLI.
//!
//! The binary runs inside the user's interactive shell, so tracing output goes
//! to `<base>/logs/cdhooks.log` (daily rotation) and never to the terminal.
//! User-facing diagnostics are printed separately on stderr.

use std::env;

use cdhooks_core::{is_truthy, StorageConfig};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const DEBUG_LOG_ENV: &str = "CDHOOKS_DEBUG_LOG";
const LOG_FILE_PREFIX: &str = "cdhooks.log";

/// Installs the global subscriber. Keep the returned guard alive until exit so
/// buffered lines get flushed. Returns `None` when logging is unavailable.
pub fn init() -> Option<WorkerGuard> {
    let storage = StorageConfig::resolve().ok()?;
    let logs_dir = storage.logs_dir();
    fs_err::create_dir_all(&logs_dir).ok()?;

    let appender = tracing_appender::rolling::daily(&logs_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .ok()?;
    Some(guard)
}

fn filter() -> EnvFilter {
    let debug_enabled = env::var(DEBUG_LOG_ENV)
        .map(|value| is_truthy(&value))
        .unwrap_or(false);
    if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    }
}
