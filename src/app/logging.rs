//! Usage: Tracing bootstrap (stderr + optional daily-rolling file, `log` records bridged).

use crate::infra::settings::{LogSettings, DEFAULT_LOG_FILTER};
use crate::shared::error::AppResult;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter};

const LOG_FILE_PREFIX: &str = "localhub-client.log";

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Installs the global subscriber once. Later calls return `Ok(None)`.
///
/// Keep the returned guard alive for as long as file logging should be flushed.
pub fn init(settings: &LogSettings) -> AppResult<Option<WorkerGuard>> {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return Ok(None);
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(settings.filter.trim()))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let (file_layer, guard) = match settings.dir.as_deref() {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| {
                format!("LOG_INIT: failed to create log dir {}: {e}", dir.display())
            })?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("LOG_INIT: global subscriber already set: {e}"))?;

    if let Err(err) = tracing_log::LogTracer::init() {
        tracing::debug!("log bridge not installed: {err}");
    }

    tracing::info!(file_logging = guard.is_some(), "logging initialized");
    Ok(guard)
}

/// Logs panic locations; the payload is not logged since it may carry user data.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
            .unwrap_or_else(|| "unknown".to_string());
        tracing::error!(location = %location, "PANIC: client panicked at {location}");
    }));
}
