//! Logging infrastructure.
//!
//! Structured `tracing` output to either the console or a log file:
//! - `console`: human-readable lines on stderr
//! - `file`: `<directory>/<file>` (cleared on start) through a non-blocking writer
//! - Level comes from `[logging] level`; RUST_LOG overrides it
//!
//! Thread ids and targets are included so interleaved worker output can be
//! told apart.

use std::fs;
use std::io;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::{LogHandler, LoggingSettings};

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard will flush and close the log file writer.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the global subscriber.
///
/// # Arguments
///
/// * `settings` - Level, handler, and file location
///
/// # Returns
///
/// LoggingGuard that must be kept alive for file logging to flush
///
/// # Errors
///
/// Returns error if the log directory cannot be created, the log file cannot
/// be cleared, or a global subscriber is already installed.
pub fn init_logging(settings: &LoggingSettings) -> Result<LoggingGuard, io::Error> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.level));

    let (file_layer, file_guard) = match settings.handler {
        LogHandler::File => {
            let (writer, guard) = file_writer(settings)?;
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_thread_ids(true)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        LogHandler::Console => (None, None),
    };

    let console_layer = (settings.handler == LogHandler::Console).then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(io::stderr)
            .with_thread_ids(true)
            .with_target(true)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(io::Error::other)?;

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

/// Prepares the log file and returns its non-blocking writer.
fn file_writer(
    settings: &LoggingSettings,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard), io::Error> {
    fs::create_dir_all(&settings.directory)?;
    fs::write(settings.directory.join(&settings.file), "")?;

    let appender = tracing_appender::rolling::never(&settings.directory, &settings.file);
    Ok(tracing_appender::non_blocking(appender))
}
