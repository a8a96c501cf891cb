//! Tracing setup for the `settle` binary.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::{AppError, ErrorKind};

pub const DEFAULT_FILTER: &str = "settle_ledger=info";
pub const LOG_FILE_PREFIX: &str = "log";
pub const LOG_FILE_SUFFIX: &str = "txt";
/// Daily files kept in the log dir; older ones are deleted on rotation.
pub const MAX_LOG_FILES: usize = 4;

/// Install the global subscriber.
///
/// Logs go to stderr, filtered by `RUST_LOG` (default `settle_ledger=info`).
/// With `log_dir`, the same events are also appended to a daily file
/// `<log_dir>/log.<YYYY-MM-DD>.txt`, keeping the newest `MAX_LOG_FILES`.
/// Keep the returned guard alive until exit so the file writer flushes.
pub fn init(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>, AppError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|e| {
                AppError::new(
                    ErrorKind::Config,
                    format!("Failed to create log dir '{}': {e}", dir.display()),
                )
            })?;
            let appender = file_appender(dir)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_thread_names(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    // try_init: tests and embedders may already have a subscriber installed.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    Ok(guard)
}

fn file_appender(dir: &Path) -> Result<RollingFileAppender, AppError> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(LOG_FILE_SUFFIX)
        .max_log_files(MAX_LOG_FILES)
        .build(dir)
        .map_err(|e| {
            AppError::new(
                ErrorKind::Config,
                format!("Failed to open log file in '{}': {e}", dir.display()),
            )
        })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn file_appender_writes_dated_file() {
        let dir = TempDir::new().unwrap();
        let mut appender = file_appender(dir.path()).unwrap();
        appender.write_all(b"hello\n").unwrap();
        appender.flush().unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("log.") && names[0].ends_with(".txt"));
    }
}
