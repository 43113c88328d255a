use crate::error::LogFileError;
use std::fs;
use std::path::Path;
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_DIRECTIVE: &str = "urlhaus_etl=info";
const LOG_FILE_PREFIX: &str = "etl.log";

/// Daily-rotated appender under `dir`, creating the directory first
pub fn file_appender(dir: &Path) -> Result<RollingFileAppender, LogFileError> {
    fs::create_dir_all(dir).map_err(|source| LogFileError::Dir {
        path: dir.to_path_buf(),
        source,
    })?;
    Ok(RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .build(dir)?)
}

/// Initializes the logging system with console output and, when `log_dir`
/// is usable, a JSON file.
///
/// The returned guard flushes the file writer when dropped; keep it alive
/// for the life of the process. `None` means file logging is off and only
/// the console receives events.
pub fn init_logging(log_dir: &Path) -> Option<WorkerGuard> {
    let (file_layer, guard, file_error) = match file_appender(log_dir) {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().json().with_writer(writer)), Some(guard), None)
        }
        Err(e) => (None, None, Some(e)),
    };

    let console_layer = fmt::layer().with_writer(std::io::stderr);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    if let Some(e) = file_error {
        warn!("File logging disabled, console only: {}", e);
    }
    guard
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_file_appender_creates_directory() {
        let dir = tempdir().unwrap();
        let logs = dir.path().join("nested").join("logs");
        assert!(file_appender(&logs).is_ok());
        assert!(logs.is_dir());
    }

    #[test]
    fn test_file_appender_on_regular_file_is_error() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("logs");
        fs::write(&blocker, "not a directory").unwrap();

        let err = file_appender(&blocker).unwrap_err();
        assert!(matches!(err, LogFileError::Dir { .. }));
        assert!(err.to_string().contains("Cannot create log directory"));
    }
}
