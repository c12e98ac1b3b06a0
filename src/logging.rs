//! Process-wide logging handle.
//!
//! Logging is initialized explicitly by the program that owns the process and
//! shut down explicitly when it exits. Library code only ever uses the `log`
//! macros; nothing in the paging engine installs a logger.

use crate::error::{PagerError, Result};
use log::LevelFilter;
use std::fs::OpenOptions;
use std::path::PathBuf;

/// Where log records are written
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LogTarget {
    #[default]
    Stderr,
    /// Append to a file, creating it when missing
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Default level; `RUST_LOG` directives still override it
    pub level: LevelFilter,
    pub target: LogTarget,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: LevelFilter::Warn,
            target: LogTarget::Stderr,
        }
    }
}

/// Proof that the logger is installed; flushes on shutdown
#[derive(Debug)]
#[must_use = "dropping the handle flushes and ends explicit logging ownership"]
pub struct LogHandle {
    level: LevelFilter,
}

impl LogHandle {
    /// Install the process-wide logger
    ///
    /// # Errors
    /// * `LoggingError` if a logger is already installed or the log file cannot be opened
    pub fn init(settings: LogSettings) -> Result<Self> {
        let mut builder = env_logger::Builder::new();
        builder.filter_level(settings.level).parse_default_env();

        if let LogTarget::File(path) = &settings.target {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    PagerError::logging(format!("cannot open {}: {}", path.display(), e))
                })?;
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }

        builder
            .try_init()
            .map_err(|e| PagerError::logging(e.to_string()))?;
        log::debug!("logging initialized at {}", settings.level);

        Ok(Self {
            level: settings.level,
        })
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }

    /// Flush buffered records and release the handle
    pub fn shutdown(self) {
        // Drop does the flushing
    }
}

impl Drop for LogHandle {
    fn drop(&mut self) {
        log::logger().flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = LogSettings::default();
        assert_eq!(settings.level, LevelFilter::Warn);
        assert_eq!(settings.target, LogTarget::Stderr);
    }

    // Both init calls live in one test: the logger is process-wide
    #[test]
    fn test_init_once_then_reject() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("pager.log");

        let handle = LogHandle::init(LogSettings {
            level: LevelFilter::Info,
            target: LogTarget::File(path.clone()),
        })
        .expect("first init succeeds");
        assert_eq!(handle.level(), LevelFilter::Info);
        assert!(path.exists());

        let second = LogHandle::init(LogSettings::default());
        assert!(matches!(second, Err(PagerError::LoggingError { .. })));

        handle.shutdown();
    }
}
