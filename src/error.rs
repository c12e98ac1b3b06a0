//! Error types and handling infrastructure for logpager.
//!
//! This module provides a centralized error handling system using `thiserror` for
//! library error types. The binary layers `anyhow` on top for context.
//!
//! ## Design Principles
//!
//! - **Absent is not fatal**: a missing or unreadable file is reported as a value,
//!   never as a panic, so a UI loop can keep running
//! - **Context preservation**: include the path or operation that failed
//! - **Consistency**: standardized Result type across all modules

use std::path::{Path, PathBuf};
use thiserror::Error;

/// The main error type for logpager operations.
#[derive(Error, Debug)]
pub enum PagerError {
    /// File system related errors (read failures, metadata failures, etc.)
    #[error("File operation failed: {message}")]
    FileError {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// File not found specifically (deleted, rotated away, never existed)
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Path exists but is not a regular file
    #[error("Path is not a regular file: {path}")]
    NotAFile { path: PathBuf },

    /// Permission denied accessing file
    #[error("Permission denied accessing file: {path}")]
    PermissionDenied { path: PathBuf },

    /// The engine was closed; no further content can be produced
    #[error("Paging engine is closed")]
    Closed,

    /// Change notification setup or delivery errors
    #[error("File watch failed: {message}")]
    WatchError { message: String },

    /// Configuration related errors
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// Logger installation errors
    #[error("Logging setup failed: {message}")]
    LoggingError { message: String },

    /// Invalid command line arguments
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },
}

/// Standard Result type for logpager operations.
pub type Result<T> = std::result::Result<T, PagerError>;

impl PagerError {
    /// Create a FileError from an io::Error with additional context
    pub fn file_error(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::FileError {
            message: message.into(),
            source,
        }
    }

    /// Map an io::Error raised while touching `path` to the most specific variant
    pub fn from_io_at(path: &Path, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::FileNotFound {
                path: path.to_path_buf(),
            },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => Self::FileError {
                message: format!("I/O failed on {}", path.display()),
                source,
            },
        }
    }

    /// Create a WatchError with a descriptive message
    pub fn watch(message: impl Into<String>) -> Self {
        Self::WatchError {
            message: message.into(),
        }
    }

    /// Create a ConfigError with a descriptive message
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a LoggingError with a descriptive message
    pub fn logging(message: impl Into<String>) -> Self {
        Self::LoggingError {
            message: message.into(),
        }
    }

    /// Create an InvalidArgument error with a descriptive message
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Whether this error means "the file cannot currently be read".
    ///
    /// Navigation operations collapse every error into the absent-file result;
    /// this distinguishes the expected cases from surprising ones for logging.
    pub fn is_absent(&self) -> bool {
        matches!(
            self,
            Self::FileNotFound { .. }
                | Self::PermissionDenied { .. }
                | Self::NotAFile { .. }
                | Self::Closed
        )
    }
}

impl From<std::io::Error> for PagerError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::FileError {
                message: "File not found".to_string(),
                source: err,
            },
            std::io::ErrorKind::PermissionDenied => Self::FileError {
                message: "Permission denied".to_string(),
                source: err,
            },
            _ => Self::FileError {
                message: "IO operation failed".to_string(),
                source: err,
            },
        }
    }
}

impl From<notify::Error> for PagerError {
    fn from(err: notify::Error) -> Self {
        Self::watch(err.to_string())
    }
}
