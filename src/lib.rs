//! # logpager - Line Paging for Large, Changing Log Files
//!
//! A paging engine that lets a viewer navigate arbitrarily large, append-mostly
//! text files by line without loading them into memory, while staying correct
//! when the file is appended to, truncated, rotated or deleted underneath.
//!
//! ## Features
//!
//! - **Bounded Memory**: Only the current window of lines is materialized; line
//!   boundaries are discovered lazily and kept as sparse checkpoints
//! - **Directional Navigation**: Move up and down by any count, jump to the top or
//!   the tail, with stable semantics at both ends of the file
//! - **Change Aware**: A background monitor signals external modification; the
//!   next `refresh` reconciles the window, following the tail when it was there
//! - **Never Crashes the Caller**: Missing or unreadable files degrade to an
//!   explicit absent-file result instead of an error
//!
//! ## Architecture
//!
//! - [`error`] - Centralized error types and handling
//! - [`config`] - Engine configuration, optionally loaded from TOML
//! - [`logging`] - Explicit process-wide logging handle
//! - [`file_handler`] - Positional reads, fingerprints, decoding and the line index
//! - [`pager`] - The paging engine, its window cache and change monitor

// Core modules
pub mod config;
pub mod error;
pub mod file_handler;
pub mod logging;

// Paging
pub mod pager;

// Re-export commonly used types for convenience
pub use error::{PagerError, Result};

// Public API surface for external usage
pub use config::{PagerConfig, WatchMode};
pub use file_handler::{Charset, FileFingerprint, ScanLimits};
pub use logging::{LogHandle, LogSettings, LogTarget};
pub use pager::{ChangeEvent, ChangeListener, ContentReader, Lines, PagingEngine};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
