//! Byte-level file access for the paging engine.
//!
//! This module provides everything below the line abstraction: positional reads
//! with bounded retry, change fingerprints, path validation, charset decoding,
//! and the lazily built line index.

pub mod charset;
pub mod fingerprint;
pub mod line_index;
pub mod source;
pub mod validation;

pub use charset::Charset;
pub use fingerprint::FileFingerprint;
pub use line_index::{LineIndex, LineSpans, ScanLimits};
pub use source::{ByteSource, FileSource};
pub use validation::validate_file_path;
