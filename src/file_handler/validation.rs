//! File validation utilities for ensuring a path can be paged.
//!
//! This module checks that a path is suitable before a paging engine is built
//! for it. Empty files are accepted: a log that has not been written yet is a
//! normal thing to open.

use crate::error::{PagerError, Result};
use std::fs::File;
use std::path::Path;

/// Validate that a file path is accessible and suitable for paging
///
/// # Validations Performed
/// - Path exists and is a regular file (not a directory)
/// - File is readable by the current process
///
/// # Error Cases
/// - `FileNotFound` when the path does not exist
/// - `NotAFile` when the path points to a directory or special file
/// - `PermissionDenied` when the file is not readable
pub fn validate_file_path(path: &Path) -> Result<()> {
    let metadata = std::fs::metadata(path).map_err(|e| PagerError::from_io_at(path, e))?;

    if !metadata.is_file() {
        return Err(PagerError::NotAFile {
            path: path.to_path_buf(),
        });
    }

    // Try to open the file to verify read permissions
    File::open(path).map_err(|e| PagerError::from_io_at(path, e))?;

    Ok(())
}
