//! Cheap change detection for a file on disk.

use crate::error::{PagerError, Result};
use std::fs::Metadata;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

/// Device and inode of a file; lets rotation be told apart from an append
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    device: u64,
    inode: u64,
}

/// (size, modification time) snapshot of a file, plus its identity where the
/// platform exposes one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileFingerprint {
    pub size: u64,
    pub modified: Option<SystemTime>,
    identity: Option<FileIdentity>,
}

/// Fingerprint captured at the last successful read, shared with the change monitor
pub(crate) type SharedFingerprint = Arc<parking_lot::Mutex<Option<FileFingerprint>>>;

impl FileFingerprint {
    /// Stat `path` and fingerprint it
    ///
    /// # Errors
    /// * `FileNotFound` / `PermissionDenied` when the path cannot be stat'ed
    /// * `NotAFile` when the path is no longer a regular file
    pub fn capture(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path).map_err(|e| PagerError::from_io_at(path, e))?;
        if !metadata.is_file() {
            return Err(PagerError::NotAFile {
                path: path.to_path_buf(),
            });
        }
        Ok(Self::from_metadata(&metadata))
    }

    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            size: metadata.len(),
            modified: metadata.modified().ok(),
            identity: identity_of(metadata),
        }
    }

    /// Fingerprint with no identity, for exercising change handling without a file
    #[cfg(test)]
    pub(crate) fn detached(size: u64) -> Self {
        Self {
            size,
            modified: None,
            identity: None,
        }
    }

    /// Whether both fingerprints describe the same underlying file.
    ///
    /// Platforms without identity information always answer true.
    pub fn same_file(&self, other: &FileFingerprint) -> bool {
        match (self.identity, other.identity) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}

#[cfg(unix)]
fn identity_of(metadata: &Metadata) -> Option<FileIdentity> {
    use std::os::unix::fs::MetadataExt;
    Some(FileIdentity {
        device: metadata.dev(),
        inode: metadata.ino(),
    })
}

#[cfg(not(unix))]
fn identity_of(_metadata: &Metadata) -> Option<FileIdentity> {
    None
}
