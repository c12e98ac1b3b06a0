//! Positional byte access to the file being paged.
//!
//! The `ByteSource` trait is the seam the line index scans through. `FileSource`
//! implements it over a read-only file handle; `Vec<u8>` implements it for
//! content that is already in memory.

use crate::error::{PagerError, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Random-access reads over a byte sequence that may change between calls
pub trait ByteSource {
    /// Current size in bytes
    fn size(&mut self) -> Result<u64>;

    /// Read up to `len` bytes starting at `offset`
    ///
    /// # Returns
    /// * Fewer than `len` bytes when the range crosses the end
    /// * An empty vector when `offset` is at or beyond the end
    fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>>;
}

impl ByteSource for Vec<u8> {
    fn size(&mut self) -> Result<u64> {
        Ok(self.len() as u64)
    }

    fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let size = self.len();
        let start = usize::try_from(offset).unwrap_or(size).min(size);
        let end = start.saturating_add(len).min(size);
        Ok(self[start..end].to_vec())
    }
}

/// Read-only handle to exactly one path
///
/// A failed read is retried once with a freshly opened handle before the error
/// is surfaced, so a transient failure does not end the session.
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    file: File,
    /// Number of content reads issued, retries included
    reads: u64,
}

impl FileSource {
    /// Open `path` for reading
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| PagerError::from_io_at(&path, e))?;
        Ok(Self {
            path,
            file,
            reads: 0,
        })
    }

    /// Replace the handle with a fresh one for the same path
    ///
    /// Used after rotation, where the path now names a different file.
    pub fn reopen(&mut self) -> Result<()> {
        self.file = File::open(&self.path).map_err(|e| PagerError::from_io_at(&self.path, e))?;
        log::debug!("reopened {}", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn reads(&self) -> u64 {
        self.reads
    }
}

impl ByteSource for FileSource {
    fn size(&mut self) -> Result<u64> {
        let metadata = self
            .file
            .metadata()
            .map_err(|e| PagerError::file_error("Failed to get file metadata", e))?;
        Ok(metadata.len())
    }

    fn read_at(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        self.reads += 1;
        match read_range(&mut self.file, offset, len) {
            Ok(bytes) => Ok(bytes),
            Err(first) => {
                log::debug!(
                    "read of {} bytes at {} in {} failed ({}), retrying with a fresh handle",
                    len,
                    offset,
                    self.path.display(),
                    first
                );
                self.reopen()?;
                self.reads += 1;
                read_range(&mut self.file, offset, len).map_err(|e| {
                    PagerError::file_error(format!("Failed to read {}", self.path.display()), e)
                })
            }
        }
    }
}

fn read_range(file: &mut File, offset: u64, len: usize) -> std::io::Result<Vec<u8>> {
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = Vec::with_capacity(len);
    file.take(len as u64).read_to_end(&mut buf)?;
    Ok(buf)
}
