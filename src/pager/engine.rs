//! The paging engine: line-oriented, change-aware navigation over one file.

use super::monitor::{ChangeDetector, ChangeEvent, ChangeMonitor, ListenerSlot};
use super::window::WindowCache;
use super::{ChangeListener, ContentReader, Lines};
use crate::config::PagerConfig;
use crate::error::{PagerError, Result};
use crate::file_handler::fingerprint::{FileFingerprint, SharedFingerprint};
use crate::file_handler::{validate_file_path, ByteSource, FileSource, LineIndex};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

/// Lines read for one range
struct Page {
    lines: Lines,
    at_eof: bool,
}

/// Pages through one file by line without holding more than the current window
///
/// Every navigation operation first compares the file's fingerprint with the one
/// captured at the last successful read, reconciles the line index with whatever
/// changed, and only then touches content. All failures are collapsed into the
/// absent-file result (`None`) and logged.
///
/// ## Navigation conventions
///
/// * `move_up(n)`: the window becomes the `n` lines starting `n` lines above the
///   current first line, clamped at the top of the file
/// * `move_down(n)`: returns the lines following the current last line. When
///   fewer than `n` remain, the window is re-anchored to the `n` lines ending at
///   the last line. When none remain, the unchanged window is returned
/// * `refresh(n)`: re-reads from the current first line. A window that reached
///   the end of a file that changed follows the new tail instead
pub struct PagingEngine {
    path: PathBuf,
    config: PagerConfig,
    source: Option<FileSource>,
    index: LineIndex,
    window: WindowCache,
    fingerprint: SharedFingerprint,
    monitor: Option<ChangeMonitor>,
    listener: ListenerSlot,
    closed: bool,
}

impl PagingEngine {
    /// Open `path` and start monitoring it for changes
    ///
    /// # Errors
    /// * `FileNotFound`, `NotAFile` or `PermissionDenied` when the path cannot be paged
    /// * `WatchError` when the monitor thread cannot be started
    pub fn open(path: impl AsRef<Path>, config: PagerConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        validate_file_path(&path)?;

        let source = FileSource::open(&path)?;
        let fingerprint: SharedFingerprint =
            Arc::new(Mutex::new(Some(FileFingerprint::capture(&path)?)));
        let listener: ListenerSlot = Arc::new(Mutex::new(None));
        let monitor = ChangeMonitor::spawn(
            ChangeDetector::new(path.clone(), Arc::clone(&fingerprint)),
            config.poll_interval,
            config.watch_mode,
            Arc::clone(&listener),
        )?;

        log::info!(
            "opened {} (charset {}, polling every {:?})",
            path.display(),
            config.charset,
            config.poll_interval
        );
        Ok(Self {
            index: LineIndex::with_limits(config.scan),
            path,
            config,
            source: Some(source),
            window: WindowCache::new(),
            fingerprint,
            monitor: Some(monitor),
            listener,
            closed: false,
        })
    }

    /// Stream of change events, independent of the listener slot
    ///
    /// After `close` the returned receiver yields nothing.
    pub fn subscribe(&self) -> UnboundedReceiver<ChangeEvent> {
        match &self.monitor {
            Some(monitor) => monitor.subscribe(),
            None => tokio::sync::mpsc::unbounded_channel().1,
        }
    }

    /// Absolute line number of the first line in the current window
    pub fn window_start(&self) -> u64 {
        self.window.start()
    }

    /// Settings the engine was opened with
    pub fn config(&self) -> &PagerConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn navigate<F>(&mut self, operation: &'static str, n: usize, step: F) -> Option<Lines>
    where
        F: FnOnce(&mut Self, bool) -> Result<Lines>,
    {
        match self.run(n, step) {
            Ok(lines) => {
                log::debug!(
                    "{}({}) -> {} lines, window at line {}",
                    operation,
                    n,
                    lines.len(),
                    self.window.start()
                );
                Some(lines)
            }
            Err(err) if err.is_absent() => {
                log::debug!("{}({}) on {}: {}", operation, n, self.path.display(), err);
                None
            }
            Err(err) => {
                log::warn!(
                    "{}({}) on {} failed: {}",
                    operation,
                    n,
                    self.path.display(),
                    err
                );
                None
            }
        }
    }

    fn run<F>(&mut self, n: usize, step: F) -> Result<Lines>
    where
        F: FnOnce(&mut Self, bool) -> Result<Lines>,
    {
        let (current, changed) = self.sync_with_disk()?;
        let lines = if n == 0 {
            Vec::new()
        } else {
            step(self, changed)?
        };
        *self.fingerprint.lock() = Some(current);
        Ok(lines)
    }

    /// Compare the file on disk with the last read and reconcile cached state
    ///
    /// Returns the current fingerprint and whether it differs from the last one.
    fn sync_with_disk(&mut self) -> Result<(FileFingerprint, bool)> {
        if self.closed {
            return Err(PagerError::Closed);
        }

        let current = match FileFingerprint::capture(&self.path) {
            Ok(fingerprint) => fingerprint,
            Err(err) => {
                self.forget_source();
                return Err(err);
            }
        };
        let previous = *self.fingerprint.lock();

        let reusable =
            self.source.is_some() && previous.is_some_and(|prev| prev.same_file(&current));
        let changed = if !reusable {
            log::debug!("(re)opening {}", self.path.display());
            match FileSource::open(&self.path) {
                Ok(source) => self.source = Some(source),
                Err(err) => {
                    self.forget_source();
                    return Err(err);
                }
            }
            self.index.invalidate();
            true
        } else if previous != Some(current) {
            if let (Some(prev), Some(source)) = (previous, self.source.as_mut()) {
                self.index.on_file_changed(&prev, &current, source)?;
            }
            true
        } else {
            false
        };

        if changed {
            self.window.mark_stale();
        }
        Ok((current, changed))
    }

    fn forget_source(&mut self) {
        self.source = None;
        self.window.mark_stale();
        *self.fingerprint.lock() = None;
    }

    fn line_exists(&mut self, line: u64) -> Result<bool> {
        let source = self.source.as_mut().ok_or(PagerError::Closed)?;
        Ok(self.index.line_start(line, source)?.is_some())
    }

    /// Read and decode the lines in `start..start + count` that exist
    fn read_range(&mut self, start: u64, count: usize) -> Result<Page> {
        let charset = self.config.charset;
        let source = self.source.as_mut().ok_or(PagerError::Closed)?;
        let end = start.saturating_add(count as u64);
        let spans = self.index.boundaries_between(start, end, source)?;

        let (Some(first), Some(last)) = (spans.spans.first(), spans.spans.last()) else {
            return Ok(Page {
                lines: Vec::new(),
                at_eof: spans.at_eof,
            });
        };
        let base = first.start;
        let bytes = source.read_at(base, (last.end - base) as usize)?;

        let lines = spans
            .spans
            .iter()
            .map(|span| {
                let from = ((span.start - base) as usize).min(bytes.len());
                let to = ((span.end - base) as usize).min(bytes.len());
                charset.decode_line(&bytes[from..to])
            })
            .collect();
        Ok(Page {
            lines,
            at_eof: spans.at_eof,
        })
    }

    /// Make the window `start..start + count`, reusing held lines where possible
    fn load(&mut self, start: u64, count: usize) -> Result<Lines> {
        let end = start.saturating_add(count as u64);
        if !self.window.shift_if_overlapping(start, count) {
            let page = self.read_range(start, count)?;
            self.window.replace(start, page.lines, page.at_eof);
            return Ok(self.window.current_window());
        }

        if start < self.window.start() {
            let missing = (self.window.start() - start) as usize;
            let head = self.read_range(start, missing)?;
            if head.lines.len() < missing {
                // The file changed under the read; start over
                let page = self.read_range(start, count)?;
                self.window.replace(start, page.lines, page.at_eof);
                return Ok(self.window.current_window());
            }
            self.window.prepend(head.lines);
        }

        if self.window.end() < end && !self.window.at_eof() {
            let from = self.window.end();
            let tail = self.read_range(from, (end - from) as usize)?;
            self.window.extend(tail.lines, tail.at_eof);
        }
        Ok(self.window.current_window())
    }

    fn top(&mut self, n: usize) -> Result<Lines> {
        self.load(0, n)
    }

    fn tail(&mut self, n: usize) -> Result<Lines> {
        let source = self.source.as_mut().ok_or(PagerError::Closed)?;
        let total = self.index.total_lines(source)?;
        self.load(total.saturating_sub(n as u64), n)
    }

    fn up(&mut self, n: usize) -> Result<Lines> {
        let start = self.window.start().saturating_sub(n as u64);
        self.load(start, n)
    }

    fn down(&mut self, n: usize) -> Result<Lines> {
        let from = self.window.end();
        let nothing_below = self.window.is_fresh() && self.window.at_eof();
        if nothing_below || !self.line_exists(from)? {
            return self.stay(n);
        }

        let revealed = self.load(from, n)?;
        if revealed.is_empty() {
            return self.tail(n);
        }
        if revealed.len() < n {
            // Keep a full window ending at the last line
            let last = from + revealed.len() as u64;
            self.load(last.saturating_sub(n as u64), n)?;
        }
        Ok(revealed)
    }

    /// Re-materialize the window where it is, or at the tail if its start is gone
    fn stay(&mut self, n: usize) -> Result<Lines> {
        let start = self.window.start();
        if start > 0 && !self.line_exists(start)? {
            return self.tail(n);
        }
        self.load(start, n)
    }

    fn reread(&mut self, n: usize, changed: bool) -> Result<Lines> {
        let start = self.window.start();
        if !changed && self.window.is_fresh() {
            return self.load(start, n);
        }
        if self.window.at_eof() || !self.line_exists(start)? {
            return self.tail(n);
        }
        self.load(start, n)
    }

    #[cfg(test)]
    fn content_reads(&self) -> u64 {
        self.source.as_ref().map_or(0, FileSource::reads)
    }
}

impl ContentReader for PagingEngine {
    fn move_up(&mut self, n: usize) -> Option<Lines> {
        self.navigate("move_up", n, |engine, _| engine.up(n))
    }

    fn move_down(&mut self, n: usize) -> Option<Lines> {
        self.navigate("move_down", n, |engine, _| engine.down(n))
    }

    fn to_top(&mut self, n: usize) -> Option<Lines> {
        self.navigate("to_top", n, |engine, _| engine.top(n))
    }

    /// Last `n` lines of the file
    ///
    /// The first call on a large file counts every line from the highest known
    /// boundary to the end of the file. Later calls only scan appended bytes.
    fn to_tail(&mut self, n: usize) -> Option<Lines> {
        self.navigate("to_tail", n, |engine, _| engine.tail(n))
    }

    fn refresh(&mut self, n: usize) -> Option<Lines> {
        self.navigate("refresh", n, |engine, changed| engine.reread(n, changed))
    }

    fn set_change_listener(&mut self, listener: ChangeListener) {
        if self.closed {
            log::debug!(
                "ignoring change listener for closed {}",
                self.path.display()
            );
            return;
        }
        *self.listener.lock() = Some(Arc::from(listener));
    }

    fn file(&self) -> &Path {
        &self.path
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(mut monitor) = self.monitor.take() {
            monitor.stop();
        }
        *self.listener.lock() = None;
        *self.fingerprint.lock() = None;
        self.source = None;
        self.window.clear();
        self.index.invalidate();
        log::info!("closed {}", self.path.display());
    }
}

impl Drop for PagingEngine {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for PagingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagingEngine")
            .field("path", &self.path)
            .field("window_start", &self.window.start())
            .field("window_len", &self.window.len())
            .field("closed", &self.closed)
            .finish()
    }
}
