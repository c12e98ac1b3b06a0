//! Lazily discovered line boundaries with bounded memory
//!
//! This module provides the LineIndex structure that maps line numbers to the byte
//! offsets where those lines start. Boundaries are discovered on demand by scanning
//! for `\n` with memchr, always starting from the closest boundary that is already
//! known, in whichever direction is shorter. Nothing is ever scanned from the start
//! of the file for a local request.
//!
//! Memory stays bounded regardless of file size: one permanent checkpoint is kept
//! every `checkpoint_stride` lines, and the boundaries discovered around recent
//! requests are kept in a capped set that is compacted around the latest request.
//!
//! Backward discovery reads the block preceding a known boundary and doubles the
//! block on each miss, up to `backscan_max`. A single line longer than that cannot
//! be crossed backwards; callers fall back to a forward scan from the previous
//! checkpoint. Pathologically long lines therefore degrade towards scanning large
//! parts of the file.

use crate::error::Result;
use crate::file_handler::fingerprint::FileFingerprint;
use crate::file_handler::source::ByteSource;
use memchr::{memchr, memrchr};
use std::collections::BTreeMap;
use std::ops::Range;

/// Bounds on every read the index performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanLimits {
    /// Block size for forward scanning
    pub block_size: usize,
    /// First block read when looking backwards for a terminator
    pub backscan_initial: usize,
    /// Largest backwards block before giving up on a line
    pub backscan_max: usize,
    /// Every line whose number is a multiple of this keeps a permanent checkpoint
    pub checkpoint_stride: u64,
    /// Cap on boundaries kept outside the checkpoints
    pub max_recent_boundaries: usize,
}

impl Default for ScanLimits {
    fn default() -> Self {
        Self {
            block_size: 64 * 1024,
            backscan_initial: 4 * 1024,
            backscan_max: 1024 * 1024,
            checkpoint_stride: 1024,
            max_recent_boundaries: 64 * 1024,
        }
    }
}

/// Byte ranges of consecutive lines, terminators excluded
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LineSpans {
    /// One range per line, in file order
    pub spans: Vec<Range<u64>>,
    /// True when no line follows the last span
    pub at_eof: bool,
}

/// Total line count, valid only while the file keeps the size it was counted at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TotalLines {
    lines: u64,
    size: u64,
}

/// Sparse map from line number to the byte offset where the line starts
#[derive(Debug)]
pub struct LineIndex {
    /// Permanent boundaries, one per `checkpoint_stride` lines; always holds line 0
    checkpoints: BTreeMap<u64, u64>,

    /// Boundaries found around recent requests, compacted when over the cap
    recent: BTreeMap<u64, u64>,

    /// Known line count, when the file has been scanned to its end
    total: Option<TotalLines>,

    limits: ScanLimits,
}

impl LineIndex {
    /// Create an empty index with default limits
    pub fn new() -> Self {
        Self::with_limits(ScanLimits::default())
    }

    /// Create an empty index with custom limits
    pub fn with_limits(limits: ScanLimits) -> Self {
        let limits = ScanLimits {
            block_size: limits.block_size.max(1),
            backscan_initial: limits.backscan_initial.max(1),
            backscan_max: limits.backscan_max.max(limits.backscan_initial.max(1)),
            checkpoint_stride: limits.checkpoint_stride.max(1),
            max_recent_boundaries: limits.max_recent_boundaries.max(4),
        };
        Self {
            checkpoints: BTreeMap::from([(0, 0)]),
            recent: BTreeMap::new(),
            total: None,
            limits,
        }
    }

    /// Byte ranges of the lines in `from..to` that exist
    ///
    /// # Returns
    /// * Fewer spans than requested when the file ends first
    /// * No spans when `from` is past the last line
    ///
    /// # Performance
    /// * Locates `from` from the nearest known boundary, then reads forward only
    ///   as far as the last requested line
    pub fn boundaries_between<S: ByteSource>(
        &mut self,
        from: u64,
        to: u64,
        source: &mut S,
    ) -> Result<LineSpans> {
        let mut result = LineSpans {
            spans: Vec::new(),
            at_eof: true,
        };
        if from >= to {
            result.at_eof = false;
            return Ok(result);
        }
        let Some(start) = self.line_start(from, source)? else {
            return Ok(result);
        };

        let size = source.size()?;
        let mut scan = ForwardScan::new(start, size, self.limits.block_size);
        let mut line = from;
        while line < to && scan.position() < scan.size() {
            let begin = scan.position();
            match scan.next_terminator(source)? {
                Some(newline) => {
                    result.spans.push(begin..newline);
                    line += 1;
                    self.record(line, newline + 1);
                }
                None => {
                    // Unterminated trailing fragment: a provisional last line
                    result.spans.push(begin..scan.size());
                    line += 1;
                }
            }
        }

        result.at_eof = scan.position() >= scan.size();
        if result.at_eof {
            self.total = Some(TotalLines {
                lines: line,
                size: scan.size(),
            });
        }
        Ok(result)
    }

    /// Start offset of the line containing `byte_offset`
    ///
    /// Reads backwards from `byte_offset` with a doubling block. When no terminator
    /// is found within `backscan_max` bytes, everything from the start of the file
    /// up to `byte_offset` is treated as one line and 0 is returned.
    pub fn boundary_at_or_before<S: ByteSource>(
        &self,
        byte_offset: u64,
        source: &mut S,
    ) -> Result<u64> {
        let offset = byte_offset.min(source.size()?);
        match self.scan_back(offset, source)? {
            Some(start) => Ok(start),
            None => {
                log::warn!(
                    "no line terminator within {} bytes before offset {}; treating the prefix as one line",
                    self.limits.backscan_max,
                    offset
                );
                Ok(0)
            }
        }
    }

    /// Number of lines known to exist without further scanning
    pub fn count_known_lines(&self) -> u64 {
        match self.total {
            Some(total) => total.lines,
            None => self.highest().0,
        }
    }

    /// Drop every discovered boundary
    pub fn invalidate(&mut self) {
        self.checkpoints.clear();
        self.checkpoints.insert(0, 0);
        self.recent.clear();
        self.total = None;
    }

    /// Start offset of `line`, or None when the file has fewer lines
    pub fn line_start<S: ByteSource>(&mut self, line: u64, source: &mut S) -> Result<Option<u64>> {
        let size = source.size()?;
        if let Some(total) = self.valid_total(size) {
            if line >= total {
                return Ok(None);
            }
        }
        if let Some(offset) = self.known(line) {
            return Ok((offset < size).then_some(offset));
        }

        let (below_line, below_offset) = self.nearest_below(line);
        if let Some((above_line, above_offset)) = self.nearest_above(line) {
            if above_offset <= size && above_line - line < line - below_line {
                if let Some(offset) = self.walk_back(above_line, above_offset, line, source)? {
                    return Ok(Some(offset));
                }
            }
        }
        self.walk_forward(below_line, below_offset, line, source)
    }

    /// Total number of lines in the file
    ///
    /// # Performance
    /// * First call on a large file scans forward from the highest known boundary
    ///   to the end; this is the most expensive operation of the index
    /// * Cached until the file size changes; after an append only the new bytes
    ///   are scanned
    pub fn total_lines<S: ByteSource>(&mut self, source: &mut S) -> Result<u64> {
        let size = source.size()?;
        if let Some(total) = self.valid_total(size) {
            return Ok(total);
        }

        let (mut line, mut start) = self.highest();
        if start > size {
            // The file shrank without anyone telling us
            self.invalidate();
            line = 0;
            start = 0;
        }

        log::trace!("counting lines from line {} at byte {}", line, start);
        let stride = self.limits.checkpoint_stride;
        let mut scan = ForwardScan::new(start, size, self.limits.block_size);
        let mut last_boundary = start;
        while let Some(newline) = scan.next_terminator(source)? {
            line += 1;
            last_boundary = newline + 1;
            if line % stride == 0 {
                self.checkpoints.insert(line, last_boundary);
            }
        }
        self.record(line, last_boundary);

        let lines = line + u64::from(last_boundary < scan.size());
        self.total = Some(TotalLines {
            lines,
            size: scan.size(),
        });
        Ok(lines)
    }

    /// Reconcile discovered boundaries with a file that changed on disk
    ///
    /// Growth keeps every boundary unless the last known one no longer follows a
    /// terminator. Any change without growth discards them all, since a rewrite
    /// of the same size can move boundaries anywhere in the file.
    pub fn on_file_changed<S: ByteSource>(
        &mut self,
        previous: &FileFingerprint,
        current: &FileFingerprint,
        source: &mut S,
    ) -> Result<()> {
        self.total = None;
        if current.size <= previous.size || !current.same_file(previous) {
            log::debug!(
                "file did not grow or was replaced ({} -> {} bytes); dropping line index",
                previous.size,
                current.size
            );
            self.invalidate();
            return Ok(());
        }

        let (_, offset) = self.highest();
        if offset > 0 && self.boundary_at_or_before(offset, source)? != offset {
            log::debug!("boundary at byte {} no longer follows a terminator", offset);
            self.invalidate();
        }
        Ok(())
    }

    fn valid_total(&self, size: u64) -> Option<u64> {
        self.total
            .filter(|total| total.size == size)
            .map(|total| total.lines)
    }

    fn known(&self, line: u64) -> Option<u64> {
        self.checkpoints
            .get(&line)
            .or_else(|| self.recent.get(&line))
            .copied()
    }

    fn nearest_below(&self, line: u64) -> (u64, u64) {
        let checkpoint = self.checkpoints.range(..line).next_back();
        let recent = self.recent.range(..line).next_back();
        match (checkpoint, recent) {
            (Some(c), Some(r)) if r.0 > c.0 => (*r.0, *r.1),
            (Some(c), _) => (*c.0, *c.1),
            (None, Some(r)) => (*r.0, *r.1),
            (None, None) => (0, 0),
        }
    }

    fn nearest_above(&self, line: u64) -> Option<(u64, u64)> {
        let checkpoint = self.checkpoints.range(line + 1..).next();
        let recent = self.recent.range(line + 1..).next();
        match (checkpoint, recent) {
            (Some(c), Some(r)) if r.0 < c.0 => Some((*r.0, *r.1)),
            (Some(c), _) => Some((*c.0, *c.1)),
            (None, r) => r.map(|(l, o)| (*l, *o)),
        }
    }

    fn highest(&self) -> (u64, u64) {
        let checkpoint = self.checkpoints.iter().next_back();
        let recent = self.recent.iter().next_back();
        match (checkpoint, recent) {
            (Some(c), Some(r)) if r.0 > c.0 => (*r.0, *r.1),
            (Some(c), _) => (*c.0, *c.1),
            (None, Some(r)) => (*r.0, *r.1),
            (None, None) => (0, 0),
        }
    }

    fn record(&mut self, line: u64, offset: u64) {
        if line % self.limits.checkpoint_stride == 0 {
            self.checkpoints.insert(line, offset);
            return;
        }
        self.recent.insert(line, offset);
        if self.recent.len() > self.limits.max_recent_boundaries {
            let keep = (self.limits.max_recent_boundaries / 4) as u64;
            self.recent.retain(|l, _| l.abs_diff(line) <= keep);
        }
    }

    /// Step back from a known boundary one line at a time until `target`
    ///
    /// Returns None when a line is too long to cross within the backwards limit.
    fn walk_back<S: ByteSource>(
        &mut self,
        from_line: u64,
        from_offset: u64,
        target: u64,
        source: &mut S,
    ) -> Result<Option<u64>> {
        let mut line = from_line;
        let mut offset = from_offset;
        while line > target {
            // `offset` starts a line after the first, so the byte before it is '\n'
            let Some(previous) = self.scan_back(offset - 1, source)? else {
                log::warn!(
                    "line {} is longer than {} bytes; falling back to a forward scan",
                    line - 1,
                    self.limits.backscan_max
                );
                return Ok(None);
            };
            line -= 1;
            offset = previous;
            self.record(line, offset);
        }
        Ok(Some(offset))
    }

    /// Scan forward from a known boundary until `target`
    fn walk_forward<S: ByteSource>(
        &mut self,
        from_line: u64,
        from_offset: u64,
        target: u64,
        source: &mut S,
    ) -> Result<Option<u64>> {
        let size = source.size()?;
        let mut scan = ForwardScan::new(from_offset, size, self.limits.block_size);
        let mut line = from_line;
        while line < target {
            match scan.next_terminator(source)? {
                Some(newline) => {
                    line += 1;
                    self.record(line, newline + 1);
                }
                None => {
                    // Reached the end before `target`: the line count is now known
                    let last_start = self.known(line).unwrap_or(from_offset);
                    self.total = Some(TotalLines {
                        lines: line + u64::from(last_start < scan.size()),
                        size: scan.size(),
                    });
                    return Ok(None);
                }
            }
        }
        let offset = scan.position();
        Ok((offset < scan.size()).then_some(offset))
    }

    /// Start of the line whose bytes end at `end` (exclusive)
    ///
    /// Returns None when no terminator precedes `end` within `backscan_max` bytes
    /// and the start of the file was not reached either.
    fn scan_back<S: ByteSource>(&self, end: u64, source: &mut S) -> Result<Option<u64>> {
        let mut block = self.limits.backscan_initial as u64;
        let mut searched_from = end;
        loop {
            let from = end.saturating_sub(block);
            if from < searched_from {
                let chunk = source.read_at(from, (searched_from - from) as usize)?;
                if let Some(pos) = memrchr(b'\n', &chunk) {
                    return Ok(Some(from + pos as u64 + 1));
                }
                searched_from = from;
            }
            if from == 0 {
                return Ok(Some(0));
            }
            if block >= self.limits.backscan_max as u64 {
                return Ok(None);
            }
            block = (block * 2).min(self.limits.backscan_max as u64);
        }
    }
}

impl Default for LineIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Buffered forward search for terminators
struct ForwardScan {
    buf: Vec<u8>,
    buf_start: u64,
    pos: u64,
    size: u64,
    block: usize,
}

impl ForwardScan {
    fn new(start: u64, size: u64, block: usize) -> Self {
        Self {
            buf: Vec::new(),
            buf_start: start,
            pos: start,
            size,
            block,
        }
    }

    /// Offset right after the last terminator returned
    fn position(&self) -> u64 {
        self.pos
    }

    fn size(&self) -> u64 {
        self.size
    }

    /// Offset of the next '\n' at or after the current position
    ///
    /// Returns None at the end of the data, leaving the position there.
    fn next_terminator<S: ByteSource>(&mut self, source: &mut S) -> Result<Option<u64>> {
        loop {
            if self.pos >= self.size {
                return Ok(None);
            }
            let buffered_end = self.buf_start + self.buf.len() as u64;
            if self.pos < self.buf_start || self.pos >= buffered_end {
                let len = self.block.min((self.size - self.pos) as usize);
                self.buf = source.read_at(self.pos, len)?;
                self.buf_start = self.pos;
                if self.buf.is_empty() {
                    // Truncated while scanning
                    self.size = self.pos;
                    return Ok(None);
                }
                if self.buf.len() < len {
                    self.size = self.pos + self.buf.len() as u64;
                }
            }

            let rel = (self.pos - self.buf_start) as usize;
            match memchr(b'\n', &self.buf[rel..]) {
                Some(found) => {
                    let newline = self.pos + found as u64;
                    self.pos = newline + 1;
                    return Ok(Some(newline));
                }
                None => self.pos = self.buf_start + self.buf.len() as u64,
            }
        }
    }
}
