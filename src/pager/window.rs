//! The materialized page of lines held by an engine.
//!
//! Pure state, no I/O. The engine asks `shift_if_overlapping` whether any of the
//! held lines can be reused for a new range; reusing them must always produce the
//! same lines a full re-read would.

use super::Lines;

#[derive(Debug, Default)]
pub(crate) struct WindowCache {
    /// Absolute line number of the first held line
    start: u64,
    lines: Lines,
    /// No line follows the last held one
    at_eof: bool,
    /// Filled since the file last changed on disk
    fresh: bool,
}

impl WindowCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn current_window(&self) -> Lines {
        self.lines.clone()
    }

    pub(crate) fn start(&self) -> u64 {
        self.start
    }

    /// Line number one past the last held line
    pub(crate) fn end(&self) -> u64 {
        self.start + self.lines.len() as u64
    }

    pub(crate) fn len(&self) -> usize {
        self.lines.len()
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.at_eof
    }

    pub(crate) fn is_fresh(&self) -> bool {
        self.fresh
    }

    pub(crate) fn replace(&mut self, start: u64, lines: Lines, at_eof: bool) {
        self.start = start;
        self.lines = lines;
        self.at_eof = at_eof;
        self.fresh = true;
    }

    /// Trim the held lines to their intersection with `start..start + count`
    ///
    /// Returns false, leaving the cache empty, when nothing can be reused: the
    /// ranges are disjoint or the held lines may no longer match the file.
    pub(crate) fn shift_if_overlapping(&mut self, start: u64, count: usize) -> bool {
        let end = start.saturating_add(count as u64);
        if !self.fresh || start >= self.end() || self.start >= end {
            self.clear();
            return false;
        }

        let keep_from = start.max(self.start);
        let keep_to = end.min(self.end());
        if keep_to < self.end() {
            self.lines.truncate((keep_to - self.start) as usize);
            self.at_eof = false;
        }
        self.lines.drain(..(keep_from - self.start) as usize);
        self.start = keep_from;
        true
    }

    /// Put lines immediately before the held ones
    pub(crate) fn prepend(&mut self, mut head: Lines) {
        self.start -= head.len() as u64;
        head.append(&mut self.lines);
        self.lines = head;
    }

    /// Put lines immediately after the held ones
    pub(crate) fn extend(&mut self, tail: Lines, at_eof: bool) {
        self.lines.extend(tail);
        self.at_eof = at_eof;
    }

    /// Keep the position but forbid reuse of the held lines
    pub(crate) fn mark_stale(&mut self) {
        self.fresh = false;
    }

    pub(crate) fn clear(&mut self) {
        self.lines.clear();
        self.at_eof = false;
        self.fresh = false;
    }
}
