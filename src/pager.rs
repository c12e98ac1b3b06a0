//! Line-oriented paging over a file that may change underneath.
//!
//! [`ContentReader`] is the surface a viewer drives; [`PagingEngine`] implements
//! it for one file. Change notifications arrive either through the single
//! listener slot or as [`ChangeEvent`] messages from [`PagingEngine::subscribe`];
//! neither path touches content, the caller follows up with `refresh`.

mod engine;
mod monitor;
mod window;

pub use engine::PagingEngine;
pub use monitor::ChangeEvent;

use std::path::Path;

/// Decoded lines in file order, terminators stripped
pub type Lines = Vec<String>;

/// Callback invoked from the monitor thread when the file changes
///
/// It must not call back into the engine; schedule a `refresh` on the thread
/// that owns the engine instead.
pub type ChangeListener = Box<dyn Fn() + Send + Sync + 'static>;

/// Directional, change-aware navigation over the lines of one file
///
/// Every navigation method returns `None` exactly when the file cannot currently
/// be read (missing, unreadable, or the reader was closed). Otherwise it returns
/// zero or more lines; a count of `0` always yields an empty page and leaves the
/// position unchanged.
pub trait ContentReader {
    /// The `n` lines starting `n` lines above the current first line
    fn move_up(&mut self, n: usize) -> Option<Lines>;

    /// The up to `n` lines following the current last line
    fn move_down(&mut self, n: usize) -> Option<Lines>;

    /// The first `n` lines of the file
    fn to_top(&mut self, n: usize) -> Option<Lines>;

    /// The last `n` lines of the file
    ///
    /// # Performance
    /// * The first call has to count the lines of the whole file
    fn to_tail(&mut self, n: usize) -> Option<Lines>;

    /// The current window re-read after checking the file for changes
    fn refresh(&mut self, n: usize) -> Option<Lines>;

    /// Register the change callback, replacing any previous one
    fn set_change_listener(&mut self, listener: ChangeListener);

    /// Path this reader was opened with; still available after `close`
    fn file(&self) -> &Path;

    /// Stop monitoring and release the file; idempotent
    fn close(&mut self);
}
