//! Background change detection for one file.
//!
//! The monitor owns a plain thread that wakes up every poll interval (or earlier,
//! on an OS notification in `WatchMode::Notify`), compares the file's fingerprint
//! with the one the engine last read at, and signals once per detected change.
//! It never reads content; callers react by calling `refresh` on the engine.

use crate::config::WatchMode;
use crate::error::{PagerError, Result};
use crate::file_handler::fingerprint::{FileFingerprint, SharedFingerprint};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// What the monitor observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeEvent {
    /// The file exists with a fingerprint other than the last one read
    Modified(FileFingerprint),
    /// The file can no longer be stat'ed
    Vanished,
}

pub(crate) type ListenerSlot = Arc<Mutex<Option<Arc<dyn Fn() + Send + Sync>>>>;

type Subscribers = Arc<Mutex<Vec<UnboundedSender<ChangeEvent>>>>;

enum Wake {
    FsEvent,
    Shutdown,
}

/// One polling step of the monitor's state machine
///
/// Signals when the file's current state differs from the baseline the engine
/// last read at, but only once per distinct state: repeated checks of the same
/// change stay quiet until the file changes again.
pub(crate) struct ChangeDetector {
    path: PathBuf,
    baseline: SharedFingerprint,
    /// State last signaled; `Some(None)` means the file's disappearance was signaled
    last_signaled: Option<Option<FileFingerprint>>,
}

impl ChangeDetector {
    pub(crate) fn new(path: PathBuf, baseline: SharedFingerprint) -> Self {
        Self {
            path,
            baseline,
            last_signaled: None,
        }
    }

    pub(crate) fn check(&mut self) -> Option<ChangeEvent> {
        let observed = FileFingerprint::capture(&self.path).ok();
        let baseline = *self.baseline.lock();

        if observed == baseline {
            self.last_signaled = None;
            return None;
        }
        if self.last_signaled == Some(observed) {
            return None;
        }

        self.last_signaled = Some(observed);
        Some(match observed {
            Some(fingerprint) => ChangeEvent::Modified(fingerprint),
            None => ChangeEvent::Vanished,
        })
    }
}

/// Handle to the background monitor thread; stops it on drop
pub(crate) struct ChangeMonitor {
    shutdown: Arc<AtomicBool>,
    wake: mpsc::Sender<Wake>,
    handle: Option<JoinHandle<()>>,
    watcher: Option<RecommendedWatcher>,
    subscribers: Subscribers,
}

impl ChangeMonitor {
    pub(crate) fn spawn(
        mut detector: ChangeDetector,
        poll_interval: Duration,
        watch_mode: WatchMode,
        listener: ListenerSlot,
    ) -> Result<Self> {
        let (wake, wake_rx) = mpsc::channel();
        let shutdown = Arc::new(AtomicBool::new(false));
        let subscribers: Subscribers = Arc::new(Mutex::new(Vec::new()));

        let watcher = match watch_mode {
            WatchMode::Poll => None,
            WatchMode::Notify => match watch_parent(&detector.path, wake.clone()) {
                Ok(watcher) => Some(watcher),
                Err(err) => {
                    log::warn!(
                        "cannot watch {} for changes ({}); polling every {:?}",
                        detector.path.display(),
                        err,
                        poll_interval
                    );
                    None
                }
            },
        };

        let thread_shutdown = Arc::clone(&shutdown);
        let thread_subscribers = Arc::clone(&subscribers);
        let handle = std::thread::Builder::new()
            .name("logpager-monitor".to_string())
            .spawn(move || {
                let mut pending = false;
                while !thread_shutdown.load(Ordering::SeqCst) {
                    if !pending {
                        match wake_rx.recv_timeout(poll_interval) {
                            Ok(Wake::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                            Ok(Wake::FsEvent) | Err(RecvTimeoutError::Timeout) => {}
                        }
                    }
                    if thread_shutdown.load(Ordering::SeqCst) {
                        break;
                    }

                    if let Some(event) = detector.check() {
                        dispatch(event, &listener, &thread_subscribers);
                    }

                    // Notifications that piled up meanwhile fold into one more check
                    pending = false;
                    loop {
                        match wake_rx.try_recv() {
                            Ok(Wake::FsEvent) => pending = true,
                            Ok(Wake::Shutdown) => return,
                            Err(_) => break,
                        }
                    }
                }
            })
            .map_err(|e| PagerError::watch(format!("cannot start monitor thread: {}", e)))?;

        Ok(Self {
            shutdown,
            wake,
            handle: Some(handle),
            watcher,
            subscribers,
        })
    }

    /// New receiver for every change event detected from now on
    pub(crate) fn subscribe(&self) -> UnboundedReceiver<ChangeEvent> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Stop the thread and wait for it; safe to call more than once
    pub(crate) fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.watcher = None;
        let _ = self.wake.send(Wake::Shutdown);

        if let Some(handle) = self.handle.take() {
            // Stopping from inside a listener must not join its own thread
            if handle.thread().id() != std::thread::current().id() && handle.join().is_err() {
                log::warn!("change monitor thread panicked");
            }
        }
        self.subscribers.lock().clear();
    }
}

impl Drop for ChangeMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn dispatch(event: ChangeEvent, listener: &ListenerSlot, subscribers: &Subscribers) {
    log::debug!("change detected: {:?}", event);
    subscribers.lock().retain(|tx| tx.send(event).is_ok());

    // Call outside the lock so the listener may replace itself
    let callback = listener.lock().clone();
    if let Some(callback) = callback {
        if catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
            log::warn!("change listener panicked; monitoring continues");
        }
    }
}

/// Watch the parent directory so replacing or deleting the file is noticed too
fn watch_parent(path: &Path, wake: mpsc::Sender<Wake>) -> Result<RecommendedWatcher> {
    let target = path.canonicalize()?;
    let parent = target
        .parent()
        .ok_or_else(|| PagerError::watch("cannot watch the root directory"))?
        .to_path_buf();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                if event.paths.iter().any(|p| p == &target) {
                    let _ = wake.send(Wake::FsEvent);
                }
            }
        },
        notify::Config::default(),
    )?;
    watcher.watch(&parent, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    const WAIT: Duration = Duration::from_secs(5);

    fn baseline_of(path: &Path) -> SharedFingerprint {
        Arc::new(Mutex::new(Some(FileFingerprint::capture(path).unwrap())))
    }

    fn wait_until(timeout: Duration, condition: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    #[test]
    fn test_detector_quiet_when_unchanged() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, b"one\n").unwrap();

        let mut detector = ChangeDetector::new(path.clone(), baseline_of(&path));
        assert_eq!(detector.check(), None);
        assert_eq!(detector.check(), None);
    }

    #[test]
    fn test_detector_signals_once_per_change() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, b"one\n").unwrap();
        let baseline = baseline_of(&path);
        let mut detector = ChangeDetector::new(path.clone(), Arc::clone(&baseline));

        std::fs::write(&path, b"one\ntwo\n").unwrap();
        let current = FileFingerprint::capture(&path).unwrap();
        assert_eq!(detector.check(), Some(ChangeEvent::Modified(current)));
        assert_eq!(detector.check(), None);

        // The engine caught up; nothing further to report
        *baseline.lock() = Some(current);
        assert_eq!(detector.check(), None);

        std::fs::write(&path, b"one\ntwo\nthree\n").unwrap();
        assert!(matches!(detector.check(), Some(ChangeEvent::Modified(_))));
    }

    #[test]
    fn test_detector_reports_vanished() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, b"one\n").unwrap();
        let mut detector = ChangeDetector::new(path.clone(), baseline_of(&path));

        std::fs::remove_file(&path).unwrap();
        assert_eq!(detector.check(), Some(ChangeEvent::Vanished));
        assert_eq!(detector.check(), None);
    }

    #[test]
    fn test_monitor_invokes_listener() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, b"one\n").unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let callback: Arc<dyn Fn() + Send + Sync> = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let listener: ListenerSlot = Arc::new(Mutex::new(Some(callback)));

        let mut monitor = ChangeMonitor::spawn(
            ChangeDetector::new(path.clone(), baseline_of(&path)),
            Duration::from_millis(10),
            WatchMode::Poll,
            listener,
        )
        .unwrap();

        std::fs::write(&path, b"one\ntwo\n").unwrap();
        assert!(wait_until(WAIT, || calls.load(Ordering::SeqCst) >= 1));

        // The baseline was never advanced, so the same change is not repeated
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        monitor.stop();
        monitor.stop();
    }

    #[test]
    fn test_panicking_listener_does_not_stop_monitor() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, b"one\n").unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let callback: Arc<dyn Fn() + Send + Sync> = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            panic!("listener failure");
        });
        let listener: ListenerSlot = Arc::new(Mutex::new(Some(callback)));

        let monitor = ChangeMonitor::spawn(
            ChangeDetector::new(path.clone(), baseline_of(&path)),
            Duration::from_millis(10),
            WatchMode::Poll,
            listener,
        )
        .unwrap();

        std::fs::write(&path, b"one\ntwo\n").unwrap();
        assert!(wait_until(WAIT, || calls.load(Ordering::SeqCst) >= 1));
        std::fs::write(&path, b"one\ntwo\nthree\n").unwrap();
        assert!(wait_until(WAIT, || calls.load(Ordering::SeqCst) >= 2));

        drop(monitor);
    }

    #[test]
    fn test_changes_during_slow_listener_coalesce() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, b"one\n").unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let callback: Arc<dyn Fn() + Send + Sync> = Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(200));
        });
        let listener: ListenerSlot = Arc::new(Mutex::new(Some(callback)));

        let monitor = ChangeMonitor::spawn(
            ChangeDetector::new(path.clone(), baseline_of(&path)),
            Duration::from_millis(10),
            WatchMode::Poll,
            listener,
        )
        .unwrap();

        std::fs::write(&path, b"one\ntwo\n").unwrap();
        assert!(wait_until(WAIT, || calls.load(Ordering::SeqCst) >= 1));

        // Both writes land while the first call is still running
        std::fs::write(&path, b"one\ntwo\nthree\n").unwrap();
        std::fs::write(&path, b"one\ntwo\nthree\nfour\n").unwrap();
        assert!(wait_until(WAIT, || calls.load(Ordering::SeqCst) >= 2));

        std::thread::sleep(Duration::from_millis(400));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        drop(monitor);
    }

    #[test]
    fn test_subscribers_receive_events() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        std::fs::write(&path, b"one\n").unwrap();

        let monitor = ChangeMonitor::spawn(
            ChangeDetector::new(path.clone(), baseline_of(&path)),
            Duration::from_millis(10),
            WatchMode::Notify,
            Arc::new(Mutex::new(None)),
        )
        .unwrap();
        let mut events = monitor.subscribe();

        std::fs::remove_file(&path).unwrap();
        let deadline = Instant::now() + WAIT;
        let mut received = None;
        while received.is_none() && Instant::now() < deadline {
            received = events.try_recv().ok();
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(received, Some(ChangeEvent::Vanished));
    }
}
