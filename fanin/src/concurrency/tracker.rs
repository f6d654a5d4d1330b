//! Accounting for spawned watcher tasks.
//!
//! Every watcher holds a [`WatcherGuard`] for its whole lifetime, so [`WatcherTracker::live`]
//! counts watchers that are still runnable or blocked. [`WatcherTracker::outputs_fired`] counts
//! the pending→fired transitions those watchers performed. The guard is released when the task
//! finishes or when the runtime drops it.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct WatcherTrackerInner {
    live: AtomicUsize,
    spawned: AtomicUsize,
    outputs_fired: AtomicUsize,
    idle: Notify,
}

/// Shared counters for watcher tasks spawned by a combinator.
#[derive(Debug, Clone, Default)]
pub struct WatcherTracker {
    inner: Arc<WatcherTrackerInner>,
}

impl WatcherTracker {
    /// Creates a tracker with no registered watchers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a watcher and returns the guard that must live as long as it does.
    pub fn register(&self) -> WatcherGuard {
        self.inner.spawned.fetch_add(1, Ordering::Relaxed);
        self.inner.live.fetch_add(1, Ordering::AcqRel);

        WatcherGuard {
            inner: self.inner.clone(),
        }
    }

    /// Number of watchers that have not finished yet.
    pub fn live(&self) -> usize {
        self.inner.live.load(Ordering::Acquire)
    }

    /// Number of watchers registered since the tracker was created.
    pub fn spawned(&self) -> usize {
        self.inner.spawned.load(Ordering::Relaxed)
    }

    /// Records that a watcher moved a combined output to fired.
    pub fn record_output_fired(&self) {
        self.inner.outputs_fired.fetch_add(1, Ordering::AcqRel);
    }

    /// Number of combined outputs fired by watchers.
    ///
    /// Each combination contributes at most one, however many of its inputs fire.
    pub fn outputs_fired(&self) -> usize {
        self.inner.outputs_fired.load(Ordering::Acquire)
    }

    /// Waits until no watcher is live.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            // Register interest before checking, otherwise the last release can slip in between.
            notified.as_mut().enable();

            if self.live() == 0 {
                return;
            }

            notified.await;
        }
    }
}

/// Keeps a watcher counted as live until dropped.
#[derive(Debug)]
pub struct WatcherGuard {
    inner: Arc<WatcherTrackerInner>,
}

impl Drop for WatcherGuard {
    fn drop(&mut self) {
        if self.inner.live.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}
