//! Running consumer handle and its counters.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Statistics from a consumer.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConsumerStats {
    /// Messages whose handler eventually succeeded.
    pub handled: usize,
    /// Messages answered with a non-retryable error.
    pub rejected: usize,
    /// Messages published to their dead-letter topic.
    pub dead_lettered: usize,
    /// Messages that should have been dead-lettered but could not be
    /// published there.
    pub dead_letter_failed: usize,
    /// Messages on topics with no handler.
    pub dropped: usize,
    pub replies: usize,
    pub polls: usize,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) handled: AtomicUsize,
    pub(crate) rejected: AtomicUsize,
    pub(crate) dead_lettered: AtomicUsize,
    pub(crate) dead_letter_failed: AtomicUsize,
    pub(crate) dropped: AtomicUsize,
    pub(crate) replies: AtomicUsize,
    pub(crate) polls: AtomicUsize,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> ConsumerStats {
        ConsumerStats {
            handled: self.handled.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            dead_letter_failed: self.dead_letter_failed.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            replies: self.replies.load(Ordering::Relaxed),
            polls: self.polls.load(Ordering::Relaxed),
        }
    }
}

/// Handle to a started consumer: one polling task per topic.
///
/// Dropping the handle signals the tasks to stop without waiting for them.
pub struct ConsumerHandle {
    pub(crate) stop: watch::Sender<bool>,
    pub(crate) tasks: Vec<JoinHandle<()>>,
    pub(crate) counters: std::sync::Arc<Counters>,
}

impl ConsumerHandle {
    /// Current counters.
    pub fn stats(&self) -> ConsumerStats {
        self.counters.snapshot()
    }

    /// Stop polling, wait for in-flight messages to finish, and return the
    /// final counters.
    pub async fn stop(mut self) -> ConsumerStats {
        let _ = self.stop.send(true);
        for task in self.tasks.drain(..) {
            if let Err(err) = task.await {
                warn!(error = %err, "consumer task ended abnormally");
            }
        }
        let stats = self.counters.snapshot();
        info!(?stats, "consumer stopped");
        stats
    }
}

impl Drop for ConsumerHandle {
    fn drop(&mut self) {
        let _ = self.stop.send(true);
    }
}
