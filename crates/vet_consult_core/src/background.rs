//! crates/vet_consult_core/src/background.rs
//!
//! "Fire-and-forget" work that must never block or fail the operation that
//! launched it: summary generation, presence bookkeeping. Failures are logged
//! and swallowed. The tracker lets tests (and shutdown) wait for everything
//! that was launched.

use std::future::Future;
use tokio_util::task::TaskTracker;
use tracing::{debug, error};

use crate::ports::PortResult;

#[derive(Clone, Default)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self {
            tracker: TaskTracker::new(),
        }
    }

    /// Launches `work` on the runtime. An `Err` outcome is logged under `label`.
    pub fn spawn<F>(&self, label: &'static str, work: F)
    where
        F: Future<Output = PortResult<()>> + Send + 'static,
    {
        self.tracker.spawn(async move {
            match work.await {
                Ok(()) => debug!(task = label, "Background task finished."),
                Err(e) => error!(task = label, "Background task failed: {}", e),
            }
        });
    }

    /// Number of launched tasks that have not finished yet.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Waits until every task launched so far has finished. New tasks may
    /// still be launched afterwards.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}
