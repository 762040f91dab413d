//! Background work tracking.
//!
//! # Responsibilities
//! - Run work that must outlive the response (cache writes, analytics, refreshes)
//! - Count outstanding tasks per request and for the whole process
//! - Let shutdown wait until every outstanding task has finished
//!
//! # Design Decisions
//! - A request lifecycle is a child of the server lifecycle; a task is
//!   counted by its own lifecycle and every ancestor
//! - Counts live in watch channels so `drain` waits without polling

use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;

/// Tracks background tasks attached to a request or to the server.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    pending: Arc<watch::Sender<usize>>,
    parent: Option<Box<Lifecycle>>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            pending: Arc::new(tx),
            parent: None,
        }
    }

    /// Create a lifecycle whose tasks are also counted by `self`.
    pub fn child(&self) -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            pending: Arc::new(tx),
            parent: Some(Box::new(self.clone())),
        }
    }

    /// Run `task` in the background, keeping it counted until it completes.
    pub fn wait_until<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let guard = self.track();
        tokio::spawn(async move {
            task.await;
            drop(guard);
        });
    }

    /// Number of background tasks still running.
    pub fn pending(&self) -> usize {
        *self.pending.borrow()
    }

    /// Wait until every task registered with this lifecycle has finished.
    pub async fn drain(&self) {
        let mut rx = self.pending.subscribe();
        let _ = rx.wait_for(|count| *count == 0).await;
    }

    fn track(&self) -> TaskGuard {
        let mut counters = Vec::new();
        let mut current = Some(self);
        while let Some(lifecycle) = current {
            lifecycle.pending.send_modify(|count| *count += 1);
            counters.push(Arc::clone(&lifecycle.pending));
            current = lifecycle.parent.as_deref();
        }
        TaskGuard { counters }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements every owning lifecycle when the task ends, including on panic.
#[derive(Debug)]
struct TaskGuard {
    counters: Vec<Arc<watch::Sender<usize>>>,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        for counter in &self.counters {
            counter.send_modify(|count| *count = count.saturating_sub(1));
        }
        tracing::trace!("Background task finished");
    }
}
