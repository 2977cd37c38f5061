//! Callback delivery.
//!
//! Request callbacks never run under the manager's borrow directly; they are
//! wrapped in a [`Job`] and handed to a [`CallbackExecutor`]. Two executors are
//! provided:
//!
//! - [`InlineExecutor`] runs the job immediately on the caller's turn.
//! - [`QueuedExecutor`] pushes the job onto a FIFO channel. The paired
//!   [`CallbackQueue`] is drained on whatever context the host prefers
//!   (a UI loop, a dedicated task). Jobs are never reordered.

use std::sync::Arc;

use tokio::sync::mpsc;

/// Deferred callback invocation.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs callback jobs.
pub trait CallbackExecutor: Send + Sync {
    fn execute(&self, job: Job);
}

/// Shared executor handle.
pub type CallbackExecutorRef = Arc<dyn CallbackExecutor>;

/// Executes callbacks synchronously.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl CallbackExecutor for InlineExecutor {
    fn execute(&self, job: Job) {
        job();
    }
}

/// Executor that enqueues callbacks for a [`CallbackQueue`].
#[derive(Clone)]
pub struct QueuedExecutor {
    tx: mpsc::UnboundedSender<Job>,
}

impl QueuedExecutor {
    /// Creates the executor and the queue that drains it.
    pub fn new() -> (Self, CallbackQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, CallbackQueue { rx })
    }
}

impl CallbackExecutor for QueuedExecutor {
    fn execute(&self, job: Job) {
        if self.tx.send(job).is_err() {
            tracing::warn!("Callback queue closed, dropping callback");
        }
    }
}

/// Receiving end of a [`QueuedExecutor`].
pub struct CallbackQueue {
    rx: mpsc::UnboundedReceiver<Job>,
}

impl CallbackQueue {
    /// Runs every job queued so far. Returns how many ran.
    pub fn drain(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Runs jobs as they arrive until every executor handle is dropped.
    pub async fn run(mut self) {
        while let Some(job) = self.rx.recv().await {
            job();
        }
        tracing::debug!("Callback queue closed");
    }
}
