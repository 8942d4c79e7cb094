//! Bounded execution of blocking handler work.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;

/// Why a job did not produce a value.
#[derive(Debug, Error)]
pub enum JobError {
    /// The pool was shut down while the job waited for a slot.
    #[error("worker pool is closed")]
    Closed,

    /// The job panicked.
    #[error("worker panicked: {0}")]
    Panicked(String),

    /// The blocking task was cancelled by runtime shutdown.
    #[error("worker task was cancelled")]
    Cancelled,
}

/// A fixed number of slots for running blocking closures.
///
/// Each job waits for a slot, then runs on the runtime's blocking thread pool
/// while holding it. Jobs beyond the slot count queue with no timeout: under
/// sustained overload a request waits rather than being rejected. A started
/// job always runs to completion.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    slots: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Create a pool with `size` slots. A size of zero is raised to one.
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            slots: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Number of slots.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of currently free slots.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Run `job` on a worker once a slot is free and wait for its result.
    pub async fn run<F, R>(&self, job: F) -> Result<R, JobError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let permit = Arc::clone(&self.slots)
            .acquire_owned()
            .await
            .map_err(|_| JobError::Closed)?;

        let handle = tokio::task::spawn_blocking(move || {
            // The slot is held until the job returns, even if the caller's
            // future is dropped in the meantime.
            let _permit = permit;
            job()
        });

        handle.await.map_err(|e| {
            if e.is_panic() {
                JobError::Panicked(panic_message(e.into_panic()))
            } else {
                JobError::Cancelled
            }
        })
    }

    /// Stop handing out slots; queued and future jobs fail with
    /// [`JobError::Closed`].
    pub fn close(&self) {
        self.slots.close();
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
