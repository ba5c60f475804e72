use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, TrySendError};

use crate::foundation::error::{AnimError, AnimResult};

/// Unit of background work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Bounded execution context for frame preparation.
pub trait FrameExecutor: Send + Sync {
    /// Queue `job` without blocking. Returns `false` when the context is saturated or gone.
    fn try_execute(&self, job: Job) -> bool;
}

/// Queue slots of a [`SerialExecutor`] when none are configured.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1;

fn run_job(job: Job) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
        let reason = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_owned());
        tracing::warn!(%reason, "background job panicked");
    }
}

/// One dedicated worker thread fed by a bounded queue.
///
/// Jobs run in submission order. Submissions beyond the queue capacity are refused instead of
/// waiting, so the submitting thread never blocks on preparation work.
pub struct SerialExecutor {
    sender: Option<Sender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl SerialExecutor {
    /// Spawn the worker with `capacity` queued jobs (at least one).
    pub fn new(capacity: usize) -> AnimResult<Self> {
        Self::with_name("animframe-prepare", capacity)
    }

    /// Spawn the worker thread under `name`.
    pub fn with_name(name: &str, capacity: usize) -> AnimResult<Self> {
        let (sender, receiver) = crossbeam_channel::bounded::<Job>(capacity.max(1));
        let worker = thread::Builder::new()
            .name(name.to_owned())
            .spawn(move || {
                for job in receiver.iter() {
                    run_job(job);
                }
                tracing::trace!("preparation worker exiting");
            })
            .map_err(|e| AnimError::Other(anyhow::Error::new(e).context("spawn preparation worker")))?;
        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }
}

impl FrameExecutor for SerialExecutor {
    fn try_execute(&self, job: Job) -> bool {
        let Some(sender) = &self.sender else {
            return false;
        };
        match sender.try_send(job) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::trace!("preparation queue full");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::debug!("preparation worker is gone");
                false
            }
        }
    }
}

impl Drop for SerialExecutor {
    fn drop(&mut self) {
        // Closing the channel lets the worker finish the queued jobs and exit.
        self.sender = None;
        if let Some(worker) = self.worker.take() {
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                tracing::warn!("preparation worker panicked");
            }
        }
    }
}

/// Runs every job on the submitting thread before returning.
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineExecutor;

impl FrameExecutor for InlineExecutor {
    fn try_execute(&self, job: Job) -> bool {
        run_job(job);
        true
    }
}

#[cfg(test)]
#[path = "../../tests/unit/prepare/executor.rs"]
mod tests;
