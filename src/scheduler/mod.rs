//! Per-client task scheduling.
//!
//! # Responsibilities
//! - Run a job once, or repeatedly at a fixed cadence
//! - Hand back a cancellable handle for every submission
//!
//! # Design Decisions
//! - Owned by the client and passed to workers explicitly; no process-wide executor
//! - Fixed-delay cadence: a slow cycle pushes the next one back instead of stacking
//! - Tests swap in [`ManualScheduler`] to drive cycles deterministically

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::task::AbortHandle;

pub mod manual;
pub mod runtime;

pub use manual::ManualScheduler;
pub use runtime::TokioScheduler;

/// A unit of work that can be invoked repeatedly.
pub type Job = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Cancellation handle for a scheduled job.
#[derive(Debug, Clone, Default)]
pub struct TaskHandle {
    cancelled: Arc<AtomicBool>,
    abort: Arc<Mutex<Option<AbortHandle>>>,
}

impl TaskHandle {
    /// Create a live handle.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a handle that is already cancelled.
    pub fn cancelled() -> Self {
        let handle = Self::new();
        handle.cancel();
        handle
    }

    pub(crate) fn attach(&self, abort: AbortHandle) {
        if self.is_cancelled() {
            abort.abort();
        } else {
            *self.abort.lock() = Some(abort);
        }
    }

    /// Stop future runs and abort the current one if it is still in flight.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(abort) = self.abort.lock().take() {
            abort.abort();
        }
    }

    /// Whether [`TaskHandle::cancel`] was called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Submits jobs for background execution.
pub trait Scheduler: Send + Sync {
    /// Run `job` once, as soon as possible.
    fn run_once(&self, job: Job) -> TaskHandle;

    /// Run `job` after `initial_delay` and then every `period` after the
    /// previous run finished. A zero period degrades to a single delayed run.
    fn schedule(&self, job: Job, initial_delay: Duration, period: Duration) -> TaskHandle;
}
