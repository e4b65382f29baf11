//! Scheduler backed by a tokio runtime.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::time::MissedTickBehavior;

use super::{Job, Scheduler, TaskHandle};

/// Spawns jobs as tokio tasks on a runtime handle.
pub struct TokioScheduler {
    runtime: Handle,
    tasks: Mutex<Vec<TaskHandle>>,
    shut_down: Mutex<bool>,
}

impl TokioScheduler {
    /// Create a scheduler on the current runtime.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn new() -> Self {
        Self::with_handle(Handle::current())
    }

    /// Create a scheduler on an explicit runtime.
    pub fn with_handle(runtime: Handle) -> Self {
        Self {
            runtime,
            tasks: Mutex::new(Vec::new()),
            shut_down: Mutex::new(false),
        }
    }

    /// Cancel every job and refuse further submissions.
    pub fn shutdown(&self) {
        *self.shut_down.lock() = true;
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in &tasks {
            task.cancel();
        }
        tracing::debug!(cancelled = tasks.len(), "Scheduler shut down");
    }

    fn track(&self) -> Option<TaskHandle> {
        if *self.shut_down.lock() {
            tracing::warn!("Job submitted after scheduler shutdown, ignoring");
            return None;
        }
        let handle = TaskHandle::new();
        let mut tasks = self.tasks.lock();
        tasks.retain(|t| !t.is_cancelled());
        tasks.push(handle.clone());
        Some(handle)
    }
}

impl Default for TokioScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for TokioScheduler {
    fn run_once(&self, job: Job) -> TaskHandle {
        let Some(handle) = self.track() else {
            return TaskHandle::cancelled();
        };

        let token = handle.clone();
        let task = self.runtime.spawn(async move {
            if !token.is_cancelled() {
                job().await;
            }
        });
        handle.attach(task.abort_handle());
        handle
    }

    fn schedule(&self, job: Job, initial_delay: Duration, period: Duration) -> TaskHandle {
        let Some(handle) = self.track() else {
            return TaskHandle::cancelled();
        };

        let token = handle.clone();
        let task = self.runtime.spawn(async move {
            if period.is_zero() {
                tokio::time::sleep(initial_delay).await;
                if !token.is_cancelled() {
                    job().await;
                }
                return;
            }
            let start = tokio::time::Instant::now() + initial_delay;
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if token.is_cancelled() {
                    break;
                }
                job().await;
            }
        });
        handle.attach(task.abort_handle());
        handle
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.cancel();
        }
    }
}
