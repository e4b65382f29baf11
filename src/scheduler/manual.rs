//! Deterministic scheduler for tests.

use std::time::Duration;

use parking_lot::Mutex;

use super::{Job, Scheduler, TaskHandle};

struct Entry {
    job: Job,
    handle: TaskHandle,
    period: Option<Duration>,
}

/// Holds submitted jobs until [`ManualScheduler::tick`] is awaited.
///
/// Each tick runs every live job once, in submission order, ignoring delays.
/// One-shot jobs are dropped after their run; repeating jobs stay until cancelled.
#[derive(Default)]
pub struct ManualScheduler {
    entries: Mutex<Vec<Entry>>,
}

impl ManualScheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every live job once. Returns how many ran.
    pub async fn tick(&self) -> usize {
        let due: Vec<(Job, TaskHandle)> = {
            let mut entries = self.entries.lock();
            entries.retain(|e| !e.handle.is_cancelled());
            let due = entries
                .iter()
                .map(|e| (e.job.clone(), e.handle.clone()))
                .collect();
            entries.retain(|e| e.period.is_some());
            due
        };

        let mut ran = 0;
        for (job, handle) in due {
            if handle.is_cancelled() {
                continue;
            }
            job().await;
            ran += 1;
        }
        ran
    }

    /// Number of live submissions.
    pub fn scheduled(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|e| !e.handle.is_cancelled())
            .count()
    }

    /// Period of the first live repeating job.
    pub fn period(&self) -> Option<Duration> {
        self.entries
            .lock()
            .iter()
            .filter(|e| !e.handle.is_cancelled())
            .find_map(|e| e.period)
    }

    fn push(&self, job: Job, period: Option<Duration>) -> TaskHandle {
        let handle = TaskHandle::new();
        self.entries.lock().push(Entry {
            job,
            handle: handle.clone(),
            period,
        });
        handle
    }
}

impl Scheduler for ManualScheduler {
    fn run_once(&self, job: Job) -> TaskHandle {
        self.push(job, None)
    }

    fn schedule(&self, job: Job, _initial_delay: Duration, period: Duration) -> TaskHandle {
        if period.is_zero() {
            return self.push(job, None);
        }
        self.push(job, Some(period))
    }
}
