//! Periodic HTTP polling worker.
//!
//! # Cycle
//! ```text
//! tick → Throttler::should_run?
//!          no  → record_skip, done
//!          yes → FeatureSource::fetch_features
//!                  Changed     → apply, backup, keep ETag, record_success, ready
//!                    rejected  → discard result and its ETag
//!                  NotChanged  → record_success, ready
//!                  Unavailable → record_error(status)
//!                  transport   → record_error(None)
//! ```

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::config::PollingConfig;
use crate::error::{ProtocolError, SyncError, SyncResult};
use crate::fetch::{
    Collaborators, FeatureSource, FetchResult, FetchStatus, FetchWorker, StartupErrorHandler,
};
use crate::observability::metrics;
use crate::resilience::Throttler;
use crate::scheduler::{Job, TaskHandle};

/// Polling cadence and startup behaviour.
#[derive(Debug, Clone)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_backoff_secs: u64,
    pub synchronous_startup: bool,
    pub disabled: bool,
}

impl PollSettings {
    pub fn from_config(config: &PollingConfig) -> Self {
        Self {
            interval: config.interval(),
            max_backoff_secs: config.max_backoff_secs,
            synchronous_startup: config.synchronous_startup,
            disabled: config.disabled,
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::from_config(&PollingConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Startup,
    Scheduled,
}

enum Cycle {
    Stopped,
    Skipped,
    Accepted(FetchResult),
    Unavailable(FetchResult),
}

struct PollState {
    throttler: Throttler,
    stopped: bool,
    task: Option<TaskHandle>,
}

struct PollInner {
    settings: PollSettings,
    source: Arc<dyn FeatureSource>,
    collab: Collaborators,
    startup_handler: Option<StartupErrorHandler>,
    state: Mutex<PollState>,
    cycle: tokio::sync::Mutex<()>,
}

/// Keeps the state store fresh by polling on a fixed cadence.
pub struct PollFetcher {
    inner: Arc<PollInner>,
}

impl PollFetcher {
    /// Create a poll worker. Nothing runs until [`FetchWorker::initialize`]
    /// or [`FetchWorker::start`].
    pub fn new(
        settings: PollSettings,
        source: Arc<dyn FeatureSource>,
        collab: Collaborators,
        startup_handler: Option<StartupErrorHandler>,
    ) -> Self {
        let interval_secs = settings.interval.as_secs();
        let throttler = Throttler::new(interval_secs, settings.max_backoff_secs, source.target());
        Self {
            inner: Arc::new(PollInner {
                settings,
                source,
                collab,
                startup_handler,
                state: Mutex::new(PollState {
                    throttler,
                    stopped: false,
                    task: None,
                }),
                cycle: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Current throttler failure count.
    pub fn failures(&self) -> u32 {
        self.inner.state.lock().throttler.failures()
    }

    /// Ticks left to skip before the next poll.
    pub fn skips(&self) -> u32 {
        self.inner.state.lock().throttler.skips()
    }

    /// Whether a schedule is active.
    pub fn is_running(&self) -> bool {
        let state = self.inner.state.lock();
        !state.stopped && state.task.is_some()
    }

    fn job(&self) -> Job {
        let weak: Weak<PollInner> = Arc::downgrade(&self.inner);
        Arc::new(move || {
            let weak = weak.clone();
            Box::pin(async move {
                if let Some(inner) = weak.upgrade() {
                    inner.scheduled_poll().await;
                }
            })
        })
    }
}

impl PollInner {
    async fn scheduled_poll(&self) {
        if let Err(e) = self.poll(Route::Scheduled).await {
            tracing::warn!(error = %e, url = %self.source.target(), "Poll cycle failed");
            self.collab.gate.forward_error(&e);
        }
    }

    async fn poll(&self, route: Route) -> SyncResult<()> {
        match self.run_cycle(route).await? {
            Cycle::Accepted(result) => {
                self.collab.gate.forward_update(&result);
                self.collab.gate.fire();
            }
            Cycle::Unavailable(result) => self.collab.gate.forward_update(&result),
            Cycle::Skipped | Cycle::Stopped => {}
        }
        Ok(())
    }

    async fn run_cycle(&self, route: Route) -> SyncResult<Cycle> {
        let _serial = self.cycle.lock().await;

        {
            let mut state = self.state.lock();
            if state.stopped {
                return Ok(Cycle::Stopped);
            }
            if !state.throttler.should_run() {
                state.throttler.record_skip();
                tracing::debug!(
                    skips = state.throttler.skips(),
                    failures = state.throttler.failures(),
                    "Skipping poll cycle"
                );
                metrics::record_poll_cycle("skipped");
                metrics::record_throttle(state.throttler.failures(), state.throttler.skips());
                return Ok(Cycle::Skipped);
            }
        }

        let fetched = self.source.fetch_features().await;

        let mut state = self.state.lock();
        if state.stopped {
            tracing::debug!("Poller stopped during fetch, discarding result");
            return Ok(Cycle::Stopped);
        }

        let result = match fetched {
            Ok(result) => result,
            Err(e) => {
                state.throttler.record_error(None);
                metrics::record_poll_cycle("network_error");
                metrics::record_throttle(state.throttler.failures(), state.throttler.skips());
                return Err(e);
            }
        };

        let cycle = match result.status {
            FetchStatus::Changed => {
                let payload = result
                    .payload
                    .as_deref()
                    .ok_or_else(|| ProtocolError::new("changed response without a body"))
                    .and_then(|payload| self.collab.store.apply_state(payload).map(|()| payload));
                let payload = match payload {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::warn!(reason = %e.reason(), "Discarding rejected feature payload");
                        metrics::record_poll_cycle("rejected");
                        return Err(e.into());
                    }
                };
                if let Err(e) = self.collab.backup.write(payload) {
                    tracing::warn!(error = %e, "Failed to write feature backup");
                }
                self.source.record_accepted(&result);
                state.throttler.record_success();
                metrics::record_poll_cycle("changed");
                Cycle::Accepted(result)
            }
            FetchStatus::NotChanged => {
                state.throttler.record_success();
                metrics::record_poll_cycle("not_changed");
                Cycle::Accepted(result)
            }
            FetchStatus::Unavailable => {
                metrics::record_poll_cycle("unavailable");
                if route == Route::Startup {
                    return Err(SyncError::Startup {
                        status: result.http_status,
                    });
                }
                state.throttler.record_error(result.http_status);
                Cycle::Unavailable(result)
            }
        };

        metrics::record_throttle(state.throttler.failures(), state.throttler.skips());
        Ok(cycle)
    }
}

#[async_trait]
impl FetchWorker for PollFetcher {
    async fn initialize(&self) -> SyncResult<()> {
        if self.inner.settings.synchronous_startup {
            tracing::info!(url = %self.inner.source.target(), "Fetching features before startup");
            if let Err(e) = self.inner.poll(Route::Startup).await {
                match &self.inner.startup_handler {
                    Some(handler) => handler(&e),
                    None => return Err(e),
                }
            }
        }
        self.start();
        Ok(())
    }

    fn start(&self) {
        let mut state = self.inner.state.lock();
        if state.stopped {
            tracing::warn!("Poller was stopped, ignoring start");
            return;
        }
        if state.task.is_some() {
            tracing::debug!("Poller already started");
            return;
        }
        if self.inner.settings.disabled {
            tracing::info!("Polling disabled, no fetches scheduled");
            return;
        }

        let scheduler = &self.inner.collab.scheduler;
        let interval = self.inner.settings.interval;
        let task = if interval.is_zero() {
            scheduler.run_once(self.job())
        } else {
            scheduler.schedule(self.job(), Duration::ZERO, interval)
        };
        state.task = Some(task);

        tracing::info!(
            url = %self.inner.source.target(),
            interval_secs = interval.as_secs(),
            "Polling started"
        );
    }

    fn stop(&self) {
        let mut state = self.inner.state.lock();
        if state.stopped {
            return;
        }
        state.stopped = true;
        if let Some(task) = state.task.take() {
            task.cancel();
        }
        tracing::info!("Polling stopped");
    }
}

impl Drop for PollFetcher {
    fn drop(&mut self) {
        if let Some(task) = self.inner.state.lock().task.take() {
            task.cancel();
        }
    }
}
