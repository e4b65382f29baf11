//! Transport selection and the one-way stream → poll failover.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::HeaderMap;

use crate::config::{FetchMode, SyncConfig};
use crate::error::SyncResult;
use crate::fetch::{
    Collaborators, FeatureSource, FetchWorker, ModeController, PollFetcher, PollSettings,
    StartupErrorHandler, StreamFetcher, StreamSettings,
};
use crate::observability::metrics;

/// The two transports an [`AdaptiveFetcher`] switches between.
pub struct Workers {
    pub polling: Arc<dyn FetchWorker>,
    pub streaming: Arc<dyn FetchWorker>,
}

#[derive(Debug, Default)]
struct Transition {
    started: bool,
    failed_over: bool,
    stopped: bool,
}

/// Runs exactly one transport at a time.
///
/// Starts the configured transport; a failover request stops streaming and
/// starts polling, and there is no way back for the lifetime of the fetcher.
pub struct AdaptiveFetcher {
    mode: FetchMode,
    polling: Arc<dyn FetchWorker>,
    streaming: Arc<dyn FetchWorker>,
    transition: Mutex<Transition>,
}

impl AdaptiveFetcher {
    /// Create a fetcher over prebuilt workers.
    pub fn new(mode: FetchMode, workers: Workers) -> Arc<Self> {
        Arc::new(Self::assemble(mode, workers))
    }

    /// Create a fetcher whose workers need a handle back to it, e.g. a
    /// stream worker that requests failover.
    pub fn with_workers<F>(mode: FetchMode, build: F) -> Arc<Self>
    where
        F: FnOnce(Weak<dyn ModeController>) -> Workers,
    {
        Arc::new_cyclic(|weak: &Weak<AdaptiveFetcher>| {
            let controller: Weak<dyn ModeController> = weak.clone();
            Self::assemble(mode, build(controller))
        })
    }

    /// Create the default poll and stream workers for `config`.
    ///
    /// # Errors
    /// Returns [`SyncError::Config`](crate::SyncError::Config) when the
    /// stream endpoint or its HTTP client cannot be built.
    pub fn from_config(
        config: &SyncConfig,
        headers: HeaderMap,
        source: Arc<dyn FeatureSource>,
        collab: Collaborators,
        startup_handler: Option<StartupErrorHandler>,
    ) -> SyncResult<Arc<Self>> {
        let poll_settings = PollSettings::from_config(&config.polling);
        let stream_settings = StreamSettings::from_config(&config.api, &config.streaming, headers)?;

        Ok(Self::with_workers(config.mode, move |controller| Workers {
            polling: Arc::new(PollFetcher::new(
                poll_settings,
                source,
                collab.clone(),
                startup_handler,
            )),
            streaming: Arc::new(StreamFetcher::new(stream_settings, collab, Some(controller))),
        }))
    }

    fn assemble(mode: FetchMode, workers: Workers) -> Self {
        Self {
            mode,
            polling: workers.polling,
            streaming: workers.streaming,
            transition: Mutex::new(Transition::default()),
        }
    }

    /// Transport currently responsible for updates.
    pub fn active_mode(&self) -> FetchMode {
        if self.transition.lock().failed_over {
            FetchMode::Polling
        } else {
            self.mode
        }
    }

    /// Whether the stream was abandoned.
    pub fn has_failed_over(&self) -> bool {
        self.transition.lock().failed_over
    }

    fn active(&self) -> &Arc<dyn FetchWorker> {
        match self.mode {
            FetchMode::Polling => &self.polling,
            FetchMode::Streaming => &self.streaming,
        }
    }

    fn claim_start(&self) -> bool {
        let mut transition = self.transition.lock();
        if transition.stopped || transition.started {
            tracing::debug!("Fetcher already started or stopped, ignoring start");
            return false;
        }
        transition.started = true;
        true
    }
}

#[async_trait]
impl FetchWorker for AdaptiveFetcher {
    async fn initialize(&self) -> SyncResult<()> {
        if !self.claim_start() {
            return Ok(());
        }
        tracing::info!(mode = %self.mode, "Starting feature synchronization");
        self.active().initialize().await
    }

    fn start(&self) {
        if self.claim_start() {
            tracing::info!(mode = %self.mode, "Starting feature synchronization");
            self.active().start();
        }
    }

    fn stop(&self) {
        let mut transition = self.transition.lock();
        if transition.stopped {
            return;
        }
        transition.stopped = true;
        self.streaming.stop();
        self.polling.stop();
        tracing::info!("Feature synchronization stopped");
    }
}

impl ModeController for AdaptiveFetcher {
    fn request_failover(&self) {
        let mut transition = self.transition.lock();
        if transition.stopped {
            tracing::debug!("Failover requested after stop, ignoring");
            return;
        }
        if self.mode != FetchMode::Streaming {
            tracing::warn!("Failover requested while polling, ignoring");
            return;
        }
        if transition.failed_over {
            tracing::debug!("Already failed over to polling");
            return;
        }
        transition.failed_over = true;

        tracing::warn!("Switching from streaming to polling");
        metrics::record_failover();
        self.streaming.stop();
        self.polling.start();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CountingWorker;

    type Fixture = (Arc<AdaptiveFetcher>, Arc<CountingWorker>, Arc<CountingWorker>);

    fn fetcher(mode: FetchMode) -> Fixture {
        let polling = Arc::new(CountingWorker::default());
        let streaming = Arc::new(CountingWorker::default());
        let fetcher = AdaptiveFetcher::new(
            mode,
            Workers {
                polling: polling.clone(),
                streaming: streaming.clone(),
            },
        );
        (fetcher, polling, streaming)
    }

    #[tokio::test]
    async fn test_starts_only_configured_worker() {
        let (fetcher, polling, streaming) = fetcher(FetchMode::Streaming);

        fetcher.initialize().await.unwrap();
        fetcher.initialize().await.unwrap();

        assert_eq!(streaming.starts(), 1);
        assert_eq!(polling.starts(), 0);
        assert_eq!(fetcher.active_mode(), FetchMode::Streaming);
    }

    #[test]
    fn test_failover_stops_stream_then_starts_poll_once() {
        let (fetcher, polling, streaming) = fetcher(FetchMode::Streaming);
        fetcher.start();

        fetcher.request_failover();
        fetcher.request_failover();

        assert_eq!(streaming.stops(), 1);
        assert_eq!(polling.starts(), 1);
        assert!(fetcher.has_failed_over());
        assert_eq!(fetcher.active_mode(), FetchMode::Polling);
    }

    #[test]
    fn test_concurrent_failover_requests_transition_once() {
        let (fetcher, polling, streaming) = fetcher(FetchMode::Streaming);
        fetcher.start();

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| fetcher.request_failover());
            }
        });

        assert_eq!(streaming.stops(), 1);
        assert_eq!(polling.starts(), 1);
    }

    #[test]
    fn test_failover_ignored_in_polling_mode() {
        let (fetcher, polling, streaming) = fetcher(FetchMode::Polling);
        fetcher.start();

        fetcher.request_failover();

        assert_eq!(polling.starts(), 1);
        assert_eq!(streaming.stops(), 0);
        assert!(!fetcher.has_failed_over());
    }

    #[test]
    fn test_failover_ignored_after_stop() {
        let (fetcher, polling, _) = fetcher(FetchMode::Streaming);
        fetcher.start();
        fetcher.stop();

        fetcher.request_failover();

        assert_eq!(polling.starts(), 0);
    }

    #[test]
    fn test_stop_is_idempotent_and_stops_both() {
        let (fetcher, polling, streaming) = fetcher(FetchMode::Polling);

        fetcher.stop();
        fetcher.stop();

        assert_eq!(polling.stops(), 1);
        assert_eq!(streaming.stops(), 1);
        fetcher.start();
        assert_eq!(polling.starts(), 0);
    }

    #[tokio::test]
    async fn test_initialize_propagates_startup_error() {
        let polling = Arc::new(CountingWorker::failing());
        let fetcher = AdaptiveFetcher::new(
            FetchMode::Polling,
            Workers {
                polling: polling.clone(),
                streaming: Arc::new(CountingWorker::default()),
            },
        );

        assert!(fetcher.initialize().await.is_err());
    }

    #[test]
    fn test_with_workers_hands_out_live_controller() {
        let polling = Arc::new(CountingWorker::default());
        let mut captured: Option<Weak<dyn ModeController>> = None;
        let fetcher = AdaptiveFetcher::with_workers(FetchMode::Streaming, |controller| {
            captured = Some(controller);
            Workers {
                polling: polling.clone(),
                streaming: Arc::new(CountingWorker::default()),
            }
        });
        fetcher.start();

        let controller = captured.and_then(|weak| weak.upgrade()).unwrap();
        controller.request_failover();

        assert_eq!(polling.starts(), 1);
        assert!(fetcher.has_failed_over());
    }
}
