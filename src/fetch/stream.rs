//! Server-sent-events streaming worker.
//!
//! # Events
//! ```text
//! unleash-connected / unleash-updated → apply, backup snapshot, ready
//!                                       rejected payload → reconnect fresh
//! fetch-mode: polling                 → ServerHint → FailoverStrategy
//! fetch-mode: anything else           → logged, dropped
//! peer closed                         → Network    → FailoverStrategy
//! error status on (re)connect         → HttpStatus → FailoverStrategy
//! ```
//!
//! # Design Decisions
//! - Event handling and stop share one lock; nothing is applied after stop
//! - The mode controller is called with the lock released, since a failover
//!   stops this worker from inside the handler
//! - Every reconnect opens a fresh EventSource, so no Last-Event-ID is sent
//!   and the server answers with a full hydration

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::StreamExt;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest_eventsource::{Error as SseError, Event as SseEvent, EventSource};

use crate::config::{ApiConfig, StreamingConfig};
use crate::error::{SyncError, SyncResult};
use crate::fetch::{Collaborators, FetchResult, FetchWorker, ModeController};
use crate::observability::metrics;
use crate::resilience::{FailEvent, FailoverStrategy};
use crate::scheduler::{Job, TaskHandle};

pub const EVENT_CONNECTED: &str = "unleash-connected";
pub const EVENT_UPDATED: &str = "unleash-updated";
pub const EVENT_FETCH_MODE: &str = "fetch-mode";

const POLLING_HINT_MESSAGE: &str = "Server has explicitly requested switching to polling mode";
const CLOSED_MESSAGE: &str = "Server closed the streaming connection";

/// Connection settings for the streaming transport.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub url: url::Url,
    pub client: reqwest::Client,
    pub max_fails: usize,
    pub fail_window: Duration,
    pub reconnect_delay: Duration,
}

impl StreamSettings {
    /// Build settings and the SSE HTTP client.
    ///
    /// # Errors
    /// Returns [`SyncError::Config`] when the endpoint URL or HTTP client
    /// cannot be built.
    pub fn from_config(
        api: &ApiConfig,
        config: &StreamingConfig,
        mut headers: HeaderMap,
    ) -> SyncResult<Self> {
        let url = api
            .streaming_url()
            .map_err(|e| SyncError::Config(format!("invalid api.url: {e}")))?;
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(config.connect_timeout())
            .read_timeout(config.read_timeout())
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build SSE client: {e}")))?;

        Ok(Self {
            url,
            client,
            max_fails: config.max_fails,
            fail_window: config.fail_window(),
            reconnect_delay: config.reconnect_delay(),
        })
    }
}

/// What the connection loop does after an event or failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamAction {
    /// Keep reading the current connection.
    Continue,
    /// Close and open a fresh connection.
    Reconnect,
    /// The worker was stopped; leave the loop.
    Stop,
}

/// A transport-level failure of the SSE connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFailure {
    /// The peer ended the stream.
    Closed,
    /// The server answered with an error status.
    Status { code: u16, message: String },
    /// The connection failed without an HTTP status.
    Network { message: String },
}

impl StreamFailure {
    /// Map an EventSource error onto a failure class.
    pub fn classify(error: &SseError) -> Self {
        match error {
            SseError::StreamEnded => StreamFailure::Closed,
            SseError::InvalidStatusCode(status, _) => StreamFailure::Status {
                code: status.as_u16(),
                message: format!("Streaming endpoint returned {status}"),
            },
            SseError::Transport(e) => match e.status() {
                Some(status) => StreamFailure::Status {
                    code: status.as_u16(),
                    message: e.to_string(),
                },
                None => StreamFailure::Network {
                    message: e.to_string(),
                },
            },
            other => StreamFailure::Network {
                message: other.to_string(),
            },
        }
    }

    fn into_event(self) -> FailEvent {
        match self {
            StreamFailure::Closed => FailEvent::network(CLOSED_MESSAGE),
            StreamFailure::Status { code, message } => FailEvent::http_status(code, message),
            StreamFailure::Network { message } => FailEvent::network(message),
        }
    }
}

/// Metric label for an SSE event name. Names the server invents share `other`.
fn event_label(event: &str) -> &'static str {
    match event {
        EVENT_CONNECTED => EVENT_CONNECTED,
        EVENT_UPDATED => EVENT_UPDATED,
        EVENT_FETCH_MODE => EVENT_FETCH_MODE,
        _ => "other",
    }
}

/// The failure a `fetch-mode` payload stands for; only `polling` is one.
fn hint_event(data: &str) -> Option<FailEvent> {
    let hint = data.trim();
    (hint == "polling").then(|| FailEvent::server_hint(hint, POLLING_HINT_MESSAGE))
}

struct StreamState {
    strategy: FailoverStrategy,
    stopped: bool,
    task: Option<TaskHandle>,
}

struct StreamInner {
    settings: StreamSettings,
    collab: Collaborators,
    controller: Option<Weak<dyn ModeController>>,
    state: Mutex<StreamState>,
}

/// Keeps the state store fresh from a server-sent-events connection.
pub struct StreamFetcher {
    inner: Arc<StreamInner>,
}

impl StreamFetcher {
    /// Create a streaming worker. Without a controller, a failover decision
    /// is logged and the stream keeps running.
    pub fn new(
        settings: StreamSettings,
        collab: Collaborators,
        controller: Option<Weak<dyn ModeController>>,
    ) -> Self {
        let strategy = FailoverStrategy::new(settings.max_fails, settings.fail_window);
        Self {
            inner: Arc::new(StreamInner {
                settings,
                collab,
                controller,
                state: Mutex::new(StreamState {
                    strategy,
                    stopped: false,
                    task: None,
                }),
            }),
        }
    }

    /// Handle one named SSE event.
    pub fn handle_message(&self, event: &str, data: &str) -> StreamAction {
        self.inner.handle_message(event, data)
    }

    /// Handle a connection failure.
    pub fn handle_failure(&self, failure: StreamFailure) -> StreamAction {
        self.inner.handle_failure(failure)
    }

    /// Failures currently counted toward failover.
    pub fn retained_failures(&self) -> usize {
        self.inner.state.lock().strategy.retained()
    }

    pub fn is_stopped(&self) -> bool {
        self.inner.is_stopped()
    }
}

impl StreamInner {
    fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }

    fn handle_message(&self, event: &str, data: &str) -> StreamAction {
        metrics::record_stream_event(event_label(event));
        match event {
            EVENT_CONNECTED | EVENT_UPDATED => self.apply_update(event, data),
            EVENT_FETCH_MODE => match hint_event(data) {
                Some(hint) => self.report(hint),
                None => {
                    tracing::info!(hint = data.trim(), "Ignoring unrecognized fetch-mode hint");
                    StreamAction::Continue
                }
            },
            other => {
                tracing::debug!(event = other, "Ignoring unknown streaming event");
                StreamAction::Continue
            }
        }
    }

    fn apply_update(&self, event: &str, data: &str) -> StreamAction {
        {
            let state = self.state.lock();
            if state.stopped {
                return StreamAction::Stop;
            }
            if let Err(e) = self.collab.store.apply_state(data) {
                drop(state);
                tracing::warn!(
                    event,
                    reason = %e.reason(),
                    "Rejected streamed payload, reconnecting for a full hydration"
                );
                self.collab.gate.forward_error(&SyncError::from(e));
                return StreamAction::Reconnect;
            }
            if let Some(snapshot) = self.collab.store.current_state() {
                if let Err(e) = self.collab.backup.write(&snapshot) {
                    tracing::warn!(error = %e, "Failed to write feature backup");
                }
            }
        }

        tracing::debug!(event, bytes = data.len(), "Applied streamed feature state");
        self.collab.gate.forward_update(&FetchResult::changed(data));
        self.collab.gate.fire();
        StreamAction::Continue
    }

    fn handle_failure(&self, failure: StreamFailure) -> StreamAction {
        match self.report(failure.into_event()) {
            StreamAction::Stop => StreamAction::Stop,
            _ => StreamAction::Reconnect,
        }
    }

    fn report(&self, event: FailEvent) -> StreamAction {
        let kind = event.kind();
        let message = event.message().to_string();

        let failover = {
            let mut state = self.state.lock();
            if state.stopped {
                return StreamAction::Stop;
            }
            metrics::record_stream_failure(kind);
            let failover = state.strategy.should_failover(event, Instant::now());
            tracing::debug!(
                kind,
                message = %message,
                retained = state.strategy.retained(),
                failover,
                "Classified streaming failure"
            );
            failover
        };

        if failover {
            match self.controller.as_ref().and_then(Weak::upgrade) {
                Some(controller) => {
                    tracing::warn!(
                        kind,
                        message = %message,
                        "Streaming disqualified, requesting failover"
                    );
                    controller.request_failover();
                }
                None => tracing::warn!(
                    kind,
                    message = %message,
                    "Streaming disqualified but no mode controller is configured, staying on stream"
                ),
            }
        }

        if self.is_stopped() {
            StreamAction::Stop
        } else {
            StreamAction::Continue
        }
    }

    async fn run(&self) {
        let url = self.settings.url.clone();
        loop {
            if self.is_stopped() {
                break;
            }

            let request = self.settings.client.get(url.clone());
            let mut source = match EventSource::new(request) {
                Ok(source) => source,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to create EventSource");
                    break;
                }
            };
            tracing::info!(url = %url, "Connecting to streaming endpoint");

            let mut action = StreamAction::Reconnect;
            while let Some(event) = source.next().await {
                action = match event {
                    Ok(SseEvent::Open) => {
                        tracing::info!(url = %url, "Streaming connection opened");
                        StreamAction::Continue
                    }
                    Ok(SseEvent::Message(msg)) => self.handle_message(&msg.event, &msg.data),
                    Err(e) => {
                        tracing::warn!(error = %e, "Streaming connection failed");
                        self.handle_failure(StreamFailure::classify(&e))
                    }
                };
                if self.is_stopped() {
                    action = StreamAction::Stop;
                }
                if action != StreamAction::Continue {
                    break;
                }
            }
            source.close();

            if action == StreamAction::Stop {
                break;
            }
            tokio::time::sleep(self.settings.reconnect_delay).await;
        }
        tracing::info!(url = %url, "Streaming connection loop exited");
    }
}

#[async_trait]
impl FetchWorker for StreamFetcher {
    fn start(&self) {
        let mut state = self.inner.state.lock();
        if state.stopped {
            tracing::warn!("Stream was stopped, ignoring start");
            return;
        }
        if state.task.is_some() {
            tracing::debug!("Stream already started");
            return;
        }

        let weak: Weak<StreamInner> = Arc::downgrade(&self.inner);
        let job: Job = Arc::new(move || {
            let weak = weak.clone();
            Box::pin(async move {
                if let Some(inner) = weak.upgrade() {
                    inner.run().await;
                }
            })
        });
        state.task = Some(self.inner.collab.scheduler.run_once(job));
        tracing::info!(url = %self.inner.settings.url, "Streaming started");
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
        tracing::info!("Streaming stopped");
    }
}

impl Drop for StreamFetcher {
    fn drop(&mut self) {
        if let Some(task) = self.inner.state.lock().task.take() {
            task.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{BackupHandler, StateStore};
    use crate::testing::{Harness, RecordingController, DOC_V1, DOC_V2};

    fn settings(max_fails: usize) -> StreamSettings {
        let api = ApiConfig::default();
        let config = StreamingConfig {
            max_fails,
            ..StreamingConfig::default()
        };
        StreamSettings::from_config(&api, &config, HeaderMap::new()).unwrap()
    }

    fn fetcher_with_controller(
        harness: &Harness,
        max_fails: usize,
    ) -> (StreamFetcher, Arc<RecordingController>) {
        let controller = Arc::new(RecordingController::default());
        let weak: Weak<dyn ModeController> = {
            let as_dyn: Arc<dyn ModeController> = controller.clone();
            Arc::downgrade(&as_dyn)
        };
        let fetcher = StreamFetcher::new(
            settings(max_fails),
            harness.collaborators.clone(),
            Some(weak),
        );
        (fetcher, controller)
    }

    #[test]
    fn test_single_hydration_applies_once() {
        let harness = Harness::new();
        let (fetcher, _) = fetcher_with_controller(&harness, 5);

        fetcher.handle_message(EVENT_CONNECTED, DOC_V1);

        assert_eq!(harness.store.applies(), 1);
        assert_eq!(harness.backup.writes(), 1);
        assert_eq!(harness.subscriber.ready_count(), 1);
        assert_eq!(harness.store.current_state().as_deref(), Some(DOC_V1));
    }

    #[test]
    fn test_hydration_applies_backs_up_and_fires_ready() {
        let harness = Harness::new();
        let (fetcher, _) = fetcher_with_controller(&harness, 5);

        assert_eq!(
            fetcher.handle_message(EVENT_CONNECTED, DOC_V1),
            StreamAction::Continue
        );
        assert_eq!(
            fetcher.handle_message(EVENT_UPDATED, DOC_V2),
            StreamAction::Continue
        );

        assert_eq!(harness.store.current_state().as_deref(), Some(DOC_V2));
        assert_eq!(harness.store.applies(), 2);
        assert_eq!(harness.backup.writes(), 2);
        assert_eq!(harness.backup.read().as_deref(), Some(DOC_V2));
        assert_eq!(harness.subscriber.ready_count(), 1);
        assert_eq!(
            harness.subscriber.updates(),
            vec![FetchResult::changed(DOC_V1), FetchResult::changed(DOC_V2)]
        );
    }

    #[test]
    fn test_rejected_payload_reconnects_without_failover() {
        let harness = Harness::new();
        let (fetcher, controller) = fetcher_with_controller(&harness, 1);
        fetcher.handle_message(EVENT_CONNECTED, DOC_V1);

        let action = fetcher.handle_message(EVENT_UPDATED, "{truncated");

        assert_eq!(action, StreamAction::Reconnect);
        assert_eq!(harness.store.current_state().as_deref(), Some(DOC_V1));
        assert_eq!(harness.backup.writes(), 1);
        assert_eq!(harness.subscriber.error_count(), 1);
        assert_eq!(fetcher.retained_failures(), 0);
        assert_eq!(controller.requests(), 0);
    }

    #[test]
    fn test_polling_hint_requests_failover() {
        let harness = Harness::new();
        let (fetcher, controller) = fetcher_with_controller(&harness, 5);

        fetcher.handle_message(EVENT_FETCH_MODE, "polling");

        assert_eq!(controller.requests(), 1);
    }

    #[test]
    fn test_other_hints_are_ignored() {
        let harness = Harness::new();
        let (fetcher, controller) = fetcher_with_controller(&harness, 1);

        fetcher.handle_message(EVENT_FETCH_MODE, "streaming");
        fetcher.handle_message(EVENT_FETCH_MODE, "");

        assert_eq!(controller.requests(), 0);
        assert_eq!(fetcher.retained_failures(), 0);
    }

    #[test]
    fn test_only_polling_hint_is_a_failure() {
        assert!(matches!(
            hint_event(" polling\n"),
            Some(FailEvent::ServerHint { ref hint, .. }) if hint == "polling"
        ));
        assert_eq!(hint_event("streaming"), None);
        assert_eq!(hint_event(""), None);
    }

    #[test]
    fn test_unknown_event_names_share_one_label() {
        assert_eq!(event_label(EVENT_CONNECTED), "unleash-connected");
        assert_eq!(event_label(EVENT_UPDATED), "unleash-updated");
        assert_eq!(event_label(EVENT_FETCH_MODE), "fetch-mode");
        assert_eq!(event_label("unleash-heartbeat"), "other");
        assert_eq!(event_label("x-7f3a"), "other");
    }

    #[test]
    fn test_hard_status_fails_over_immediately() {
        let harness = Harness::new();
        let (fetcher, controller) = fetcher_with_controller(&harness, 5);

        let action = fetcher.handle_failure(StreamFailure::Status {
            code: 401,
            message: "unauthorized".into(),
        });

        assert_eq!(action, StreamAction::Reconnect);
        assert_eq!(controller.requests(), 1);
        assert_eq!(fetcher.retained_failures(), 0);
    }

    #[test]
    fn test_repeated_closes_fail_over_once_threshold_reached() {
        let harness = Harness::new();
        let (fetcher, controller) = fetcher_with_controller(&harness, 3);

        fetcher.handle_failure(StreamFailure::Closed);
        fetcher.handle_failure(StreamFailure::Network {
            message: "reset".into(),
        });
        assert_eq!(controller.requests(), 0);

        fetcher.handle_failure(StreamFailure::Status {
            code: 503,
            message: "unavailable".into(),
        });
        assert_eq!(controller.requests(), 1);
        assert_eq!(fetcher.retained_failures(), 3);
    }

    #[test]
    fn test_unlisted_status_is_not_counted() {
        let harness = Harness::new();
        let (fetcher, controller) = fetcher_with_controller(&harness, 1);

        fetcher.handle_failure(StreamFailure::Status {
            code: 418,
            message: "teapot".into(),
        });

        assert_eq!(controller.requests(), 0);
        assert_eq!(fetcher.retained_failures(), 0);
    }

    #[test]
    fn test_without_controller_stream_keeps_running() {
        let harness = Harness::new();
        let fetcher = StreamFetcher::new(settings(5), harness.collaborators.clone(), None);

        let action = fetcher.handle_message(EVENT_FETCH_MODE, "polling");

        assert_eq!(action, StreamAction::Continue);
        assert!(!fetcher.is_stopped());
    }

    #[test]
    fn test_dropped_controller_is_ignored() {
        let harness = Harness::new();
        let (fetcher, controller) = fetcher_with_controller(&harness, 5);
        drop(controller);

        assert_eq!(
            fetcher.handle_message(EVENT_FETCH_MODE, "polling"),
            StreamAction::Continue
        );
    }

    #[test]
    fn test_events_after_stop_are_no_ops() {
        let harness = Harness::new();
        let (fetcher, controller) = fetcher_with_controller(&harness, 1);

        fetcher.stop();
        fetcher.stop();

        assert_eq!(
            fetcher.handle_message(EVENT_CONNECTED, DOC_V1),
            StreamAction::Stop
        );
        assert_eq!(
            fetcher.handle_failure(StreamFailure::Closed),
            StreamAction::Stop
        );
        assert_eq!(harness.store.current_state(), None);
        assert_eq!(harness.subscriber.ready_count(), 0);
        assert_eq!(controller.requests(), 0);
    }

    #[tokio::test]
    async fn test_start_submits_one_connection_task() {
        let harness = Harness::new();
        let (fetcher, _) = fetcher_with_controller(&harness, 5);

        fetcher.start();
        fetcher.start();
        assert_eq!(harness.scheduler.scheduled(), 1);

        fetcher.stop();
        assert_eq!(harness.scheduler.scheduled(), 0);
        fetcher.start();
        assert_eq!(harness.scheduler.scheduled(), 0);
    }
}
