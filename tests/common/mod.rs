//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use flag_sync::{EventSubscriber, FetchMode, FetchResult, SyncConfig, SyncError};
use wiremock::MockServer;

pub const FEATURES_PATH: &str = "/api/client/features";
pub const STREAMING_PATH: &str = "/api/client/streaming";

pub const DOC_V1: &str = r#"{"version":1,"features":[{"name":"checkout","enabled":true}]}"#;
pub const DOC_V2: &str = r#"{"version":1,"features":[{"name":"checkout","enabled":false}]}"#;

/// A config pointing at `server` with short test-friendly timings.
pub fn config_for(server: &MockServer, mode: FetchMode) -> SyncConfig {
    let mut config = SyncConfig::default();
    config.api.url = format!("{}/api/", server.uri());
    config.api.app_name = "integration".to_string();
    config.api.instance_id = "integration-1".to_string();
    config.mode = mode;
    config.polling.interval_secs = 1;
    config.polling.max_backoff_secs = 10;
    config.streaming.reconnect_delay_ms = 50;
    config
}

/// Render SSE frames from `(event, data)` pairs.
pub fn sse_body(events: &[(&str, &str)]) -> String {
    events
        .iter()
        .map(|(event, data)| format!("event: {event}\ndata: {data}\n\n"))
        .collect()
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_until<F: Fn() -> bool>(timeout: Duration, condition: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

/// Subscriber that counts notifications.
#[derive(Default)]
pub struct CountingSubscriber {
    ready: AtomicUsize,
    updates: AtomicUsize,
    errors: Mutex<Vec<String>>,
}

impl CountingSubscriber {
    pub fn ready(&self) -> usize {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().unwrap().clone()
    }
}

impl EventSubscriber for CountingSubscriber {
    fn on_ready(&self) {
        self.ready.fetch_add(1, Ordering::SeqCst);
    }

    fn on_update(&self, _result: &FetchResult) {
        self.updates.fetch_add(1, Ordering::SeqCst);
    }

    fn on_error(&self, error: &SyncError) {
        self.errors.lock().unwrap().push(error.to_string());
    }
}
