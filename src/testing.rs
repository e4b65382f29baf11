//! Shared fakes for unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{ProtocolError, SyncError, SyncResult};
use crate::events::{EventSubscriber, ReadinessGate};
use crate::fetch::{Collaborators, FeatureSource, FetchResult, FetchWorker, ModeController};
use crate::scheduler::ManualScheduler;
use crate::state::{InMemoryStateStore, MemoryBackup, StateStore};

pub const DOC_V1: &str = r#"{"version":1,"features":[{"name":"checkout","enabled":true}]}"#;
pub const DOC_V2: &str = r#"{"version":1,"features":[{"name":"checkout","enabled":false}]}"#;

/// Counts every notification it receives.
#[derive(Default)]
pub struct RecordingSubscriber {
    ready: AtomicUsize,
    updates: Mutex<Vec<FetchResult>>,
    errors: Mutex<Vec<String>>,
}

impl RecordingSubscriber {
    pub fn ready_count(&self) -> usize {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().len()
    }

    pub fn updates(&self) -> Vec<FetchResult> {
        self.updates.lock().clone()
    }

    pub fn error_count(&self) -> usize {
        self.errors.lock().len()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }
}

impl EventSubscriber for RecordingSubscriber {
    fn on_ready(&self) {
        self.ready.fetch_add(1, Ordering::SeqCst);
    }

    fn on_update(&self, result: &FetchResult) {
        self.updates.lock().push(result.clone());
    }

    fn on_error(&self, error: &SyncError) {
        self.errors.lock().push(error.to_string());
    }
}

/// Replays queued fetch outcomes; answers `NotChanged` once drained.
#[derive(Default)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<SyncResult<FetchResult>>>,
    calls: AtomicUsize,
    accepted: Mutex<Vec<Option<String>>>,
}

impl ScriptedSource {
    pub fn new(script: Vec<SyncResult<FetchResult>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            ..Self::default()
        }
    }

    pub fn push(&self, outcome: SyncResult<FetchResult>) {
        self.script.lock().push_back(outcome);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// ETags of the results the poller reported as installed.
    pub fn accepted_etags(&self) -> Vec<Option<String>> {
        self.accepted.lock().clone()
    }
}

#[async_trait]
impl FeatureSource for ScriptedSource {
    async fn fetch_features(&self) -> SyncResult<FetchResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(FetchResult::not_changed()))
    }

    fn record_accepted(&self, result: &FetchResult) {
        self.accepted.lock().push(result.etag.clone());
    }

    fn target(&self) -> String {
        "http://flags.test/api/client/features".to_string()
    }
}

/// In-memory store that counts every apply attempt.
#[derive(Default)]
pub struct CountingStore {
    inner: InMemoryStateStore,
    applies: AtomicUsize,
}

impl CountingStore {
    pub fn applies(&self) -> usize {
        self.applies.load(Ordering::SeqCst)
    }
}

impl StateStore for CountingStore {
    fn apply_state(&self, document: &str) -> Result<(), ProtocolError> {
        self.applies.fetch_add(1, Ordering::SeqCst);
        self.inner.apply_state(document)
    }

    fn current_state(&self) -> Option<String> {
        self.inner.current_state()
    }
}

/// Counts failover requests.
#[derive(Default)]
pub struct RecordingController {
    requests: AtomicUsize,
}

impl RecordingController {
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl ModeController for RecordingController {
    fn request_failover(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

/// A worker that only counts lifecycle calls.
#[derive(Default)]
pub struct CountingWorker {
    starts: AtomicUsize,
    stops: AtomicUsize,
    fail_initialize: bool,
}

impl CountingWorker {
    pub fn failing() -> Self {
        Self {
            fail_initialize: true,
            ..Self::default()
        }
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FetchWorker for CountingWorker {
    async fn initialize(&self) -> SyncResult<()> {
        if self.fail_initialize {
            return Err(SyncError::Startup { status: Some(503) });
        }
        self.start();
        Ok(())
    }

    fn start(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Collaborators wired to in-memory fakes.
pub struct Harness {
    pub store: Arc<CountingStore>,
    pub backup: Arc<MemoryBackup>,
    pub subscriber: Arc<RecordingSubscriber>,
    pub scheduler: Arc<ManualScheduler>,
    pub collaborators: Collaborators,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(CountingStore::default());
        let backup = Arc::new(MemoryBackup::new());
        let subscriber = Arc::new(RecordingSubscriber::default());
        let scheduler = Arc::new(ManualScheduler::new());
        let collaborators = Collaborators {
            store: store.clone(),
            backup: backup.clone(),
            gate: Arc::new(ReadinessGate::new(subscriber.clone())),
            scheduler: scheduler.clone(),
        };
        Self {
            store,
            backup,
            subscriber,
            scheduler,
            collaborators,
        }
    }
}
