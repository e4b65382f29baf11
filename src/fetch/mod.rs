//! Fetch workers and transport selection.
//!
//! # Data Flow
//! ```text
//! AdaptiveFetcher (adaptive.rs)
//!     ├─ PollFetcher (poll.rs)    → FeatureSource (source.rs) → HTTP GET client/features
//!     └─ StreamFetcher (stream.rs) → SSE client/streaming
//!                                      │ disqualifying failures
//!                                      ▼
//!                          ModeController::request_failover
//!                          → stop stream, start poll (one-way)
//!
//! Accepted state → StateStore → BackupHandler → ReadinessGate → subscriber
//! ```
//!
//! # Design Decisions
//! - Exactly one worker touches the store and backup at a time
//! - Each worker funnels every state mutation through one lock
//! - Workers are single-use; stop is permanent and idempotent

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{SyncError, SyncResult};
use crate::events::ReadinessGate;
use crate::scheduler::Scheduler;
use crate::state::{BackupHandler, StateStore};

pub mod adaptive;
pub mod headers;
pub mod poll;
pub mod source;
pub mod stream;

pub use adaptive::{AdaptiveFetcher, Workers};
pub use poll::{PollFetcher, PollSettings};
pub use source::{FeatureSource, HttpFeatureSource};
pub use stream::{StreamAction, StreamFailure, StreamFetcher, StreamSettings};

/// Outcome class of a single fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// A new document is available.
    Changed,
    /// Server confirmed the current document.
    NotChanged,
    /// Server answered with an error status.
    Unavailable,
}

/// Result of one poll or one stream event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub status: FetchStatus,
    pub payload: Option<String>,
    pub http_status: Option<u16>,
    /// Validator the server attached to a changed document.
    pub etag: Option<String>,
}

impl FetchResult {
    /// A new document.
    pub fn changed(payload: impl Into<String>) -> Self {
        Self {
            status: FetchStatus::Changed,
            payload: Some(payload.into()),
            http_status: Some(200),
            etag: None,
        }
    }

    /// Server confirmed the current document.
    pub fn not_changed() -> Self {
        Self {
            status: FetchStatus::NotChanged,
            payload: None,
            http_status: Some(304),
            etag: None,
        }
    }

    /// Server answered with `status`.
    pub fn unavailable(status: u16) -> Self {
        Self {
            status: FetchStatus::Unavailable,
            payload: None,
            http_status: Some(status),
            etag: None,
        }
    }

    /// Attach the server's validator for this document.
    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = Some(etag.into());
        self
    }
}

/// Receives a synchronous startup failure instead of aborting startup.
pub type StartupErrorHandler = Arc<dyn Fn(&SyncError) + Send + Sync>;

/// A transport that keeps the state store fresh.
#[async_trait]
pub trait FetchWorker: Send + Sync {
    /// Run any caller-blocking startup work, then [`FetchWorker::start`].
    ///
    /// # Errors
    /// Returns the startup failure when the worker was configured to fail fast.
    async fn initialize(&self) -> SyncResult<()> {
        self.start();
        Ok(())
    }

    /// Begin fetching in the background.
    fn start(&self);

    /// Stop fetching. Idempotent; later deliveries are no-ops.
    fn stop(&self);
}

/// Accepts requests to abandon the streaming transport.
pub trait ModeController: Send + Sync {
    /// Stop streaming and continue with polling.
    fn request_failover(&self);
}

/// Shared collaborators handed to whichever worker is active.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn StateStore>,
    pub backup: Arc<dyn BackupHandler>,
    pub gate: Arc<ReadinessGate>,
    pub scheduler: Arc<dyn Scheduler>,
}
