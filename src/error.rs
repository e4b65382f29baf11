//! Error taxonomy for the synchronization layer.
//!
//! # Categories
//! - Network: connection-level failure, no HTTP semantics
//! - Upstream: HTTP status >= 400 from a reachable server
//! - Protocol: payload could not be applied to the state store
//! - Startup: fail-fast initial fetch did not produce state
//!
//! Server mode hints are not errors; they travel as `FailEvent::ServerHint`.

use thiserror::Error;

/// The state store rejected a payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid feature payload: {reason}")]
pub struct ProtocolError {
    reason: String,
}

impl ProtocolError {
    /// Create a new protocol error with a human readable reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Why the payload was rejected.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Errors surfaced by fetch workers and the client facade.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Transport failed before an HTTP status was available.
    #[error("network error: {0}")]
    Network(String),

    /// Server answered with an error status.
    #[error("upstream returned HTTP {status}")]
    Upstream { status: u16 },

    /// Payload could not be installed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Synchronous startup fetch failed.
    #[error("could not initialize feature state, got response code {}", display_status(.status))]
    Startup { status: Option<u16> },

    /// Client could not be assembled from its configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for synchronization operations.
pub type SyncResult<T> = Result<T, SyncError>;

fn display_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "none".to_string(),
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => SyncError::Upstream {
                status: status.as_u16(),
            },
            None => SyncError::Network(err.to_string()),
        }
    }
}
