//! Sliding-window failover classifier for the streaming transport.
//!
//! # Decision Table
//! ```text
//! ServerHint "polling"            → fail over immediately, not retained
//! ServerHint anything else        → ignore, not retained
//! HTTP 401/403/404/429/501 (hard) → fail over immediately, not retained
//! HTTP 408/500/502/503/504 (soft) → retain, fail over when window >= max_fails
//! HTTP any other status           → ignore, not retained
//! Network error                   → retain, fail over when window >= max_fails
//! ```
//!
//! # Design Decisions
//! - Prune runs before every decision; survivors keep their relative order
//! - Not internally synchronized: the owning stream fetcher serializes calls

use std::time::{Duration, Instant};

/// Default number of retained failures that triggers failover.
pub const DEFAULT_MAX_FAILS: usize = 5;

/// Default retention window for failures.
pub const DEFAULT_FAIL_WINDOW: Duration = Duration::from_secs(60);

/// Status codes meaning the server rejected this client outright.
pub const HARD_FAILOVER_STATUS_CODES: [u16; 5] = [401, 403, 404, 429, 501];

/// Status codes that may be transient.
pub const SOFT_FAILOVER_STATUS_CODES: [u16; 5] = [408, 500, 502, 503, 504];

/// Hint values the server may send to request a mode change.
const FAILOVER_SERVER_HINTS: [&str; 1] = ["polling"];

/// A single observed transport failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailEvent {
    /// Connection-level failure.
    Network { occurred_at: Instant, message: String },
    /// HTTP error status during (re)connect.
    HttpStatus {
        occurred_at: Instant,
        message: String,
        status: u16,
    },
    /// Explicit mode hint sent by the server.
    ServerHint {
        occurred_at: Instant,
        message: String,
        hint: String,
    },
}

impl FailEvent {
    /// Network failure observed now.
    pub fn network(message: impl Into<String>) -> Self {
        FailEvent::Network {
            occurred_at: Instant::now(),
            message: message.into(),
        }
    }

    /// HTTP status failure observed now.
    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        FailEvent::HttpStatus {
            occurred_at: Instant::now(),
            message: message.into(),
            status,
        }
    }

    /// Server hint received now.
    pub fn server_hint(hint: impl Into<String>, message: impl Into<String>) -> Self {
        FailEvent::ServerHint {
            occurred_at: Instant::now(),
            message: message.into(),
            hint: hint.into(),
        }
    }

    /// Copy of this event with a different timestamp.
    pub fn at(mut self, instant: Instant) -> Self {
        match &mut self {
            FailEvent::Network { occurred_at, .. }
            | FailEvent::HttpStatus { occurred_at, .. }
            | FailEvent::ServerHint { occurred_at, .. } => *occurred_at = instant,
        }
        self
    }

    /// When the failure was observed.
    pub fn occurred_at(&self) -> Instant {
        match self {
            FailEvent::Network { occurred_at, .. }
            | FailEvent::HttpStatus { occurred_at, .. }
            | FailEvent::ServerHint { occurred_at, .. } => *occurred_at,
        }
    }

    /// Human readable description.
    pub fn message(&self) -> &str {
        match self {
            FailEvent::Network { message, .. }
            | FailEvent::HttpStatus { message, .. }
            | FailEvent::ServerHint { message, .. } => message,
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            FailEvent::Network { .. } => "network",
            FailEvent::HttpStatus { .. } => "http_status",
            FailEvent::ServerHint { .. } => "server_hint",
        }
    }
}

/// Decides whether accumulated failures justify abandoning the stream.
#[derive(Debug)]
pub struct FailoverStrategy {
    max_fails: usize,
    window: Duration,
    failures: Vec<FailEvent>,
}

impl FailoverStrategy {
    /// Create a strategy that fails over once `max_fails` retained
    /// failures fall within `window`.
    pub fn new(max_fails: usize, window: Duration) -> Self {
        Self {
            max_fails,
            window,
            failures: Vec::new(),
        }
    }

    /// Classify `event` at time `now`.
    pub fn should_failover(&mut self, event: FailEvent, now: Instant) -> bool {
        self.prune(now);

        match event {
            FailEvent::ServerHint { ref hint, .. } => {
                FAILOVER_SERVER_HINTS.contains(&hint.as_str())
            }
            FailEvent::HttpStatus { status, .. } => {
                if HARD_FAILOVER_STATUS_CODES.contains(&status) {
                    true
                } else if SOFT_FAILOVER_STATUS_CODES.contains(&status) {
                    self.retain_and_check(event)
                } else {
                    tracing::debug!(status, "Ignoring non-failover status code");
                    false
                }
            }
            FailEvent::Network { .. } => self.retain_and_check(event),
        }
    }

    /// Number of failures currently inside the window.
    pub fn retained(&self) -> usize {
        self.failures.len()
    }

    /// Configured threshold.
    pub fn max_fails(&self) -> usize {
        self.max_fails
    }

    fn retain_and_check(&mut self, event: FailEvent) -> bool {
        self.failures.push(event);
        self.failures.len() >= self.max_fails
    }

    fn prune(&mut self, now: Instant) {
        // Before the window has elapsed since an arbitrary epoch, nothing can be stale.
        if let Some(cutoff) = now.checked_sub(self.window) {
            self.failures.retain(|failure| failure.occurred_at() >= cutoff);
        }
    }
}

impl Default for FailoverStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FAILS, DEFAULT_FAIL_WINDOW)
    }
}
