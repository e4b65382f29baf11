//! Adaptive backoff for the polling transport.
//!
//! The scheduler ticks at a fixed cadence; the throttler decides per tick
//! whether the HTTP call is attempted. Sustained upstream errors lengthen the
//! effective interval up to `max_backoff_secs`.
//!
//! # Growth
//! ```text
//! max_skips = max(max_backoff_secs / max(interval_secs, 1), 1)
//! 401/403/404     → skips = max_skips
//! any other error → failures = min(failures + 1, max_skips), skips = failures
//! success         → failures -= 1 (floor 0), skips = 0
//! skipped tick    → skips -= 1 (floor 0)
//! ```

/// Status codes that indicate misconfiguration rather than load.
const MAXIMIZING_STATUS_CODES: [u16; 3] = [401, 403, 404];

/// Skip counter driven by upstream error history.
#[derive(Debug, Clone)]
pub struct Throttler {
    max_skips: u32,
    failures: u32,
    skips: u32,
    target: String,
}

impl Throttler {
    /// Create a throttler for a fixed `interval_secs` cadence that never
    /// stretches the effective interval beyond `max_backoff_secs`.
    pub fn new(interval_secs: u64, max_backoff_secs: u64, target: impl Into<String>) -> Self {
        let ratio = max_backoff_secs / interval_secs.max(1);
        let max_skips = u32::try_from(ratio).unwrap_or(u32::MAX).max(1);
        Self {
            max_skips,
            failures: 0,
            skips: 0,
            target: target.into(),
        }
    }

    /// True if this tick's HTTP call should be attempted.
    pub fn should_run(&self) -> bool {
        self.skips == 0
    }

    /// Record a tick that was not attempted.
    pub fn record_skip(&mut self) {
        self.skips = self.skips.saturating_sub(1);
    }

    /// Record an outcome that was not an upstream error.
    pub fn record_success(&mut self) {
        self.failures = self.failures.saturating_sub(1);
        self.skips = 0;
    }

    /// Record an upstream error. `None` means the server was never reached.
    pub fn record_error(&mut self, status: Option<u16>) {
        match status {
            Some(code) if MAXIMIZING_STATUS_CODES.contains(&code) => {
                self.failures = (self.failures + 1).min(self.max_skips);
                self.skips = self.max_skips;
                if code == 404 {
                    tracing::error!(
                        target_url = %self.target,
                        status = code,
                        max_skips = self.max_skips,
                        "Server said the resource does not exist, check the configured API url. Backing off to the maximum interval"
                    );
                } else {
                    tracing::error!(
                        target_url = %self.target,
                        status = code,
                        max_skips = self.max_skips,
                        "Client was not authorized, check the configured API token. Backing off to the maximum interval"
                    );
                }
            }
            _ => {
                self.failures = (self.failures + 1).min(self.max_skips);
                self.skips = self.failures;
                tracing::warn!(
                    target_url = %self.target,
                    status = ?status,
                    failures = self.failures,
                    skips = self.skips,
                    "Upstream error, backing off"
                );
            }
        }
    }

    /// Consecutive failure count.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Ticks left to skip.
    pub fn skips(&self) -> u32 {
        self.skips
    }

    /// Upper bound for `skips`.
    pub fn max_skips(&self) -> u32 {
        self.max_skips
    }
}
