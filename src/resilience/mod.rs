//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Poll cycle:
//!     → throttle.rs (skip this tick? record outcome)
//!
//! Stream failure (disconnect, HTTP error, server hint):
//!     → failover.rs (sliding window classification)
//!     → ModeController::request_failover when disqualified
//! ```
//!
//! # Design Decisions
//! - Scheduling cadence never changes; backoff is expressed as skipped ticks
//! - Failover is one-way: a disqualified stream is never reopened
//! - Both classifiers are plain data owned by exactly one worker

pub mod failover;
pub mod throttle;

pub use failover::{FailEvent, FailoverStrategy};
pub use throttle::Throttler;
