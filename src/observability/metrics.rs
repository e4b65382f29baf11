//! Metrics collection and exposition.
//!
//! # Metrics
//! - `flag_sync_poll_cycles_total` (counter): poll cycles by outcome
//! - `flag_sync_throttle_skips` (gauge): remaining skips before the next poll
//! - `flag_sync_throttle_failures` (gauge): current throttler failure count
//! - `flag_sync_stream_events_total` (counter): SSE events by name
//! - `flag_sync_stream_failures_total` (counter): stream failures by kind
//! - `flag_sync_failovers_total` (counter): stream → poll transitions
//! - `flag_sync_ready` (gauge): 1 once the readiness gate fired
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Prometheus exposition is opt-in via configuration

use std::net::SocketAddr;
use std::sync::Once;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

static DESCRIBE: Once = Once::new();

/// Register metric descriptions. Idempotent.
pub fn describe_metrics() {
    DESCRIBE.call_once(|| {
        describe_counter!("flag_sync_poll_cycles_total", "Poll cycles by outcome");
        describe_gauge!("flag_sync_throttle_skips", "Poll ticks left to skip");
        describe_gauge!("flag_sync_throttle_failures", "Throttler failure count");
        describe_counter!("flag_sync_stream_events_total", "SSE events received");
        describe_counter!("flag_sync_stream_failures_total", "Streaming failures");
        describe_counter!("flag_sync_failovers_total", "Stream to poll failovers");
        describe_gauge!("flag_sync_ready", "Feature state readiness");
    });
}

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe_metrics();
            tracing::info!(address = %addr, "Metrics endpoint started");
        }
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a poll cycle outcome (`changed`, `not_changed`, `unavailable`,
/// `skipped`, `rejected`, `network_error`).
pub fn record_poll_cycle(outcome: &'static str) {
    counter!("flag_sync_poll_cycles_total", "outcome" => outcome).increment(1);
}

/// Record the throttler state after a cycle.
pub fn record_throttle(failures: u32, skips: u32) {
    gauge!("flag_sync_throttle_failures").set(f64::from(failures));
    gauge!("flag_sync_throttle_skips").set(f64::from(skips));
}

/// Record a received SSE event.
pub fn record_stream_event(event: &'static str) {
    counter!("flag_sync_stream_events_total", "event" => event).increment(1);
}

/// Record a stream failure by kind (`network`, `http_status`, `server_hint`).
pub fn record_stream_failure(kind: &'static str) {
    counter!("flag_sync_stream_failures_total", "kind" => kind).increment(1);
}

/// Record a stream → poll failover.
pub fn record_failover() {
    counter!("flag_sync_failovers_total").increment(1);
}

/// Record that the readiness gate fired.
pub fn record_ready() {
    gauge!("flag_sync_ready").set(1.0);
}
