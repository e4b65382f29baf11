//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Workers, gate, controller produce:
//!     → tracing events (structured fields)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → logging.rs (fmt subscriber with EnvFilter)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - The library only emits; installing subscribers and exporters is left to the binary
//! - Metrics are cheap (atomic updates behind the facade)

pub mod logging;
pub mod metrics;
