//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     backup → bootstrap fallback → state store, before any fetch
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → binary shuts the client down
//! ```
//!
//! # Design Decisions
//! - Ordered startup: seed, then start the configured transport
//! - Shutdown is idempotent and also runs when the client is dropped

pub mod signals;
pub mod startup;

pub use startup::{seed_state, SeedSource};
