//! Feature-flag synchronization layer.
//!
//! Keeps a local feature document fresh from a remote API over either
//! periodic HTTP polling or a server-sent-events stream, and falls back from
//! streaming to polling when the stream proves unreliable.

// Core
pub mod client;
pub mod error;
pub mod fetch;
pub mod state;

// Coordination
pub mod events;
pub mod resilience;
pub mod scheduler;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{SyncClient, SyncClientBuilder};
pub use config::{FetchMode, SyncConfig};
pub use error::{ProtocolError, SyncError, SyncResult};
pub use events::{EventSubscriber, LoggingSubscriber, ReadinessGate};
pub use fetch::{FetchResult, FetchStatus};
