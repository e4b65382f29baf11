//! Application notifications.
//!
//! # Data Flow
//! ```text
//! worker accepted state
//!     → gate.rs (ready at most once, updates/errors pass through)
//!     → subscriber.rs (application callbacks)
//! ```

pub mod gate;
pub mod subscriber;

pub use gate::ReadinessGate;
pub use subscriber::{EventSubscriber, LoggingSubscriber, NoopSubscriber};
