//! One-shot readiness latch in front of the subscriber.
//!
//! # Design Decisions
//! - Compare-and-set on the fired flag: poll and stream paths may race
//!   during a failover transition, the subscriber still sees one ready
//! - Updates and errors pass through ungated

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::SyncError;
use crate::events::subscriber::EventSubscriber;
use crate::fetch::FetchResult;
use crate::observability::metrics;

/// Guarantees a single `on_ready` per client lifetime.
pub struct ReadinessGate {
    fired: AtomicBool,
    subscriber: Arc<dyn EventSubscriber>,
}

impl ReadinessGate {
    /// Create a gate in front of `subscriber`.
    pub fn new(subscriber: Arc<dyn EventSubscriber>) -> Self {
        Self {
            fired: AtomicBool::new(false),
            subscriber,
        }
    }

    /// Dispatch `on_ready` if this is the first call. Returns true for the
    /// call that actually dispatched.
    pub fn fire(&self) -> bool {
        if self
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            tracing::info!("Readiness gate fired");
            metrics::record_ready();
            self.subscriber.on_ready();
            true
        } else {
            false
        }
    }

    /// Whether `fire` has dispatched.
    pub fn is_ready(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Pass a fetch result through.
    pub fn forward_update(&self, result: &FetchResult) {
        self.subscriber.on_update(result);
    }

    /// Pass an error through.
    pub fn forward_error(&self, error: &SyncError) {
        self.subscriber.on_error(error);
    }
}

impl std::fmt::Debug for ReadinessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessGate")
            .field("fired", &self.is_ready())
            .finish()
    }
}
