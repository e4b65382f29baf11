//! Startup seeding.
//!
//! # Responsibilities
//! - Install the last known state before any network call
//! - Fall back to a bootstrap document when no backup exists
//!
//! # Design Decisions
//! - A bad seed is reported, never fatal: the first fetch can still succeed
//! - Seeding does not fire readiness; only a fetch does

use crate::error::SyncError;
use crate::events::ReadinessGate;
use crate::state::{BackupHandler, BootstrapProvider, StateStore};

/// Where the seed document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedSource {
    Backup,
    Bootstrap,
}

/// Apply the backup, or else the bootstrap document, to `store`.
///
/// Returns where the applied document came from, or `None` when nothing was
/// applied.
pub fn seed_state(
    store: &dyn StateStore,
    backup: &dyn BackupHandler,
    bootstrap: Option<&dyn BootstrapProvider>,
    gate: &ReadinessGate,
) -> Option<SeedSource> {
    let (document, origin) = match backup.read() {
        Some(document) => (document, SeedSource::Backup),
        None => (bootstrap?.read()?, SeedSource::Bootstrap),
    };

    match store.apply_state(&document) {
        Ok(()) => {
            tracing::info!(source = ?origin, bytes = document.len(), "Seeded feature state");
            Some(origin)
        }
        Err(e) => {
            tracing::warn!(source = ?origin, reason = %e.reason(), "Failed to seed feature state");
            gate.forward_error(&SyncError::from(e));
            None
        }
    }
}
