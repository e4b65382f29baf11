//! Feature state and its persistence collaborators.
//!
//! # Data Flow
//! ```text
//! startup:  backup.rs (read) → bootstrap fallback → store.rs
//! runtime:  worker → store.rs (apply) → backup.rs (write snapshot)
//! ```

pub mod backup;
pub mod store;

pub use backup::{BackupHandler, BootstrapProvider, MemoryBackup, NoopBackup, StaticBootstrap};
pub use store::{InMemoryStateStore, StateStore};
