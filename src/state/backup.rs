//! Backup and bootstrap sources for startup seeding.

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

/// Persists the last accepted state so a restart can serve it before the
/// first successful fetch.
pub trait BackupHandler: Send + Sync {
    /// Last persisted document.
    fn read(&self) -> Option<String>;

    /// Persist `document`.
    ///
    /// # Errors
    /// Returns the underlying I/O failure. Callers log it and carry on.
    fn write(&self, document: &str) -> io::Result<()>;
}

/// Supplies an initial document when no backup exists.
pub trait BootstrapProvider: Send + Sync {
    fn read(&self) -> Option<String>;
}

/// Discards writes and never has anything to read.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBackup;

impl BackupHandler for NoopBackup {
    fn read(&self) -> Option<String> {
        None
    }

    fn write(&self, _document: &str) -> io::Result<()> {
        Ok(())
    }
}

/// Keeps the last written document in memory.
#[derive(Debug, Default)]
pub struct MemoryBackup {
    document: Mutex<Option<String>>,
    writes: AtomicUsize,
}

impl MemoryBackup {
    /// Create an empty backup.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backup that already holds `document`.
    pub fn with_document(document: impl Into<String>) -> Self {
        Self {
            document: Mutex::new(Some(document.into())),
            writes: AtomicUsize::new(0),
        }
    }

    /// Number of successful writes.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }
}

impl BackupHandler for MemoryBackup {
    fn read(&self) -> Option<String> {
        self.document.lock().clone()
    }

    fn write(&self, document: &str) -> io::Result<()> {
        *self.document.lock() = Some(document.to_string());
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// A fixed bootstrap document.
#[derive(Debug, Clone)]
pub struct StaticBootstrap {
    document: String,
}

impl StaticBootstrap {
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
        }
    }
}

impl BootstrapProvider for StaticBootstrap {
    fn read(&self) -> Option<String> {
        Some(self.document.clone())
    }
}
