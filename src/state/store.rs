//! The feature-state store that workers install accepted documents into.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::error::ProtocolError;

/// Holds the current feature document.
///
/// Implementations reject malformed documents; a rejected document must leave
/// the previous state untouched.
pub trait StateStore: Send + Sync {
    /// Replace the current state with `document`.
    ///
    /// # Errors
    /// Returns [`ProtocolError`] when the document cannot be accepted.
    fn apply_state(&self, document: &str) -> Result<(), ProtocolError>;

    /// Snapshot of the current state, if any was ever applied.
    fn current_state(&self) -> Option<String>;
}

/// Keeps the latest valid JSON document in memory.
#[derive(Default)]
pub struct InMemoryStateStore {
    current: ArcSwapOption<String>,
}

impl InMemoryStateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for InMemoryStateStore {
    fn apply_state(&self, document: &str) -> Result<(), ProtocolError> {
        let value: serde_json::Value =
            serde_json::from_str(document).map_err(|e| ProtocolError::new(e.to_string()))?;
        if !value.is_object() {
            return Err(ProtocolError::new("document is not a JSON object"));
        }
        self.current.store(Some(Arc::new(document.to_string())));
        Ok(())
    }

    fn current_state(&self) -> Option<String> {
        self.current.load_full().map(|doc| doc.as_ref().clone())
    }
}

impl std::fmt::Debug for InMemoryStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStateStore")
            .field("populated", &self.current.load().is_some())
            .finish()
    }
}
