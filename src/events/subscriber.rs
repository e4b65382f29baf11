//! Application-visible notifications.

use crate::error::SyncError;
use crate::fetch::{FetchResult, FetchStatus};

/// Receives readiness, update and error notifications.
///
/// Callbacks run on the worker task that produced them and must not block.
pub trait EventSubscriber: Send + Sync {
    /// First usable state was installed. Fires at most once per client.
    fn on_ready(&self) {}

    /// A fetch produced a result.
    fn on_update(&self, _result: &FetchResult) {}

    /// A failure the application may want to know about.
    fn on_error(&self, _error: &SyncError) {}
}

/// Ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSubscriber;

impl EventSubscriber for NoopSubscriber {}

/// Logs every notification through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSubscriber;

impl EventSubscriber for LoggingSubscriber {
    fn on_ready(&self) {
        tracing::info!("Feature state is ready");
    }

    fn on_update(&self, result: &FetchResult) {
        match result.status {
            FetchStatus::Changed => tracing::info!(
                bytes = result.payload.as_ref().map(String::len).unwrap_or(0),
                "Feature state updated"
            ),
            FetchStatus::NotChanged => tracing::debug!("Feature state unchanged"),
            FetchStatus::Unavailable => tracing::warn!(
                status = ?result.http_status,
                "Feature source unavailable"
            ),
        }
    }

    fn on_error(&self, error: &SyncError) {
        tracing::warn!(error = %error, "Feature synchronization error");
    }
}
