//! Client facade that wires the sync layer together.
//!
//! # Data Flow
//! ```text
//! SyncClientBuilder::build
//!     → validate config
//!     → connection id + identification headers
//!     → seed state from backup / bootstrap
//!     → AdaptiveFetcher::initialize (optionally blocks on first poll)
//!     → SyncClient
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use crate::config::{validate_config, FetchMode, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::events::{EventSubscriber, NoopSubscriber, ReadinessGate};
use crate::fetch::headers::client_headers;
use crate::fetch::{
    AdaptiveFetcher, Collaborators, FeatureSource, FetchWorker, HttpFeatureSource,
    StartupErrorHandler,
};
use crate::lifecycle::seed_state;
use crate::scheduler::{Scheduler, TokioScheduler};
use crate::state::{BackupHandler, BootstrapProvider, InMemoryStateStore, NoopBackup, StateStore};

/// A running feature synchronization client.
pub struct SyncClient {
    connection_id: String,
    store: Arc<dyn StateStore>,
    gate: Arc<ReadinessGate>,
    fetcher: Arc<AdaptiveFetcher>,
    owned_scheduler: Option<Arc<TokioScheduler>>,
    shut_down: AtomicBool,
}

impl SyncClient {
    /// Start building a client for `config`.
    pub fn builder(config: SyncConfig) -> SyncClientBuilder {
        SyncClientBuilder::new(config)
    }

    /// Current feature document.
    pub fn state(&self) -> Option<String> {
        self.store.current_state()
    }

    /// Whether a fetch has installed usable state.
    pub fn is_ready(&self) -> bool {
        self.gate.is_ready()
    }

    /// Identifier sent as the connection-id header on every request.
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Transport currently responsible for updates.
    pub fn active_mode(&self) -> FetchMode {
        self.fetcher.active_mode()
    }

    /// Stop all fetching. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.fetcher.stop();
        if let Some(scheduler) = &self.owned_scheduler {
            scheduler.shutdown();
        }
        tracing::info!(connection_id = %self.connection_id, "Sync client shut down");
    }
}

impl Drop for SyncClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for SyncClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncClient")
            .field("connection_id", &self.connection_id)
            .field("ready", &self.is_ready())
            .field("mode", &self.active_mode())
            .finish()
    }
}

/// Builder for [`SyncClient`]. Every collaborator has a default.
pub struct SyncClientBuilder {
    config: SyncConfig,
    store: Option<Arc<dyn StateStore>>,
    backup: Option<Arc<dyn BackupHandler>>,
    subscriber: Option<Arc<dyn EventSubscriber>>,
    bootstrap: Option<Arc<dyn BootstrapProvider>>,
    source: Option<Arc<dyn FeatureSource>>,
    scheduler: Option<Arc<dyn Scheduler>>,
    startup_handler: Option<StartupErrorHandler>,
}

impl SyncClientBuilder {
    /// Create a builder with default collaborators.
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            store: None,
            backup: None,
            subscriber: None,
            bootstrap: None,
            source: None,
            scheduler: None,
            startup_handler: None,
        }
    }

    pub fn store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn backup(mut self, backup: Arc<dyn BackupHandler>) -> Self {
        self.backup = Some(backup);
        self
    }

    pub fn subscriber(mut self, subscriber: Arc<dyn EventSubscriber>) -> Self {
        self.subscriber = Some(subscriber);
        self
    }

    pub fn bootstrap(mut self, bootstrap: Arc<dyn BootstrapProvider>) -> Self {
        self.bootstrap = Some(bootstrap);
        self
    }

    /// Replace the HTTP polling source.
    pub fn source(mut self, source: Arc<dyn FeatureSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Use an externally owned scheduler. The client will not shut it down.
    pub fn scheduler(mut self, scheduler: Arc<dyn Scheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Receive a failed synchronous startup fetch instead of failing `build`.
    pub fn startup_error_handler(mut self, handler: StartupErrorHandler) -> Self {
        self.startup_handler = Some(handler);
        self
    }

    /// Validate, seed and start the client.
    ///
    /// # Errors
    /// - [`SyncError::Config`] for an invalid configuration
    /// - the startup failure when synchronous startup fails without a handler
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime and no scheduler was given.
    pub async fn build(self) -> SyncResult<SyncClient> {
        let config = self.config;
        validate_config(&config).map_err(|errors| {
            SyncError::Config(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            )
        })?;

        let connection_id = Uuid::new_v4().to_string();
        let headers = client_headers(&config.api, &connection_id)?;

        let store: Arc<dyn StateStore> = match self.store {
            Some(store) => store,
            None => Arc::new(InMemoryStateStore::new()),
        };
        let backup: Arc<dyn BackupHandler> = match self.backup {
            Some(backup) => backup,
            None => Arc::new(NoopBackup),
        };
        let subscriber: Arc<dyn EventSubscriber> = match self.subscriber {
            Some(subscriber) => subscriber,
            None => Arc::new(NoopSubscriber),
        };
        let gate = Arc::new(ReadinessGate::new(subscriber));

        let (scheduler, owned_scheduler) = match self.scheduler {
            Some(scheduler) => (scheduler, None),
            None => {
                let owned = Arc::new(TokioScheduler::new());
                (owned.clone() as Arc<dyn Scheduler>, Some(owned))
            }
        };

        seed_state(
            store.as_ref(),
            backup.as_ref(),
            self.bootstrap.as_deref(),
            &gate,
        );

        let source: Arc<dyn FeatureSource> = match self.source {
            Some(source) => source,
            None => Arc::new(HttpFeatureSource::new(&config.api, headers.clone())?),
        };
        let collab = Collaborators {
            store: store.clone(),
            backup,
            gate: gate.clone(),
            scheduler,
        };
        let fetcher =
            AdaptiveFetcher::from_config(&config, headers, source, collab, self.startup_handler)?;

        let client = SyncClient {
            connection_id,
            store,
            gate,
            fetcher,
            owned_scheduler,
            shut_down: AtomicBool::new(false),
        };

        tracing::info!(
            connection_id = %client.connection_id,
            app_name = %config.api.app_name,
            mode = %config.mode,
            "Starting sync client"
        );
        client.fetcher.initialize().await?;
        Ok(client)
    }
}
