//! flag-sync
//!
//! Runs a feature synchronization client until Ctrl-C or SIGTERM.
//!
//! ```text
//!   ┌──────────────────────────── SyncClient ────────────────────────────┐
//!   │                                                                    │
//!   │   backup / bootstrap ──▶ state store ◀── AdaptiveFetcher           │
//!   │                              │            ├─ PollFetcher  ◀── HTTP │
//!   │                              │            └─ StreamFetcher ◀── SSE │
//!   │                              ▼                    │ failover       │
//!   │                        ReadinessGate ◀────────────┘                │
//!   │                              │                                     │
//!   │                              ▼                                     │
//!   │                       LoggingSubscriber                            │
//!   └────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use flag_sync::config::{load_config, FetchMode, SyncConfig};
use flag_sync::lifecycle::signals::shutdown_signal;
use flag_sync::observability::{logging, metrics};
use flag_sync::{LoggingSubscriber, SyncClient};

#[derive(Parser, Debug)]
#[command(name = "flag-sync", version, about = "Feature flag synchronization client")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured transport (polling, streaming)
    #[arg(short, long)]
    mode: Option<FetchMode>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => SyncConfig::default(),
    };
    if let Some(mode) = cli.mode {
        config.mode = mode;
    }

    logging::init_logging(&config.observability.log_level);
    tracing::info!("flag-sync v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    tracing::info!(
        url = %config.api.url,
        app_name = %config.api.app_name,
        mode = %config.mode,
        interval_secs = config.polling.interval_secs,
        "Configuration loaded"
    );

    let client = SyncClient::builder(config)
        .subscriber(Arc::new(LoggingSubscriber))
        .build()
        .await?;

    shutdown_signal().await;

    client.shutdown();
    tracing::info!("Shutdown complete");
    Ok(())
}
