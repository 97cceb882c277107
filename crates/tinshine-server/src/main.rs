//! # tinshine-server
//!
//! Record store for the Tinshine packaging catalog.
//!
//! This binary provides:
//! - **Flat-file persistence** of products and blog posts as JSON arrays,
//!   plus a global data version bumped on every mutation
//! - **REST API** (axum) under `/api` for CRUD, version checks, a full sync
//!   payload and health reporting

mod api;
mod config;
mod error;
mod record_store;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::record_store::RecordStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tinshine_server=debug")),
        )
        .init();

    info!("Starting Tinshine record store v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Open the data directory (creates missing files)
    // -----------------------------------------------------------------------
    let store = Arc::new(RecordStore::new(config.data_dir.clone()).await?);
    let version = store.version().await?;
    info!(
        path = %store.base_path().display(),
        version = version.version,
        "Data directory ready"
    );

    let http_addr = config.http_addr;
    let app_state = AppState {
        store,
        config: Arc::new(config),
    };

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
