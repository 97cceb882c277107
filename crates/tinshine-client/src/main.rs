//! # tinshine-mirror
//!
//! Headless client that keeps a local cache in step with the record store:
//! a full sync at startup, a periodic resync, a faster update check that
//! triggers a resync when the server moves ahead, and the cross-process
//! watcher so edits made by other clients on this machine are picked up.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use tinshine_client::{
    AutoSync, ClientConfig, HttpRemote, StorageWatcher, SyncClient, SyncEvent, SyncMode,
};
use tinshine_shared::Collection;
use tinshine_store::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("tinshine_client=debug,tinshine_mirror=debug,tinshine_store=info,warn")
    });
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    info!("Starting Tinshine mirror v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration and open the cache
    // -----------------------------------------------------------------------
    let config = ClientConfig::from_env();
    info!(?config, "Loaded configuration");

    let db = match &config.cache_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };
    let remote = HttpRemote::new(config.api_base_url.clone(), config.http_timeout)?;
    let client = Arc::new(SyncClient::new(remote, db)?);

    // -----------------------------------------------------------------------
    // 3. Initial sync
    // -----------------------------------------------------------------------
    if !client.sync_all().await {
        warn!("Server unreachable at startup, serving cached data");
    }
    for collection in Collection::ALL {
        info!(
            collection = %collection,
            count = client.count(collection),
            state = ?client.state(collection),
            "Cache status"
        );
    }

    // -----------------------------------------------------------------------
    // 4. Background tasks
    // -----------------------------------------------------------------------
    // Headless: the view is always "visible".
    let (_visible_tx, visible) = watch::channel(true);

    let resync = AutoSync::new(
        client.clone(),
        config.auto_sync_interval,
        SyncMode::Resync,
        visible.clone(),
    );
    let update_check = AutoSync::new(
        client.clone(),
        config.update_check_interval,
        SyncMode::Notify,
        visible,
    );
    let watcher = StorageWatcher::new(client.clone(), config.watch_poll_interval);

    let mut events = client.subscribe();
    resync.start();
    update_check.start();
    watcher.start();

    // -----------------------------------------------------------------------
    // 5. React to events until shutdown
    // -----------------------------------------------------------------------
    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(SyncEvent::UpdateAvailable { version }) => {
                        info!(version, "Update available, syncing");
                        client.sync_all().await;
                    }
                    Some(SyncEvent::DataUpdated { scope }) => {
                        info!(?scope, version = client.local_version(), "Data updated");
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    resync.stop();
    update_check.stop();
    watcher.stop();
    Ok(())
}
