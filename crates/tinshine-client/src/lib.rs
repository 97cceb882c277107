//! # tinshine-client
//!
//! Offline-first synchronization between the Tinshine record store and a
//! local SQLite cache shared by every client on the machine.
//!
//! - [`SyncClient`] serves reads from the cache and sends writes to the
//!   server first, falling back to the cache when the server is down
//! - [`AutoSync`] compares the local data version with the server's on a
//!   timer and resyncs or announces the update
//! - [`StorageWatcher`] notices writes made by other clients through the
//!   shared cache file
//! - [`EventBus`] tells in-process subscribers what changed

pub mod client;
pub mod config;
pub mod detector;
pub mod error;
pub mod events;
pub mod images;
pub mod query;
pub mod remote;
pub mod scheduler;
pub mod state;
pub mod watcher;

mod task;

#[cfg(test)]
mod testing;

pub use client::{Origin, PlaceholderSource, SyncClient, WelcomePlaceholder, WriteOutcome};
pub use config::ClientConfig;
pub use error::{SnapshotRejection, SyncError};
pub use events::{EventBus, Scope, Subscription, SyncEvent};
pub use images::ImageLookup;
pub use remote::{HttpRemote, Remote, RemoteError};
pub use scheduler::{AutoSync, SyncMode, TickOutcome};
pub use state::SyncState;
pub use watcher::StorageWatcher;
