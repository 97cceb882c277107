//! # tinshine-store
//!
//! Persistent local cache for the Tinshine sync client, backed by SQLite.
//!
//! The cache is a namespaced key/value table holding whole serialized
//! values: one blob per collection, one for the image lookup table, and a
//! few scalars (last synced version, last sync time, the cross-process
//! change marker). Values are only ever replaced wholesale, and multi-key
//! writes go through a single transaction.

pub mod cache;
pub mod database;
pub mod migrations;
pub mod models;
pub mod snapshot;

mod error;
mod kv;

pub use cache::CacheBatch;
pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
pub use snapshot::ImportOutcome;
