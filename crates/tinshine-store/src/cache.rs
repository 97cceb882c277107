//! Typed access to the cached collections and bookkeeping scalars.
//!
//! Reads go straight to the key/value table. Writes are grouped in a
//! [`CacheBatch`] and applied in one SQLite transaction, so a logical
//! operation (e.g. "replace products, update the image table, touch the
//! change marker") either lands completely or not at all.

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use tinshine_shared::{Collection, Record};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::kv;
use crate::models::{ImageTable, PendingChange, SyncMarker};

pub(crate) const KEY_DATA_VERSION: &str = "data_version";
pub(crate) const KEY_LAST_SYNC: &str = "last_sync";
pub(crate) const KEY_SYNC_MARKER: &str = "sync_timestamp";
pub(crate) const KEY_IMAGE_DB: &str = "imageDb";
pub(crate) const KEY_PENDING: &str = "pending_changes";

/// A set of whole-value replacements applied atomically.
#[derive(Debug, Default, Clone)]
pub struct CacheBatch {
    collections: Vec<(Collection, Option<Vec<Record>>)>,
    version: Option<u64>,
    images: Option<ImageTable>,
    marker: Option<SyncMarker>,
    synced_at: Option<DateTime<Utc>>,
    pending: Option<Vec<PendingChange>>,
}

impl CacheBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a collection wholesale.
    pub fn put_collection(mut self, collection: Collection, records: Vec<Record>) -> Self {
        self.collections.push((collection, Some(records)));
        self
    }

    /// Drop a collection's cache entry.
    pub fn clear_collection(mut self, collection: Collection) -> Self {
        self.collections.push((collection, None));
        self
    }

    pub fn version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }

    pub fn images(mut self, table: ImageTable) -> Self {
        self.images = Some(table);
        self
    }

    pub fn marker(mut self, marker: SyncMarker) -> Self {
        self.marker = Some(marker);
        self
    }

    pub fn synced_at(mut self, at: DateTime<Utc>) -> Self {
        self.synced_at = Some(at);
        self
    }

    pub fn pending(mut self, pending: Vec<PendingChange>) -> Self {
        self.pending = Some(pending);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
            && self.version.is_none()
            && self.images.is_none()
            && self.marker.is_none()
            && self.synced_at.is_none()
            && self.pending.is_none()
    }

    pub(crate) fn apply(&self, conn: &Connection) -> Result<()> {
        for (collection, records) in &self.collections {
            match records {
                Some(records) => kv::put_json(conn, collection.storage_key(), records)?,
                None => {
                    kv::remove_raw(conn, collection.storage_key())?;
                }
            }
        }
        if let Some(version) = self.version {
            kv::put_raw(conn, KEY_DATA_VERSION, &version.to_string())?;
        }
        if let Some(images) = &self.images {
            kv::put_json(conn, KEY_IMAGE_DB, images)?;
        }
        if let Some(at) = self.synced_at {
            kv::put_raw(conn, KEY_LAST_SYNC, &at.to_rfc3339())?;
        }
        if let Some(pending) = &self.pending {
            kv::put_json(conn, KEY_PENDING, pending)?;
        }
        if let Some(marker) = &self.marker {
            kv::put_json(conn, KEY_SYNC_MARKER, marker)?;
        }
        Ok(())
    }
}

pub(crate) fn read_version(conn: &Connection) -> Result<u64> {
    match kv::get_raw(conn, KEY_DATA_VERSION)? {
        Some(raw) => raw.trim().parse().map_err(|_| StoreError::Corrupt {
            key: KEY_DATA_VERSION.to_string(),
            reason: format!("not an unsigned integer: {raw:?}"),
        }),
        None => Ok(0),
    }
}

pub(crate) fn read_collection(conn: &Connection, collection: Collection) -> Result<Vec<Record>> {
    Ok(kv::get_json(conn, collection.storage_key())?.unwrap_or_default())
}

impl Database {
    /// Cached records of a collection; empty when nothing is cached yet.
    pub fn load_collection(&self, collection: Collection) -> Result<Vec<Record>> {
        read_collection(self.conn(), collection)
    }

    /// Whether the collection has a cache entry at all (possibly empty).
    pub fn has_collection(&self, collection: Collection) -> Result<bool> {
        Ok(kv::get_raw(self.conn(), collection.storage_key())?.is_some())
    }

    /// Last version this cache was synced or imported at, 0 if never.
    pub fn local_version(&self) -> Result<u64> {
        read_version(self.conn())
    }

    pub fn last_synced_at(&self) -> Result<Option<DateTime<Utc>>> {
        match kv::get_raw(self.conn(), KEY_LAST_SYNC)? {
            Some(raw) => DateTime::parse_from_rfc3339(&raw)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(|e| StoreError::Corrupt {
                    key: KEY_LAST_SYNC.to_string(),
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    pub fn sync_marker(&self) -> Result<Option<SyncMarker>> {
        kv::get_json(self.conn(), KEY_SYNC_MARKER)
    }

    pub fn load_image_table(&self) -> Result<Option<ImageTable>> {
        kv::get_json(self.conn(), KEY_IMAGE_DB)
    }

    pub fn pending_changes(&self) -> Result<Vec<PendingChange>> {
        Ok(kv::get_json(self.conn(), KEY_PENDING)?.unwrap_or_default())
    }

    /// Apply every write in `batch` inside a single transaction.
    pub fn write_batch(&mut self, batch: &CacheBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let tx = self.conn_mut().transaction()?;
        batch.apply(&tx)?;
        tx.commit()?;
        Ok(())
    }
}
