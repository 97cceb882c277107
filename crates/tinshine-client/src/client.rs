//! Cache-first reads and remote-first writes over the local SQLite cache.
//!
//! Reads never touch the network unless asked to (`fetch_all`, `load`,
//! `sync_all`). Writes go to the server first; when the server cannot be
//! used the change is applied to the cache alone, recorded in the pending
//! ledger and reported with [`Origin::LocalFallback`]. Every logical
//! read-modify-write cycle of the cache runs under one async mutex, so
//! concurrent operations are applied in the order they acquire it.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use tinshine_shared::models::{patch_image_url, welcome_post, without_reserved};
use tinshine_shared::{Collection, Entity, Fields, Record, Snapshot};
use tinshine_store::{
    CacheBatch, Database, ImageTable, ImportOutcome, PendingChange, PendingKind, StoreError,
    SyncMarker,
};

use crate::error::{SnapshotRejection, SyncError};
use crate::events::{EventBus, Scope, Subscription, SyncEvent};
use crate::images::ImageLookup;
use crate::query;
use crate::remote::{Remote, RemoteError};
use crate::state::{StateTable, SyncState};

/// Where a write ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Origin {
    /// Accepted by the server and mirrored into the cache.
    Remote,
    /// Server unreachable; saved in the cache only.
    LocalFallback,
    /// The collection has no server route.
    LocalOnly,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteOutcome<T> {
    pub value: T,
    pub origin: Origin,
}

impl<T> WriteOutcome<T> {
    /// Whether the caller should surface a "saved locally only" warning.
    pub fn is_degraded(&self) -> bool {
        self.origin == Origin::LocalFallback
    }
}

/// Content shown when a collection has neither server nor cached data.
/// Never persisted.
pub trait PlaceholderSource: Send + Sync {
    fn placeholder(&self, collection: Collection) -> Vec<Record>;
}

/// Shows the welcome blog post and nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct WelcomePlaceholder;

impl PlaceholderSource for WelcomePlaceholder {
    fn placeholder(&self, collection: Collection) -> Vec<Record> {
        match collection {
            Collection::BlogPosts => vec![welcome_post()],
            _ => Vec::new(),
        }
    }
}

enum Attempt<T> {
    Accepted(T),
    /// The server answered but does not have the record.
    Missing,
    Failed,
    LocalOnly,
}

impl<T> Attempt<T> {
    /// Drives the collection state and the pending ledger. A server that
    /// reports a record missing is reachable, so nothing is pending.
    fn origin(&self) -> Origin {
        match self {
            Attempt::Accepted(_) | Attempt::Missing => Origin::Remote,
            Attempt::Failed => Origin::LocalFallback,
            Attempt::LocalOnly => Origin::LocalOnly,
        }
    }

    /// For calls where a 404 says nothing about a record, e.g. list or create.
    fn missing_as_failed(self) -> Self {
        match self {
            Attempt::Missing => Attempt::Failed,
            other => other,
        }
    }
}

pub struct SyncClient<R: Remote> {
    pub(crate) remote: R,
    db: Arc<Mutex<Database>>,
    pub(crate) images: ImageLookup,
    pub(crate) events: EventBus,
    states: StateTable,
    queue: tokio::sync::Mutex<()>,
    pub(crate) origin: Uuid,
    pub(crate) last_seen_marker: Mutex<Option<SyncMarker>>,
    placeholder: Box<dyn PlaceholderSource>,
}

impl<R: Remote> SyncClient<R> {
    pub fn new(remote: R, db: Database) -> Result<Self, SyncError> {
        let images = db.load_image_table()?.unwrap_or_default();
        let marker = db.sync_marker()?;
        let version = db.local_version()?;
        let origin = Uuid::new_v4();

        info!(%origin, cache = ?db.path(), version, "Sync client ready");

        Ok(Self {
            remote,
            db: Arc::new(Mutex::new(db)),
            images: ImageLookup::new(images),
            events: EventBus::new(),
            states: StateTable::default(),
            queue: tokio::sync::Mutex::new(()),
            origin,
            last_seen_marker: Mutex::new(marker),
            placeholder: Box::new(WelcomePlaceholder),
        })
    }

    pub fn with_placeholder(mut self, source: impl PlaceholderSource + 'static) -> Self {
        self.placeholder = Box::new(source);
        self
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn images(&self) -> &ImageLookup {
        &self.images
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }

    /// Instance id written into the cross-process change marker.
    pub fn origin(&self) -> Uuid {
        self.origin
    }

    pub fn state(&self, collection: Collection) -> SyncState {
        self.states.get(collection)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Cached records, newest first. Never fetches.
    pub fn get_all(&self, collection: Collection) -> Vec<Record> {
        self.with_db(|db| db.load_collection(collection))
            .unwrap_or_else(|e| {
                error!(collection = %collection, error = %e, "Failed to read cache");
                Vec::new()
            })
    }

    pub fn get_by_id(&self, collection: Collection, id: i64) -> Option<Record> {
        self.get_all(collection).into_iter().find(|r| r.id == id)
    }

    pub fn find(&self, collection: Collection, query: &Fields) -> Vec<Record> {
        self.get_all(collection)
            .into_iter()
            .filter(|r| query::matches(r, query))
            .collect()
    }

    pub fn count(&self, collection: Collection) -> usize {
        self.get_all(collection).len()
    }

    /// Cached records of an entity's collection, decoded. Records that do
    /// not decode are skipped.
    pub fn typed<T: Entity>(&self) -> Vec<T> {
        self.get_all(T::COLLECTION)
            .iter()
            .filter_map(|record| match record.decode::<T>() {
                Ok(entity) => Some(entity),
                Err(e) => {
                    warn!(id = record.id, error = %e, "Skipping undecodable record");
                    None
                }
            })
            .collect()
    }

    /// Replace the cache with the server's list. On failure the cache is
    /// returned unchanged.
    pub async fn fetch_all(&self, collection: Collection) -> Vec<Record> {
        let _turn = self.queue.lock().await;

        match self
            .attempt(collection, "list", self.remote.list(collection))
            .await
            .missing_as_failed()
        {
            Attempt::Accepted(records) => {
                let batch = CacheBatch::new()
                    .put_collection(collection, records.clone())
                    .synced_at(Utc::now());
                match self.with_db(|db| db.write_batch(&batch)) {
                    Ok(()) => {
                        self.states.set(collection, SyncState::Synced);
                        self.notify(Scope::Collection(collection));
                        info!(collection = %collection, count = records.len(), "Collection fetched");
                    }
                    Err(e) => {
                        self.states.set(collection, SyncState::Degraded);
                        error!(collection = %collection, error = %e, "Failed to cache fetched collection");
                    }
                }
                records
            }
            Attempt::Failed | Attempt::Missing => {
                self.states.set(collection, SyncState::Degraded);
                self.get_all(collection)
            }
            Attempt::LocalOnly => self.get_all(collection),
        }
    }

    /// Read path for catalog pages: the cache when it has an entry,
    /// otherwise a fetch, otherwise placeholder content.
    pub async fn load(&self, collection: Collection) -> Vec<Record> {
        let cached = self
            .with_db(|db| db.has_collection(collection))
            .unwrap_or(false);
        let records = if cached {
            self.get_all(collection)
        } else {
            self.fetch_all(collection).await
        };

        if records.is_empty() {
            let placeholder = self.placeholder.placeholder(collection);
            if !placeholder.is_empty() {
                debug!(collection = %collection, "Serving placeholder content");
                return placeholder;
            }
        }
        records
    }

    /// Fetch every served collection.
    pub async fn resync_all(&self) {
        for collection in Collection::remote() {
            self.fetch_all(collection).await;
        }
    }

    /// Replace products and blogs from the full server payload and record
    /// its version. Returns false and leaves everything as is on failure.
    pub async fn sync_all(&self) -> bool {
        let _turn = self.queue.lock().await;
        for collection in Collection::remote() {
            self.states.set(collection, SyncState::Syncing);
        }

        let result = match self.remote.sync_all().await {
            Ok(payload) => self
                .with_db(|db| db.apply_sync_payload(&payload, Utc::now()))
                .map(|()| payload),
            Err(e) => Err(SyncError::NetworkUnavailable(e)),
        };

        match result {
            Ok(payload) => {
                for (collection, _) in payload.collections() {
                    self.states.set(collection, SyncState::Synced);
                }
                self.notify(Scope::All);
                info!(
                    version = payload.version.version,
                    products = payload.products.len(),
                    blogs = payload.blogs.len(),
                    "Full sync complete"
                );
                true
            }
            Err(e) => {
                for collection in Collection::remote() {
                    self.states.set(collection, SyncState::Degraded);
                }
                warn!(error = %e, "Full sync failed, keeping cached data");
                false
            }
        }
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    pub async fn add(
        &self,
        collection: Collection,
        fields: Fields,
    ) -> Result<WriteOutcome<Record>, SyncError> {
        let fields = without_reserved(fields);
        let _turn = self.queue.lock().await;

        let attempt = self
            .attempt(collection, "create", self.remote.create(collection, &fields))
            .await
            .missing_as_failed();
        let origin = attempt.origin();

        let mut records = self.with_db(|db| db.load_collection(collection))?;
        let record = match attempt {
            Attempt::Accepted(record) => record,
            Attempt::Missing | Attempt::Failed | Attempt::LocalOnly => {
                local_record(&records, fields)
            }
        };
        records.insert(0, record.clone());

        let mut batch = CacheBatch::new().put_collection(collection, records);
        if origin == Origin::LocalFallback {
            batch = self.with_pending(batch, collection, record.id, PendingKind::Added)?;
        }
        let images = self.with_product_image(collection, record.id, record.image_url());

        self.commit(collection, batch, images)?;
        self.settle(collection, origin);
        self.notify(Scope::Collection(collection));

        info!(collection = %collection, id = record.id, ?origin, "Record added");
        Ok(WriteOutcome {
            value: record,
            origin,
        })
    }

    pub async fn update(
        &self,
        collection: Collection,
        id: i64,
        patch: Fields,
    ) -> Result<WriteOutcome<Record>, SyncError> {
        let patch = without_reserved(patch);
        let _turn = self.queue.lock().await;

        let attempt = self
            .attempt(collection, "update", self.remote.update(collection, id, &patch))
            .await;
        let settled = attempt.origin();
        // Only the cache holds the change when the server lacks the record.
        let origin = match attempt {
            Attempt::Missing => Origin::LocalFallback,
            _ => settled,
        };

        let mut records = self.with_db(|db| db.load_collection(collection))?;
        let position = records.iter().position(|r| r.id == id);

        let record = match attempt {
            Attempt::Accepted(record) => {
                if let Some(i) = position {
                    records[i] = record.clone();
                }
                record
            }
            Attempt::Missing | Attempt::Failed | Attempt::LocalOnly => {
                let Some(i) = position else {
                    self.settle(collection, settled);
                    return Err(SyncError::NotFound { collection, id });
                };
                records[i].merge(&patch, Utc::now());
                records[i].clone()
            }
        };

        let images = self.with_product_image(collection, id, patch_image_url(&patch));
        if position.is_none() && images.is_none() {
            self.settle(collection, settled);
            debug!(collection = %collection, id, "Updated record is not cached");
            return Ok(WriteOutcome {
                value: record,
                origin,
            });
        }

        let mut batch = CacheBatch::new();
        if position.is_some() {
            batch = batch.put_collection(collection, records);
        }
        if settled == Origin::LocalFallback {
            batch = self.with_pending(batch, collection, id, PendingKind::Updated)?;
        }

        self.commit(collection, batch, images)?;
        self.settle(collection, settled);
        self.notify(Scope::Collection(collection));

        info!(collection = %collection, id, ?origin, "Record updated");
        Ok(WriteOutcome {
            value: record,
            origin,
        })
    }

    /// Delete a record. The value is true when a cached copy was removed.
    pub async fn delete(
        &self,
        collection: Collection,
        id: i64,
    ) -> Result<WriteOutcome<bool>, SyncError> {
        let _turn = self.queue.lock().await;

        let attempt = self
            .attempt(collection, "delete", self.remote.delete(collection, id))
            .await;
        let origin = attempt.origin();

        let mut records = self.with_db(|db| db.load_collection(collection))?;
        let before = records.len();
        records.retain(|r| r.id != id);
        let removed = records.len() != before;

        if !removed {
            self.settle(collection, origin);
            debug!(collection = %collection, id, "Nothing to delete");
            return Ok(WriteOutcome {
                value: false,
                origin,
            });
        }

        let mut batch = CacheBatch::new().put_collection(collection, records);
        let mut images = None;
        if collection == Collection::Products {
            let mut table = self.images.snapshot();
            if table.product_images.remove(&id).is_some() {
                images = Some(table);
            }
        }
        if origin == Origin::LocalFallback {
            batch = self.with_pending(batch, collection, id, PendingKind::Deleted)?;
        }

        self.commit(collection, batch, images)?;
        self.settle(collection, origin);
        self.notify(Scope::Collection(collection));

        info!(collection = %collection, id, ?origin, "Record deleted");
        Ok(WriteOutcome {
            value: true,
            origin,
        })
    }

    /// Drop a collection's cache entry.
    pub async fn clear(&self, collection: Collection) -> Result<(), SyncError> {
        let _turn = self.queue.lock().await;
        self.commit(collection, CacheBatch::new().clear_collection(collection), None)?;
        self.notify(Scope::Collection(collection));
        info!(collection = %collection, "Collection cleared");
        Ok(())
    }

    /// Seed a collection if the cache holds no records for it. Returns
    /// whether the seed was written.
    pub async fn initialize(
        &self,
        collection: Collection,
        seed: Vec<Record>,
    ) -> Result<bool, SyncError> {
        let _turn = self.queue.lock().await;
        if !self.with_db(|db| db.load_collection(collection))?.is_empty() {
            return Ok(false);
        }

        let count = seed.len();
        self.commit(collection, CacheBatch::new().put_collection(collection, seed), None)?;
        self.notify(Scope::Collection(collection));
        info!(collection = %collection, count, "Collection seeded");
        Ok(true)
    }

    pub async fn set_category_image(&self, category_id: i64, url: &str) -> Result<(), SyncError> {
        let _turn = self.queue.lock().await;
        let mut table = self.images.snapshot();
        table.category_images.insert(category_id, url.to_string());
        self.commit(Collection::Categories, CacheBatch::new(), Some(table))?;
        self.notify(Scope::ImageTable);
        Ok(())
    }

    /// Re-read the image table from the cache.
    pub fn reload_images(&self) -> Result<(), SyncError> {
        let table = self.with_db(|db| db.load_image_table())?.unwrap_or_default();
        self.images.replace(table);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    /// Import a snapshot file. Returns the new local version.
    ///
    /// The snapshot must parse and be strictly newer than the cache;
    /// otherwise nothing is written.
    pub async fn import_snapshot(&self, json: &str) -> Result<u64, SyncError> {
        let snapshot: Snapshot = serde_json::from_str(json)
            .map_err(|e| SnapshotRejection::Malformed(e.to_string()))?;

        let _turn = self.queue.lock().await;
        let marker = SyncMarker::now(self.origin);

        match self.with_db(|db| db.import_snapshot(&snapshot, Some(marker)))? {
            ImportOutcome::Applied { version } => {
                self.mark_seen(marker);
                self.notify(Scope::All);
                Ok(version)
            }
            ImportOutcome::NotNewer { snapshot, local } => {
                warn!(snapshot, local, "Snapshot rejected, not newer than local data");
                Err(SnapshotRejection::NotNewer { snapshot, local }.into())
            }
        }
    }

    /// Local version and every collection as pretty JSON.
    pub fn export_snapshot(&self) -> Result<String, SyncError> {
        let snapshot = self.with_db(|db| db.export_snapshot())?;
        let json = serde_json::to_string_pretty(&snapshot).map_err(StoreError::from)?;
        Ok(json)
    }

    // -----------------------------------------------------------------------
    // Bookkeeping
    // -----------------------------------------------------------------------

    /// Version the cache was last synced or imported at, 0 if never.
    pub fn local_version(&self) -> u64 {
        self.with_db(|db| db.local_version()).unwrap_or_else(|e| {
            error!(error = %e, "Failed to read local version");
            0
        })
    }

    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.with_db(|db| db.last_synced_at()).unwrap_or_else(|e| {
            error!(error = %e, "Failed to read last sync time");
            None
        })
    }

    /// Writes that only reached the cache, oldest first.
    pub fn pending_changes(&self) -> Vec<PendingChange> {
        self.with_db(|db| db.pending_changes()).unwrap_or_else(|e| {
            error!(error = %e, "Failed to read pending changes");
            Vec::new()
        })
    }

    pub async fn clear_pending(&self) -> Result<(), SyncError> {
        let _turn = self.queue.lock().await;
        self.with_db(|db| db.write_batch(&CacheBatch::new().pending(Vec::new())))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    pub(crate) fn with_db<T>(
        &self,
        f: impl FnOnce(&mut Database) -> tinshine_store::Result<T>,
    ) -> Result<T, SyncError> {
        let mut db = self.db.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(f(&mut db)?)
    }

    pub(crate) fn notify(&self, scope: Scope) {
        self.events.emit(SyncEvent::data_updated(scope));
    }

    pub(crate) fn mark_seen(&self, marker: SyncMarker) {
        *self
            .last_seen_marker
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(marker);
    }

    /// Run a server call for a served collection, logging a failure.
    async fn attempt<T>(
        &self,
        collection: Collection,
        op: &'static str,
        call: impl Future<Output = Result<T, RemoteError>>,
    ) -> Attempt<T> {
        if !collection.is_remote() {
            return Attempt::LocalOnly;
        }
        self.states.set(collection, SyncState::Syncing);
        match call.await {
            Ok(value) => Attempt::Accepted(value),
            Err(RemoteError::NotFound) => {
                debug!(collection = %collection, op, "Server has no such record");
                Attempt::Missing
            }
            Err(e) => {
                warn!(
                    collection = %collection,
                    op,
                    error = %e,
                    "Server call failed, using local cache"
                );
                Attempt::Failed
            }
        }
    }

    fn settle(&self, collection: Collection, origin: Origin) {
        match origin {
            Origin::Remote => self.states.set(collection, SyncState::Synced),
            Origin::LocalFallback => self.states.set(collection, SyncState::Degraded),
            Origin::LocalOnly => {}
        }
    }

    /// Write a mutation together with a fresh change marker and, when
    /// given, the new image table.
    fn commit(
        &self,
        collection: Collection,
        batch: CacheBatch,
        images: Option<ImageTable>,
    ) -> Result<(), SyncError> {
        let marker = SyncMarker::now(self.origin);
        let mut batch = batch.marker(marker);
        if let Some(table) = &images {
            batch = batch.images(table.clone());
        }

        if let Err(e) = self.with_db(|db| db.write_batch(&batch)) {
            error!(collection = %collection, error = %e, "Failed to write cache");
            if collection.is_remote() {
                self.states.set(collection, SyncState::Degraded);
            }
            return Err(e);
        }

        self.mark_seen(marker);
        if let Some(table) = images {
            self.images.replace(table);
        }
        Ok(())
    }

    fn with_pending(
        &self,
        batch: CacheBatch,
        collection: Collection,
        id: i64,
        kind: PendingKind,
    ) -> Result<CacheBatch, SyncError> {
        let mut pending = self.with_db(|db| db.pending_changes())?;
        pending.push(PendingChange::new(collection, id, kind));
        warn!(collection = %collection, id, ?kind, "Change saved locally only");
        Ok(batch.pending(pending))
    }

    fn with_product_image(
        &self,
        collection: Collection,
        id: i64,
        url: Option<&str>,
    ) -> Option<ImageTable> {
        if collection != Collection::Products {
            return None;
        }
        let url = url?;
        let mut table = self.images.snapshot();
        table.product_images.insert(id, url.to_string());
        Some(table)
    }
}

/// A record created without the server: wall-clock millisecond id, moved
/// past any id already cached.
fn local_record(existing: &[Record], fields: Fields) -> Record {
    let now = Utc::now();
    let mut id = now.timestamp_millis();
    while existing.iter().any(|r| r.id == id) {
        id += 1;
    }
    Record::new(id, fields, now)
}
