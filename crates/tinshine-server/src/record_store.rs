//! Flat-file JSON persistence for the served collections.
//!
//! Each collection lives in its own `<name>.json` array and the global data
//! version in `version.json`. Files are rewritten whole through a temporary
//! file and a rename, so a failed write leaves the previous contents intact.
//! Mutations are serialized through one async mutex; running several server
//! processes on the same data directory is not supported.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use tinshine_shared::models::{DiskHealth, HealthReport, ServiceHealth};
use tinshine_shared::{Collection, Fields, Record, SyncPayload, VersionInfo};

use crate::error::ServerError;

const VERSION_FILE: &str = "version.json";

fn file_name(collection: Collection) -> Result<&'static str, ServerError> {
    match collection {
        Collection::Products => Ok("products.json"),
        Collection::BlogPosts => Ok("blogs.json"),
        Collection::Categories => Err(ServerError::UnsupportedCollection(collection)),
    }
}

/// Pick a wall-clock-derived id that is above the last one handed out and
/// not present in the collection.
fn next_id(last: &mut i64, existing: &[Record]) -> i64 {
    let mut id = Utc::now().timestamp_millis().max(*last + 1);
    while existing.iter().any(|r| r.id == id) {
        id += 1;
    }
    *last = id;
    id
}

#[derive(Debug)]
pub struct RecordStore {
    base_path: PathBuf,
    /// Held for the whole read-modify-write of a mutation; guards the last
    /// id handed out.
    write_lock: Mutex<i64>,
}

impl RecordStore {
    /// Open a data directory, creating it and any missing data files.
    pub async fn new(base_path: PathBuf) -> Result<Self, ServerError> {
        fs::create_dir_all(&base_path).await.map_err(|e| {
            ServerError::Storage(format!(
                "Failed to create data directory '{}': {}",
                base_path.display(),
                e
            ))
        })?;

        let store = Self {
            base_path,
            write_lock: Mutex::new(0),
        };

        for collection in Collection::remote() {
            let path = store.collection_path(collection)?;
            if !path.exists() {
                write_json(&path, &Vec::<Record>::new()).await?;
            }
        }
        let version_path = store.base_path.join(VERSION_FILE);
        if !version_path.exists() {
            write_json(&version_path, &VersionInfo::initial()).await?;
        }

        info!(path = %store.base_path.display(), "Record store initialized");
        Ok(store)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn collection_path(&self, collection: Collection) -> Result<PathBuf, ServerError> {
        Ok(self.base_path.join(file_name(collection)?))
    }

    /// All records of a collection. A file that cannot be read counts as
    /// empty so the catalog stays available.
    pub async fn list(&self, collection: Collection) -> Result<Vec<Record>, ServerError> {
        let path = self.collection_path(collection)?;
        match read_json::<Vec<Record>>(&path).await {
            Ok(records) => Ok(records),
            Err(e) => {
                error!(collection = %collection, error = %e, "Failed to read collection");
                Ok(Vec::new())
            }
        }
    }

    pub async fn get(&self, collection: Collection, id: i64) -> Result<Record, ServerError> {
        self.list(collection)
            .await?
            .into_iter()
            .find(|r| r.id == id)
            .ok_or(ServerError::NotFound { collection, id })
    }

    pub async fn create(&self, collection: Collection, fields: Fields) -> Result<Record, ServerError> {
        let mut last_id = self.write_lock.lock().await;
        let mut records = self.list(collection).await?;

        let id = next_id(&mut last_id, &records);
        let record = Record::new(id, fields, Utc::now());
        records.insert(0, record.clone());

        self.persist(collection, &records).await?;
        debug!(collection = %collection, id, "Created record");
        Ok(record)
    }

    pub async fn update(
        &self,
        collection: Collection,
        id: i64,
        patch: Fields,
    ) -> Result<Record, ServerError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.list(collection).await?;

        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(ServerError::NotFound { collection, id })?;
        record.merge(&patch, Utc::now());
        let updated = record.clone();

        self.persist(collection, &records).await?;
        debug!(collection = %collection, id, "Updated record");
        Ok(updated)
    }

    /// Remove a record; returns whether anything was removed. The version
    /// only moves when something was.
    pub async fn delete(&self, collection: Collection, id: i64) -> Result<bool, ServerError> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.list(collection).await?;

        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Ok(false);
        }

        self.persist(collection, &records).await?;
        debug!(collection = %collection, id, "Deleted record");
        Ok(true)
    }

    pub async fn version(&self) -> Result<VersionInfo, ServerError> {
        read_json(&self.base_path.join(VERSION_FILE)).await
    }

    /// Read-only aggregate of every served collection.
    pub async fn sync_all(&self) -> Result<SyncPayload, ServerError> {
        Ok(SyncPayload {
            version: self.version().await?,
            products: self.list(Collection::Products).await?,
            blogs: self.list(Collection::BlogPosts).await?,
            categories: None,
        })
    }

    pub async fn health(&self) -> Result<HealthReport, ServerError> {
        let status = |present: bool| if present { "OK" } else { "WARNING" }.to_string();

        let dir_ok = fs::metadata(&self.base_path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);

        Ok(HealthReport {
            status: "UP".to_string(),
            timestamp: Utc::now(),
            version: self.version().await?,
            services: ServiceHealth {
                products: status(self.collection_path(Collection::Products)?.exists()),
                blogs: status(self.collection_path(Collection::BlogPosts)?.exists()),
                disk_space: DiskHealth {
                    status: status(dir_ok),
                    message: if dir_ok {
                        "Data directory accessible".to_string()
                    } else {
                        "Data directory missing".to_string()
                    },
                },
            },
        })
    }

    /// Stage the collection and the bumped version, then swap both into
    /// place. The version is read before anything is written so a broken
    /// version file aborts the whole mutation, and nothing is renamed
    /// unless both temporary files were written.
    async fn persist(&self, collection: Collection, records: &[Record]) -> Result<(), ServerError> {
        let version_path = self.base_path.join(VERSION_FILE);
        let current: VersionInfo = read_json(&version_path).await?;
        let next = current.bumped();

        let collection_path = self.collection_path(collection)?;
        let staged_records = stage_json(&collection_path, &records).await?;
        let staged_version = match stage_json(&version_path, &next).await {
            Ok(tmp) => tmp,
            Err(e) => {
                discard(&staged_records).await;
                return Err(e);
            }
        };

        if let Err(e) = swap_in(&staged_records, &collection_path).await {
            discard(&staged_records).await;
            discard(&staged_version).await;
            return Err(e);
        }
        if let Err(e) = swap_in(&staged_version, &version_path).await {
            discard(&staged_version).await;
            error!(error = %e, "Collection written but version not bumped");
            return Err(e);
        }

        debug!(version = next.version, "Data version bumped");
        Ok(())
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ServerError> {
    let raw = fs::read_to_string(path)
        .await
        .map_err(|e| ServerError::Storage(format!("Failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&raw)
        .map_err(|e| ServerError::Storage(format!("Corrupt {}: {}", path.display(), e)))
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ServerError> {
    let tmp = stage_json(path, value).await?;
    if let Err(e) = swap_in(&tmp, path).await {
        discard(&tmp).await;
        return Err(e);
    }
    Ok(())
}

/// Write `value` next to `path` as `<name>.json.tmp` and return that path.
async fn stage_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<PathBuf, ServerError> {
    let data = serde_json::to_vec_pretty(value)
        .map_err(|e| ServerError::Internal(format!("Failed to encode {}: {}", path.display(), e)))?;

    let tmp = path.with_extension("json.tmp");
    if let Err(e) = fs::write(&tmp, &data).await {
        discard(&tmp).await;
        return Err(ServerError::Storage(format!(
            "Failed to write {}: {}",
            tmp.display(),
            e
        )));
    }
    Ok(tmp)
}

async fn swap_in(tmp: &Path, path: &Path) -> Result<(), ServerError> {
    fs::rename(tmp, path)
        .await
        .map_err(|e| ServerError::Storage(format!("Failed to replace {}: {}", path.display(), e)))
}

async fn discard(tmp: &Path) {
    if fs::metadata(tmp).await.is_ok_and(|m| m.is_file()) {
        if let Err(e) = fs::remove_file(tmp).await {
            debug!(path = %tmp.display(), error = %e, "Failed to remove temporary file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    async fn test_store() -> (RecordStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RecordStore::new(dir.path().to_path_buf()).await.unwrap();
        (store, dir)
    }

    fn fields(value: serde_json::Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_fresh_directory_is_initialized() {
        let (store, dir) = test_store().await;
        assert!(dir.path().join("products.json").exists());
        assert!(dir.path().join("blogs.json").exists());
        assert_eq!(store.version().await.unwrap().version, 1);
        assert!(store.list(Collection::Products).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_prepends_and_bumps_version() {
        let (store, _dir) = test_store().await;

        let first = store
            .create(Collection::Products, fields(json!({"name": "a"})))
            .await
            .unwrap();
        let second = store
            .create(Collection::Products, fields(json!({"name": "b", "id": 1})))
            .await
            .unwrap();

        assert!(second.id > first.id);
        let ids: Vec<i64> = store
            .list(Collection::Products)
            .await
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);
        assert_eq!(store.version().await.unwrap().version, 3);
    }

    #[tokio::test]
    async fn test_update_merges_and_bumps() {
        let (store, _dir) = test_store().await;
        let created = store
            .create(Collection::BlogPosts, fields(json!({"title": "t", "likes": 0})))
            .await
            .unwrap();

        let updated = store
            .update(Collection::BlogPosts, created.id, fields(json!({"likes": 4})))
            .await
            .unwrap();
        assert_eq!(updated.fields["title"], "t");
        assert_eq!(updated.fields["likes"], 4);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);
        assert_eq!(store.version().await.unwrap().version, 3);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found_and_keeps_version() {
        let (store, _dir) = test_store().await;
        let err = store
            .update(Collection::Products, 404, Fields::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::NotFound { id: 404, .. }));
        assert_eq!(store.version().await.unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_delete_only_bumps_when_removed() {
        let (store, _dir) = test_store().await;
        let created = store
            .create(Collection::Products, fields(json!({"name": "x"})))
            .await
            .unwrap();

        assert!(!store.delete(Collection::Products, created.id + 1).await.unwrap());
        assert_eq!(store.version().await.unwrap().version, 2);

        assert!(store.delete(Collection::Products, created.id).await.unwrap());
        assert_eq!(store.version().await.unwrap().version, 3);
        assert!(store.get(Collection::Products, created.id).await.is_err());
    }

    #[tokio::test]
    async fn test_unreadable_collection_reads_empty() {
        let (store, dir) = test_store().await;
        std::fs::write(dir.path().join("blogs.json"), "{not json").unwrap();
        assert!(store.list(Collection::BlogPosts).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_broken_version_file_aborts_write() {
        let (store, dir) = test_store().await;
        std::fs::write(dir.path().join("version.json"), "garbage").unwrap();

        let result = store
            .create(Collection::Products, fields(json!({"name": "x"})))
            .await;
        assert!(result.is_err());
        assert!(store.list(Collection::Products).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_version_write_leaves_collection_untouched() {
        let (store, dir) = test_store().await;
        store
            .create(Collection::Products, fields(json!({"name": "kept"})))
            .await
            .unwrap();

        // A directory in the way makes the staged version unwritable.
        std::fs::create_dir(dir.path().join("version.json.tmp")).unwrap();

        let result = store
            .create(Collection::Products, fields(json!({"name": "lost"})))
            .await;
        assert!(result.is_err());

        let names: Vec<_> = store
            .list(Collection::Products)
            .await
            .unwrap()
            .iter()
            .filter_map(|r| r.get("name"))
            .collect();
        assert_eq!(names, vec![json!("kept")]);
        assert_eq!(store.version().await.unwrap().version, 2);
        assert!(!dir.path().join("products.json.tmp").exists());

        std::fs::remove_dir(dir.path().join("version.json.tmp")).unwrap();
        store
            .create(Collection::Products, fields(json!({"name": "later"})))
            .await
            .unwrap();
        assert_eq!(store.list(Collection::Products).await.unwrap().len(), 2);
        assert_eq!(store.version().await.unwrap().version, 3);
    }

    #[tokio::test]
    async fn test_categories_are_not_served() {
        let (store, _dir) = test_store().await;
        assert!(matches!(
            store.list(Collection::Categories).await,
            Err(ServerError::UnsupportedCollection(_))
        ));
    }

    #[test]
    fn test_next_id_skips_collisions() {
        let now = Utc::now().timestamp_millis();
        let existing = vec![Record::new(now + 10_000, Fields::new(), Utc::now())];
        let mut last = now + 9_999;
        let id = next_id(&mut last, &existing);
        assert_eq!(id, now + 10_001);
        assert_eq!(last, id);
    }
}
