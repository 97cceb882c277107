use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tinshine_shared::{Collection, Snapshot, SyncPayload, VersionInfo};

use crate::cache::{read_collection, read_version, CacheBatch};
use crate::database::Database;
use crate::error::Result;
use crate::models::SyncMarker;

/// Result of a snapshot import attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImportOutcome {
    /// Every included collection was replaced and the local version advanced.
    Applied { version: u64 },
    /// The snapshot is not newer than the cache; nothing was written.
    NotNewer { snapshot: u64, local: u64 },
}

impl Database {
    /// Export the local version and every collection.
    pub fn export_snapshot(&self) -> Result<Snapshot> {
        let conn = self.conn();
        Ok(Snapshot {
            version: VersionInfo {
                version: read_version(conn)?,
                last_updated: Utc::now(),
            },
            products: Some(read_collection(conn, Collection::Products)?),
            blogs: Some(read_collection(conn, Collection::BlogPosts)?),
            categories: Some(read_collection(conn, Collection::Categories)?),
        })
    }

    /// Import a snapshot if it is strictly newer than the cache.
    ///
    /// The version check and all replacements run inside one transaction.
    pub fn import_snapshot(
        &mut self,
        snapshot: &Snapshot,
        marker: Option<SyncMarker>,
    ) -> Result<ImportOutcome> {
        let tx = self.conn_mut().transaction()?;

        let local = read_version(&tx)?;
        if snapshot.version.version <= local {
            return Ok(ImportOutcome::NotNewer {
                snapshot: snapshot.version.version,
                local,
            });
        }

        let mut batch = CacheBatch::new().version(snapshot.version.version);
        for (collection, records) in snapshot.included() {
            batch = batch.put_collection(collection, records.to_vec());
        }
        if let Some(marker) = marker {
            batch = batch.marker(marker);
        }
        batch.apply(&tx)?;
        tx.commit()?;

        tracing::info!(
            version = snapshot.version.version,
            previous = local,
            collections = snapshot.included().len(),
            "snapshot imported"
        );

        Ok(ImportOutcome::Applied {
            version: snapshot.version.version,
        })
    }

    /// Replace the cache with a full server payload and record the version.
    pub fn apply_sync_payload(&mut self, payload: &SyncPayload, synced_at: DateTime<Utc>) -> Result<()> {
        let mut batch = CacheBatch::new()
            .version(payload.version.version)
            .synced_at(synced_at);
        for (collection, records) in payload.collections() {
            batch = batch.put_collection(collection, records.to_vec());
        }
        self.write_batch(&batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tinshine_shared::Record;
    use uuid::Uuid;

    fn test_db() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("snap.db")).unwrap();
        (db, dir)
    }

    fn record(id: i64) -> Record {
        let fields = json!({ "name": format!("item {id}") }).as_object().cloned().unwrap();
        Record::new(id, fields, Utc::now())
    }

    fn version(v: u64) -> VersionInfo {
        VersionInfo {
            version: v,
            last_updated: Utc::now(),
        }
    }

    fn seed(db: &mut Database, v: u64) {
        db.write_batch(
            &CacheBatch::new()
                .put_collection(Collection::Products, vec![record(1), record(2)])
                .put_collection(Collection::BlogPosts, vec![record(10)])
                .version(v),
        )
        .unwrap();
    }

    #[test]
    fn stale_snapshot_changes_nothing() {
        let (mut db, _dir) = test_db();
        seed(&mut db, 5);

        let snapshot = Snapshot {
            version: version(5),
            products: Some(vec![]),
            blogs: None,
            categories: None,
        };
        let outcome = db.import_snapshot(&snapshot, None).unwrap();

        assert_eq!(outcome, ImportOutcome::NotNewer { snapshot: 5, local: 5 });
        assert_eq!(db.load_collection(Collection::Products).unwrap().len(), 2);
        assert_eq!(db.local_version().unwrap(), 5);
    }

    #[test]
    fn newer_snapshot_replaces_only_included_collections() {
        let (mut db, _dir) = test_db();
        seed(&mut db, 5);

        let marker = SyncMarker::now(Uuid::new_v4());
        let snapshot = Snapshot {
            version: version(6),
            products: Some(vec![]),
            blogs: None,
            categories: Some(vec![record(100)]),
        };
        let outcome = db.import_snapshot(&snapshot, Some(marker)).unwrap();

        assert_eq!(outcome, ImportOutcome::Applied { version: 6 });
        assert!(db.load_collection(Collection::Products).unwrap().is_empty());
        assert_eq!(db.load_collection(Collection::BlogPosts).unwrap().len(), 1);
        assert_eq!(db.load_collection(Collection::Categories).unwrap().len(), 1);
        assert_eq!(db.local_version().unwrap(), 6);
        assert_eq!(db.sync_marker().unwrap(), Some(marker));
    }

    #[test]
    fn export_then_import_with_bumped_version_reproduces_collections() {
        let (mut db, _dir) = test_db();
        seed(&mut db, 3);
        let exported = db.export_snapshot().unwrap();
        assert_eq!(exported.version.version, 3);

        let dir = tempfile::tempdir().unwrap();
        let mut other = Database::open_at(&dir.path().join("other.db")).unwrap();
        let mut bumped = exported.clone();
        bumped.version.version += 1;
        other.import_snapshot(&bumped, None).unwrap();

        for collection in Collection::ALL {
            assert_eq!(
                other.load_collection(collection).unwrap(),
                db.load_collection(collection).unwrap()
            );
        }
    }

    #[test]
    fn sync_payload_sets_version_and_sync_time() {
        let (mut db, _dir) = test_db();
        let payload = SyncPayload {
            version: version(12),
            products: vec![record(7)],
            blogs: vec![],
            categories: None,
        };
        let at = Utc::now();
        db.apply_sync_payload(&payload, at).unwrap();

        assert_eq!(db.local_version().unwrap(), 12);
        assert_eq!(db.load_collection(Collection::Products).unwrap()[0].id, 7);
        assert!(db.has_collection(Collection::BlogPosts).unwrap());
        assert!(!db.has_collection(Collection::Categories).unwrap());
        assert!(db.last_synced_at().unwrap().is_some());
    }
}
