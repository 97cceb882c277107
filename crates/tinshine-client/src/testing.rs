//! In-memory [`Remote`] for tests, with a switch to simulate an outage.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;

use tinshine_shared::{Collection, Fields, Record, SyncPayload, VersionInfo};

use crate::remote::{Remote, RemoteError};

#[derive(Debug, Default)]
struct FakeState {
    offline: bool,
    version: u64,
    next_id: i64,
    collections: HashMap<Collection, Vec<Record>>,
    calls: usize,
}

/// Cloning shares the same server state, so two clients can talk to "one"
/// server.
#[derive(Debug, Clone)]
pub struct FakeRemote {
    state: Arc<Mutex<FakeState>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                version: 1,
                next_id: 1000,
                ..FakeState::default()
            })),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.state.lock().unwrap().offline = !online;
    }

    /// Put records on the server directly.
    pub fn seed(&self, collection: Collection, records: Vec<Record>) {
        let mut state = self.state.lock().unwrap();
        state.collections.insert(collection, records);
        state.version += 1;
    }

    pub fn records(&self, collection: Collection) -> Vec<Record> {
        self.state
            .lock()
            .unwrap()
            .collections
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn server_version(&self) -> u64 {
        self.state.lock().unwrap().version
    }

    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().calls
    }

    fn with_state<T>(
        &self,
        f: impl FnOnce(&mut FakeState) -> Result<T, RemoteError>,
    ) -> Result<T, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if state.offline {
            return Err(RemoteError::Unavailable("connection refused".into()));
        }
        f(&mut state)
    }
}

fn routed(collection: Collection) -> Result<(), RemoteError> {
    if collection.is_remote() {
        Ok(())
    } else {
        Err(RemoteError::NoRoute(collection))
    }
}

impl Remote for FakeRemote {
    async fn list(&self, collection: Collection) -> Result<Vec<Record>, RemoteError> {
        self.with_state(|s| {
            routed(collection)?;
            Ok(s.collections.get(&collection).cloned().unwrap_or_default())
        })
    }

    async fn create(&self, collection: Collection, fields: &Fields) -> Result<Record, RemoteError> {
        self.with_state(|s| {
            routed(collection)?;
            s.next_id += 1;
            let record = Record::new(s.next_id, fields.clone(), Utc::now());
            s.collections
                .entry(collection)
                .or_default()
                .insert(0, record.clone());
            s.version += 1;
            Ok(record)
        })
    }

    async fn update(
        &self,
        collection: Collection,
        id: i64,
        patch: &Fields,
    ) -> Result<Record, RemoteError> {
        self.with_state(|s| {
            routed(collection)?;
            let record = s
                .collections
                .entry(collection)
                .or_default()
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or(RemoteError::NotFound)?;
            record.merge(patch, Utc::now());
            let updated = record.clone();
            s.version += 1;
            Ok(updated)
        })
    }

    async fn delete(&self, collection: Collection, id: i64) -> Result<(), RemoteError> {
        self.with_state(|s| {
            routed(collection)?;
            let records = s.collections.entry(collection).or_default();
            let before = records.len();
            records.retain(|r| r.id != id);
            if records.len() == before {
                return Err(RemoteError::NotFound);
            }
            s.version += 1;
            Ok(())
        })
    }

    async fn version(&self) -> Result<VersionInfo, RemoteError> {
        self.with_state(|s| {
            Ok(VersionInfo {
                version: s.version,
                last_updated: Utc::now(),
            })
        })
    }

    async fn sync_all(&self) -> Result<SyncPayload, RemoteError> {
        self.with_state(|s| {
            let get = |c: Collection| s.collections.get(&c).cloned().unwrap_or_default();
            Ok(SyncPayload {
                version: VersionInfo {
                    version: s.version,
                    last_updated: Utc::now(),
                },
                products: get(Collection::Products),
                blogs: get(Collection::BlogPosts),
                categories: None,
            })
        })
    }
}

pub fn record(id: i64, value: serde_json::Value) -> Record {
    Record::new(id, fields(value), Utc::now())
}

pub fn fields(value: serde_json::Value) -> Fields {
    value.as_object().cloned().unwrap_or_default()
}
