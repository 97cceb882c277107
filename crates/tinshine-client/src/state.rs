//! Per-collection synchronization state.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use tinshine_shared::Collection;

/// Where a collection's cache stands relative to the server.
///
/// `Unsynced` until the first remote attempt; `Syncing` while a remote call
/// is in flight; `Synced` after the server answered; `Degraded` after a
/// remote failure or a write that only reached the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncState {
    #[default]
    Unsynced,
    Syncing,
    Synced,
    Degraded,
}

#[derive(Debug, Default)]
pub(crate) struct StateTable {
    states: Mutex<HashMap<Collection, SyncState>>,
}

impl StateTable {
    pub fn get(&self, collection: Collection) -> SyncState {
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&collection)
            .copied()
            .unwrap_or_default()
    }

    pub fn set(&self, collection: Collection, state: SyncState) {
        let previous = self
            .states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(collection, state);
        if previous != Some(state) {
            tracing::trace!(collection = %collection, ?state, "Sync state changed");
        }
    }
}
