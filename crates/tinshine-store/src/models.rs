//! Values persisted in the local cache besides the record collections.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tinshine_shared::constants::DEFAULT_IMAGE_URL;
use tinshine_shared::Collection;

// ---------------------------------------------------------------------------
// Image lookup table
// ---------------------------------------------------------------------------

/// Image URLs keyed by numeric record id, with one default fallback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImageTable {
    #[serde(default)]
    pub product_images: BTreeMap<i64, String>,
    #[serde(default)]
    pub category_images: BTreeMap<i64, String>,
    #[serde(default = "default_image")]
    pub default_image: String,
}

fn default_image() -> String {
    DEFAULT_IMAGE_URL.to_string()
}

impl Default for ImageTable {
    fn default() -> Self {
        Self {
            product_images: BTreeMap::new(),
            category_images: BTreeMap::new(),
            default_image: default_image(),
        }
    }
}

// ---------------------------------------------------------------------------
// Cross-process change marker
// ---------------------------------------------------------------------------

/// Written on every local mutation so other clients sharing the cache file
/// know that *something* changed. It carries no description of the change.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncMarker {
    /// Wall-clock milliseconds of the write.
    pub at: i64,
    /// Instance id of the client that wrote it.
    pub origin: Uuid,
}

impl SyncMarker {
    pub fn now(origin: Uuid) -> Self {
        Self {
            at: Utc::now().timestamp_millis(),
            origin,
        }
    }
}

// ---------------------------------------------------------------------------
// Pending (unsynced) changes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PendingKind {
    Added,
    Updated,
    Deleted,
}

/// A mutation that only reached the local cache because the server could not
/// be reached.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingChange {
    pub collection: Collection,
    pub id: i64,
    pub kind: PendingKind,
    pub at: DateTime<Utc>,
}

impl PendingChange {
    pub fn new(collection: Collection, id: i64, kind: PendingKind) -> Self {
        Self {
            collection,
            id,
            kind,
            at: Utc::now(),
        }
    }
}
