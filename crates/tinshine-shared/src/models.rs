//! Wire-level data model shared by the record store and the sync client.
//!
//! A [`Record`] is the base shape of every collection item: a store-assigned
//! id, two timestamps, and an opaque bag of domain fields. Everything in this
//! module serializes with the camelCase keys the REST surface and snapshot
//! files use.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::{INITIAL_VERSION, RESERVED_FIELDS};
use crate::entities::Entity;
use crate::error::SharedError;
use crate::types::Collection;

/// Domain fields of a record, opaque to the sync layer.
pub type Fields = serde_json::Map<String, Value>;

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Record {
    /// Build a record with both timestamps set to `now`.
    pub fn new(id: i64, fields: Fields, now: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at: now,
            updated_at: now,
            fields: without_reserved(fields),
        }
    }

    /// Look up a field by its wire name, including `id` and the timestamps.
    pub fn get(&self, key: &str) -> Option<Value> {
        match key {
            "id" => Some(Value::from(self.id)),
            "createdAt" => Some(Value::String(self.created_at.to_rfc3339())),
            "updatedAt" => Some(Value::String(self.updated_at.to_rfc3339())),
            other => self.fields.get(other).cloned(),
        }
    }

    /// Shallow-merge `patch` into the domain fields and bump `updatedAt`.
    pub fn merge(&mut self, patch: &Fields, now: DateTime<Utc>) {
        for (key, value) in patch {
            if RESERVED_FIELDS.contains(&key.as_str()) {
                continue;
            }
            self.fields.insert(key.clone(), value.clone());
        }
        self.updated_at = now;
    }

    pub fn image_url(&self) -> Option<&str> {
        self.fields.get("imageUrl").and_then(Value::as_str)
    }

    /// Decode into the typed entity of its collection.
    pub fn decode<T: Entity>(&self) -> Result<T, SharedError> {
        let value = serde_json::to_value(self).map_err(|e| SharedError::EntityDecode {
            entity: T::NAME,
            reason: e.to_string(),
        })?;
        serde_json::from_value(value).map_err(|e| SharedError::EntityDecode {
            entity: T::NAME,
            reason: e.to_string(),
        })
    }
}

/// Drop the keys the store owns from a caller-supplied field set.
pub fn without_reserved(mut fields: Fields) -> Fields {
    for key in RESERVED_FIELDS {
        fields.remove(key);
    }
    fields
}

/// Extract the `imageUrl` of a patch if it carries a string one.
pub fn patch_image_url(fields: &Fields) -> Option<&str> {
    fields.get("imageUrl").and_then(Value::as_str)
}

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

/// Global data version of the record store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub version: u64,
    pub last_updated: DateTime<Utc>,
}

impl VersionInfo {
    pub fn initial() -> Self {
        Self {
            version: INITIAL_VERSION,
            last_updated: Utc::now(),
        }
    }

    /// The next version, stamped now.
    pub fn bumped(&self) -> Self {
        Self {
            version: self.version + 1,
            last_updated: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sync payload (GET /sync/all)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncPayload {
    pub version: VersionInfo,
    #[serde(default)]
    pub products: Vec<Record>,
    #[serde(default)]
    pub blogs: Vec<Record>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<Record>>,
}

impl SyncPayload {
    /// Payload served when the store cannot be read, so offline-first
    /// clients always have something to parse.
    pub fn fallback() -> Self {
        Self {
            version: VersionInfo::initial(),
            products: Vec::new(),
            blogs: vec![welcome_post()],
            categories: None,
        }
    }

    pub fn collections(&self) -> Vec<(Collection, &[Record])> {
        let mut out = vec![
            (Collection::Products, self.products.as_slice()),
            (Collection::BlogPosts, self.blogs.as_slice()),
        ];
        if let Some(categories) = &self.categories {
            out.push((Collection::Categories, categories.as_slice()));
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Snapshot (import / export file)
// ---------------------------------------------------------------------------

/// Portable export of the whole local cache.
///
/// On import any of the three collections may be absent, which means "leave
/// that collection alone". `version` is mandatory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Snapshot {
    pub version: VersionInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub products: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blogs: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<Record>>,
}

impl Snapshot {
    pub fn collection(&self, collection: Collection) -> Option<&[Record]> {
        match collection {
            Collection::Products => self.products.as_deref(),
            Collection::BlogPosts => self.blogs.as_deref(),
            Collection::Categories => self.categories.as_deref(),
        }
    }

    /// The collections this snapshot carries.
    pub fn included(&self) -> Vec<(Collection, &[Record])> {
        Collection::ALL
            .into_iter()
            .filter_map(|c| self.collection(c).map(|records| (c, records)))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Misc REST bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DiskHealth {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealth {
    pub products: String,
    pub blogs: String,
    pub disk_space: DiskHealth,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthReport {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: VersionInfo,
    pub services: ServiceHealth,
}

/// The single blog post served when nothing else is available.
pub fn welcome_post() -> Record {
    let now = Utc::now();
    let fields = serde_json::json!({
        "title": "Welcome to Metal Box Pack",
        "excerpt": "Your premier destination for high-quality tin packaging solutions",
        "content": "Metal Box Pack provides premium tin packaging solutions for various industries including food, cosmetics, and more. Our products are designed to be durable, sustainable, and visually appealing.",
        "imageUrl": "https://space.coze.cn/api/coze_space/gen_image?image_size=landscape_16_9&prompt=Tin%20can%20packaging%20factory%20modern%20equipment%20production%20line&sign=947ccfb12838abe5f0d41ee67f040e65",
        "category": "Company News",
        "author": "Admin",
        "authorImage": "https://space.coze.cn/api/coze_space/gen_image?image_size=square_hd&prompt=Professional%20business%20man%20CEO%20confident%20portrait&sign=17bf79fcd820f1aa9e254cfaab9fe4b8",
        "date": now.format("%B %-d, %Y").to_string(),
        "readTime": 3,
        "likes": 0,
    });
    let fields = match fields {
        Value::Object(map) => map,
        _ => Fields::new(),
    };
    Record::new(1, fields, now)
}
