//! Typed views of the records in each collection.
//!
//! The sync layer moves [`Record`](crate::models::Record)s around without
//! looking inside them; pages that want real fields decode into one of these
//! through [`Record::decode`](crate::models::Record::decode).

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::types::Collection;

/// A record type bound to exactly one collection.
pub trait Entity: Serialize + DeserializeOwned {
    const COLLECTION: Collection;
    const NAME: &'static str;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Dimensions {
    pub height: f64,
    pub width: f64,
    pub depth: f64,
    pub unit: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub additional_images: Vec<String>,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub category: String,
    pub sub_category: Option<String>,
    pub dimensions: Option<Dimensions>,
    pub material: Option<String>,
    pub capacity: Option<String>,
    pub color: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub applications: Vec<String>,
    pub min_order_quantity: Option<u32>,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default)]
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Product {
    const COLLECTION: Collection = Collection::Products;
    const NAME: &'static str = "Product";
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    pub id: i64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub author: String,
    pub author_image: Option<String>,
    pub date: Option<String>,
    #[serde(default)]
    pub read_time: u32,
    #[serde(default)]
    pub likes: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for BlogPost {
    const COLLECTION: Collection = Collection::BlogPosts;
    const NAME: &'static str = "BlogPost";
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Category {
    const COLLECTION: Collection = Collection::Categories;
    const NAME: &'static str = "Category";
}
