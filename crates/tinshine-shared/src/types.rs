use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SharedError;

/// The closed set of record collections the system knows about.
///
/// Each identifier carries its local storage key, its REST path (if the
/// server exposes one) and its field name inside a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Products,
    BlogPosts,
    Categories,
}

impl Collection {
    pub const ALL: [Collection; 3] = [
        Collection::Products,
        Collection::BlogPosts,
        Collection::Categories,
    ];

    /// Key suffix used in the local cache namespace.
    pub fn storage_key(&self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::BlogPosts => "blogPosts",
            Self::Categories => "categories",
        }
    }

    /// REST path relative to the API base, `None` for local-only collections.
    pub fn endpoint(&self) -> Option<&'static str> {
        match self {
            Self::Products => Some("/products"),
            Self::BlogPosts => Some("/blogs"),
            Self::Categories => None,
        }
    }

    pub fn is_remote(&self) -> bool {
        self.endpoint().is_some()
    }

    /// Field name in snapshot and sync payloads.
    pub fn snapshot_field(&self) -> &'static str {
        match self {
            Self::Products => "products",
            Self::BlogPosts => "blogs",
            Self::Categories => "categories",
        }
    }

    /// Collections the server persists.
    pub fn remote() -> impl Iterator<Item = Collection> {
        Self::ALL.into_iter().filter(Collection::is_remote)
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.storage_key())
    }
}

impl FromStr for Collection {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "products" => Ok(Self::Products),
            "blogPosts" | "blogs" => Ok(Self::BlogPosts),
            "categories" => Ok(Self::Categories),
            other => Err(SharedError::UnknownCollection(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_storage_and_rest_names() {
        assert_eq!("products".parse::<Collection>().unwrap(), Collection::Products);
        assert_eq!("blogPosts".parse::<Collection>().unwrap(), Collection::BlogPosts);
        assert_eq!("blogs".parse::<Collection>().unwrap(), Collection::BlogPosts);
        assert!("orders".parse::<Collection>().is_err());
    }

    #[test]
    fn test_categories_are_local_only() {
        assert!(!Collection::Categories.is_remote());
        let remote: Vec<_> = Collection::remote().collect();
        assert_eq!(remote, vec![Collection::Products, Collection::BlogPosts]);
    }
}
