//! In-memory view of the persisted image lookup table.
//!
//! The sync client owns persistence: it writes the table in the same cache
//! transaction as the collection change that caused it, then swaps the new
//! table in here.

use std::sync::{PoisonError, RwLock};

use tinshine_store::ImageTable;

#[derive(Debug, Default)]
pub struct ImageLookup {
    table: RwLock<ImageTable>,
}

impl ImageLookup {
    pub fn new(table: ImageTable) -> Self {
        Self {
            table: RwLock::new(table),
        }
    }

    /// Image for a product: its own entry, else its category's, else the
    /// default.
    pub fn product_image(&self, product_id: i64, category_id: Option<i64>) -> String {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        table
            .product_images
            .get(&product_id)
            .or_else(|| category_id.and_then(|id| table.category_images.get(&id)))
            .unwrap_or(&table.default_image)
            .clone()
    }

    pub fn category_image(&self, category_id: i64) -> String {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        table
            .category_images
            .get(&category_id)
            .unwrap_or(&table.default_image)
            .clone()
    }

    pub fn has_product_image(&self, product_id: i64) -> bool {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .product_images
            .contains_key(&product_id)
    }

    pub fn default_image(&self) -> String {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .default_image
            .clone()
    }

    /// Copy of the current table, for building a modified one.
    pub fn snapshot(&self) -> ImageTable {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn replace(&self, table: ImageTable) {
        *self.table.write().unwrap_or_else(PoisonError::into_inner) = table;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_image_falls_back_to_category_then_default() {
        let mut table = ImageTable::default();
        table.product_images.insert(1, "p1".into());
        table.category_images.insert(7, "c7".into());
        let lookup = ImageLookup::new(table);

        assert_eq!(lookup.product_image(1, Some(7)), "p1");
        assert_eq!(lookup.product_image(2, Some(7)), "c7");
        assert_eq!(lookup.product_image(2, None), lookup.default_image());
        assert_eq!(lookup.category_image(8), lookup.default_image());
    }

    #[test]
    fn test_replace_swaps_whole_table() {
        let lookup = ImageLookup::default();
        let mut table = lookup.snapshot();
        table.product_images.insert(3, "x".into());
        lookup.replace(table);
        assert!(lookup.has_product_image(3));
    }
}
