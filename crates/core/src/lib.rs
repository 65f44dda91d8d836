//! Shelf core types: catalog items as produced by the catalog source.

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

/// Stable catalog identity.
pub type ItemId = u64;

/// Highest rating a catalog item can carry.
pub const MAX_RATING: u8 = 5;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    #[error("item {id}: negative price {price}")]
    NegativePrice { id: ItemId, price: f64 },
    #[error("item {id}: original price {original} below price {price}")]
    OriginalBelowPrice { id: ItemId, price: f64, original: f64 },
    #[error("item {id}: rating {rating} out of range 0..={MAX_RATING}")]
    RatingOutOfRange { id: ItemId, rating: u8 },
    #[error("duplicate item id {0}")]
    DuplicateId(ItemId),
}

/// A catalog entry. Never mutated by this workspace once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: ItemId,
    pub name: String,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<f64>,
    #[serde(default)]
    pub rating: u8,
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,
    /// Display size in megabytes.
    #[serde(default)]
    pub size: f64,
    #[serde(default)]
    pub overview: String,
    #[serde(default, rename = "image_local")]
    pub image: String,
    #[serde(default)]
    pub best_seller: bool,
}

fn default_in_stock() -> bool { true }

impl CatalogItem {
    /// Minimal item; remaining fields take their catalog defaults.
    pub fn new(id: ItemId, name: impl Into<String>, price: f64, rating: u8) -> Self {
        Self {
            id,
            name: name.into(),
            price,
            original_price: None,
            rating,
            in_stock: true,
            size: 0.0,
            overview: String::new(),
            image: String::new(),
            best_seller: false,
        }
    }

    /// Markdown from the original price, when the item is actually discounted.
    pub fn discount(&self) -> Option<f64> {
        match self.original_price {
            Some(orig) if orig > self.price => Some(orig - self.price),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.price < 0.0 {
            return Err(CatalogError::NegativePrice { id: self.id, price: self.price });
        }
        if let Some(original) = self.original_price {
            if original < self.price {
                return Err(CatalogError::OriginalBelowPrice { id: self.id, price: self.price, original });
            }
        }
        if self.rating > MAX_RATING {
            return Err(CatalogError::RatingOutOfRange { id: self.id, rating: self.rating });
        }
        Ok(())
    }
}

/// Validate a whole catalog: every item individually plus id uniqueness.
pub fn validate_catalog(items: &[CatalogItem]) -> Result<(), CatalogError> {
    let mut seen = std::collections::HashSet::with_capacity(items.len());
    for it in items {
        it.validate()?;
        if !seen.insert(it.id) {
            return Err(CatalogError::DuplicateId(it.id));
        }
    }
    Ok(())
}

pub mod prelude {
    pub use super::{CatalogError, CatalogItem, ItemId};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_catalog_wire_names() {
        let raw = serde_json::json!({
            "id": 10001,
            "name": "Basics To Advanced In React",
            "overview": "Learn React from scratch",
            "price": 29,
            "original_price": 39,
            "rating": 5,
            "in_stock": false,
            "size": 5,
            "image_local": "/assets/images/10001.avif",
            "best_seller": true
        });
        let it: CatalogItem = serde_json::from_value(raw).unwrap();
        assert_eq!(it.id, 10001);
        assert_eq!(it.image, "/assets/images/10001.avif");
        assert!(!it.in_stock);
        assert!(it.best_seller);
        assert_eq!(it.discount(), Some(10.0));
        it.validate().unwrap();
    }

    #[test]
    fn missing_optional_fields_take_defaults() {
        let it: CatalogItem = serde_json::from_str(r#"{"id":1,"name":"x","price":3.5}"#).unwrap();
        assert!(it.in_stock);
        assert_eq!(it.rating, 0);
        assert_eq!(it.original_price, None);
        assert_eq!(it.discount(), None);
    }

    #[test]
    fn validate_rejects_bad_items() {
        let mut it = CatalogItem::new(1, "a", -1.0, 3);
        assert!(matches!(it.validate(), Err(CatalogError::NegativePrice { .. })));
        it.price = 10.0;
        it.original_price = Some(5.0);
        assert!(matches!(it.validate(), Err(CatalogError::OriginalBelowPrice { .. })));
        it.original_price = None;
        it.rating = 6;
        assert!(matches!(it.validate(), Err(CatalogError::RatingOutOfRange { .. })));
    }

    #[test]
    fn catalog_ids_must_be_unique() {
        let items = vec![CatalogItem::new(1, "a", 1.0, 1), CatalogItem::new(1, "b", 2.0, 2)];
        assert_eq!(validate_catalog(&items), Err(CatalogError::DuplicateId(1)));
    }
}
