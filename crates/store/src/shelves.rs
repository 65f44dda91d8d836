use serde::Serialize;
use shelf_core::{CatalogItem, ItemId};
use tracing::info;

use crate::{CollectionHandle, CollectionKind};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("item {0} is out of stock")]
    OutOfStock(ItemId),
}

/// Count and value line shown next to a collection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CollectionSummary {
    pub kind: CollectionKind,
    pub count: usize,
    pub total_value: f64,
}

/// Session-owned wishlist and cart. Handed to consumers by reference; the
/// two collections share no state.
pub struct Shelves {
    pub wishlist: CollectionHandle,
    pub cart: CollectionHandle,
}

impl Default for Shelves {
    fn default() -> Self { Self::new() }
}

impl Shelves {
    pub fn new() -> Self {
        Self {
            wishlist: CollectionHandle::new(CollectionKind::Wishlist),
            cart: CollectionHandle::new(CollectionKind::Cart),
        }
    }

    pub fn get(&self, kind: CollectionKind) -> &CollectionHandle {
        match kind {
            CollectionKind::Wishlist => &self.wishlist,
            CollectionKind::Cart => &self.cart,
        }
    }

    /// Out-of-stock items cannot go into the cart. Returns whether the cart changed.
    pub fn add_to_cart(&self, item: CatalogItem) -> Result<bool, StoreError> {
        if !item.in_stock {
            info!(id = item.id, "cart add refused: out of stock");
            return Err(StoreError::OutOfStock(item.id));
        }
        Ok(self.cart.add(item))
    }

    /// Heart button: flips wishlist membership and returns the new membership.
    pub fn toggle_wishlist(&self, item: CatalogItem) -> bool { self.wishlist.toggle(item) }

    pub fn summary(&self, kind: CollectionKind) -> CollectionSummary {
        let cur = self.get(kind).current();
        CollectionSummary { kind, count: cur.len(), total_value: cur.total_value() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wishlist_and_cart_are_independent() {
        let shelves = Shelves::new();
        let book = CatalogItem::new(1, "Rust in Action", 40.0, 5);
        assert!(shelves.toggle_wishlist(book.clone()));
        assert!(shelves.wishlist.contains(1));
        assert!(!shelves.cart.contains(1));
        assert_eq!(shelves.add_to_cart(book), Ok(true));
        shelves.wishlist.clear();
        assert!(shelves.cart.contains(1));
    }

    #[test]
    fn out_of_stock_never_reaches_the_cart() {
        let shelves = Shelves::new();
        let mut book = CatalogItem::new(2, "Sold Out", 10.0, 4);
        book.in_stock = false;
        assert_eq!(shelves.add_to_cart(book.clone()), Err(StoreError::OutOfStock(2)));
        assert!(shelves.cart.current().is_empty());
        // the wishlist accepts it
        assert!(shelves.toggle_wishlist(book));
    }

    #[test]
    fn summary_counts_and_sums() {
        let shelves = Shelves::new();
        shelves.add_to_cart(CatalogItem::new(1, "a", 19.5, 3)).unwrap();
        shelves.add_to_cart(CatalogItem::new(2, "b", 0.5, 3)).unwrap();
        shelves.add_to_cart(CatalogItem::new(2, "b", 0.5, 3)).unwrap();
        let s = shelves.summary(CollectionKind::Cart);
        assert_eq!(s.count, 2);
        assert_eq!(s.total_value, 20.0);
        assert_eq!(shelves.summary(CollectionKind::Wishlist).count, 0);
    }
}
