//! Shelf store: duplicate-free ordered collections (wishlist, cart).
//!
//! `CollectionState` is a plain value with a pure reducer; `CollectionHandle`
//! owns the current value and is the only way to move it forward.

#![forbid(unsafe_code)]

use std::sync::Arc;

use arc_swap::ArcSwap;
use rustc_hash::FxHashSet;
use serde::Serialize;
use shelf_core::{CatalogItem, ItemId};
use tokio::sync::watch;
use tracing::debug;

mod shelves;

pub use shelves::{CollectionSummary, Shelves, StoreError};

/// Item snapshot taken at insertion time; not a live link to the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionEntry {
    pub id: ItemId,
    pub item: CatalogItem,
}

impl From<CatalogItem> for CollectionEntry {
    fn from(item: CatalogItem) -> Self { Self { id: item.id, item } }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CollectionAction {
    Add(CatalogItem),
    Remove(ItemId),
    Clear,
}

impl CollectionAction {
    fn label(&self) -> &'static str {
        match self {
            Self::Add(_) => "add",
            Self::Remove(_) => "remove",
            Self::Clear => "clear",
        }
    }
}

/// Ordered entries plus an id set mirroring them for membership checks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionState {
    entries: Vec<CollectionEntry>,
    ids: FxHashSet<ItemId>,
}

impl CollectionState {
    pub fn new() -> Self { Self::default() }

    /// Next state for `action`. Total: unknown ids and repeated adds are no-ops.
    pub fn reduce(&self, action: &CollectionAction) -> Self {
        self.transition(action).unwrap_or_else(|| self.clone())
    }

    /// `None` when the action leaves the state unchanged.
    fn transition(&self, action: &CollectionAction) -> Option<Self> {
        match action {
            CollectionAction::Add(item) => {
                if self.ids.contains(&item.id) {
                    return None;
                }
                let mut next = self.clone();
                next.ids.insert(item.id);
                next.entries.push(CollectionEntry::from(item.clone()));
                Some(next)
            }
            CollectionAction::Remove(id) => {
                if !self.ids.contains(id) {
                    return None;
                }
                let mut next = self.clone();
                next.ids.remove(id);
                next.entries.retain(|e| e.id != *id);
                Some(next)
            }
            CollectionAction::Clear => {
                if self.entries.is_empty() {
                    return None;
                }
                Some(Self::default())
            }
        }
    }

    pub fn contains(&self, id: ItemId) -> bool { self.ids.contains(&id) }
    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
    pub fn entries(&self) -> &[CollectionEntry] { &self.entries }
    pub fn iter(&self) -> impl Iterator<Item = &CatalogItem> { self.entries.iter().map(|e| &e.item) }
    pub fn ids(&self) -> Vec<ItemId> { self.entries.iter().map(|e| e.id).collect() }

    /// Sum of entry prices as captured at insertion.
    pub fn total_value(&self) -> f64 { self.entries.iter().map(|e| e.item.price).sum() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionKind {
    Wishlist,
    Cart,
}

impl CollectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wishlist => "wishlist",
            Self::Cart => "cart",
        }
    }
}

impl std::fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

/// Owner of one collection. Transitions are read-copy-update on the current
/// snapshot; readers never see a half-applied action.
pub struct CollectionHandle {
    kind: CollectionKind,
    state: ArcSwap<CollectionState>,
    revision_tx: watch::Sender<u64>,
}

impl CollectionHandle {
    pub fn new(kind: CollectionKind) -> Self {
        let (revision_tx, _rx) = watch::channel(0u64);
        Self { kind, state: ArcSwap::from_pointee(CollectionState::default()), revision_tx }
    }

    pub fn kind(&self) -> CollectionKind { self.kind }
    pub fn current(&self) -> Arc<CollectionState> { self.state.load_full() }
    pub fn contains(&self, id: ItemId) -> bool { self.state.load().contains(id) }

    /// Revision counter bumped on every state change.
    pub fn subscribe(&self) -> watch::Receiver<u64> { self.revision_tx.subscribe() }

    /// Apply `action`; returns whether the state changed.
    pub fn dispatch(&self, action: CollectionAction) -> bool {
        let mut changed = false;
        self.state.rcu(|cur| match cur.transition(&action) {
            Some(next) => {
                changed = true;
                Arc::new(next)
            }
            None => {
                changed = false;
                Arc::clone(cur)
            }
        });
        metrics::counter!("collection_actions_total", 1u64, "collection" => self.kind.as_str(), "action" => action.label());
        if changed {
            self.revision_tx.send_modify(|r| *r += 1);
        }
        debug!(collection = %self.kind, action = action.label(), changed, len = self.state.load().len(), "collection action");
        changed
    }

    pub fn add(&self, item: CatalogItem) -> bool { self.dispatch(CollectionAction::Add(item)) }
    pub fn remove(&self, id: ItemId) -> bool { self.dispatch(CollectionAction::Remove(id)) }
    pub fn clear(&self) -> bool { self.dispatch(CollectionAction::Clear) }

    /// Remove when present, add otherwise. Returns membership afterwards.
    pub fn toggle(&self, item: CatalogItem) -> bool {
        let mut member = false;
        self.state.rcu(|cur| {
            let action = if cur.contains(item.id) {
                CollectionAction::Remove(item.id)
            } else {
                CollectionAction::Add(item.clone())
            };
            member = matches!(action, CollectionAction::Add(_));
            match cur.transition(&action) {
                Some(next) => Arc::new(next),
                None => Arc::clone(cur),
            }
        });
        let label = if member { "add" } else { "remove" };
        metrics::counter!("collection_actions_total", 1u64, "collection" => self.kind.as_str(), "action" => label);
        self.revision_tx.send_modify(|r| *r += 1);
        debug!(collection = %self.kind, id = item.id, member, "collection toggle");
        member
    }
}
