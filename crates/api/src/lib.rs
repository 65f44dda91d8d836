//! Shelf catalog port.
//!
//! This crate defines the lookup trait the query coordinator depends on,
//! plus two in-process implementations: a scripted mock for tests and an
//! in-memory catalog loaded from a JSON file.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::Context;
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use serde::{Deserialize, Serialize};
use shelf_core::{CatalogItem, ItemId};
use tracing::info;

/// Lookup errors suitable for transport over RPC later.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum ShelfError {
    #[error("unavailable: {0}")]
    Unavailable(String),
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("internal: {0}")]
    Internal(String),
}

pub type ShelfResult<T> = Result<T, ShelfError>;

/// Remote catalog lookup. Completion order across calls is not guaranteed,
/// and the returned items are unranked candidates.
#[async_trait::async_trait]
pub trait CatalogPort: Send + Sync {
    async fn search(&self, text: &str) -> ShelfResult<Vec<CatalogItem>>;
}

// ----------------- Mock implementation -----------------

#[derive(Debug, Clone)]
struct Scripted {
    delay: Duration,
    outcome: ShelfResult<Vec<CatalogItem>>,
}

/// Scripted port for tests: per-query latency and outcome, records every call.
/// Unscripted queries succeed immediately with no items.
#[derive(Default)]
pub struct MockCatalog {
    scripts: HashMap<String, Scripted>,
    calls: Mutex<Vec<String>>,
}

impl MockCatalog {
    pub fn new() -> Self { Self::default() }

    pub fn with_response(mut self, query: &str, delay: Duration, items: Vec<CatalogItem>) -> Self {
        self.scripts.insert(query.to_string(), Scripted { delay, outcome: Ok(items) });
        self
    }

    pub fn with_failure(mut self, query: &str, delay: Duration, err: ShelfError) -> Self {
        self.scripts.insert(query.to_string(), Scripted { delay, outcome: Err(err) });
        self
    }

    /// Queries received so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl CatalogPort for MockCatalog {
    async fn search(&self, text: &str) -> ShelfResult<Vec<CatalogItem>> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(text.to_string());
        }
        let Some(script) = self.scripts.get(text).cloned() else {
            return Ok(Vec::new());
        };
        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }
        script.outcome
    }
}

// ----------------- In-memory implementation -----------------

/// Catalog held in RAM; name lookups use fuzzy matching, the way a remote
/// `name_like` endpoint would loosely match.
pub struct InMemoryCatalog {
    items: Vec<CatalogItem>,
    latency: Duration,
}

impl InMemoryCatalog {
    pub fn new(items: Vec<CatalogItem>) -> Self { Self { items, latency: Duration::ZERO } }

    /// Artificial per-call latency, useful to exercise debouncing by hand.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Parse and validate a JSON array of catalog items.
    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let items: Vec<CatalogItem> = serde_json::from_str(raw).context("parse catalog json")?;
        shelf_core::validate_catalog(&items).context("validate catalog")?;
        Ok(Self::new(items))
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let t0 = Instant::now();
        let raw = std::fs::read_to_string(path).with_context(|| format!("read catalog {}", path.display()))?;
        let cat = Self::from_json_str(&raw)?;
        info!(path = %path.display(), items = cat.items.len(), took_ms = %t0.elapsed().as_millis(), "catalog loaded");
        Ok(cat)
    }

    pub fn items(&self) -> &[CatalogItem] { &self.items }

    pub fn get(&self, id: ItemId) -> Option<&CatalogItem> { self.items.iter().find(|it| it.id == id) }
}

#[async_trait::async_trait]
impl CatalogPort for InMemoryCatalog {
    async fn search(&self, text: &str) -> ShelfResult<Vec<CatalogItem>> {
        let t0 = Instant::now();
        let q = text.trim();
        if q.is_empty() {
            return Err(ShelfError::Validation("empty query".into()));
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let matcher = SkimMatcherV2::default().ignore_case();
        let hits: Vec<CatalogItem> = self
            .items
            .iter()
            .filter(|it| matcher.fuzzy_match(&it.name, q).is_some())
            .cloned()
            .collect();
        metrics::histogram!("catalog_search_ms", t0.elapsed().as_secs_f64() * 1_000.0);
        info!(query = %q, hits = hits.len(), took_ms = %t0.elapsed().as_millis(), "api: search ok");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::from_json_str(
            r#"[
                {"id": 1, "name": "Basics To Advanced In React", "price": 29, "rating": 5},
                {"id": 2, "name": "Django Framework for Beginners", "price": 19, "rating": 5},
                {"id": 3, "name": "Mastering HTML and CSS", "price": 29, "rating": 4}
            ]"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn in_memory_matches_names_loosely() {
        let cat = catalog();
        let hits = cat.search("react").await.unwrap();
        assert_eq!(hits.iter().map(|i| i.id).collect::<Vec<_>>(), vec![1]);
        let hits = cat.search("DJANGO").await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(cat.search("zzzz").await.unwrap().is_empty());
        assert_eq!(cat.get(3).map(|i| i.name.as_str()), Some("Mastering HTML and CSS"));
    }

    #[tokio::test]
    async fn in_memory_rejects_blank_queries() {
        assert!(matches!(catalog().search("   ").await, Err(ShelfError::Validation(_))));
    }

    #[test]
    fn invalid_catalogs_fail_to_load() {
        assert!(InMemoryCatalog::from_json_str("{}").is_err());
        assert!(InMemoryCatalog::from_json_str(r#"[{"id":1,"name":"a","price":1},{"id":1,"name":"b","price":2}]"#).is_err());
        assert!(InMemoryCatalog::from_json_str(r#"[{"id":1,"name":"a","price":1,"rating":9}]"#).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn mock_replays_scripts_and_records_calls() {
        let mock = MockCatalog::new()
            .with_response("rust", Duration::from_millis(200), vec![CatalogItem::new(1, "Rust", 10.0, 5)])
            .with_failure("down", Duration::ZERO, ShelfError::Unavailable("503".into()));
        let t0 = tokio::time::Instant::now();
        assert_eq!(mock.search("rust").await.unwrap().len(), 1);
        assert!(t0.elapsed() >= Duration::from_millis(200));
        assert_eq!(mock.search("down").await, Err(ShelfError::Unavailable("503".into())));
        assert!(mock.search("other").await.unwrap().is_empty());
        assert_eq!(mock.calls(), vec!["rust", "down", "other"]);
    }
}
