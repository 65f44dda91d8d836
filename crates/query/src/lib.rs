//! Shelf query coordinator: debounced catalog lookups where only the most
//! recently issued lookup can ever reach the published view.
//!
//! All query state lives inside one actor task. Text and criteria changes,
//! timer expiry and lookup completions are handled there one at a time, so
//! the state needs no lock.

#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use shelf_api::CatalogPort;
use shelf_core::CatalogItem;
use shelf_search::{Category, CriteriaChange, FilterCriteria, MinRating, PriceRange, SortKey};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::info;

mod actor;

use actor::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("query coordinator is no longer active")]
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryConfig {
    /// Input must be stable this long before a lookup is issued.
    pub quiet: Duration,
    /// Capacity of the command channel between handle and actor.
    pub queue_cap: usize,
}

impl Default for QueryConfig {
    fn default() -> Self { Self { quiet: Duration::from_millis(500), queue_cap: 256 } }
}

impl QueryConfig {
    /// Defaults overridden by `SHELF_DEBOUNCE_MS` and `SHELF_QUEUE_CAP`.
    pub fn from_env() -> Self {
        let d = Self::default();
        let quiet = std::env::var("SHELF_DEBOUNCE_MS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(d.quiet);
        let queue_cap = std::env::var("SHELF_QUEUE_CAP")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(d.queue_cap);
        Self { quiet, queue_cap }
    }
}

/// What the presentation layer should show for the current view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "status", content = "count")]
pub enum SearchStatus {
    Loading,
    /// Nothing typed yet.
    Idle,
    /// A lookup finished but nothing survived the filters.
    Empty,
    Results(usize),
}

/// Snapshot published after every state change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryView {
    pub raw_text: String,
    pub last_issued_text: Option<String>,
    pub sequence: u64,
    /// Text and criteria commands the coordinator has processed.
    pub applied: u64,
    /// Last accepted lookup result, unfiltered.
    pub results: Vec<CatalogItem>,
    /// `results` after the filter pipeline; what gets rendered.
    pub visible: Vec<CatalogItem>,
    pub is_loading: bool,
    pub debounce_pending: bool,
    pub criteria: FilterCriteria,
    /// Set when the current lookup failed; cleared by the next issued lookup.
    pub failure: Option<String>,
    pub active: bool,
}

impl QueryView {
    pub fn status(&self) -> SearchStatus {
        if self.is_loading {
            SearchStatus::Loading
        } else if self.raw_text.trim().is_empty() {
            SearchStatus::Idle
        } else if self.visible.is_empty() {
            SearchStatus::Empty
        } else {
            SearchStatus::Results(self.visible.len())
        }
    }

    /// No timer pending and no lookup outstanding.
    pub fn is_settled(&self) -> bool { !self.debounce_pending && !self.is_loading }
}

/// Handle to a running coordinator. Dropping it stops the actor; pending and
/// in-flight lookups then have no observable effect.
pub struct QueryCoordinator {
    cmd_tx: mpsc::Sender<Command>,
    view_rx: watch::Receiver<QueryView>,
    task: JoinHandle<()>,
    /// Text and criteria commands handed to the actor.
    sent: AtomicU64,
}

impl QueryCoordinator {
    /// Spawn the coordinator actor on the current runtime.
    pub fn activate(port: Arc<dyn CatalogPort>, config: QueryConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(config.queue_cap.max(1));
        let (view_tx, view_rx) = watch::channel(actor::initial_view());
        info!(quiet_ms = %config.quiet.as_millis(), "query coordinator activated");
        let task = tokio::spawn(actor::run(port, config, cmd_rx, view_tx));
        Self { cmd_tx, view_rx, task, sent: AtomicU64::new(0) }
    }

    async fn send(&self, cmd: Command) -> Result<(), QueryError> {
        self.cmd_tx.send(cmd).await.map_err(|_| QueryError::Inactive)?;
        self.sent.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Echo `text` right away and (re)start the quiet timer.
    pub async fn set_query_text(&self, text: impl Into<String>) -> Result<(), QueryError> {
        self.send(Command::SetText(text.into())).await
    }

    pub async fn set_criteria(&self, criteria: FilterCriteria) -> Result<(), QueryError> {
        self.send(Command::SetCriteria(criteria)).await
    }

    pub async fn change_criteria(&self, change: CriteriaChange) -> Result<(), QueryError> {
        self.send(Command::ChangeCriteria(change)).await
    }

    pub async fn set_price_range(&self, v: PriceRange) -> Result<(), QueryError> {
        self.change_criteria(CriteriaChange::PriceRange(v)).await
    }

    pub async fn set_min_rating(&self, v: MinRating) -> Result<(), QueryError> {
        self.change_criteria(CriteriaChange::MinRating(v)).await
    }

    pub async fn set_category(&self, v: Category) -> Result<(), QueryError> {
        self.change_criteria(CriteriaChange::Category(v)).await
    }

    pub async fn set_sort_key(&self, v: SortKey) -> Result<(), QueryError> {
        self.change_criteria(CriteriaChange::SortKey(v)).await
    }

    /// Latest published view.
    pub fn view(&self) -> QueryView { self.view_rx.borrow().clone() }

    pub fn subscribe(&self) -> watch::Receiver<QueryView> { self.view_rx.clone() }

    /// Wait until every command sent so far has been processed and the view
    /// has no pending timer and no lookup outstanding.
    pub async fn wait_settled(&self) -> Result<QueryView, QueryError> {
        let target = self.sent.load(Ordering::Acquire);
        let mut rx = self.view_rx.clone();
        let view = rx
            .wait_for(|v| !v.active || (v.applied >= target && v.is_settled()))
            .await
            .map_err(|_| QueryError::Inactive)?;
        if !view.active {
            return Err(QueryError::Inactive);
        }
        Ok(view.clone())
    }

    /// Cancel the pending timer, make any in-flight lookup stale and stop the actor.
    pub async fn deactivate(self) {
        let _ = self.cmd_tx.send(Command::Deactivate).await;
        let _ = self.task.await;
    }
}
