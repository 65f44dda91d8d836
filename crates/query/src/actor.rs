use std::sync::Arc;

use shelf_api::{CatalogPort, ShelfResult};
use shelf_core::CatalogItem;
use shelf_search::{apply_filters, CriteriaChange, FilterCriteria};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{QueryConfig, QueryView};

#[derive(Debug)]
pub(crate) enum Command {
    SetText(String),
    SetCriteria(FilterCriteria),
    ChangeCriteria(CriteriaChange),
    Deactivate,
}

/// Result of one issued lookup, tagged with the sequence value it was issued under.
struct Completion {
    token: u64,
    outcome: ShelfResult<Vec<CatalogItem>>,
}

#[derive(Default)]
struct QueryState {
    raw_text: String,
    last_issued_text: Option<String>,
    sequence: u64,
    /// Text and criteria commands processed so far.
    applied: u64,
    /// Token of the lookup whose completion would still be accepted.
    in_flight: Option<u64>,
    results: Vec<CatalogItem>,
    is_loading: bool,
    debounce_pending: bool,
    criteria: FilterCriteria,
    failure: Option<String>,
    active: bool,
}

impl QueryState {
    fn view(&self) -> QueryView {
        QueryView {
            raw_text: self.raw_text.clone(),
            last_issued_text: self.last_issued_text.clone(),
            sequence: self.sequence,
            applied: self.applied,
            results: self.results.clone(),
            visible: apply_filters(&self.results, &self.criteria),
            is_loading: self.is_loading,
            debounce_pending: self.debounce_pending,
            criteria: self.criteria,
            failure: self.failure.clone(),
            active: self.active,
        }
    }

    fn is_current(&self, token: u64) -> bool { self.in_flight == Some(token) && token == self.sequence }
}

pub(crate) fn initial_view() -> QueryView { QueryState { active: true, ..Default::default() }.view() }

pub(crate) async fn run(
    port: Arc<dyn CatalogPort>,
    config: QueryConfig,
    mut cmd_rx: mpsc::Receiver<Command>,
    view_tx: watch::Sender<QueryView>,
) {
    let mut state = QueryState { active: true, ..Default::default() };
    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Completion>();
    // The one debounce timer; re-armed by reset, never duplicated.
    let timer = tokio::time::sleep(config.quiet);
    tokio::pin!(timer);

    loop {
        tokio::select! {
            maybe = cmd_rx.recv() => {
                match maybe {
                    Some(Command::SetText(text)) => {
                        state.raw_text = text;
                        state.debounce_pending = true;
                        timer.as_mut().reset(Instant::now() + config.quiet);
                    }
                    Some(Command::SetCriteria(criteria)) => state.criteria = criteria,
                    Some(Command::ChangeCriteria(change)) => state.criteria.apply_change(change),
                    Some(Command::Deactivate) => {
                        debug!("deactivate requested");
                        break;
                    }
                    None => {
                        debug!("command channel closed; stopping coordinator");
                        break;
                    }
                }
                state.applied += 1;
                view_tx.send_replace(state.view());
            }
            () = &mut timer, if state.debounce_pending => {
                state.debounce_pending = false;
                fire(&mut state, &port, &done_tx);
                view_tx.send_replace(state.view());
            }
            Some(done) = done_rx.recv() => {
                if accept(&mut state, done) {
                    view_tx.send_replace(state.view());
                }
            }
        }
    }

    state.debounce_pending = false;
    state.in_flight = None;
    state.is_loading = false;
    state.active = false;
    view_tx.send_replace(state.view());
    info!(sequence = state.sequence, "query coordinator deactivated");
}

/// Quiet period elapsed: issue a lookup for the stabilized text, or clear.
fn fire(
    state: &mut QueryState,
    port: &Arc<dyn CatalogPort>,
    done_tx: &mpsc::UnboundedSender<Completion>,
) {
    let text = state.raw_text.clone();
    if text.trim().is_empty() {
        state.results.clear();
        state.is_loading = false;
        state.in_flight = None;
        state.failure = None;
        debug!("blank query; results cleared");
        return;
    }
    state.sequence += 1;
    let token = state.sequence;
    state.in_flight = Some(token);
    state.is_loading = true;
    state.failure = None;
    state.last_issued_text = Some(text.clone());
    metrics::counter!("query_lookups_issued_total", 1u64);
    debug!(token, query = %text, "lookup issued");

    let port = Arc::clone(port);
    let tx = done_tx.clone();
    tokio::spawn(async move {
        let outcome = port.search(&text).await;
        // Receiver is gone once the coordinator stopped; nothing to report then.
        let _ = tx.send(Completion { token, outcome });
    });
}

/// Apply a completion if it belongs to the latest issued lookup. Returns
/// whether the state changed.
fn accept(state: &mut QueryState, done: Completion) -> bool {
    if !state.is_current(done.token) {
        metrics::counter!("query_stale_completions_total", 1u64);
        debug!(token = done.token, sequence = state.sequence, "stale completion discarded");
        return false;
    }
    state.in_flight = None;
    state.is_loading = false;
    match done.outcome {
        Ok(items) => {
            debug!(token = done.token, items = items.len(), "lookup accepted");
            state.results = items;
        }
        Err(e) => {
            metrics::counter!("query_lookup_failures_total", 1u64);
            warn!(token = done.token, error = %e, "lookup failed");
            state.results.clear();
            state.failure = Some(e.to_string());
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_api::ShelfError;

    fn state_with_lookup(token: u64) -> QueryState {
        QueryState { sequence: token, in_flight: Some(token), is_loading: true, active: true, ..Default::default() }
    }

    #[test]
    fn older_token_is_discarded() {
        let mut s = state_with_lookup(2);
        let changed = accept(&mut s, Completion { token: 1, outcome: Ok(vec![CatalogItem::new(1, "old", 1.0, 1)]) });
        assert!(!changed);
        assert!(s.is_loading);
        assert!(s.results.is_empty());
    }

    #[test]
    fn current_token_success_replaces_results() {
        let mut s = state_with_lookup(3);
        s.results = vec![CatalogItem::new(9, "prev", 1.0, 1)];
        assert!(accept(&mut s, Completion { token: 3, outcome: Ok(vec![CatalogItem::new(1, "new", 1.0, 1)]) }));
        assert!(!s.is_loading);
        assert_eq!(s.results[0].id, 1);
        assert_eq!(s.in_flight, None);
    }

    #[test]
    fn current_token_failure_clears_and_flags() {
        let mut s = state_with_lookup(1);
        s.results = vec![CatalogItem::new(9, "prev", 1.0, 1)];
        assert!(accept(&mut s, Completion { token: 1, outcome: Err(ShelfError::Unavailable("down".into())) }));
        assert!(s.results.is_empty());
        assert!(!s.is_loading);
        assert_eq!(s.failure.as_deref(), Some("unavailable: down"));
    }

    #[test]
    fn older_token_failure_is_discarded() {
        let mut s = state_with_lookup(2);
        s.results = vec![CatalogItem::new(5, "current", 1.0, 1)];
        let changed = accept(&mut s, Completion { token: 1, outcome: Err(ShelfError::Timeout("slow".into())) });
        assert!(!changed);
        assert!(s.is_loading);
        assert_eq!(s.failure, None);
        assert_eq!(s.results[0].id, 5);
        assert_eq!(s.in_flight, Some(2));
    }

    #[test]
    fn a_token_is_accepted_at_most_once() {
        let mut s = state_with_lookup(1);
        assert!(accept(&mut s, Completion { token: 1, outcome: Ok(Vec::new()) }));
        assert!(!accept(&mut s, Completion { token: 1, outcome: Ok(vec![CatalogItem::new(1, "dup", 1.0, 1)]) }));
        assert!(s.results.is_empty());
    }
}
