//! Shelf aggregation: cache consult, concurrent connector fan-out, merge,
//! per-shelf ordering and truncation, write-through.
//!
//! The core correctness property is partial-failure tolerance: one
//! connector's timeout, auth failure, or transport error degrades its
//! contribution to zero items and never aborts siblings or fails the
//! aggregate request.

use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tokio::time::timeout;

use crate::error::CapError;
use crate::filters::FilterParams;
use crate::state::CapState;
use crate::types::Shelf;
use crate::validator;

/// Truncation limits applied when the request carries none.
const COMMS_DEFAULT_LIMIT: usize = 100;
const DOCS_DEFAULT_LIMIT: usize = 50;
const TASKS_DEFAULT_LIMIT: usize = 100;

/// Aggregated result for one shelf request.
#[derive(Debug, Clone, Serialize)]
pub struct ShelfResponse {
    pub shelf: Shelf,
    pub count: usize,
    pub items: Vec<Value>,
}

impl ShelfResponse {
    fn new(shelf: Shelf, items: Vec<Value>) -> Self {
        Self {
            shelf,
            count: items.len(),
            items,
        }
    }
}

/// Aggregate one shelf request.
///
/// The only hard error is a filter set that cannot be canonicalized into a
/// cache key; it is raised before the cache is consulted, so failures are
/// never cached. A shelf with zero connectors, or with every connector
/// failing, produces a well-formed empty result.
pub async fn aggregate(
    state: &CapState,
    shelf: Shelf,
    filters: &FilterParams,
) -> Result<ShelfResponse, CapError> {
    let cache_key = filters.cache_key(shelf)?;

    if let Some(items) = state.cache.get(&cache_key) {
        log::info!("returning cached {shelf} data");
        return Ok(ShelfResponse::new(shelf, items));
    }

    let connectors = state.registry.connectors_for(shelf);
    if connectors.is_empty() {
        log::info!("no connectors registered for shelf {shelf}");
        state.cache.set(&cache_key, Vec::new());
        return Ok(ShelfResponse::new(shelf, Vec::new()));
    }

    let budget = Duration::from_secs(state.config.fetch_timeout_secs);

    // Fan out to every connector concurrently, each call bounded by its own
    // timeout. Stop waiting on a straggler; never cancel its siblings.
    let fetches: Vec<_> = connectors
        .iter()
        .map(|connector| {
            let connector = connector.clone();
            let filters = filters.clone();
            async move {
                let result = timeout(budget, connector.fetch_shelf(shelf, &filters)).await;
                (connector, result)
            }
        })
        .collect();

    let results = join_all(fetches).await;

    // Merge in registration order. No cross-connector deduplication: an
    // object present in two connectors' output appears twice.
    let mut items: Vec<Value> = Vec::new();
    for (connector, result) in results {
        match result {
            Ok(Ok(fetched)) => {
                log::debug!("{} returned {} {shelf} items", connector.name(), fetched.len());
                police(connector.name(), shelf, &fetched);
                items.extend(fetched);
            }
            Ok(Err(err @ CapError::UnsupportedShelf { .. })) => {
                // Dispatch reached a connector that never declared this
                // shelf: a registry-wiring bug, not an upstream condition.
                log::error!("{err}");
            }
            Ok(Err(err)) => {
                log::warn!("error fetching {shelf} from {}: {err}", connector.name());
            }
            Err(_) => {
                log::warn!(
                    "{} timed out fetching {shelf} after {budget:?}",
                    connector.name()
                );
            }
        }
    }

    postprocess(shelf, filters, &mut items);

    state.cache.set(&cache_key, items.clone());
    Ok(ShelfResponse::new(shelf, items))
}

/// Report schema violations in connector output. Invalid objects are served
/// regardless: dropping them would silently change observable counts.
fn police(connector: &str, shelf: Shelf, items: &[Value]) {
    for item in items {
        let report = validator::validate(item, Some(shelf));
        if !report.is_valid() {
            let id = item.get("id").and_then(Value::as_str).unwrap_or("<no id>");
            log::warn!(
                "{connector} produced an invalid {shelf} object ({id}): {}",
                report.errors.join("; ")
            );
        }
    }
}

/// Shelf-specific ordering and truncation. Sorts are stable, so
/// registration order breaks ties.
fn postprocess(shelf: Shelf, filters: &FilterParams, items: &mut Vec<Value>) {
    match shelf {
        Shelf::Calendar => {
            items.sort_by(|a, b| str_field(a, "start_time").cmp(str_field(b, "start_time")));
        }
        Shelf::Comms => {
            items.sort_by(|a, b| str_field(b, "timestamp").cmp(str_field(a, "timestamp")));
            items.truncate(filters.limit_or(COMMS_DEFAULT_LIMIT));
        }
        Shelf::Tasks => {
            items.sort_by(|a, b| due_key(a).cmp(&due_key(b)));
            items.truncate(filters.limit_or(TASKS_DEFAULT_LIMIT));
        }
        Shelf::Docs => {
            items.truncate(filters.limit_or(DOCS_DEFAULT_LIMIT));
        }
        Shelf::Identity => {}
    }
}

fn str_field<'a>(item: &'a Value, key: &str) -> &'a str {
    item.get(key).and_then(Value::as_str).unwrap_or("")
}

/// Sort key for tasks: a missing due date is treated as the maximal value,
/// so undated tasks sort after every dated one.
fn due_key(item: &Value) -> (bool, &str) {
    match item.get("due_date").and_then(Value::as_str) {
        Some(date) if !date.is_empty() => (false, date),
        _ => (true, ""),
    }
}
