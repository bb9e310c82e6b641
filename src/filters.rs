//! Shelf filter parameters and cache-key canonicalization.
//!
//! Filters are string key/value pairs held in a `BTreeMap`, so the encoding
//! of logically identical requests is stable regardless of the order the
//! caller supplied them in. Date-valued filters accept symbolic tokens
//! (`today`, `+7days`, `-30days`) alongside ISO dates.

use std::collections::BTreeMap;

use chrono::{Duration, Local, NaiveDate};

use crate::error::CapError;
use crate::types::Shelf;

/// Filter keys accepted on every shelf.
const COMMON_KEYS: &[&str] = &["tags", "type"];

/// Shelf-dependent filter keys, per the `cap://` addressing grammar.
fn shelf_keys(shelf: Shelf) -> &'static [&'static str] {
    match shelf {
        Shelf::Identity => &[],
        Shelf::Calendar => &["start_date", "end_date", "status", "attendee"],
        Shelf::Comms => &[
            "timestamp_after",
            "timestamp_before",
            "is_read",
            "from",
            "to",
            "limit",
        ],
        Shelf::Docs => &["query", "limit"],
        Shelf::Tasks => &[
            "due_date",
            "due_date_start",
            "due_date_end",
            "priority",
            "status",
            "limit",
        ],
    }
}

/// Canonicalized filter parameters for one shelf request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterParams(BTreeMap<String, String>);

impl FilterParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The requested item limit, falling back to the shelf default.
    pub fn limit_or(&self, default: usize) -> usize {
        self.get("limit")
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// A date-valued filter, with symbolic tokens resolved against today.
    pub fn date(&self, key: &str) -> Option<NaiveDate> {
        self.get(key).and_then(resolve_date_token)
    }

    /// Check keys and typed values against the shelf's filter grammar.
    pub fn validate_for(&self, shelf: Shelf) -> Result<(), CapError> {
        let allowed = shelf_keys(shelf);
        for (key, value) in self.iter() {
            if !allowed.contains(&key) && !COMMON_KEYS.contains(&key) {
                return Err(CapError::InvalidFilter(format!(
                    "unknown filter key '{key}' for shelf {shelf}"
                )));
            }
            match key {
                "limit" => {
                    let parsed: Result<usize, _> = value.parse();
                    if parsed.map(|n| n == 0).unwrap_or(true) {
                        return Err(CapError::InvalidFilter(format!(
                            "limit must be a positive integer, got '{value}'"
                        )));
                    }
                }
                "is_read" => {
                    if value != "true" && value != "false" {
                        return Err(CapError::InvalidFilter(format!(
                            "is_read must be true or false, got '{value}'"
                        )));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Deterministic composite cache key for `(shelf, filters)`. Identical
    /// logical requests always produce the same key; parameter insertion
    /// order never matters. Fails only when the filters are malformed.
    pub fn cache_key(&self, shelf: Shelf) -> Result<String, CapError> {
        self.validate_for(shelf)?;

        let mut key = shelf.as_str().to_string();
        for (i, (k, v)) in self.iter().enumerate() {
            key.push(if i == 0 { '?' } else { '&' });
            key.push_str(k);
            key.push('=');
            key.push_str(v);
        }
        Ok(key)
    }
}

/// Resolve a date filter value: an ISO date, `today`, or a `±Ndays` offset
/// (the symbolic tokens the query builder emits).
pub fn resolve_date_token(value: &str) -> Option<NaiveDate> {
    let today = Local::now().date_naive();
    if value == "today" {
        return Some(today);
    }
    if let Some(days) = value
        .strip_prefix('+')
        .and_then(|rest| rest.strip_suffix("days"))
        .and_then(|n| n.parse::<i64>().ok())
    {
        return Some(today + Duration::days(days));
    }
    if let Some(days) = value
        .strip_prefix('-')
        .and_then(|rest| rest.strip_suffix("days"))
        .and_then(|n| n.parse::<i64>().ok())
    {
        return Some(today - Duration::days(days));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}
