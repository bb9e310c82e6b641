//! `cap://` resource addressing.
//!
//! Grammar: `cap://<shelf>[?key=value&key=value...]` with shelf-dependent
//! filter keys. Also home to the natural-language query builder, which maps
//! free-text descriptions onto shelves and filters using keyword tables.
//! Time windows are emitted as symbolic tokens (`today`, `+7days`) and
//! resolved to concrete dates at fetch time.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::error::CapError;
use crate::filters::FilterParams;
use crate::types::Shelf;

/// A parsed shelf address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapQuery {
    pub shelf: Shelf,
    pub filters: FilterParams,
}

impl CapQuery {
    /// Parse a `cap://` address and validate its filters against the
    /// shelf's grammar.
    pub fn parse(input: &str) -> Result<Self, CapError> {
        let url = Url::parse(input)
            .map_err(|e| CapError::InvalidFilter(format!("invalid cap query '{input}': {e}")))?;

        if url.scheme() != "cap" {
            return Err(CapError::InvalidFilter(format!(
                "expected cap:// scheme, got '{}'",
                url.scheme()
            )));
        }

        let shelf_name = url.host_str().unwrap_or_default();
        let shelf = Shelf::parse(shelf_name).ok_or_else(|| {
            CapError::InvalidFilter(format!("unknown shelf '{shelf_name}' in '{input}'"))
        })?;

        let filters = FilterParams::from_pairs(
            url.query_pairs()
                .map(|(k, v)| (k.into_owned(), v.into_owned())),
        );
        filters.validate_for(shelf)?;

        Ok(Self { shelf, filters })
    }
}

impl fmt::Display for CapQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cap://{}", self.shelf)?;
        for (i, (k, v)) in self.filters.iter().enumerate() {
            write!(f, "{}{k}={v}", if i == 0 { '?' } else { '&' })?;
        }
        Ok(())
    }
}

// ============================================================================
// Natural-language query builder
// ============================================================================

/// Keywords that select a shelf. First match wins, in table order.
const SHELF_KEYWORDS: &[(Shelf, &[&str])] = &[
    (
        Shelf::Calendar,
        &["calendar", "event", "meeting", "appointment", "schedule"],
    ),
    (
        Shelf::Tasks,
        &["task", "todo", "project", "milestone", "deadline"],
    ),
    (
        Shelf::Comms,
        &["email", "message", "communication", "call", "conversation"],
    ),
    (
        Shelf::Identity,
        &["contact", "person", "people", "organization", "client"],
    ),
    (
        Shelf::Docs,
        &["document", "note", "file", "bookmark", "snippet"],
    ),
];

/// Time phrases and the symbolic (start, end) window they denote.
const TIME_WINDOWS: &[(&str, &str, &str)] = &[
    ("today", "today", "today"),
    ("tomorrow", "+1days", "+1days"),
    ("yesterday", "-1days", "-1days"),
    ("this week", "today", "+7days"),
    ("next week", "+7days", "+14days"),
    ("last week", "-7days", "today"),
    ("this month", "today", "+30days"),
    ("next month", "+30days", "+60days"),
    ("last month", "-30days", "today"),
];

/// Priority phrases, longest-match first.
const PRIORITY_KEYWORDS: &[(&str, &str)] = &[
    ("urgent", "urgent"),
    ("high priority", "high"),
    ("high", "high"),
    ("medium priority", "medium"),
    ("medium", "medium"),
    ("low priority", "low"),
    ("low", "low"),
];

const STATUS_KEYWORDS: &[(&str, &str)] = &[
    ("pending", "pending"),
    ("active", "active"),
    ("blocked", "blocked"),
    ("completed", "completed"),
    ("cancelled", "cancelled"),
    ("done", "completed"),
    ("in progress", "active"),
];

fn type_keywords(shelf: Shelf) -> &'static [(&'static str, &'static str)] {
    match shelf {
        Shelf::Calendar => &[("event", "event"), ("reminder", "reminder"), ("block", "block")],
        Shelf::Tasks => &[
            ("task", "task"),
            ("project", "project"),
            ("milestone", "milestone"),
        ],
        Shelf::Comms => &[("email", "email"), ("message", "message"), ("call", "call")],
        Shelf::Identity => &[
            ("person", "person"),
            ("people", "person"),
            ("organization", "org"),
            ("org", "org"),
            ("role", "role"),
        ],
        Shelf::Docs => &[
            ("note", "note"),
            ("file", "file"),
            ("snippet", "snippet"),
            ("bookmark", "bookmark"),
        ],
    }
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap())
}

fn tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:tagged|tag:)\s+(\w+)").unwrap())
}

/// Build a `cap://` query from a natural-language description.
pub fn build_from_text(text: &str) -> Result<CapQuery, CapError> {
    let lowered = text.to_lowercase();

    let shelf = detect_shelf(&lowered).ok_or_else(|| {
        CapError::InvalidFilter(format!("could not determine shelf from query: '{text}'"))
    })?;

    let mut filters = FilterParams::new();
    extract_time(&lowered, shelf, &mut filters);
    extract_priority(&lowered, shelf, &mut filters);
    extract_status(&lowered, shelf, &mut filters);
    extract_read_state(&lowered, shelf, &mut filters);
    extract_type(&lowered, shelf, &mut filters);
    extract_email(&lowered, shelf, &mut filters);
    extract_tags(&lowered, &mut filters);

    Ok(CapQuery { shelf, filters })
}

fn detect_shelf(query: &str) -> Option<Shelf> {
    for (shelf, keywords) in SHELF_KEYWORDS {
        if keywords.iter().any(|k| query.contains(k)) {
            return Some(*shelf);
        }
    }
    None
}

fn extract_time(query: &str, shelf: Shelf, filters: &mut FilterParams) {
    for (phrase, start, end) in TIME_WINDOWS {
        if query.contains(phrase) {
            match shelf {
                Shelf::Calendar => {
                    filters.insert("start_date", *start);
                    filters.insert("end_date", *end);
                }
                Shelf::Tasks => {
                    filters.insert("due_date_start", *start);
                    filters.insert("due_date_end", *end);
                }
                Shelf::Comms => {
                    filters.insert("timestamp_after", *start);
                    if start != end {
                        filters.insert("timestamp_before", *end);
                    }
                }
                _ => {}
            }
            return;
        }
    }

    // "due today" / "due tomorrow" shorthand for tasks
    if shelf == Shelf::Tasks && query.contains("due") {
        if query.contains("today") {
            filters.insert("due_date", "today");
        } else if query.contains("tomorrow") {
            filters.insert("due_date", "+1days");
        }
    }
}

fn extract_priority(query: &str, shelf: Shelf, filters: &mut FilterParams) {
    if shelf != Shelf::Tasks {
        return;
    }
    for (phrase, priority) in PRIORITY_KEYWORDS {
        if query.contains(phrase) {
            filters.insert("priority", *priority);
            return;
        }
    }
}

fn extract_status(query: &str, shelf: Shelf, filters: &mut FilterParams) {
    if shelf != Shelf::Tasks && shelf != Shelf::Calendar {
        return;
    }
    for (phrase, status) in STATUS_KEYWORDS {
        if query.contains(phrase) {
            filters.insert("status", *status);
            return;
        }
    }
}

fn extract_read_state(query: &str, shelf: Shelf, filters: &mut FilterParams) {
    if shelf != Shelf::Comms {
        return;
    }
    if query.contains("unread") {
        filters.insert("is_read", "false");
    } else if query.contains("read") {
        filters.insert("is_read", "true");
    }
}

fn extract_type(query: &str, shelf: Shelf, filters: &mut FilterParams) {
    for (keyword, type_value) in type_keywords(shelf) {
        if query.contains(keyword) {
            filters.insert("type", *type_value);
            return;
        }
    }
}

fn extract_email(query: &str, shelf: Shelf, filters: &mut FilterParams) {
    let Some(email) = email_regex().find(query).map(|m| m.as_str()) else {
        return;
    };
    match shelf {
        Shelf::Comms => {
            if query.contains("to") && !query.contains("from") {
                filters.insert("to", email);
            } else {
                filters.insert("from", email);
            }
        }
        Shelf::Calendar => filters.insert("attendee", email),
        _ => {}
    }
}

fn extract_tags(query: &str, filters: &mut FilterParams) {
    if let Some(captures) = tag_regex().captures(query) {
        filters.insert("tags", &captures[1]);
    }
}
