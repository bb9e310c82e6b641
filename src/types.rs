//! Canonical schema vocabulary: shelves, closed enums, source pointers.
//!
//! Canonical objects themselves travel as `serde_json::Value`: the wire
//! contract is JSON, and the validator must be able to inspect output that
//! does not (yet) conform to any typed shape.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// A normalized record conforming to the common envelope plus its shelf
/// schema. Produced by exactly one connector per fetch; never mutated after
/// creation.
pub type CanonicalObject = Value;

/// A named category of canonical data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shelf {
    Identity,
    Calendar,
    Comms,
    Docs,
    Tasks,
}

impl Shelf {
    pub const ALL: [Shelf; 5] = [
        Shelf::Identity,
        Shelf::Calendar,
        Shelf::Comms,
        Shelf::Docs,
        Shelf::Tasks,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Shelf::Identity => "identity",
            Shelf::Calendar => "calendar",
            Shelf::Comms => "comms",
            Shelf::Docs => "docs",
            Shelf::Tasks => "tasks",
        }
    }

    pub fn parse(s: &str) -> Option<Shelf> {
        match s {
            "identity" => Some(Shelf::Identity),
            "calendar" => Some(Shelf::Calendar),
            "comms" => Some(Shelf::Comms),
            "docs" => Some(Shelf::Docs),
            "tasks" => Some(Shelf::Tasks),
            _ => None,
        }
    }
}

impl fmt::Display for Shelf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access-restriction tier, `S1` (least restricted) to `S3` (most).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sensitivity {
    S1,
    S2,
    S3,
}

impl Sensitivity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sensitivity::S1 => "S1",
            Sensitivity::S2 => "S2",
            Sensitivity::S3 => "S3",
        }
    }

    pub fn parse(s: &str) -> Option<Sensitivity> {
        match s {
            "S1" => Some(Sensitivity::S1),
            "S2" => Some(Sensitivity::S2),
            "S3" => Some(Sensitivity::S3),
            _ => None,
        }
    }
}

// ============================================================================
// Closed value sets, per shelf schema
// ============================================================================

pub const IDENTITY_TYPES: &[&str] = &["person", "org", "role"];
pub const COMMS_TYPES: &[&str] = &["email", "message", "call"];
pub const CALENDAR_TYPES: &[&str] = &["event", "reminder", "block"];
pub const CALENDAR_STATUSES: &[&str] = &["confirmed", "tentative", "cancelled"];
pub const ATTENDEE_STATUSES: &[&str] = &["accepted", "declined", "tentative", "pending"];
pub const DOCS_TYPES: &[&str] = &["note", "file", "snippet", "bookmark"];
pub const TASK_TYPES: &[&str] = &["task", "project", "milestone"];
pub const TASK_STATUSES: &[&str] = &["pending", "active", "blocked", "completed", "cancelled"];
pub const TASK_PRIORITIES: &[&str] = &["low", "medium", "high", "urgent"];
pub const SENSITIVITY_TIERS: &[&str] = &["S1", "S2", "S3"];

// ============================================================================
// Source pointers
// ============================================================================

/// Provenance record attached to every canonical object. `hash` is a content
/// digest of the raw upstream record, used for change and duplicate
/// detection downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePointer {
    pub system: String,
    pub external_id: String,
    pub url: Option<String>,
    pub hash: String,
}

impl SourcePointer {
    /// Build a pointer for a raw upstream record. The digest is SHA-256 over
    /// the record serialized with sorted keys, so re-fetching an unchanged
    /// record yields the same hash.
    pub fn for_raw(system: &str, raw: &Value, external_id: &str, url: Option<String>) -> Self {
        let encoded = serde_json::to_string(raw).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(encoded.as_bytes());
        SourcePointer {
            system: system.to_string(),
            external_id: external_id.to_string(),
            url,
            hash: hex::encode(hasher.finalize()),
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_shelf_roundtrip() {
        for shelf in Shelf::ALL {
            assert_eq!(Shelf::parse(shelf.as_str()), Some(shelf));
        }
        assert_eq!(Shelf::parse("bookcase"), None);
    }

    #[test]
    fn test_source_pointer_hash_is_key_order_independent() {
        // serde_json's default map is sorted, so logically identical records
        // digest identically regardless of upstream field order.
        let a: Value = serde_json::from_str(r#"{"id": "1", "summary": "Standup"}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"summary": "Standup", "id": "1"}"#).unwrap();

        let pa = SourcePointer::for_raw("google_calendar", &a, "1", None);
        let pb = SourcePointer::for_raw("google_calendar", &b, "1", None);
        assert_eq!(pa.hash, pb.hash);
    }

    #[test]
    fn test_source_pointer_hash_tracks_content() {
        let a = json!({"id": "1", "summary": "Standup"});
        let b = json!({"id": "1", "summary": "Retro"});

        let pa = SourcePointer::for_raw("google_calendar", &a, "1", None);
        let pb = SourcePointer::for_raw("google_calendar", &b, "1", None);
        assert_ne!(pa.hash, pb.hash);
    }

    #[test]
    fn test_source_pointer_serializes_with_null_url() {
        let pointer = SourcePointer::for_raw("gmail", &json!({"id": "m1"}), "m1", None);
        let value = pointer.to_value();
        assert_eq!(value["system"], "gmail");
        assert_eq!(value["external_id"], "m1");
        assert!(value["url"].is_null());
        assert_eq!(value["hash"].as_str().unwrap().len(), 64);
    }
}
