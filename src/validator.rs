//! Canonical-object contract checker.
//!
//! Two independent phases: the common envelope (always), then the
//! shelf-specific schema (when the shelf is known or structurally
//! inferable). Produces an error list of violations, which fail validation
//! when non-empty, and a warning list of recommended-but-absent fields,
//! which never affects pass/fail. Side-effect free.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};

use crate::types::{
    Shelf, ATTENDEE_STATUSES, CALENDAR_STATUSES, CALENDAR_TYPES, COMMS_TYPES, DOCS_TYPES,
    IDENTITY_TYPES, SENSITIVITY_TIERS, TASK_PRIORITIES, TASK_STATUSES, TASK_TYPES,
};

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate a canonical object against the common envelope and, when known
/// or inferable, its shelf schema.
pub fn validate(data: &Value, shelf: Option<Shelf>) -> ValidationReport {
    let mut report = ValidationReport::default();

    let Some(obj) = data.as_object() else {
        report.errors.push("object must be a JSON map".to_string());
        return report;
    };

    check_envelope(obj, &mut report);

    match shelf.or_else(|| infer_shelf(obj)) {
        Some(Shelf::Identity) => check_identity(obj, &mut report),
        Some(Shelf::Comms) => check_comms(obj, &mut report),
        Some(Shelf::Calendar) => check_calendar(obj, &mut report),
        Some(Shelf::Docs) => check_docs(obj, &mut report),
        Some(Shelf::Tasks) => check_tasks(obj, &mut report),
        None => report
            .warnings
            .push("could not infer shelf type from object structure".to_string()),
    }

    report
}

/// Infer the shelf from object structure. Priority order, first match wins.
pub fn infer_shelf(obj: &Map<String, Value>) -> Option<Shelf> {
    if obj.contains_key("name") && obj.contains_key("emails") {
        Some(Shelf::Identity)
    } else if obj.contains_key("thread_id") && obj.contains_key("from") {
        Some(Shelf::Comms)
    } else if obj.contains_key("start_time") && obj.contains_key("end_time") {
        Some(Shelf::Calendar)
    } else if obj.contains_key("content_preview") || obj.contains_key("url") {
        Some(Shelf::Docs)
    } else if obj.contains_key("status") && obj.contains_key("priority") {
        Some(Shelf::Tasks)
    } else {
        None
    }
}

// ============================================================================
// Phase 1: common envelope
// ============================================================================

fn check_envelope(obj: &Map<String, Value>, report: &mut ValidationReport) {
    for field in ["id", "created_at", "updated_at", "source", "confidence", "sensitivity"] {
        if !obj.contains_key(field) {
            report.errors.push(format!("Missing required field: {field}"));
        }
    }

    if let Some(id) = obj.get("id") {
        if !id.is_string() {
            report.errors.push("Field 'id' must be a string".to_string());
        }
    }

    for field in ["created_at", "updated_at"] {
        if let Some(value) = obj.get(field) {
            check_iso8601(value, field, report);
        }
    }

    if let Some(source) = obj.get("source") {
        check_source_pointer(source, report);
    }

    if let Some(confidence) = obj.get("confidence") {
        match confidence.as_f64() {
            Some(c) if (0.0..=1.0).contains(&c) => {}
            Some(c) => report.errors.push(format!(
                "Field 'confidence' must be between 0.0 and 1.0, got {c}"
            )),
            None => report
                .errors
                .push("Field 'confidence' must be a number".to_string()),
        }
    }

    if let Some(sensitivity) = obj.get("sensitivity") {
        let tier = sensitivity.as_str().unwrap_or_default();
        if !SENSITIVITY_TIERS.contains(&tier) {
            report.errors.push(format!(
                "Invalid sensitivity tier: {sensitivity}. Valid values: {}",
                SENSITIVITY_TIERS.join(", ")
            ));
        }
    }
}

fn check_source_pointer(source: &Value, report: &mut ValidationReport) {
    let Some(obj) = source.as_object() else {
        report.errors.push("Field 'source' must be an object".to_string());
        return;
    };

    for field in ["system", "external_id"] {
        if !obj.contains_key(field) {
            report
                .errors
                .push(format!("Missing required field in source: {field}"));
        }
    }

    if let Some(url) = obj.get("url") {
        if !url.is_string() && !url.is_null() {
            report
                .errors
                .push("Field 'source.url' must be a string or null".to_string());
        }
    }
}

/// ISO-8601 acceptance: RFC 3339 (a trailing `Z` means UTC), naive
/// datetimes with or without fractional seconds, and bare dates.
fn parse_iso8601(value: &str) -> bool {
    DateTime::parse_from_rfc3339(&value.replace('Z', "+00:00")).is_ok()
        || DateTime::parse_from_rfc3339(value).is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

fn check_iso8601(value: &Value, field: &str, report: &mut ValidationReport) {
    let Some(s) = value.as_str() else {
        report
            .errors
            .push(format!("Field '{field}' must be an ISO8601 string"));
        return;
    };
    if !parse_iso8601(s) {
        report.errors.push(format!(
            "Field '{field}' is not a valid ISO8601 timestamp: {s}"
        ));
    }
}

fn check_enum(
    obj: &Map<String, Value>,
    field: &str,
    valid: &[&str],
    label: &str,
    report: &mut ValidationReport,
) {
    if let Some(value) = obj.get(field) {
        let v = value.as_str().unwrap_or_default();
        if !valid.contains(&v) {
            report.errors.push(format!(
                "Invalid {label}: {value}. Valid values: {}",
                valid.join(", ")
            ));
        }
    }
}

fn check_array(obj: &Map<String, Value>, field: &str, report: &mut ValidationReport) {
    if let Some(value) = obj.get(field) {
        if !value.is_array() {
            report
                .errors
                .push(format!("Field '{field}' must be an array"));
        }
    }
}

fn check_bool(obj: &Map<String, Value>, field: &str, report: &mut ValidationReport) {
    if let Some(value) = obj.get(field) {
        if !value.is_boolean() {
            report
                .errors
                .push(format!("Field '{field}' must be a boolean"));
        }
    }
}

fn require(obj: &Map<String, Value>, fields: &[&str], report: &mut ValidationReport) {
    for field in fields {
        if !obj.contains_key(*field) {
            report.errors.push(format!("Missing required field: {field}"));
        }
    }
}

// ============================================================================
// Phase 2: shelf-specific schemas
// ============================================================================

fn check_identity(obj: &Map<String, Value>, report: &mut ValidationReport) {
    check_enum(obj, "type", IDENTITY_TYPES, "identity type", report);

    if let Some(name) = obj.get("name") {
        match name.as_object() {
            Some(name) => {
                if !name.contains_key("full") {
                    report
                        .warnings
                        .push("Missing recommended field: name.full".to_string());
                }
                if !name.contains_key("display") {
                    report
                        .warnings
                        .push("Missing recommended field: name.display".to_string());
                }
            }
            None => report
                .errors
                .push("Field 'name' must be an object".to_string()),
        }
    }

    check_array(obj, "emails", report);
    check_array(obj, "phones", report);
    check_array(obj, "tags", report);
}

fn check_comms(obj: &Map<String, Value>, report: &mut ValidationReport) {
    check_enum(obj, "type", COMMS_TYPES, "comms type", report);
    require(obj, &["from", "to", "timestamp"], report);
    check_array(obj, "to", report);

    if let Some(timestamp) = obj.get("timestamp") {
        check_iso8601(timestamp, "timestamp", report);
    }

    check_bool(obj, "is_read", report);
}

fn check_calendar(obj: &Map<String, Value>, report: &mut ValidationReport) {
    check_enum(obj, "type", CALENDAR_TYPES, "calendar type", report);
    require(obj, &["title", "start_time", "end_time"], report);

    for field in ["start_time", "end_time"] {
        if let Some(value) = obj.get(field) {
            check_iso8601(value, field, report);
        }
    }

    check_bool(obj, "all_day", report);
    check_enum(obj, "status", CALENDAR_STATUSES, "calendar status", report);

    if let Some(attendees) = obj.get("attendees") {
        let Some(attendees) = attendees.as_array() else {
            report
                .errors
                .push("Field 'attendees' must be an array".to_string());
            return;
        };
        for (i, attendee) in attendees.iter().enumerate() {
            let Some(attendee) = attendee.as_object() else {
                report.errors.push(format!("Attendee {i} must be an object"));
                continue;
            };
            if !attendee.contains_key("email") {
                report
                    .errors
                    .push(format!("Attendee {i} missing required field: email"));
            }
            if let Some(status) = attendee.get("status") {
                let s = status.as_str().unwrap_or_default();
                if !ATTENDEE_STATUSES.contains(&s) {
                    report
                        .errors
                        .push(format!("Invalid attendee status: {status}"));
                }
            }
        }
    }
}

fn check_docs(obj: &Map<String, Value>, report: &mut ValidationReport) {
    check_enum(obj, "type", DOCS_TYPES, "docs type", report);
    require(obj, &["title"], report);
    check_array(obj, "tags", report);
}

fn check_tasks(obj: &Map<String, Value>, report: &mut ValidationReport) {
    check_enum(obj, "type", TASK_TYPES, "task type", report);
    require(obj, &["title", "status", "priority"], report);
    check_enum(obj, "status", TASK_STATUSES, "task status", report);
    check_enum(obj, "priority", TASK_PRIORITIES, "task priority", report);

    if let Some(due_date) = obj.get("due_date") {
        if !due_date.is_null() {
            check_iso8601(due_date, "due_date", report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_task() -> Value {
        json!({
            "id": "t1",
            "created_at": "2026-08-01T09:00:00Z",
            "updated_at": "2026-08-01T09:00:00Z",
            "source": {"system": "test", "external_id": "t1"},
            "confidence": 0.9,
            "sensitivity": "S1",
            "title": "File quarterly report",
            "status": "pending",
            "priority": "high"
        })
    }

    #[test]
    fn test_minimal_task_is_valid() {
        let report = validate(&minimal_task(), Some(Shelf::Tasks));
        assert!(report.errors.is_empty(), "errors: {:?}", report.errors);
        assert!(report.is_valid());
    }

    #[test]
    fn test_confidence_out_of_range_fails() {
        let mut task = minimal_task();
        task["confidence"] = json!(1.5);

        let report = validate(&task, Some(Shelf::Tasks));
        assert!(!report.is_valid());
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains("confidence")), "errors: {:?}", report.errors);
    }

    #[test]
    fn test_missing_envelope_fields_are_reported() {
        let report = validate(&json!({"title": "bare"}), Some(Shelf::Docs));
        for field in ["id", "created_at", "updated_at", "source", "confidence", "sensitivity"] {
            assert!(
                report.errors.iter().any(|e| e.contains(field)),
                "no error for {field}: {:?}",
                report.errors
            );
        }
    }

    #[test]
    fn test_invalid_sensitivity_tier() {
        let mut task = minimal_task();
        task["sensitivity"] = json!("S9");
        let report = validate(&task, Some(Shelf::Tasks));
        assert!(report.errors.iter().any(|e| e.contains("sensitivity tier")));
    }

    #[test]
    fn test_invalid_task_enums() {
        let mut task = minimal_task();
        task["status"] = json!("doing");
        task["priority"] = json!("asap");

        let report = validate(&task, Some(Shelf::Tasks));
        assert!(report.errors.iter().any(|e| e.contains("task status")));
        assert!(report.errors.iter().any(|e| e.contains("task priority")));
    }

    #[test]
    fn test_date_only_due_date_is_accepted() {
        let mut task = minimal_task();
        task["due_date"] = json!("2026-08-15");
        let report = validate(&task, Some(Shelf::Tasks));
        assert!(report.is_valid(), "errors: {:?}", report.errors);
    }

    #[test]
    fn test_source_pointer_checks() {
        let mut task = minimal_task();
        task["source"] = json!({"system": "test"});
        let report = validate(&task, Some(Shelf::Tasks));
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains("source: external_id")));

        task["source"] = json!({"system": "test", "external_id": "t1", "url": 42});
        let report = validate(&task, Some(Shelf::Tasks));
        assert!(report.errors.iter().any(|e| e.contains("source.url")));
    }

    #[test]
    fn test_attendee_structure() {
        let event = json!({
            "id": "e1",
            "created_at": "2026-08-01T09:00:00Z",
            "updated_at": "2026-08-01T09:00:00Z",
            "source": {"system": "google_calendar", "external_id": "e1"},
            "confidence": 1.0,
            "sensitivity": "S1",
            "title": "Planning",
            "start_time": "2026-08-02T10:00:00Z",
            "end_time": "2026-08-02T11:00:00Z",
            "attendees": [
                {"email": "a@example.com", "status": "accepted"},
                {"status": "maybe"}
            ]
        });

        let report = validate(&event, Some(Shelf::Calendar));
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains("Attendee 1 missing required field: email")));
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains("Invalid attendee status")));
    }

    #[test]
    fn test_shelf_inference_priority() {
        let identity = json!({"name": {"full": "Ada"}, "emails": []});
        assert_eq!(
            infer_shelf(identity.as_object().unwrap()),
            Some(Shelf::Identity)
        );

        let comms = json!({"thread_id": "th1", "from": "a@example.com"});
        assert_eq!(infer_shelf(comms.as_object().unwrap()), Some(Shelf::Comms));

        let calendar = json!({"start_time": "x", "end_time": "y"});
        assert_eq!(
            infer_shelf(calendar.as_object().unwrap()),
            Some(Shelf::Calendar)
        );

        let docs = json!({"url": "https://example.com"});
        assert_eq!(infer_shelf(docs.as_object().unwrap()), Some(Shelf::Docs));

        let tasks = json!({"status": "pending", "priority": "low"});
        assert_eq!(infer_shelf(tasks.as_object().unwrap()), Some(Shelf::Tasks));
    }

    #[test]
    fn test_uninferable_shelf_warns_but_envelope_still_checked() {
        let obj = json!({
            "id": "x1",
            "created_at": "2026-08-01T09:00:00Z",
            "updated_at": "2026-08-01T09:00:00Z",
            "source": {"system": "test", "external_id": "x1"},
            "confidence": 0.5,
            "sensitivity": "S2"
        });

        let report = validate(&obj, None);
        assert!(report.is_valid());
        assert!(report
            .warnings
            .iter()
            .any(|w| w.contains("could not infer shelf")));
    }

    #[test]
    fn test_identity_name_warnings_do_not_fail() {
        let person = json!({
            "id": "p1",
            "created_at": "2026-08-01T09:00:00Z",
            "updated_at": "2026-08-01T09:00:00Z",
            "source": {"system": "test", "external_id": "p1"},
            "confidence": 0.8,
            "sensitivity": "S2",
            "type": "person",
            "name": {},
            "emails": ["ada@example.com"]
        });

        let report = validate(&person, Some(Shelf::Identity));
        assert!(report.is_valid());
        assert_eq!(report.warnings.len(), 2);
    }

    #[test]
    fn test_non_object_input() {
        let report = validate(&json!(["not", "a", "map"]), None);
        assert!(!report.is_valid());
    }

    #[test]
    fn test_timestamp_formats() {
        for good in [
            "2026-08-01T09:00:00Z",
            "2026-08-01T09:00:00+02:00",
            "2026-08-01T09:00:00.123456Z",
            "2026-08-01T09:00:00",
            "2026-08-01",
        ] {
            assert!(parse_iso8601(good), "rejected {good}");
        }
        for bad in ["yesterday", "08/01/2026", ""] {
            assert!(!parse_iso8601(bad), "accepted {bad}");
        }
    }
}
