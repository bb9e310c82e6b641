//! Export canonical shelf data to CSV, JSON, or Markdown.
//!
//! Downstream consumers of the canonical schema; the field lists double as
//! a human-readable schema reference. No aggregation logic here.

use chrono::Utc;
use serde_json::{json, Value};

use crate::types::Shelf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
    Markdown,
}

impl ExportFormat {
    pub fn parse(s: &str) -> Option<ExportFormat> {
        match s {
            "csv" => Some(ExportFormat::Csv),
            "json" => Some(ExportFormat::Json),
            "markdown" | "md" => Some(ExportFormat::Markdown),
            _ => None,
        }
    }
}

/// Render shelf items in the requested format.
pub fn export(format: ExportFormat, shelf: Shelf, items: &[Value]) -> String {
    match format {
        ExportFormat::Csv => to_csv(shelf, items),
        ExportFormat::Json => to_json(shelf, items),
        ExportFormat::Markdown => to_markdown(shelf, items),
    }
}

// ============================================================================
// CSV
// ============================================================================

/// Envelope columns present on every shelf.
const COMMON_FIELDS: &[&str] = &[
    "id",
    "created_at",
    "updated_at",
    "source_system",
    "confidence",
    "sensitivity",
];

fn shelf_fields(shelf: Shelf) -> &'static [&'static str] {
    match shelf {
        Shelf::Calendar => &[
            "type",
            "title",
            "start_time",
            "end_time",
            "all_day",
            "location",
            "status",
        ],
        Shelf::Tasks => &["type", "title", "status", "priority", "due_date", "project"],
        Shelf::Comms => &[
            "type",
            "thread_id",
            "from",
            "to",
            "subject",
            "timestamp",
            "is_read",
        ],
        Shelf::Identity => &["type", "name_full", "name_display", "emails", "phones", "tags"],
        Shelf::Docs => &["type", "title", "content_preview", "url", "tags"],
    }
}

pub fn to_csv(shelf: Shelf, items: &[Value]) -> String {
    let fields: Vec<&str> = COMMON_FIELDS
        .iter()
        .chain(shelf_fields(shelf))
        .copied()
        .collect();

    let mut out = fields.join(",");
    out.push('\n');

    for item in items {
        let row: Vec<String> = fields
            .iter()
            .map(|field| csv_escape(&flat_field(item, field)))
            .collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

/// Flatten nested canonical structures into one CSV cell.
fn flat_field(item: &Value, field: &str) -> String {
    match field {
        "source_system" => item
            .pointer("/source/system")
            .map(cell_text)
            .unwrap_or_default(),
        "name_full" => item.pointer("/name/full").map(cell_text).unwrap_or_default(),
        "name_display" => item
            .pointer("/name/display")
            .map(cell_text)
            .unwrap_or_default(),
        _ => item.get(field).map(cell_text).unwrap_or_default(),
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        // Arrays (emails, phones, tags, to) become comma-separated lists.
        Value::Array(items) => items
            .iter()
            .map(cell_text)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

fn csv_escape(cell: &str) -> String {
    if cell.contains(',') || cell.contains('"') || cell.contains('\n') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

// ============================================================================
// JSON
// ============================================================================

pub fn to_json(shelf: Shelf, items: &[Value]) -> String {
    let envelope = json!({
        "shelf": shelf,
        "exported_at": Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        "count": items.len(),
        "items": items,
    });
    serde_json::to_string_pretty(&envelope).unwrap_or_default()
}

// ============================================================================
// Markdown
// ============================================================================

pub fn to_markdown(shelf: Shelf, items: &[Value]) -> String {
    let mut out = format!(
        "# {} Export\n\n**Exported:** {}\n\n**Total Items:** {}\n\n---\n\n",
        title_case(shelf.as_str()),
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC"),
        items.len()
    );

    match shelf {
        Shelf::Calendar => calendar_markdown(items, &mut out),
        Shelf::Tasks => tasks_markdown(items, &mut out),
        Shelf::Comms => comms_markdown(items, &mut out),
        Shelf::Identity => identity_markdown(items, &mut out),
        Shelf::Docs => docs_markdown(items, &mut out),
    }
    out
}

fn text<'a>(item: &'a Value, field: &str) -> Option<&'a str> {
    item.get(field).and_then(Value::as_str)
}

fn calendar_markdown(items: &[Value], out: &mut String) {
    for item in items {
        out.push_str(&format!(
            "## {}\n\n**When:** {} - {}\n\n",
            text(item, "title").unwrap_or("Untitled Event"),
            text(item, "start_time").unwrap_or("N/A"),
            text(item, "end_time").unwrap_or("N/A"),
        ));
        if let Some(location) = text(item, "location") {
            out.push_str(&format!("**Location:** {location}\n\n"));
        }
        if let Some(attendees) = item.get("attendees").and_then(Value::as_array) {
            if !attendees.is_empty() {
                out.push_str("**Attendees:**\n");
                for attendee in attendees {
                    out.push_str(&format!(
                        "- {} ({})\n",
                        text(attendee, "email").unwrap_or("Unknown"),
                        text(attendee, "status").unwrap_or("pending"),
                    ));
                }
                out.push('\n');
            }
        }
        out.push_str(&format!(
            "**Status:** {}\n\n---\n\n",
            text(item, "status").unwrap_or("unknown")
        ));
    }
}

fn tasks_markdown(items: &[Value], out: &mut String) {
    // Group by status, first-seen order.
    let mut groups: Vec<(&str, Vec<&Value>)> = Vec::new();
    for item in items {
        let status = text(item, "status").unwrap_or("unknown");
        match groups.iter().position(|(s, _)| *s == status) {
            Some(i) => groups[i].1.push(item),
            None => groups.push((status, vec![item])),
        }
    }

    for (status, tasks) in groups {
        out.push_str(&format!("## {} Tasks\n\n", title_case(status)));
        for task in tasks {
            let priority = text(task, "priority").unwrap_or("medium");
            let marker = match priority {
                "urgent" => "[!!]",
                "high" => "[!]",
                "medium" => "[-]",
                "low" => "[ ]",
                _ => "[?]",
            };
            out.push_str(&format!(
                "- {marker} **{}**",
                text(task, "title").unwrap_or("Untitled Task")
            ));
            if let Some(due) = text(task, "due_date") {
                out.push_str(&format!(" (Due: {due})"));
            }
            if let Some(project) = text(task, "project") {
                out.push_str(&format!(" - *{project}*"));
            }
            out.push('\n');
        }
        out.push('\n');
    }
}

fn comms_markdown(items: &[Value], out: &mut String) {
    for item in items {
        out.push_str(&format!(
            "## {}\n\n**From:** {}\n\n",
            text(item, "subject").unwrap_or("No Subject"),
            text(item, "from").unwrap_or("Unknown"),
        ));
        if let Some(to) = item.get("to").and_then(Value::as_array) {
            let list: Vec<&str> = to.iter().filter_map(Value::as_str).collect();
            if !list.is_empty() {
                out.push_str(&format!("**To:** {}\n\n", list.join(", ")));
            }
        }
        out.push_str(&format!(
            "**Time:** {}\n\n",
            text(item, "timestamp").unwrap_or("N/A")
        ));
        if let Some(preview) = text(item, "body_preview") {
            out.push_str(&format!("**Preview:** {preview}\n\n"));
        }
        out.push_str("---\n\n");
    }
}

fn identity_markdown(items: &[Value], out: &mut String) {
    for item in items {
        let display = item
            .pointer("/name/display")
            .or_else(|| item.pointer("/name/full"))
            .and_then(Value::as_str)
            .unwrap_or("Unknown");
        out.push_str(&format!(
            "## {display}\n\n**Type:** {}\n\n",
            text(item, "type").unwrap_or("unknown")
        ));

        for (label, field) in [("Emails", "emails"), ("Phones", "phones")] {
            if let Some(values) = item.get(field).and_then(Value::as_array) {
                if !values.is_empty() {
                    out.push_str(&format!("**{label}:**\n"));
                    for value in values.iter().filter_map(Value::as_str) {
                        out.push_str(&format!("- {value}\n"));
                    }
                    out.push('\n');
                }
            }
        }

        if let Some(tags) = item.get("tags").and_then(Value::as_array) {
            let list: Vec<&str> = tags.iter().filter_map(Value::as_str).collect();
            if !list.is_empty() {
                out.push_str(&format!("**Tags:** {}\n\n", list.join(", ")));
            }
        }
        out.push_str("---\n\n");
    }
}

fn docs_markdown(items: &[Value], out: &mut String) {
    for item in items {
        out.push_str(&format!(
            "## {}\n\n**Type:** {}\n\n",
            text(item, "title").unwrap_or("Untitled Document"),
            text(item, "type").unwrap_or("unknown"),
        ));
        if let Some(url) = text(item, "url") {
            out.push_str(&format!("**URL:** [{url}]({url})\n\n"));
        }
        if let Some(preview) = text(item, "content_preview") {
            out.push_str(&format!("**Preview:**\n\n{preview}\n\n"));
        }
        if let Some(tags) = item.get("tags").and_then(Value::as_array) {
            let list: Vec<&str> = tags.iter().filter_map(Value::as_str).collect();
            if !list.is_empty() {
                out.push_str(&format!("**Tags:** {}\n\n", list.join(", ")));
            }
        }
        out.push_str("---\n\n");
    }
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tasks() -> Vec<Value> {
        vec![
            json!({
                "id": "t1",
                "type": "task",
                "title": "Ship the report, finally",
                "status": "active",
                "priority": "high",
                "due_date": "2026-08-10",
                "created_at": "2026-08-01T09:00:00Z",
                "updated_at": "2026-08-01T09:00:00Z",
                "source": {"system": "test", "external_id": "t1"},
                "confidence": 1.0,
                "sensitivity": "S1"
            }),
            json!({
                "id": "t2",
                "type": "task",
                "title": "Sharpen pencils",
                "status": "pending",
                "priority": "low",
                "created_at": "2026-08-01T09:00:00Z",
                "updated_at": "2026-08-01T09:00:00Z",
                "source": {"system": "test", "external_id": "t2"},
                "confidence": 1.0,
                "sensitivity": "S1"
            }),
        ]
    }

    #[test]
    fn test_csv_header_and_rows() {
        let csv = to_csv(Shelf::Tasks, &tasks());
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(
            lines[0],
            "id,created_at,updated_at,source_system,confidence,sensitivity,type,title,status,priority,due_date,project"
        );
        assert_eq!(lines.len(), 3);
        // Comma in the title forces quoting.
        assert!(lines[1].contains("\"Ship the report, finally\""));
        assert!(lines[1].contains("test"));
    }

    #[test]
    fn test_csv_flattens_arrays_and_nested_names() {
        let person = json!({
            "id": "p1",
            "type": "person",
            "name": {"full": "Ada Lovelace", "display": "Ada"},
            "emails": ["ada@example.com", "al@example.org"],
            "created_at": "2026-08-01T09:00:00Z",
            "updated_at": "2026-08-01T09:00:00Z",
            "source": {"system": "test", "external_id": "p1"},
            "confidence": 0.9,
            "sensitivity": "S2"
        });
        let csv = to_csv(Shelf::Identity, &[person]);
        assert!(csv.contains("Ada Lovelace"));
        assert!(csv.contains("\"ada@example.com, al@example.org\""));
    }

    #[test]
    fn test_json_envelope() {
        let out = to_json(Shelf::Tasks, &tasks());
        let parsed: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(parsed["shelf"], "tasks");
        assert_eq!(parsed["count"], 2);
        assert_eq!(parsed["items"].as_array().unwrap().len(), 2);
        assert!(parsed["exported_at"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_markdown_groups_tasks_by_status() {
        let md = to_markdown(Shelf::Tasks, &tasks());
        assert!(md.contains("# Tasks Export"));
        assert!(md.contains("## Active Tasks"));
        assert!(md.contains("## Pending Tasks"));
        assert!(md.contains("(Due: 2026-08-10)"));
    }

    #[test]
    fn test_markdown_calendar_renders_attendees() {
        let event = json!({
            "id": "e1",
            "title": "Planning",
            "start_time": "2026-08-10T10:00:00Z",
            "end_time": "2026-08-10T11:00:00Z",
            "status": "confirmed",
            "attendees": [{"email": "ada@example.com", "status": "accepted"}]
        });
        let md = to_markdown(Shelf::Calendar, &[event]);
        assert!(md.contains("## Planning"));
        assert!(md.contains("- ada@example.com (accepted)"));
        assert!(md.contains("**Status:** confirmed"));
    }

    #[test]
    fn test_empty_export_still_has_header() {
        let csv = to_csv(Shelf::Docs, &[]);
        assert_eq!(csv.lines().count(), 1);

        let md = to_markdown(Shelf::Docs, &[]);
        assert!(md.contains("**Total Items:** 0"));
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(ExportFormat::parse("csv"), Some(ExportFormat::Csv));
        assert_eq!(ExportFormat::parse("md"), Some(ExportFormat::Markdown));
        assert_eq!(ExportFormat::parse("yaml"), None);
    }
}
