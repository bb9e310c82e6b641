//! Task-oriented views over aggregated shelves: the daily briefing, client
//! pipeline, and knowledge search. Pure consumers; every item comes out of
//! the aggregator, and nothing here talks to a connector.

use chrono::{Duration, Local};
use serde_json::Value;

use crate::aggregator::aggregate;
use crate::error::CapError;
use crate::filters::FilterParams;
use crate::state::CapState;
use crate::types::Shelf;

fn text<'a>(item: &'a Value, field: &str) -> Option<&'a str> {
    item.get(field).and_then(Value::as_str)
}

/// Today's calendar, due tasks, and recent communications as one report.
pub async fn today_briefing(state: &CapState) -> Result<String, CapError> {
    let today = Local::now().date_naive();
    let tomorrow = today + Duration::days(1);

    let calendar = aggregate(
        state,
        Shelf::Calendar,
        &FilterParams::new()
            .with("start_date", today.to_string())
            .with("end_date", tomorrow.to_string()),
    )
    .await?;
    let tasks = aggregate(
        state,
        Shelf::Tasks,
        &FilterParams::new().with("status", "active,pending"),
    )
    .await?;
    let comms = aggregate(
        state,
        Shelf::Comms,
        &FilterParams::new()
            .with("timestamp_after", today.to_string())
            .with("limit", "10"),
    )
    .await?;

    let mut briefing = format!("# Today's Briefing - {today}\n\n");

    briefing.push_str(&format!("## Calendar ({} events)\n\n", calendar.count));
    for event in &calendar.items {
        briefing.push_str(&format!(
            "- {}: {}\n",
            text(event, "start_time").unwrap_or("TBD"),
            text(event, "title").unwrap_or("Untitled"),
        ));
    }

    let today_str = today.to_string();
    let due_today: Vec<&Value> = tasks
        .items
        .iter()
        .filter(|t| text(t, "due_date").unwrap_or("") <= today_str.as_str())
        .collect();
    briefing.push_str(&format!("\n## Tasks Due Today ({})\n\n", due_today.len()));
    for task in due_today.iter().take(10) {
        briefing.push_str(&format!(
            "- [{}] {}\n",
            text(task, "status").unwrap_or("?"),
            text(task, "title").unwrap_or("Untitled"),
        ));
    }

    briefing.push_str(&format!(
        "\n## Recent Communications ({})\n\n",
        comms.count
    ));
    for comm in comms.items.iter().take(5) {
        briefing.push_str(&format!(
            "- From {}: {}\n",
            text(comm, "from").unwrap_or("Unknown"),
            text(comm, "subject").unwrap_or("No subject"),
        ));
    }

    Ok(briefing)
}

/// Per-client overview: contacts tagged as clients, their recent
/// communications, and related tasks.
pub async fn client_pipeline(state: &CapState, client_tag: Option<&str>) -> Result<String, CapError> {
    let identity = aggregate(
        state,
        Shelf::Identity,
        &FilterParams::new().with("type", "person").with("tags", "client"),
    )
    .await?;
    let comms = aggregate(
        state,
        Shelf::Comms,
        &FilterParams::new().with("limit", "50"),
    )
    .await?;
    let tasks = aggregate(
        state,
        Shelf::Tasks,
        &FilterParams::new().with("limit", "100"),
    )
    .await?;

    let mut report = String::from("# Client Pipeline\n\n");

    for client in &identity.items {
        if let Some(tag) = client_tag {
            let tagged = client
                .get("tags")
                .and_then(Value::as_array)
                .map(|tags| tags.iter().filter_map(Value::as_str).any(|t| t == tag))
                .unwrap_or(false);
            if !tagged {
                continue;
            }
        }

        let name = client
            .pointer("/name/display")
            .or_else(|| client.pointer("/name/full"))
            .and_then(Value::as_str)
            .unwrap_or("Unknown");
        report.push_str(&format!("## {name}\n\n"));

        let emails: Vec<&str> = client
            .get("emails")
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let client_comms = comms
            .items
            .iter()
            .filter(|c| {
                text(c, "from")
                    .map(|from| emails.iter().any(|e| from.contains(e)))
                    .unwrap_or(false)
            })
            .count();
        report.push_str(&format!("- Recent communications: {client_comms}\n"));

        let lowered = name.to_lowercase();
        let client_tasks = tasks
            .items
            .iter()
            .filter(|t| {
                text(t, "title")
                    .map(|title| title.to_lowercase().contains(&lowered))
                    .unwrap_or(false)
            })
            .count();
        report.push_str(&format!("- Related tasks: {client_tasks}\n\n"));
    }

    Ok(report)
}

/// Search across documents and notes, formatted for reading.
pub async fn knowledge_search(
    state: &CapState,
    query: &str,
    limit: usize,
) -> Result<String, CapError> {
    let docs = aggregate(
        state,
        Shelf::Docs,
        &FilterParams::new()
            .with("query", query)
            .with("limit", limit.to_string()),
    )
    .await?;

    let mut results = format!("# Search Results for '{query}'\n\nFound {} results\n\n", docs.count);

    for doc in &docs.items {
        results.push_str(&format!(
            "## {}\nType: {} | Updated: {}\n",
            text(doc, "title").unwrap_or("Untitled"),
            text(doc, "type").unwrap_or("unknown"),
            text(doc, "updated_at").unwrap_or("N/A"),
        ));
        if let Some(preview) = text(doc, "content_preview") {
            results.push_str(&format!("{preview}...\n"));
        }
        results.push('\n');
    }

    Ok(results)
}
