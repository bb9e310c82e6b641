//! Gmail connector — comms shelf.
//!
//! Lists messages matching the request filters, then fetches metadata
//! headers for each and normalizes to canonical comms objects. Individual
//! message-fetch failures are skipped; the rest of the batch still serves.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Local, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::CapError;
use crate::filters::FilterParams;
use crate::types::{Sensitivity, Shelf, SourcePointer};

use super::Connector;

const API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

/// Messages fetched when the request carries no limit.
const DEFAULT_LIMIT: usize = 100;

/// Lookback window when the request carries no `timestamp_after`.
const DEFAULT_SINCE_DAYS: i64 = 7;

// ============================================================================
// API response types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageListResponse {
    #[serde(default)]
    messages: Vec<MessageStub>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageStub {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageDetail {
    #[serde(default)]
    id: String,
    #[serde(default)]
    thread_id: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    label_ids: Vec<String>,
    #[serde(default)]
    internal_date: Option<String>,
    payload: Option<MessagePayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagePayload {
    #[serde(default)]
    headers: Vec<Header>,
}

#[derive(Debug, Deserialize)]
struct Header {
    #[serde(default)]
    name: String,
    #[serde(default)]
    value: String,
}

impl MessageDetail {
    fn header(&self, name: &str) -> Option<&str> {
        self.payload.as_ref().and_then(|p| {
            p.headers
                .iter()
                .find(|h| h.name.eq_ignore_ascii_case(name))
                .map(|h| h.value.as_str())
        })
    }
}

// ============================================================================
// Connector
// ============================================================================

pub struct GmailConnector {
    access_token: Option<String>,
    client: reqwest::Client,
    authenticated: AtomicBool,
}

impl GmailConnector {
    pub fn new(config: HashMap<String, String>) -> Self {
        Self {
            access_token: config.get("access_token").cloned(),
            client: reqwest::Client::new(),
            authenticated: AtomicBool::new(false),
        }
    }

    fn token(&self) -> Result<&str, CapError> {
        self.access_token.as_deref().ok_or_else(|| {
            CapError::Authentication("Gmail access token not configured".to_string())
        })
    }

    async fn ensure_authenticated(&self) -> Result<(), CapError> {
        if self.authenticated.load(Ordering::Relaxed) {
            return Ok(());
        }
        self.authenticate().await
    }

    /// Gmail search expression for the request filters.
    fn search_query(filters: &FilterParams) -> String {
        let since = filters
            .date("timestamp_after")
            .unwrap_or_else(|| Local::now().date_naive() - Duration::days(DEFAULT_SINCE_DAYS));
        let mut q = format!("after:{}", since.format("%Y/%m/%d"));

        if let Some(before) = filters.date("timestamp_before") {
            q.push_str(&format!(" before:{}", before.format("%Y/%m/%d")));
        }
        if let Some(from) = filters.get("from") {
            q.push_str(&format!(" from:{from}"));
        }
        if let Some(to) = filters.get("to") {
            q.push_str(&format!(" to:{to}"));
        }
        match filters.get("is_read") {
            Some("true") => q.push_str(" is:read"),
            Some("false") => q.push_str(" is:unread"),
            _ => {}
        }
        q
    }

    /// Normalize one message (typed view + raw record) to the canonical
    /// comms schema.
    fn normalize_message(&self, detail: &MessageDetail, raw: &Value) -> Value {
        let timestamp = detail
            .internal_date
            .as_deref()
            .and_then(|ms| ms.parse::<i64>().ok())
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .or_else(|| {
                detail
                    .header("Date")
                    .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
                    .map(|d| d.with_timezone(&Utc))
            })
            .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
            .unwrap_or_default();

        let to: Vec<String> = detail
            .header("To")
            .map(|to| {
                to.split(',')
                    .map(|addr| addr.trim().to_string())
                    .filter(|addr| !addr.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let is_read = !detail.label_ids.iter().any(|label| label == "UNREAD");
        let url = format!("https://mail.google.com/mail/u/0/#inbox/{}", detail.id);
        let source = SourcePointer::for_raw("gmail", raw, &detail.id, Some(url));

        json!({
            "id": detail.id.clone(),
            "type": "email",
            "thread_id": detail.thread_id.clone(),
            "from": detail.header("From").unwrap_or_default(),
            "to": to,
            "subject": detail.header("Subject").unwrap_or_default(),
            "timestamp": timestamp.clone(),
            "is_read": is_read,
            "body_preview": detail.snippet.clone(),
            "created_at": timestamp.clone(),
            "updated_at": timestamp,
            "source": source.to_value(),
            "confidence": 1.0,
            "sensitivity": Sensitivity::S2.as_str(),
        })
    }
}

#[async_trait]
impl Connector for GmailConnector {
    fn name(&self) -> &str {
        "gmail"
    }

    fn supported_shelves(&self) -> &[Shelf] {
        &[Shelf::Comms]
    }

    async fn authenticate(&self) -> Result<(), CapError> {
        let token = self.token()?;

        let resp = self
            .client
            .get(format!("{API_BASE}/users/me/profile"))
            .bearer_auth(token)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            self.authenticated.store(true, Ordering::Relaxed);
            Ok(())
        } else if status == reqwest::StatusCode::UNAUTHORIZED {
            Err(CapError::Authentication("Gmail token rejected".to_string()))
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(CapError::Upstream(format!(
                "Gmail auth probe failed: HTTP {status}: {body}"
            )))
        }
    }

    async fn fetch_comms(&self, filters: &FilterParams) -> Result<Vec<Value>, CapError> {
        self.ensure_authenticated().await?;

        let limit = filters.limit_or(DEFAULT_LIMIT);
        let q = Self::search_query(filters);

        let resp = self
            .client
            .get(format!("{API_BASE}/users/me/messages"))
            .bearer_auth(self.token()?)
            .query(&[("q", q.as_str()), ("maxResults", &limit.to_string())])
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(CapError::Authentication(
                "Gmail token expired or revoked".to_string(),
            ));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CapError::Upstream(format!(
                "Gmail API error {status}: {body}"
            )));
        }

        let list: MessageListResponse = resp.json().await?;

        let mut messages = Vec::with_capacity(list.messages.len());
        for stub in &list.messages {
            match self.fetch_message(&stub.id).await {
                Ok(message) => messages.push(message),
                Err(e) => log::debug!("skipping message {}: {e}", stub.id),
            }
        }
        Ok(messages)
    }
}

impl GmailConnector {
    async fn fetch_message(&self, id: &str) -> Result<Value, CapError> {
        let resp = self
            .client
            .get(format!("{API_BASE}/users/me/messages/{id}"))
            .bearer_auth(self.token()?)
            .query(&[
                ("format", "metadata"),
                ("metadataHeaders", "From"),
                ("metadataHeaders", "To"),
                ("metadataHeaders", "Subject"),
                ("metadataHeaders", "Date"),
            ])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CapError::Upstream(format!(
                "Gmail message fetch {status}: {body}"
            )));
        }

        let raw: Value = resp.json().await?;
        let detail: MessageDetail = serde_json::from_value(raw.clone())?;
        Ok(self.normalize_message(&detail, &raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator;

    fn connector() -> GmailConnector {
        GmailConnector::new(HashMap::new())
    }

    fn raw_message() -> Value {
        json!({
            "id": "msg_1",
            "threadId": "thread_9",
            "snippet": "Attached are the Q3 projections...",
            "labelIds": ["INBOX", "UNREAD"],
            "internalDate": "1754642400000",
            "payload": {
                "headers": [
                    {"name": "From", "value": "ada@example.com"},
                    {"name": "To", "value": "grace@example.com, alan@example.com"},
                    {"name": "Subject", "value": "Q3 projections"},
                    {"name": "Date", "value": "Fri, 8 Aug 2026 10:00:00 +0000"}
                ]
            }
        })
    }

    #[test]
    fn test_normalize_message_produces_canonical_object() {
        let raw = raw_message();
        let detail: MessageDetail = serde_json::from_value(raw.clone()).unwrap();
        let message = connector().normalize_message(&detail, &raw);

        assert_eq!(message["id"], "msg_1");
        assert_eq!(message["type"], "email");
        assert_eq!(message["thread_id"], "thread_9");
        assert_eq!(message["from"], "ada@example.com");
        assert_eq!(
            message["to"],
            json!(["grace@example.com", "alan@example.com"])
        );
        assert_eq!(message["is_read"], false);
        assert_eq!(message["source"]["system"], "gmail");
        assert_eq!(message["sensitivity"], "S2");

        let report = validator::validate(&message, Some(Shelf::Comms));
        assert!(report.is_valid(), "errors: {:?}", report.errors);
    }

    #[test]
    fn test_read_state_follows_unread_label() {
        let mut raw = raw_message();
        raw["labelIds"] = json!(["INBOX"]);
        let detail: MessageDetail = serde_json::from_value(raw.clone()).unwrap();
        let message = connector().normalize_message(&detail, &raw);
        assert_eq!(message["is_read"], true);
    }

    #[test]
    fn test_search_query_from_filters() {
        let filters = FilterParams::new()
            .with("timestamp_after", "2026-08-01")
            .with("from", "ada@example.com")
            .with("is_read", "false");

        let q = GmailConnector::search_query(&filters);
        assert_eq!(q, "after:2026/08/01 from:ada@example.com is:unread");
    }

    #[test]
    fn test_search_query_defaults_to_lookback_window() {
        let q = GmailConnector::search_query(&FilterParams::new());
        assert!(q.starts_with("after:"), "got {q}");
    }

    #[tokio::test]
    async fn test_missing_token_is_an_authentication_error() {
        let err = connector().authenticate().await.unwrap_err();
        assert!(matches!(err, CapError::Authentication(_)));
    }
}
