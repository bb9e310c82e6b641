//! Google Calendar connector — calendar shelf.
//!
//! Fetches events from the Calendar API v3 with a static bearer token and
//! normalizes them to canonical calendar objects. No token refresh: the
//! token comes from connector config and auth failures degrade the request.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Local};
use serde_json::{json, Value};

use crate::error::CapError;
use crate::filters::FilterParams;
use crate::types::{Sensitivity, Shelf, SourcePointer};

use super::Connector;

const API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Window fetched when the request carries no date range.
const DEFAULT_RANGE_DAYS: i64 = 30;

pub struct GoogleCalendarConnector {
    access_token: Option<String>,
    calendar_id: String,
    client: reqwest::Client,
    authenticated: AtomicBool,
}

impl GoogleCalendarConnector {
    pub fn new(config: HashMap<String, String>) -> Self {
        Self {
            access_token: config.get("access_token").cloned(),
            calendar_id: config
                .get("calendar_id")
                .cloned()
                .unwrap_or_else(|| "primary".to_string()),
            client: reqwest::Client::new(),
            authenticated: AtomicBool::new(false),
        }
    }

    fn token(&self) -> Result<&str, CapError> {
        self.access_token.as_deref().ok_or_else(|| {
            CapError::Authentication("Google Calendar access token not configured".to_string())
        })
    }

    async fn ensure_authenticated(&self) -> Result<(), CapError> {
        if self.authenticated.load(Ordering::Relaxed) {
            return Ok(());
        }
        self.authenticate().await
    }

    /// Normalize a raw Calendar API event to the canonical calendar schema.
    fn normalize_event(&self, raw: &Value) -> Value {
        let start = raw.get("start");
        let end = raw.get("end");

        let start_time = start
            .and_then(|s| s.get("dateTime").or_else(|| s.get("date")))
            .cloned()
            .unwrap_or(Value::Null);
        let end_time = end
            .and_then(|e| e.get("dateTime").or_else(|| e.get("date")))
            .cloned()
            .unwrap_or(Value::Null);
        let all_day = start.map(|s| s.get("date").is_some()).unwrap_or(false);

        let attendees: Vec<Value> = raw
            .get("attendees")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .map(|attendee| {
                        json!({
                            "email": attendee.get("email").cloned().unwrap_or(Value::Null),
                            "status": attendee
                                .get("responseStatus")
                                .and_then(Value::as_str)
                                .unwrap_or("pending"),
                            "organizer": attendee
                                .get("organizer")
                                .and_then(Value::as_bool)
                                .unwrap_or(false),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let id = raw.get("id").and_then(Value::as_str).unwrap_or_default();
        let url = raw
            .get("htmlLink")
            .and_then(Value::as_str)
            .map(str::to_string);
        let source = SourcePointer::for_raw("google_calendar", raw, id, url);

        json!({
            "id": id,
            "type": "event",
            "title": raw.get("summary").and_then(Value::as_str).unwrap_or("Untitled Event"),
            "description": raw.get("description").cloned().unwrap_or(Value::Null),
            "start_time": start_time,
            "end_time": end_time,
            "all_day": all_day,
            "location": raw.get("location").cloned().unwrap_or(Value::Null),
            "attendees": attendees,
            "recurrence": raw.get("recurrence").cloned().unwrap_or(Value::Null),
            "calendar_name": "Google Calendar",
            "status": raw.get("status").and_then(Value::as_str).unwrap_or("confirmed"),
            "created_at": raw.get("created").cloned().unwrap_or(Value::Null),
            "updated_at": raw.get("updated").cloned().unwrap_or(Value::Null),
            "source": source.to_value(),
            "confidence": 1.0,
            "sensitivity": Sensitivity::S1.as_str(),
        })
    }
}

#[async_trait]
impl Connector for GoogleCalendarConnector {
    fn name(&self) -> &str {
        "google_calendar"
    }

    fn supported_shelves(&self) -> &[Shelf] {
        &[Shelf::Calendar]
    }

    async fn authenticate(&self) -> Result<(), CapError> {
        let token = self.token()?;

        // Probe the token against the calendar list.
        let resp = self
            .client
            .get(format!("{API_BASE}/users/me/calendarList"))
            .bearer_auth(token)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            self.authenticated.store(true, Ordering::Relaxed);
            Ok(())
        } else if status == reqwest::StatusCode::UNAUTHORIZED {
            Err(CapError::Authentication(
                "Google Calendar token rejected".to_string(),
            ))
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(CapError::Upstream(format!(
                "Google Calendar auth probe failed: HTTP {status}: {body}"
            )))
        }
    }

    async fn fetch_calendar(&self, filters: &FilterParams) -> Result<Vec<Value>, CapError> {
        self.ensure_authenticated().await?;

        let today = Local::now().date_naive();
        let start = filters.date("start_date").unwrap_or(today);
        let end = filters
            .date("end_date")
            .unwrap_or(today + Duration::days(DEFAULT_RANGE_DAYS));
        let time_min = format!("{start}T00:00:00Z");
        let time_max = format!("{end}T23:59:59Z");

        let resp = self
            .client
            .get(format!("{API_BASE}/calendars/{}/events", self.calendar_id))
            .bearer_auth(self.token()?)
            .query(&[
                ("timeMin", time_min.as_str()),
                ("timeMax", time_max.as_str()),
                ("singleEvents", "true"),
                ("orderBy", "startTime"),
            ])
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(CapError::Authentication(
                "Google Calendar token expired or revoked".to_string(),
            ));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(CapError::Upstream(format!(
                "Google Calendar API error {status}: {body}"
            )));
        }

        let data: Value = resp.json().await?;
        let events = data
            .get("items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(events.iter().map(|e| self.normalize_event(e)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator;

    fn connector() -> GoogleCalendarConnector {
        GoogleCalendarConnector::new(HashMap::new())
    }

    fn raw_event() -> Value {
        json!({
            "id": "evt_1",
            "summary": "Quarterly review",
            "description": "Numbers and narratives",
            "status": "confirmed",
            "location": "Room 4",
            "htmlLink": "https://calendar.google.com/event?eid=evt_1",
            "created": "2026-07-01T08:00:00Z",
            "updated": "2026-07-20T12:30:00Z",
            "start": {"dateTime": "2026-08-10T14:00:00Z"},
            "end": {"dateTime": "2026-08-10T15:00:00Z"},
            "attendees": [
                {"email": "ada@example.com", "responseStatus": "accepted", "organizer": true},
                {"email": "grace@example.com"}
            ]
        })
    }

    #[test]
    fn test_normalize_event_produces_canonical_object() {
        let event = connector().normalize_event(&raw_event());

        assert_eq!(event["id"], "evt_1");
        assert_eq!(event["type"], "event");
        assert_eq!(event["title"], "Quarterly review");
        assert_eq!(event["start_time"], "2026-08-10T14:00:00Z");
        assert_eq!(event["end_time"], "2026-08-10T15:00:00Z");
        assert_eq!(event["all_day"], false);
        assert_eq!(event["source"]["system"], "google_calendar");
        assert_eq!(event["source"]["external_id"], "evt_1");
        assert_eq!(event["sensitivity"], "S1");

        // Missing responseStatus defaults to pending.
        assert_eq!(event["attendees"][1]["status"], "pending");

        let report = validator::validate(&event, Some(Shelf::Calendar));
        assert!(report.is_valid(), "errors: {:?}", report.errors);
    }

    #[test]
    fn test_normalize_all_day_event() {
        let raw = json!({
            "id": "evt_2",
            "summary": "Offsite",
            "created": "2026-07-01T08:00:00Z",
            "updated": "2026-07-01T08:00:00Z",
            "start": {"date": "2026-08-12"},
            "end": {"date": "2026-08-13"}
        });

        let event = connector().normalize_event(&raw);
        assert_eq!(event["all_day"], true);
        assert_eq!(event["start_time"], "2026-08-12");
        assert_eq!(event["status"], "confirmed");
    }

    #[tokio::test]
    async fn test_missing_token_is_an_authentication_error() {
        let err = connector().authenticate().await.unwrap_err();
        assert!(matches!(err, CapError::Authentication(_)));
    }
}
