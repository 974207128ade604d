//! Calendar API types and data structures.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A calendar event as used by the rest of the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub calendar_id: String,
    pub summary: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: EventTime,
    pub end: EventTime,
    pub all_day: bool,
    pub attendees: Vec<Attendee>,
    pub creator: Option<String>,
    pub status: EventStatus,
    pub html_link: Option<String>,
}

/// Event time - can be a specific datetime or an all-day date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventTime {
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
}

impl EventTime {
    pub fn as_datetime(&self) -> DateTime<Utc> {
        match self {
            EventTime::DateTime(dt) => *dt,
            EventTime::Date(d) => d.and_time(chrono::NaiveTime::MIN).and_utc(),
        }
    }
}

/// Event status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum EventStatus {
    Confirmed,
    Tentative,
    Cancelled,
}

impl Default for EventStatus {
    fn default() -> Self {
        Self::Confirmed
    }
}

/// Event attendee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attendee {
    pub email: String,
    pub display_name: Option<String>,
    pub response_status: ResponseStatus,
    pub is_organizer: bool,
}

/// Attendee response status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ResponseStatus {
    NeedsAction,
    Declined,
    Tentative,
    Accepted,
}

impl Default for ResponseStatus {
    fn default() -> Self {
        Self::NeedsAction
    }
}

// API Response Types

/// Google Calendar API event resource.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEvent {
    pub id: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: Option<ApiEventTime>,
    pub end: Option<ApiEventTime>,
    #[serde(default)]
    pub attendees: Vec<ApiAttendee>,
    pub creator: Option<ApiCreator>,
    pub status: Option<String>,
    pub html_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEventTime {
    pub date_time: Option<String>,
    pub date: Option<String>,
    pub time_zone: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAttendee {
    pub email: String,
    pub display_name: Option<String>,
    pub response_status: Option<String>,
    #[serde(default)]
    pub organizer: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiCreator {
    pub email: Option<String>,
    pub display_name: Option<String>,
}

/// API response for event list.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventListResponse {
    #[serde(default)]
    pub items: Vec<ApiEvent>,
    pub next_page_token: Option<String>,
}

impl Event {
    /// Convert API response to local Event.
    pub fn from_api(api: ApiEvent, calendar_id: &str) -> Self {
        let (start, all_day) = api
            .start
            .map(|t| parse_event_time(&t))
            .unwrap_or((EventTime::DateTime(Utc::now()), false));

        let end = api
            .end
            .map(|t| parse_event_time(&t).0)
            .unwrap_or_else(|| start.clone());

        let status = match api.status.as_deref() {
            Some("confirmed") => EventStatus::Confirmed,
            Some("tentative") => EventStatus::Tentative,
            Some("cancelled") => EventStatus::Cancelled,
            _ => EventStatus::Confirmed,
        };

        let attendees = api
            .attendees
            .into_iter()
            .map(|a| {
                let response_status = match a.response_status.as_deref() {
                    Some("accepted") => ResponseStatus::Accepted,
                    Some("declined") => ResponseStatus::Declined,
                    Some("tentative") => ResponseStatus::Tentative,
                    _ => ResponseStatus::NeedsAction,
                };
                Attendee {
                    email: a.email,
                    display_name: a.display_name,
                    response_status,
                    is_organizer: a.organizer,
                }
            })
            .collect();

        Self {
            id: api.id,
            calendar_id: calendar_id.to_string(),
            summary: api.summary.unwrap_or_default(),
            description: api.description,
            location: api.location,
            start,
            end,
            all_day,
            attendees,
            creator: api.creator.and_then(|c| c.email),
            status,
            html_link: api.html_link,
        }
    }
}

fn parse_event_time(api: &ApiEventTime) -> (EventTime, bool) {
    if let Some(dt_str) = &api.date_time {
        // Try parsing as RFC3339
        if let Ok(dt) = DateTime::parse_from_rfc3339(dt_str) {
            return (EventTime::DateTime(dt.with_timezone(&Utc)), false);
        }
    }
    if let Some(date_str) = &api.date {
        if let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
            return (EventTime::Date(date), true);
        }
    }
    (EventTime::DateTime(Utc::now()), false)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_event_from_api() {
        let json = r#"{
            "id": "event123",
            "summary": "Team Meeting",
            "description": "Weekly sync",
            "location": "Conference Room A",
            "start": {"dateTime": "2024-02-01T10:00:00Z"},
            "end": {"dateTime": "2024-02-01T11:00:00Z"},
            "status": "confirmed",
            "creator": {"email": "alice@example.com"},
            "htmlLink": "https://calendar.google.com/event?id=123"
        }"#;

        let api_event: ApiEvent = serde_json::from_str(json).unwrap();
        let event = Event::from_api(api_event, "primary");

        assert_eq!(event.id, "event123");
        assert_eq!(event.summary, "Team Meeting");
        assert_eq!(event.location, Some("Conference Room A".to_string()));
        assert_eq!(event.creator, Some("alice@example.com".to_string()));
        assert_eq!(event.status, EventStatus::Confirmed);
        assert!(!event.all_day);
    }

    #[test]
    fn test_all_day_event() {
        let json = r#"{
            "id": "event456",
            "summary": "Holiday",
            "start": {"date": "2024-02-01"},
            "end": {"date": "2024-02-02"}
        }"#;

        let api_event: ApiEvent = serde_json::from_str(json).unwrap();
        let event = Event::from_api(api_event, "primary");

        assert!(event.all_day);
        assert!(matches!(event.start, EventTime::Date(_)));
    }

    #[test]
    fn test_missing_summary_defaults_to_empty() {
        let json = r#"{
            "id": "event789",
            "start": {"dateTime": "2024-02-01T14:00:00Z"},
            "end": {"dateTime": "2024-02-01T15:00:00Z"}
        }"#;

        let api_event: ApiEvent = serde_json::from_str(json).unwrap();
        let event = Event::from_api(api_event, "primary");

        assert!(event.summary.is_empty());
        assert!(event.description.is_none());
    }

    #[test]
    fn test_unparseable_time_falls_back() {
        let json = r#"{
            "id": "bad",
            "summary": "Broken clock",
            "start": {"dateTime": "not-a-timestamp"},
            "end": {"dateTime": "also-bad"}
        }"#;

        let api_event: ApiEvent = serde_json::from_str(json).unwrap();
        let event = Event::from_api(api_event, "primary");

        // Falls back to "now" rather than rejecting the whole response
        assert!(!event.all_day);
        assert!(matches!(event.start, EventTime::DateTime(_)));
    }

    #[test]
    fn test_event_with_attendees() {
        let json = r#"{
            "id": "event321",
            "summary": "Project Review",
            "start": {"dateTime": "2024-02-01T14:00:00Z"},
            "end": {"dateTime": "2024-02-01T15:00:00Z"},
            "attendees": [
                {"email": "alice@example.com", "responseStatus": "accepted", "organizer": true},
                {"email": "bob@example.com", "responseStatus": "tentative"}
            ]
        }"#;

        let api_event: ApiEvent = serde_json::from_str(json).unwrap();
        let event = Event::from_api(api_event, "primary");

        assert_eq!(event.attendees.len(), 2);
        assert_eq!(event.attendees[0].response_status, ResponseStatus::Accepted);
        assert!(event.attendees[0].is_organizer);
        assert_eq!(event.attendees[1].response_status, ResponseStatus::Tentative);
        assert!(!event.attendees[1].is_organizer);
    }

    #[test]
    fn test_attendee_unknown_status_defaults() {
        let json = r#"{
            "id": "event322",
            "summary": "Maybe",
            "start": {"dateTime": "2024-02-01T14:00:00Z"},
            "end": {"dateTime": "2024-02-01T15:00:00Z"},
            "attendees": [
                {"email": "carol@example.com"}
            ]
        }"#;

        let api_event: ApiEvent = serde_json::from_str(json).unwrap();
        let event = Event::from_api(api_event, "primary");

        assert_eq!(
            event.attendees[0].response_status,
            ResponseStatus::NeedsAction
        );
    }

    #[test]
    fn test_event_time_as_datetime() {
        let dt = EventTime::DateTime(Utc::now());
        assert!(dt.as_datetime() <= Utc::now());

        let date = EventTime::Date(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        let as_dt = date.as_datetime();
        assert_eq!(
            as_dt.date_naive(),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
        );
    }

    #[test]
    fn test_event_list_response_defaults() {
        let response: EventListResponse = serde_json::from_str("{}").unwrap();
        assert!(response.items.is_empty());
        assert!(response.next_page_token.is_none());
    }
}
