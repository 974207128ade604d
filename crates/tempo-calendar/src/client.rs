//! Google Calendar API client.

use chrono::{DateTime, Utc};
use tracing::instrument;

use crate::error::CalendarError;
use crate::types::{ApiEvent, Event, EventListResponse};

const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3";

/// Thin client over the Calendar v3 REST API, bound to one access token.
pub struct CalendarClient {
    client: reqwest::Client,
    access_token: String,
    base_url: String,
}

impl CalendarClient {
    pub fn new(access_token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token: access_token.to_string(),
            base_url: CALENDAR_API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    pub fn new_with_base_url(access_token: &str, base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            access_token: access_token.to_string(),
            base_url: base_url.to_string(),
        }
    }

    /// List one page of events within a time range.
    ///
    /// Expands recurring events (`singleEvents`) and orders by start time.
    /// The caller follows `next_page_token` for further pages.
    #[instrument(skip(self), level = "info")]
    pub async fn list_events(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<EventListResponse, CalendarError> {
        let mut url = format!(
            "{}/calendars/{}/events?timeMin={}&timeMax={}&singleEvents=true&orderBy=startTime&maxResults={}",
            self.base_url,
            urlencoding::encode(calendar_id),
            urlencoding::encode(&time_min.to_rfc3339()),
            urlencoding::encode(&time_max.to_rfc3339()),
            max_results,
        );

        if let Some(pt) = page_token {
            url.push_str(&format!("&pageToken={}", pt));
        }

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Create a new event.
    #[instrument(skip(self, description), level = "info")]
    pub async fn insert_event(
        &self,
        calendar_id: &str,
        summary: &str,
        description: Option<&str>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Event, CalendarError> {
        let url = format!(
            "{}/calendars/{}/events",
            self.base_url,
            urlencoding::encode(calendar_id),
        );

        let mut body = serde_json::json!({
            "summary": summary,
            "start": { "dateTime": start.to_rfc3339() },
            "end": { "dateTime": end.to_rfc3339() },
        });

        if let Some(desc) = description {
            body["description"] = serde_json::Value::String(desc.to_string());
        }

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;

        let api_event: ApiEvent = self.handle_response(response).await?;
        Ok(Event::from_api(api_event, calendar_id))
    }

    /// Helper to handle API responses and errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, CalendarError> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .map_err(|e| CalendarError::ApiError(format!("JSON parse error: {}", e)))
        } else if status.as_u16() == 401 {
            Err(CalendarError::TokenExpired)
        } else if status.as_u16() == 403 {
            Err(CalendarError::AuthRequired)
        } else if status.as_u16() == 404 {
            let text = response.text().await.unwrap_or_default();
            Err(CalendarError::EventNotFound(text))
        } else if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            Err(CalendarError::RateLimited(retry_after))
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(CalendarError::ApiError(format!("{}: {}", status, text)))
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn time_range() -> (DateTime<Utc>, DateTime<Utc>) {
        let time_min = DateTime::parse_from_rfc3339("2024-02-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let time_max = DateTime::parse_from_rfc3339("2024-02-08T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        (time_min, time_max)
    }

    #[tokio::test]
    async fn test_list_events() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/calendars/primary/events"))
            .and(header("Authorization", "Bearer test_token"))
            .and(query_param("singleEvents", "true"))
            .and(query_param("orderBy", "startTime"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    {
                        "id": "event1",
                        "summary": "Meeting",
                        "start": {"dateTime": "2024-02-01T10:00:00Z"},
                        "end": {"dateTime": "2024-02-01T11:00:00Z"}
                    }
                ]
            })))
            .mount(&mock_server)
            .await;

        let client = CalendarClient::new_with_base_url("test_token", &mock_server.uri());
        let (time_min, time_max) = time_range();

        let response = client
            .list_events("primary", time_min, time_max, 50, None)
            .await
            .unwrap();

        assert_eq!(response.items.len(), 1);
        assert_eq!(response.items[0].summary, Some("Meeting".to_string()));
    }

    #[tokio::test]
    async fn test_list_events_passes_page_token() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/calendars/primary/events"))
            .and(query_param("pageToken", "page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": []
            })))
            .mount(&mock_server)
            .await;

        let client = CalendarClient::new_with_base_url("test_token", &mock_server.uri());
        let (time_min, time_max) = time_range();

        let response = client
            .list_events("primary", time_min, time_max, 50, Some("page2"))
            .await
            .unwrap();

        assert!(response.items.is_empty());
    }

    #[tokio::test]
    async fn test_insert_event() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/calendars/primary/events"))
            .and(header("Authorization", "Bearer test_token"))
            .and(body_string_contains("Dentist"))
            .and(body_string_contains("Bring insurance card"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "created1",
                "summary": "Dentist",
                "description": "Bring insurance card",
                "start": {"dateTime": "2024-02-01T10:00:00Z"},
                "end": {"dateTime": "2024-02-01T11:00:00Z"},
                "status": "confirmed"
            })))
            .mount(&mock_server)
            .await;

        let client = CalendarClient::new_with_base_url("test_token", &mock_server.uri());
        let (start, end) = time_range();

        let event = client
            .insert_event(
                "primary",
                "Dentist",
                Some("Bring insurance card"),
                start,
                end,
            )
            .await
            .unwrap();

        assert_eq!(event.id, "created1");
        assert_eq!(event.summary, "Dentist");
        assert_eq!(event.calendar_id, "primary");
    }

    #[tokio::test]
    async fn test_insert_event_omits_missing_description() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/calendars/primary/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "created2",
                "summary": "Standup",
                "start": {"dateTime": "2024-02-01T10:00:00Z"},
                "end": {"dateTime": "2024-02-01T10:15:00Z"}
            })))
            .mount(&mock_server)
            .await;

        let client = CalendarClient::new_with_base_url("test_token", &mock_server.uri());
        let (start, end) = time_range();

        let event = client
            .insert_event("primary", "Standup", None, start, end)
            .await
            .unwrap();

        assert!(event.description.is_none());
    }

    #[tokio::test]
    async fn test_token_expired() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/calendars/primary/events"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&mock_server)
            .await;

        let client = CalendarClient::new_with_base_url("expired_token", &mock_server.uri());
        let (time_min, time_max) = time_range();
        let result = client
            .list_events("primary", time_min, time_max, 50, None)
            .await;

        assert!(matches!(result, Err(CalendarError::TokenExpired)));
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/calendars/primary/events"))
            .respond_with(ResponseTemplate::new(429).append_header("Retry-After", "60"))
            .mount(&mock_server)
            .await;

        let client = CalendarClient::new_with_base_url("token", &mock_server.uri());
        let (time_min, time_max) = time_range();
        let result = client
            .list_events("primary", time_min, time_max, 50, None)
            .await;

        assert!(matches!(result, Err(CalendarError::RateLimited(60))));
    }

    #[tokio::test]
    async fn test_forbidden_maps_to_auth_required() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/calendars/primary/events"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&mock_server)
            .await;

        let client = CalendarClient::new_with_base_url("token", &mock_server.uri());
        let (time_min, time_max) = time_range();
        let result = client
            .list_events("primary", time_min, time_max, 50, None)
            .await;

        assert!(matches!(result, Err(CalendarError::AuthRequired)));
    }
}
