//! Google Calendar API client (public calendars, API key auth).

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use eventfeed_core::ReqwestErrorExt;
use tracing::instrument;

use crate::error::CalendarError;
use crate::types::EventListResponse;

/// Events API client. Built once; the API key is passed per call because
/// admins can change it at runtime.
#[derive(Debug, Clone)]
pub struct GoogleCalendarClient {
    client: reqwest::Client,
    base_url: String,
}

impl GoogleCalendarClient {
    pub fn new_with_base_url(base_url: &str, timeout: Duration) -> Result<Self, CalendarError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CalendarError::Network(e.into_network_error()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// List single (expanded) events starting from `time_min`, ordered by start.
    #[instrument(skip(self, api_key), level = "info")]
    pub async fn list_upcoming(
        &self,
        api_key: &str,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        max_results: u32,
    ) -> Result<EventListResponse, CalendarError> {
        // The API rejects "+00:00"; send a Z suffix.
        let time_min = time_min.to_rfc3339_opts(SecondsFormat::Secs, true);
        let url = format!(
            "{}/calendars/{}/events?maxResults={}&orderBy=startTime&singleEvents=true&timeMin={}&key={}",
            self.base_url,
            urlencoding::encode(calendar_id),
            max_results,
            urlencoding::encode(&time_min),
            urlencoding::encode(api_key),
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| e.into_network_error())?;

        self.handle_response(response).await
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
        } else if matches!(status.as_u16(), 400 | 401 | 403) {
            let text = response.text().await.unwrap_or_default();
            tracing::warn!("Google Calendar refused request ({}): {}", status, text);
            Err(CalendarError::AccessDenied)
        } else if status.as_u16() == 404 {
            let text = response.text().await.unwrap_or_default();
            Err(CalendarError::CalendarNotFound(text))
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
    use chrono::TimeZone;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GoogleCalendarClient {
        GoogleCalendarClient::new_with_base_url(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 21, 8, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_list_upcoming() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/calendars/club%40group.calendar.google.com/events"))
            .and(query_param("key", "test_key"))
            .and(query_param("maxResults", "20"))
            .and(query_param("orderBy", "startTime"))
            .and(query_param("singleEvents", "true"))
            .and(query_param("timeMin", "2025-10-21T08:00:00Z"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "timeZone": "Europe/Berlin",
                "items": [
                    {
                        "id": "evt1",
                        "summary": "Repair Café #Repaircafe",
                        "start": {"dateTime": "2025-10-22T18:00:00+02:00"},
                        "end": {"dateTime": "2025-10-22T21:00:00+02:00"}
                    }
                ]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let response = client(&mock_server)
            .list_upcoming("test_key", "club@group.calendar.google.com", now(), 20)
            .await
            .unwrap();

        assert_eq!(response.items.len(), 1);
        assert_eq!(response.time_zone.as_deref(), Some("Europe/Berlin"));
        assert_eq!(response.items[0].id.as_deref(), Some("evt1"));
    }

    #[tokio::test]
    async fn test_client_is_reused_across_keys() {
        let mock_server = MockServer::start().await;
        for key in ["old_key", "new_key"] {
            Mock::given(method("GET"))
                .and(query_param("key", key))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"items": []})))
                .expect(1)
                .mount(&mock_server)
                .await;
        }

        let client = client(&mock_server);
        client.list_upcoming("old_key", "cal", now(), 20).await.unwrap();
        client.list_upcoming("new_key", "cal", now(), 20).await.unwrap();
    }

    #[tokio::test]
    async fn test_forbidden_maps_to_access_denied() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
            .mount(&mock_server)
            .await;

        let err = client(&mock_server)
            .list_upcoming("test_key", "cal", now(), 20)
            .await
            .unwrap_err();
        assert!(matches!(err, CalendarError::AccessDenied));
    }

    #[tokio::test]
    async fn test_not_found() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&mock_server)
            .await;

        let err = client(&mock_server)
            .list_upcoming("test_key", "missing", now(), 20)
            .await
            .unwrap_err();
        assert!(matches!(err, CalendarError::CalendarNotFound(_)));
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
            .mount(&mock_server)
            .await;

        let err = client(&mock_server)
            .list_upcoming("test_key", "cal", now(), 20)
            .await
            .unwrap_err();
        assert!(matches!(err, CalendarError::RateLimited(30)));
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&mock_server)
            .await;

        let err = client(&mock_server)
            .list_upcoming("test_key", "cal", now(), 20)
            .await
            .unwrap_err();
        assert!(matches!(err, CalendarError::ApiError(_)));
    }
}
