//! Calendar API types and data structures.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Event time - can be a specific instant or an all-day date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventTime {
    DateTime(DateTime<Utc>),
    Date(NaiveDate),
}

impl EventTime {
    /// The instant this time denotes; all-day dates start at local midnight in `tz`.
    pub fn to_utc(&self, tz: Tz) -> DateTime<Utc> {
        match self {
            EventTime::DateTime(dt) => *dt,
            EventTime::Date(d) => local_midnight(*d, tz),
        }
    }

    pub fn is_date(&self) -> bool {
        matches!(self, EventTime::Date(_))
    }
}

/// Start of `date` in `tz`, as UTC.
///
/// A midnight skipped by a DST change resolves to the first valid instant after it.
pub fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&naive).earliest() {
        Some(dt) => dt.with_timezone(&Utc),
        None => {
            let shifted = naive + chrono::Duration::hours(1);
            tz.from_local_datetime(&shifted)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|| shifted.and_utc())
        }
    }
}

/// One event in the shape every endpoint and template consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedEvent {
    pub summary: String,
    pub description: String,
    pub location: String,
    /// `dd.mm.YYYY`
    pub start_date: String,
    /// `HH:MM`, empty for all-day events
    pub start_time: String,
    pub end_date: String,
    pub end_time: String,
    pub same_day: bool,
    pub all_day: bool,
    /// German two-letter weekday of the start (`Mo`, `Di`, ...)
    pub week_day_short: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Hashtags without the leading `#`, in order of first appearance
    pub tags: Vec<String>,
}

/// `{ "items": [...] }` wrapper returned by the list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventList {
    pub items: Vec<NormalizedEvent>,
}

// API Response Types

/// Google Calendar API event response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEvent {
    #[serde(default)]
    pub id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: Option<ApiEventTime>,
    pub end: Option<ApiEventTime>,
    pub status: Option<String>,
    pub html_link: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiEventTime {
    pub date_time: Option<String>,
    pub date: Option<String>,
    pub time_zone: Option<String>,
}

impl ApiEventTime {
    /// Parse either shape; `None` when neither field holds a valid value.
    pub fn parse(&self) -> Option<EventTime> {
        if let Some(dt_str) = &self.date_time {
            if let Ok(dt) = DateTime::parse_from_rfc3339(dt_str) {
                return Some(EventTime::DateTime(dt.with_timezone(&Utc)));
            }
        }
        if let Some(date_str) = &self.date {
            if let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
                return Some(EventTime::Date(date));
            }
        }
        None
    }
}

/// API response for event list.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventListResponse {
    #[serde(default)]
    pub items: Vec<ApiEvent>,
    pub next_page_token: Option<String>,
    pub time_zone: Option<String>,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_api_event_time_shapes() {
        let json = r#"{
            "summary": "Repair Café",
            "start": {"dateTime": "2025-10-22T18:00:00+02:00"},
            "end": {"date": "2025-10-23"}
        }"#;
        let api_event: ApiEvent = serde_json::from_str(json).unwrap();

        let start = api_event.start.unwrap().parse().unwrap();
        assert_eq!(
            start,
            EventTime::DateTime(Utc.with_ymd_and_hms(2025, 10, 22, 16, 0, 0).unwrap())
        );
        let end = api_event.end.unwrap().parse().unwrap();
        assert_eq!(
            end,
            EventTime::Date(NaiveDate::from_ymd_opt(2025, 10, 23).unwrap())
        );
    }

    #[test]
    fn test_api_event_time_invalid() {
        let time = ApiEventTime {
            date_time: Some("tomorrow".into()),
            date: None,
            time_zone: None,
        };
        assert!(time.parse().is_none());
    }

    #[test]
    fn test_date_starts_at_local_midnight() {
        let date = EventTime::Date(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
        assert_eq!(
            date.to_utc(chrono_tz::Europe::Berlin),
            Utc.with_ymd_and_hms(2025, 6, 30, 22, 0, 0).unwrap()
        );
        assert!(date.is_date());
    }

    #[test]
    fn test_normalized_event_serializes_camel_case() {
        let at = Utc.with_ymd_and_hms(2025, 10, 22, 16, 0, 0).unwrap();
        let event = NormalizedEvent {
            summary: "Repair Café".into(),
            description: String::new(),
            location: String::new(),
            start_date: "22.10.2025".into(),
            start_time: "18:00".into(),
            end_date: "22.10.2025".into(),
            end_time: "21:00".into(),
            same_day: true,
            all_day: false,
            week_day_short: "Mi".into(),
            start: at,
            end: at,
            tags: vec!["Repaircafe".into()],
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["startDate"], "22.10.2025");
        assert_eq!(value["sameDay"], true);
        assert_eq!(value["weekDayShort"], "Mi");
        assert_eq!(value["start"], "2025-10-22T16:00:00Z");
    }
}
