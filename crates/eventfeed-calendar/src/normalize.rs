//! Conversion of Google and ICS events into [`NormalizedEvent`].

use std::sync::OnceLock;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;
use regex::Regex;

use crate::ics::IcsEvent;
use crate::types::{local_midnight, ApiEvent, EventTime, NormalizedEvent};

const WEEKDAYS_SHORT: [&str; 7] = ["Mo", "Di", "Mi", "Do", "Fr", "Sa", "So"];

#[allow(clippy::expect_used)]
fn hashtag_regex() -> &'static Regex {
    static HASHTAG_RE: OnceLock<Regex> = OnceLock::new();
    HASHTAG_RE.get_or_init(|| Regex::new(r"[ \t]*#(\w+)").expect("hashtag regex must compile"))
}

/// Pull `#tags` out of `text`.
///
/// Returns the text with every tag (and the blanks before it) removed and
/// trimmed, plus the tag names without `#` in order of first appearance.
pub fn extract_hashtags(text: &str) -> (String, Vec<String>) {
    let re = hashtag_regex();
    let mut tags = Vec::new();
    for caps in re.captures_iter(text) {
        let tag = caps[1].to_string();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    let stripped = re.replace_all(text, "").trim().to_string();
    (stripped, tags)
}

/// Keep events whose start falls on the local day after `now`.
pub fn filter_tomorrow(
    events: Vec<NormalizedEvent>,
    now: DateTime<Utc>,
    tz: Tz,
) -> Vec<NormalizedEvent> {
    let today = now.with_timezone(&tz).date_naive();
    let Some(tomorrow) = today.succ_opt() else {
        return Vec::new();
    };
    let Some(day_after) = tomorrow.succ_opt() else {
        return Vec::new();
    };
    let from = local_midnight(tomorrow, tz);
    let until = local_midnight(day_after, tz);

    events
        .into_iter()
        .filter(|e| e.start >= from && e.start < until)
        .collect()
}

/// Keep events carrying `tag`. A leading `#` on `tag` is ignored.
pub fn filter_by_tag(events: Vec<NormalizedEvent>, tag: &str) -> Vec<NormalizedEvent> {
    let tag = tag.trim_start_matches('#');
    events
        .into_iter()
        .filter(|e| e.tags.iter().any(|t| t == tag))
        .collect()
}

/// Formats events for display in one time zone.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    tz: Tz,
}

impl Normalizer {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Normalize a Google item. Cancelled items and items without a start are dropped.
    pub fn normalize_google(&self, api: ApiEvent) -> Option<NormalizedEvent> {
        if api.status.as_deref() == Some("cancelled") {
            return None;
        }
        let start = api.start.as_ref().and_then(|t| t.parse())?;
        let end = api.end.as_ref().and_then(|t| t.parse()).unwrap_or(start);

        Some(self.build(
            api.summary.as_deref().unwrap_or_default(),
            api.description.as_deref().unwrap_or_default(),
            api.location.as_deref().unwrap_or_default(),
            start,
            end,
        ))
    }

    /// Normalize a list of Google items, keeping the API's order.
    pub fn google_events(&self, items: Vec<ApiEvent>) -> Vec<NormalizedEvent> {
        items
            .into_iter()
            .filter_map(|item| self.normalize_google(item))
            .collect()
    }

    pub fn normalize_ics(&self, event: &IcsEvent) -> NormalizedEvent {
        self.build(
            &event.summary,
            &event.description,
            &event.location,
            event.start,
            event.end,
        )
    }

    /// Normalize parsed ICS events: drop those that ended before `now`, sort by start.
    pub fn ics_events(&self, events: &[IcsEvent], now: DateTime<Utc>) -> Vec<NormalizedEvent> {
        let mut out: Vec<NormalizedEvent> = events
            .iter()
            .map(|e| self.normalize_ics(e))
            .filter(|e| e.end >= now)
            .collect();
        out.sort_by(|a, b| a.start.cmp(&b.start));
        out
    }

    fn build(
        &self,
        summary: &str,
        description: &str,
        location: &str,
        start: EventTime,
        end: EventTime,
    ) -> NormalizedEvent {
        let (summary, mut tags) = extract_hashtags(summary);
        let (description, description_tags) = extract_hashtags(description);
        for tag in description_tags {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }

        let all_day = start.is_date();
        let start_day = self.local_date(start);
        let end_day = match (start, end) {
            // All-day ends are exclusive; show the last covered day.
            (EventTime::Date(s), EventTime::Date(e)) if e > s => e.pred_opt().unwrap_or(e),
            _ => self.local_date(end),
        };

        let start_date = start_day.format("%d.%m.%Y").to_string();
        let end_date = end_day.format("%d.%m.%Y").to_string();

        NormalizedEvent {
            summary,
            description,
            location: location.trim().to_string(),
            same_day: start_date == end_date,
            start_date,
            start_time: self.local_time(start),
            end_date,
            end_time: self.local_time(end),
            all_day,
            week_day_short: WEEKDAYS_SHORT[start_day.weekday().num_days_from_monday() as usize]
                .to_string(),
            start: start.to_utc(self.tz),
            end: end.to_utc(self.tz),
            tags,
        }
    }

    fn local_date(&self, time: EventTime) -> NaiveDate {
        match time {
            EventTime::DateTime(dt) => dt.with_timezone(&self.tz).date_naive(),
            EventTime::Date(d) => d,
        }
    }

    fn local_time(&self, time: EventTime) -> String {
        match time {
            EventTime::DateTime(dt) => dt.with_timezone(&self.tz).format("%H:%M").to_string(),
            EventTime::Date(_) => String::new(),
        }
    }
}

/// First event starting on or after `now`, if it starts tomorrow.
pub fn next_if_tomorrow(
    events: Vec<NormalizedEvent>,
    now: DateTime<Utc>,
    tz: Tz,
) -> Option<NormalizedEvent> {
    let next = events.into_iter().filter(|e| e.start >= now).min_by_key(|e| e.start)?;
    filter_tomorrow(vec![next], now, tz).into_iter().next()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use crate::types::ApiEventTime;
    use chrono::{Duration, TimeZone};

    const BERLIN: Tz = chrono_tz::Europe::Berlin;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn ics(summary: &str, start: EventTime, end: EventTime) -> IcsEvent {
        IcsEvent {
            uid: None,
            summary: summary.to_string(),
            description: String::new(),
            location: String::new(),
            start,
            end,
            recurrence: None,
            recurrence_id: None,
        }
    }

    fn timed(summary: &str, start: DateTime<Utc>) -> IcsEvent {
        ics(
            summary,
            EventTime::DateTime(start),
            EventTime::DateTime(start + Duration::hours(2)),
        )
    }

    #[test]
    fn test_extract_hashtags() {
        let (text, tags) = extract_hashtags("Meeting #Repaircafe");
        assert_eq!(text, "Meeting");
        assert_eq!(tags, vec!["Repaircafe"]);

        let (text, tags) = extract_hashtags("#Kids Löten\t#Kids #Lötkurs  ");
        assert_eq!(text, "Löten");
        assert_eq!(tags, vec!["Kids", "Lötkurs"]);

        let (text, tags) = extract_hashtags("No tags here");
        assert_eq!(text, "No tags here");
        assert!(tags.is_empty());
    }

    #[test]
    fn test_same_day_timed_event() {
        let n = Normalizer::new(BERLIN);
        let event = n.normalize_ics(&timed("Repair Café #Repaircafe", utc(2025, 10, 22, 16, 0)));

        assert_eq!(event.summary, "Repair Café");
        assert_eq!(event.tags, vec!["Repaircafe"]);
        assert_eq!(event.start_date, "22.10.2025");
        assert_eq!(event.start_time, "18:00");
        assert_eq!(event.end_time, "20:00");
        assert_eq!(event.week_day_short, "Mi");
        assert!(event.same_day);
        assert!(!event.all_day);
    }

    #[test]
    fn test_multi_day_event_is_not_same_day() {
        let n = Normalizer::new(BERLIN);
        let event = n.normalize_ics(&ics(
            "Maker Faire",
            EventTime::DateTime(utc(2025, 10, 25, 8, 0)),
            EventTime::DateTime(utc(2025, 10, 26, 16, 0)),
        ));

        assert_eq!(event.end_date, "26.10.2025");
        assert!(!event.same_day);
    }

    #[test]
    fn test_same_day_uses_local_dates() {
        // 23:30 UTC is already the next day in Berlin.
        let n = Normalizer::new(BERLIN);
        let event = n.normalize_ics(&ics(
            "Late",
            EventTime::DateTime(utc(2025, 10, 22, 20, 0)),
            EventTime::DateTime(utc(2025, 10, 22, 23, 30)),
        ));
        assert_eq!(event.end_date, "23.10.2025");
        assert!(!event.same_day);
    }

    #[test]
    fn test_all_day_event_end_is_inclusive() {
        let n = Normalizer::new(BERLIN);
        let day = NaiveDate::from_ymd_opt(2025, 10, 24).unwrap();
        let event = n.normalize_ics(&ics(
            "Holiday",
            EventTime::Date(day),
            EventTime::Date(day.succ_opt().unwrap()),
        ));

        assert!(event.all_day);
        assert!(event.same_day);
        assert_eq!(event.start_time, "");
        assert_eq!(event.week_day_short, "Fr");
    }

    #[test]
    fn test_google_items() {
        let n = Normalizer::new(BERLIN);
        let items: Vec<ApiEvent> = serde_json::from_value(serde_json::json!([
            {
                "summary": "Open Lab #Werkstatt",
                "description": "Bring ideas #Kids",
                "start": {"dateTime": "2025-10-22T18:00:00+02:00"},
                "end": {"dateTime": "2025-10-22T21:00:00+02:00"}
            },
            {"summary": "Gone", "status": "cancelled", "start": {"date": "2025-10-23"}},
            {"summary": "No start"}
        ]))
        .unwrap();

        let events = n.google_events(items);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].summary, "Open Lab");
        assert_eq!(events[0].description, "Bring ideas");
        assert_eq!(events[0].tags, vec!["Werkstatt", "Kids"]);
        assert_eq!(events[0].start_time, "18:00");
    }

    #[test]
    fn test_google_missing_end_uses_start() {
        let n = Normalizer::new(BERLIN);
        let api = ApiEvent {
            id: None,
            summary: Some("Quick".into()),
            description: None,
            location: None,
            start: Some(ApiEventTime {
                date_time: Some("2025-10-22T18:00:00+02:00".into()),
                date: None,
                time_zone: None,
            }),
            end: None,
            status: None,
            html_link: None,
        };
        let event = n.normalize_google(api).unwrap();
        assert_eq!(event.start, event.end);
    }

    #[test]
    fn test_ics_events_sorted_and_upcoming() {
        let n = Normalizer::new(BERLIN);
        let now = utc(2025, 10, 22, 12, 0);
        let events = vec![
            timed("Later", utc(2025, 10, 30, 16, 0)),
            timed("Past", utc(2025, 10, 1, 16, 0)),
            timed("Running", utc(2025, 10, 22, 11, 0)),
            timed("Soon", utc(2025, 10, 23, 16, 0)),
        ];

        let out = n.ics_events(&events, now);
        let names: Vec<&str> = out.iter().map(|e| e.summary.as_str()).collect();
        assert_eq!(names, vec!["Running", "Soon", "Later"]);
    }

    #[test]
    fn test_filter_tomorrow_window() {
        let n = Normalizer::new(BERLIN);
        // 22.10.2025 12:00 Berlin
        let now = utc(2025, 10, 22, 10, 0);
        let events = n.ics_events(
            &[
                timed("Today", utc(2025, 10, 22, 16, 0)),
                // 23.10. 00:00 Berlin
                timed("Midnight", utc(2025, 10, 22, 22, 0)),
                timed("Tomorrow", utc(2025, 10, 23, 16, 0)),
                // 24.10. 00:00 Berlin
                timed("DayAfter", utc(2025, 10, 23, 22, 0)),
            ],
            now,
        );

        let out = filter_tomorrow(events, now, BERLIN);
        let names: Vec<&str> = out.iter().map(|e| e.summary.as_str()).collect();
        assert_eq!(names, vec!["Midnight", "Tomorrow"]);
    }

    #[test]
    fn test_filter_by_tag() {
        let n = Normalizer::new(BERLIN);
        let now = utc(2025, 10, 1, 0, 0);
        let events = n.ics_events(
            &[
                timed("A #Repaircafe", utc(2025, 10, 22, 16, 0)),
                timed("B #Kids", utc(2025, 10, 23, 16, 0)),
            ],
            now,
        );

        let out = filter_by_tag(events.clone(), "#Repaircafe");
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].summary, "A");
        assert!(filter_by_tag(events, "Other").is_empty());
    }

    #[test]
    fn test_next_if_tomorrow() {
        let n = Normalizer::new(BERLIN);
        let now = utc(2025, 10, 22, 10, 0);
        let tomorrow = n.ics_events(&[timed("Next", utc(2025, 10, 23, 16, 0))], now);
        assert_eq!(
            next_if_tomorrow(tomorrow, now, BERLIN).unwrap().summary,
            "Next"
        );

        let later = n.ics_events(&[timed("Later", utc(2025, 10, 25, 16, 0))], now);
        assert!(next_if_tomorrow(later, now, BERLIN).is_none());
    }
}
