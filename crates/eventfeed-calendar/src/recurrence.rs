//! Expansion of recurring ICS events.
//!
//! A series master (RRULE and/or RDATE) is replaced by its instances inside a
//! window around `now`, minus its EXDATEs. Instances named by a
//! RECURRENCE-ID override are dropped; the override itself is kept as a
//! plain event.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use rrule::RRuleSet;

use crate::ics::{IcsEvent, Recurrence};
use crate::types::EventTime;

/// How far ahead series are expanded.
pub const EXPANSION_HORIZON_DAYS: i64 = 365;

/// Upper bound on instances generated per series.
pub const MAX_INSTANCES: u16 = 500;

/// Replace every series master in `events` with its instances near `now`.
///
/// Instances that ended before `now` may still be returned; callers filter
/// on the end time. A master whose RRULE cannot be read is kept as a single
/// event.
pub fn expand_recurrences(events: Vec<IcsEvent>, now: DateTime<Utc>) -> Vec<IcsEvent> {
    let overridden: Vec<(Option<String>, EventTime)> = events
        .iter()
        .filter_map(|e| e.recurrence_id.map(|id| (e.uid.clone(), id)))
        .collect();
    let horizon = now + Duration::days(EXPANSION_HORIZON_DAYS);

    let mut out = Vec::with_capacity(events.len());
    for event in events {
        let Some(recurrence) = &event.recurrence else {
            out.push(event);
            continue;
        };

        match expand(&event, recurrence, now, horizon) {
            Ok(instances) => out.extend(instances.into_iter().filter(|instance| {
                !overridden
                    .iter()
                    .any(|(uid, id)| *uid == event.uid && *id == instance.start)
            })),
            Err(e) => {
                tracing::warn!(
                    "Cannot expand recurring event '{}': {}; keeping it as a single event",
                    event.summary,
                    e
                );
                out.push(event);
            }
        }
    }
    out
}

fn expand(
    master: &IcsEvent,
    recurrence: &Recurrence,
    now: DateTime<Utc>,
    horizon: DateTime<Utc>,
) -> Result<Vec<IcsEvent>, String> {
    let duration = match (master.start, master.end) {
        (EventTime::DateTime(start), EventTime::DateTime(end)) => end - start,
        _ => Duration::zero(),
    };
    let day_span = match (master.start, master.end) {
        (EventTime::Date(start), EventTime::Date(end)) => end - start,
        _ => Duration::zero(),
    };
    // One spare day covers all-day instances that are still running today.
    let from = now - duration - Duration::days(1);

    // DTSTART is always the first instance.
    let mut starts = vec![master.start];
    if let Some(rule) = &recurrence.rrule {
        starts.extend(rule_starts(master.start, rule, recurrence.zone, from, horizon)?);
    }
    starts.extend(recurrence.rdates.iter().copied());

    let mut seen = Vec::with_capacity(starts.len());
    for start in starts {
        let at = start.to_utc(chrono_tz::UTC);
        if at < from || at > horizon {
            continue;
        }
        if recurrence.exdates.contains(&start) || seen.contains(&start) {
            continue;
        }
        seen.push(start);
    }
    seen.sort_by_key(|start| start.to_utc(chrono_tz::UTC));

    Ok(seen
        .into_iter()
        .map(|start| {
            let end = match start {
                EventTime::Date(d) => EventTime::Date(d + day_span),
                EventTime::DateTime(dt) => EventTime::DateTime(dt + duration),
            };
            IcsEvent {
                start,
                end,
                recurrence: None,
                recurrence_id: Some(start),
                ..master.clone()
            }
        })
        .collect())
}

/// Occurrences of `rule` between `from` and `until`, inclusive.
fn rule_starts(
    start: EventTime,
    rule: &str,
    zone: Tz,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Result<Vec<EventTime>, String> {
    // All-day series repeat on midnight UTC and map back to dates.
    let (dtstart, zone) = match start {
        EventTime::Date(d) => (format!("DTSTART:{}T000000Z", d.format("%Y%m%d")), chrono_tz::UTC),
        EventTime::DateTime(dt) if zone == chrono_tz::UTC => {
            (format!("DTSTART:{}", dt.format("%Y%m%dT%H%M%SZ")), zone)
        }
        EventTime::DateTime(dt) => (
            format!(
                "DTSTART;TZID={}:{}",
                zone.name(),
                dt.with_timezone(&zone).format("%Y%m%dT%H%M%S")
            ),
            zone,
        ),
    };

    let set: RRuleSet = format!("{}\nRRULE:{}", dtstart, normalize_until(rule, zone))
        .parse()
        .map_err(|e: rrule::RRuleError| e.to_string())?;

    // after/before are exclusive.
    let tz: rrule::Tz = Utc.into();
    let result = set
        .after((from - Duration::seconds(1)).with_timezone(&tz))
        .before((until + Duration::seconds(1)).with_timezone(&tz))
        .all(MAX_INSTANCES);
    if result.limited {
        tracing::debug!("Series expansion stopped at {} instances", MAX_INSTANCES);
    }

    Ok(result
        .dates
        .iter()
        .map(|dt| match start {
            EventTime::Date(_) => EventTime::Date(dt.date_naive()),
            EventTime::DateTime(_) => EventTime::DateTime(dt.with_timezone(&Utc)),
        })
        .collect())
}

/// Rewrite a date-only or local UNTIL as a UTC timestamp.
///
/// A date-only UNTIL includes the whole day.
fn normalize_until(rule: &str, zone: Tz) -> String {
    rule.split(';')
        .map(|part| {
            let Some(value) = part.strip_prefix("UNTIL=") else {
                return part.to_string();
            };
            if value.ends_with('Z') {
                return part.to_string();
            }
            let local = if value.len() == 8 {
                NaiveDate::parse_from_str(value, "%Y%m%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(23, 59, 59))
            } else {
                NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").ok()
            };
            match local.and_then(|naive| zone.from_local_datetime(&naive).earliest()) {
                Some(dt) => format!(
                    "UNTIL={}",
                    dt.with_timezone(&Utc).format("%Y%m%dT%H%M%SZ")
                ),
                None => part.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join(";")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use crate::ics::parse_ics;
    use crate::normalize::Normalizer;

    const BERLIN: Tz = chrono_tz::Europe::Berlin;

    fn now() -> DateTime<Utc> {
        // Tuesday 21.10.2025 12:00 Berlin
        Utc.with_ymd_and_hms(2025, 10, 21, 10, 0, 0).unwrap()
    }

    fn utc(y: i32, m: u32, d: u32, h: u32) -> EventTime {
        EventTime::DateTime(Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap())
    }

    fn date(y: i32, m: u32, d: u32) -> EventTime {
        EventTime::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    fn parse(events: &str) -> Vec<IcsEvent> {
        let ics = format!(
            "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//Test//EN\r\n{}END:VCALENDAR\r\n",
            events
        );
        parse_ics(&ics, BERLIN).unwrap()
    }

    const WEEKLY: &str = "BEGIN:VEVENT\r\n\
        UID:lab@example.org\r\n\
        SUMMARY:Open Lab #OpenLab\r\n\
        DTSTART;TZID=Europe/Berlin:20250101T190000\r\n\
        DTEND;TZID=Europe/Berlin:20250101T210000\r\n\
        RRULE:FREQ=WEEKLY\r\n\
        END:VEVENT\r\n";

    #[test]
    fn test_weekly_series_started_in_the_past() {
        let expanded = expand_recurrences(parse(WEEKLY), now());

        // Wednesdays from 22.10.2025 up to one year ahead.
        assert_eq!(expanded.len(), 52);
        // Wall-clock time survives the switch to CET on 26.10.
        assert_eq!(expanded[0].start, utc(2025, 10, 22, 17));
        assert_eq!(expanded[0].end, utc(2025, 10, 22, 19));
        assert_eq!(expanded[1].start, utc(2025, 10, 29, 18));
        assert!(expanded.iter().all(|e| e.recurrence.is_none()));
        assert_eq!(expanded[0].recurrence_id, Some(expanded[0].start));
        assert_eq!(expanded[0].summary, "Open Lab #OpenLab");

        let upcoming = Normalizer::new(BERLIN).ics_events(&expanded, now());
        assert_eq!(upcoming.len(), 52);
        assert_eq!(upcoming[0].start_date, "22.10.2025");
        assert_eq!(upcoming[0].start_time, "19:00");
        assert_eq!(upcoming[1].start_time, "19:00");
        assert_eq!(upcoming[0].tags, vec!["OpenLab"]);
    }

    #[test]
    fn test_exdate_and_override_replace_instances() {
        let events = parse(&format!(
            "{}\
             BEGIN:VEVENT\r\n\
             UID:lab@example.org\r\n\
             SUMMARY:Open Lab (later)\r\n\
             RECURRENCE-ID;TZID=Europe/Berlin:20251029T190000\r\n\
             DTSTART;TZID=Europe/Berlin:20251029T200000\r\n\
             DTEND;TZID=Europe/Berlin:20251029T220000\r\n\
             END:VEVENT\r\n",
            WEEKLY.replace(
                "RRULE:FREQ=WEEKLY\r\n",
                "RRULE:FREQ=WEEKLY\r\nEXDATE;TZID=Europe/Berlin:20251022T190000\r\n"
            )
        ));

        let expanded = expand_recurrences(events, now());

        assert!(expanded.iter().all(|e| e.start != utc(2025, 10, 22, 17)));
        assert!(expanded.iter().all(|e| e.start != utc(2025, 10, 29, 18)));
        let moved: Vec<_> = expanded
            .iter()
            .filter(|e| e.summary == "Open Lab (later)")
            .collect();
        assert_eq!(moved.len(), 1);
        assert_eq!(moved[0].start, utc(2025, 10, 29, 19));
        // 52 generated, minus one exdate and one override, plus the override.
        assert_eq!(expanded.len(), 51);
    }

    #[test]
    fn test_all_day_series_with_date_until_and_rdate() {
        let events = parse(
            "BEGIN:VEVENT\r\n\
             SUMMARY:Monthly\r\n\
             DTSTART;VALUE=DATE:20250101\r\n\
             DTEND;VALUE=DATE:20250102\r\n\
             RRULE:FREQ=MONTHLY;UNTIL=20251201\r\n\
             RDATE;VALUE=DATE:20251115\r\n\
             END:VEVENT\r\n",
        );

        let expanded = expand_recurrences(events, now());

        let starts: Vec<_> = expanded.iter().map(|e| e.start).collect();
        assert_eq!(starts, vec![date(2025, 11, 1), date(2025, 11, 15), date(2025, 12, 1)]);
        assert_eq!(expanded[0].end, date(2025, 11, 2));
    }

    #[test]
    fn test_rdate_without_rule() {
        let events = parse(
            "BEGIN:VEVENT\r\n\
             SUMMARY:Twice\r\n\
             DTSTART:20251101T100000Z\r\n\
             DTEND:20251101T120000Z\r\n\
             RDATE:20251201T100000Z\r\n\
             END:VEVENT\r\n",
        );

        let expanded = expand_recurrences(events, now());

        let starts: Vec<_> = expanded.iter().map(|e| e.start).collect();
        assert_eq!(starts, vec![utc(2025, 11, 1, 10), utc(2025, 12, 1, 10)]);
        assert_eq!(expanded[1].end, utc(2025, 12, 1, 12));
    }

    #[test]
    fn test_finished_series_yields_nothing() {
        let events = parse(
            "BEGIN:VEVENT\r\n\
             SUMMARY:Past\r\n\
             DTSTART:20250101T100000Z\r\n\
             RRULE:FREQ=DAILY;COUNT=3\r\n\
             END:VEVENT\r\n",
        );

        assert!(expand_recurrences(events, now()).is_empty());
    }

    #[test]
    fn test_unreadable_rule_keeps_master() {
        let events = parse(
            "BEGIN:VEVENT\r\n\
             SUMMARY:Odd\r\n\
             DTSTART:20251101T100000Z\r\n\
             RRULE:FREQ=SOMETIMES\r\n\
             END:VEVENT\r\n",
        );

        let expanded = expand_recurrences(events.clone(), now());
        assert_eq!(expanded, events);
    }

    #[test]
    fn test_single_events_pass_through() {
        let events = parse(
            "BEGIN:VEVENT\r\n\
             SUMMARY:Once\r\n\
             DTSTART:20251101T100000Z\r\n\
             END:VEVENT\r\n",
        );

        assert_eq!(expand_recurrences(events.clone(), now()), events);
    }

    #[test]
    fn test_normalize_until() {
        assert_eq!(
            normalize_until("FREQ=WEEKLY;UNTIL=20251231", chrono_tz::UTC),
            "FREQ=WEEKLY;UNTIL=20251231T235959Z"
        );
        assert_eq!(
            normalize_until("FREQ=WEEKLY;UNTIL=20251231T190000;BYDAY=WE", BERLIN),
            "FREQ=WEEKLY;UNTIL=20251231T180000Z;BYDAY=WE"
        );
        assert_eq!(
            normalize_until("FREQ=DAILY;UNTIL=20251231T180000Z", BERLIN),
            "FREQ=DAILY;UNTIL=20251231T180000Z"
        );
    }
}
