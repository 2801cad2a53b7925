//! ICS parsing using the icalendar crate's parser.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use icalendar::{
    parser::{read_calendar, unfold, Component, Property},
    CalendarDateTime, DatePerhapsTime,
};

use crate::error::CalendarError;
use crate::types::{local_midnight, EventTime};

/// A VEVENT with the fields the normalizer needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IcsEvent {
    pub uid: Option<String>,
    pub summary: String,
    pub description: String,
    pub location: String,
    pub start: EventTime,
    pub end: EventTime,
    /// Set on series masters.
    pub recurrence: Option<Recurrence>,
    /// Set on instance overrides; names the generated start it replaces.
    pub recurrence_id: Option<EventTime>,
}

/// Recurrence data of a series master.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recurrence {
    pub rrule: Option<String>,
    pub rdates: Vec<EventTime>,
    pub exdates: Vec<EventTime>,
    /// Zone the series repeats in, so instances keep their wall-clock time.
    pub zone: Tz,
}

/// Parse every VEVENT in `content`.
///
/// Floating times are read in `tz`. The parse is all-or-nothing: an unreadable
/// document or any VEVENT without a usable DTSTART fails the whole call.
pub fn parse_ics(content: &str, tz: Tz) -> Result<Vec<IcsEvent>, CalendarError> {
    if !content.trim_start().starts_with("BEGIN:VCALENDAR") {
        return Err(CalendarError::IcsParse(
            "document does not start with BEGIN:VCALENDAR".to_string(),
        ));
    }

    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).map_err(|e| CalendarError::IcsParse(e.to_string()))?;

    calendar
        .components
        .iter()
        .filter(|c| c.name == "VEVENT")
        .enumerate()
        .map(|(index, vevent)| parse_vevent(vevent, tz, index))
        .collect()
}

fn parse_vevent(vevent: &Component<'_>, tz: Tz, index: usize) -> Result<IcsEvent, CalendarError> {
    let text = |name: &str| {
        vevent
            .find_prop(name)
            .map(|p| unescape_text(p.val.as_ref()))
            .unwrap_or_default()
    };

    let start_prop = vevent
        .find_prop("DTSTART")
        .ok_or_else(|| CalendarError::IcsParse(format!("VEVENT #{} has no DTSTART", index + 1)))?;
    let start_dpt = DatePerhapsTime::try_from(start_prop).map_err(|_| {
        CalendarError::IcsParse(format!(
            "VEVENT #{} has an unreadable DTSTART '{}'",
            index + 1,
            start_prop.val.as_ref()
        ))
    })?;
    let zone = zone_of(&start_dpt, tz);
    let start = to_event_time(start_dpt, tz);

    // A missing or unreadable DTEND collapses the event onto its start.
    let end = vevent
        .find_prop("DTEND")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .map(|dpt| to_event_time(dpt, tz))
        .unwrap_or(start);

    let rrule = vevent.find_prop("RRULE").map(|p| p.val.to_string());
    let dates = |name: &str| -> Vec<EventTime> {
        vevent
            .properties
            .iter()
            .filter(|p| p.name.as_ref() == name)
            .flat_map(|p| parse_time_list(p, tz))
            .collect()
    };
    let rdates = dates("RDATE");
    let recurrence = if rrule.is_some() || !rdates.is_empty() {
        Some(Recurrence {
            rrule,
            rdates,
            exdates: dates("EXDATE"),
            zone,
        })
    } else {
        None
    };

    let recurrence_id = vevent
        .find_prop("RECURRENCE-ID")
        .and_then(|p| DatePerhapsTime::try_from(p).ok())
        .map(|dpt| to_event_time(dpt, tz));

    Ok(IcsEvent {
        uid: vevent.find_prop("UID").map(|p| p.val.to_string()),
        summary: text("SUMMARY"),
        description: text("DESCRIPTION"),
        location: text("LOCATION"),
        start,
        end,
        recurrence,
        recurrence_id,
    })
}

// Unknown TZIDs (e.g. Windows names) fall back to the display zone.
fn resolve_tzid(tzid: &str, tz: Tz) -> Tz {
    tzid.parse::<Tz>().unwrap_or_else(|_| {
        tracing::debug!("Unknown TZID '{}', using {}", tzid, tz);
        tz
    })
}

fn zone_of(dpt: &DatePerhapsTime, tz: Tz) -> Tz {
    match dpt {
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(_)) => chrono_tz::UTC,
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { tzid, .. }) => {
            resolve_tzid(tzid, tz)
        }
        _ => tz,
    }
}

fn to_event_time(dpt: DatePerhapsTime, tz: Tz) -> EventTime {
    let zone = zone_of(&dpt, tz);
    match dpt {
        DatePerhapsTime::Date(d) => EventTime::Date(d),
        DatePerhapsTime::DateTime(CalendarDateTime::Utc(dt)) => EventTime::DateTime(dt),
        DatePerhapsTime::DateTime(CalendarDateTime::Floating(naive)) => {
            EventTime::DateTime(in_zone(naive, zone))
        }
        DatePerhapsTime::DateTime(CalendarDateTime::WithTimezone { date_time, .. }) => {
            EventTime::DateTime(in_zone(date_time, zone))
        }
    }
}

/// Read an RDATE/EXDATE value list.
///
/// Values are comma separated and share the property's TZID or VALUE=DATE
/// parameter. Unreadable values (and RDATE periods) are skipped.
fn parse_time_list(prop: &Property, tz: Tz) -> Vec<EventTime> {
    let zone = prop
        .params
        .iter()
        .find(|p| p.key == "TZID")
        .and_then(|p| p.val.as_ref().map(|v| resolve_tzid(v.as_ref(), tz)))
        .unwrap_or(tz);
    let is_date = prop
        .params
        .iter()
        .any(|p| p.key == "VALUE" && p.val.as_ref().map(|v| v.as_ref()) == Some("DATE"));

    prop.val
        .as_ref()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| {
            if is_date {
                return NaiveDate::parse_from_str(s, "%Y%m%d").ok().map(EventTime::Date);
            }
            match s.strip_suffix('Z') {
                Some(utc) => NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S")
                    .ok()
                    .map(|dt| EventTime::DateTime(dt.and_utc())),
                None => NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%S")
                    .ok()
                    .map(|dt| EventTime::DateTime(in_zone(dt, zone))),
            }
        })
        .collect()
}

fn in_zone(naive: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    match tz.from_local_datetime(&naive).earliest() {
        Some(dt) => dt.with_timezone(&Utc),
        // Inside a DST gap: anchor on the day and add the wall-clock offset.
        None => {
            let since_midnight = naive - naive.date().and_time(NaiveTime::MIN);
            local_midnight(naive.date(), tz) + since_midnight
        }
    }
}

/// Undo RFC 5545 TEXT escaping.
fn unescape_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
