//! Wall-clock helpers for timetable strings coming from the backend.
//!
//! The backend is inconsistent about time formats: search results carry full
//! ISO timestamps while stored orders carry bare `HH:MM` values. Everything here
//! degrades to `None` / an empty label instead of failing.

use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, TimeZone, Utc};

const MINUTES_PER_DAY: i64 = 24 * 60;

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parse a date-time, keeping the wall-clock time of whatever offset it carries.
pub fn parse_date_time(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_local());
    }
    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}

pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

/// Parse an instant. Timestamps without an offset are device-local wall-clock time.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    parse_timestamp_in(raw, &Local)
}

/// Parse an instant, reading offset-less timestamps in `zone`. A wall-clock time
/// repeated by a DST fold resolves to its earlier instant; one skipped by a DST gap
/// is rejected.
pub fn parse_timestamp_in<Tz: TimeZone>(raw: &str, zone: &Tz) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    let naive = DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())?;
    zone.from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

/// `HH:MM` for display. Accepts full timestamps or anything containing a `HH:MM` run.
pub fn clock_label(raw: &str) -> String {
    if let Some(parsed) = parse_date_time(raw) {
        return parsed.format("%H:%M").to_string();
    }
    find_clock_run(raw).unwrap_or_default()
}

fn find_clock_run(raw: &str) -> Option<String> {
    let bytes = raw.as_bytes();
    bytes.windows(5).find_map(|w| {
        let digits = [w[0], w[1], w[3], w[4]];
        if w[2] == b':' && digits.iter().all(u8::is_ascii_digit) {
            Some(String::from_utf8_lossy(w).into_owned())
        } else {
            None
        }
    })
}

/// Minutes between departure and arrival.
///
/// Full timestamps are subtracted directly (negative spans are rejected). Bare times of
/// day are assumed to be within 24 hours of each other, so an arrival earlier than the
/// departure is read as the next day.
pub fn travel_minutes(departure: &str, arrival: &str) -> Option<i64> {
    if let (Some(dep), Some(arr)) = (parse_date_time(departure), parse_date_time(arrival)) {
        let minutes = (arr - dep).num_minutes();
        return (minutes >= 0).then_some(minutes);
    }
    let dep = parse_time_of_day(departure)?;
    let arr = parse_time_of_day(arrival)?;
    let minutes = (arr - dep).num_minutes();
    Some(if minutes < 0 { minutes + MINUTES_PER_DAY } else { minutes })
}

pub fn format_duration(minutes: i64) -> String {
    format!("{}ч {}м", minutes / 60, minutes % 60)
}

/// Duration label such as `3ч 25м`, or an empty string when either side is unparseable.
pub fn duration_label(departure: &str, arrival: &str) -> String {
    travel_minutes(departure, arrival)
        .map(format_duration)
        .unwrap_or_default()
}
