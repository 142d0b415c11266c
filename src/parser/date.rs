use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;

const CANONICAL: &str = "%Y-%m-%dT%H:%M:%S";

// Trailing zone designator: "PST", "GMT", "UTC+1", "GMT-07:00", "+0530".
static ZONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r" (?:(?:GMT|UTC)(?:[+-]\d{1,2}(?::?\d{2})?)?|[A-Z]{2,5}|[+-]\d{2}:?\d{2})$").unwrap()
});
static SEPT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bSept\b").unwrap());
// Zone between the time and a trailing year: "15:04:05 MST 2006", "15:04:05 -0700 2006".
static MID_ZONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,2}:\d{2}(?::\d{2})?) ([A-Z]{2,5}|[+-]\d{4}) (\d{4})$").unwrap()
});

/// Layouts with a time of day, tried in order.
const DATETIME_LAYOUTS: &[&str] = &[
    "%B %d, %Y, %I:%M:%S %p",
    "%B %d, %Y %I:%M:%S %p",
    "%B %d, %Y, %I:%M %p",
    "%B %d, %Y %I:%M %p",
    "%B %d, %Y, %H:%M:%S",
    "%B %d, %Y %H:%M:%S",
    "%B %d, %Y, %H:%M",
    "%B %d, %Y %H:%M",
    "%B %d %Y %I:%M:%S %p",
    "%B %d %Y %I:%M %p",
    "%B %d %Y %H:%M:%S",
    "%B %d %Y %H:%M",
    "%d %B %Y, %H:%M:%S",
    "%d %B %Y %H:%M:%S",
    "%d %B %Y, %H:%M",
    "%d %B %Y %H:%M",
    "%d %B %Y, %I:%M:%S %p",
    "%d %B %Y, %I:%M %p",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y, %I:%M:%S %p",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y, %I:%M %p",
    "%m/%d/%Y %I:%M %p",
    "%a %B %d %H:%M:%S %Y",
    "%a %B %d %H:%M %Y",
];

/// Date-only layouts; the time becomes midnight.
const DATE_LAYOUTS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%B %d %Y",
    "%d %B %Y",
    "%m/%d/%Y",
];

/// Canonicalize a free-form date to `YYYY-MM-DDThh:mm:ss`, keeping the
/// wall-clock time as written. Returns an empty string when no layout fits.
pub fn normalize(text: &str) -> String {
    parse(text)
        .map(|dt| dt.format(CANONICAL).to_string())
        .unwrap_or_default()
}

pub fn parse(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.naive_local());
    }
    if let Some(dt) = parse_epoch(text) {
        return Some(dt);
    }

    let cleaned = clean(text);
    DATETIME_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(&cleaned, layout).ok())
        .or_else(|| {
            DATE_LAYOUTS
                .iter()
                .find_map(|layout| NaiveDate::parse_from_str(&cleaned, layout).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Bare unix time: 10 digits are seconds, 13 are milliseconds. Read as UTC.
fn parse_epoch(text: &str) -> Option<NaiveDateTime> {
    if !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n: i64 = text.parse().ok()?;
    let dt = match text.len() {
        10 => DateTime::from_timestamp(n, 0)?,
        13 => DateTime::from_timestamp_millis(n)?,
        _ => return None,
    };
    Some(dt.naive_utc())
}

fn is_meridiem(s: &str) -> bool {
    s.eq_ignore_ascii_case("AM") || s.eq_ignore_ascii_case("PM")
}

/// Collapse unicode spacing, drop the zone and fix "Sept".
fn clean(text: &str) -> String {
    let mut s = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if let Some(m) = ZONE_RE.find(&s) {
        if !is_meridiem(m.as_str().trim()) {
            s.truncate(m.start());
        }
    }
    if let Some(caps) = MID_ZONE_RE.captures(&s) {
        if !is_meridiem(&caps[2]) {
            let start = caps.get(0).map_or(0, |m| m.start());
            s = format!("{}{} {}", &s[..start], &caps[1], &caps[3]);
        }
    }
    SEPT_RE.replace_all(&s, "Sep").into_owned()
}
