// src/utils/dates.rs

//! Event date parsing and the lookahead window.
//!
//! Dates carrying an offset (ISO-8601 with `Z` or `±hh:mm`) are taken at face
//! value. Naive dates are interpreted in the institution's local zone and then
//! converted to UTC. All serialized datetimes are ISO-8601 with a `Z` suffix.

use chrono::{
    DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc, Weekday,
};
use chrono_tz::Tz;

/// ISO-8601 layouts that carry an explicit offset.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
];

/// Naive layouts with a time component, tried in order.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %I:%M %p",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %I:%M %p",
    "%m-%d-%Y %I:%M %p",
    "%B %d, %Y %I:%M %p",
    "%b %d, %Y %I:%M %p",
];

/// Naive date-only layouts; these resolve to local midnight.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%m-%d-%Y", "%B %d, %Y", "%b %d, %Y"];

/// Parse an event date string into UTC.
///
/// Sub-second precision is dropped so the value matches its serialized form.
pub fn parse_datetime(raw: &str, tz: Tz) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    parse_with_offset(s)
        .or_else(|| parse_naive(strip_weekday(s)).and_then(|naive| localize(naive, tz)))
        .and_then(|dt| dt.with_nanosecond(0))
}

fn parse_with_offset(s: &str) -> Option<DateTime<Utc>> {
    let normalized = match s.strip_suffix('Z').or_else(|| s.strip_suffix('z')) {
        Some(head) => format!("{head}+00:00"),
        None => s.to_string(),
    };

    OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(&normalized, fmt).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_naive(s: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Drop a leading "Monday," / "Mon," so a stale weekday cannot veto the date.
fn strip_weekday(s: &str) -> &str {
    match s.split_once(',') {
        Some((head, rest)) if head.trim().parse::<Weekday>().is_ok() => rest.trim(),
        _ => s,
    }
}

/// Attach the local zone to a naive value and convert to UTC.
///
/// Ambiguous wall times (DST fall-back) take the earlier instant; wall times
/// inside a spring-forward gap are shifted one hour forward.
fn localize(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    let local = match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => tz
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest(),
    };
    local.map(|dt| dt.with_timezone(&Utc))
}

/// Format a UTC datetime as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn to_iso_utc(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Whether `start` falls within `[now, now + days_lookahead]` (both ends inclusive).
///
/// A window reaching past the representable range is open-ended.
pub fn within_lookahead(start: &DateTime<Utc>, now: &DateTime<Utc>, days_lookahead: i64) -> bool {
    let window_end = Duration::try_days(days_lookahead).and_then(|d| now.checked_add_signed(d));
    match window_end {
        Some(end) => *start >= *now && *start <= end,
        None => days_lookahead > 0 && *start >= *now,
    }
}

/// Serde adapter for `DateTime<Utc>` as a `Z`-suffixed ISO string.
pub mod iso_utc {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::to_iso_utc(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for `Option<DateTime<Utc>>`.
pub mod iso_utc_opt {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &Option<DateTime<Utc>>, s: S) -> Result<S::Ok, S::Error> {
        match dt {
            Some(dt) => s.serialize_some(&super::to_iso_utc(dt)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|raw| {
                DateTime::parse_from_rfc3339(&raw)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(serde::de::Error::custom)
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use chrono_tz::America::New_York;

    fn parse(s: &str) -> DateTime<Utc> {
        parse_datetime(s, New_York).unwrap_or_else(|| panic!("failed to parse {s:?}"))
    }

    #[test]
    fn test_supported_formats_land_on_same_day() {
        for input in [
            "2025-01-15T15:00:00Z",
            "01/15/2025 3:00 PM",
            "January 15, 2025 3:00 PM",
            "Monday, January 15, 2025",
        ] {
            let dt = parse(input);
            let iso = to_iso_utc(&dt);
            assert!(iso.ends_with('Z'), "{iso}");
            assert!(iso.starts_with("2025-01-15T"), "{input} -> {iso}");
            assert_eq!((dt.year(), dt.month(), dt.day()), (2025, 1, 15));
        }
    }

    #[test]
    fn test_iso_with_z_is_taken_verbatim() {
        assert_eq!(to_iso_utc(&parse("2025-01-15T15:00:00Z")), "2025-01-15T15:00:00Z");
    }

    #[test]
    fn test_iso_with_offset_converts_to_utc() {
        assert_eq!(
            to_iso_utc(&parse("2025-01-15T15:00:00-05:00")),
            "2025-01-15T20:00:00Z"
        );
    }

    #[test]
    fn test_naive_values_use_local_zone() {
        // EST in January is UTC-5
        assert_eq!(to_iso_utc(&parse("2025-01-15T15:00:00")), "2025-01-15T20:00:00Z");
        // EDT in July is UTC-4
        assert_eq!(to_iso_utc(&parse("07/04/2025 6:30 PM")), "2025-07-04T22:30:00Z");
    }

    #[test]
    fn test_fractional_seconds_are_dropped() {
        assert_eq!(
            to_iso_utc(&parse("2025-01-15T15:00:00.750Z")),
            "2025-01-15T15:00:00Z"
        );
    }

    #[test]
    fn test_abbreviated_weekday_and_month() {
        let dt = parse("Wed, Jan 15, 2025");
        assert_eq!((dt.month(), dt.day()), (1, 15));
    }

    #[test]
    fn test_spring_forward_gap_shifts_forward() {
        // 2:30 AM does not exist in New York on 2025-03-09
        assert_eq!(
            to_iso_utc(&parse("2025-03-09 02:30:00")),
            "2025-03-09T07:30:00Z"
        );
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(parse_datetime("", New_York).is_none());
        assert!(parse_datetime("   ", New_York).is_none());
        assert!(parse_datetime("next tuesday-ish", New_York).is_none());
        assert!(parse_datetime("2025-13-45", New_York).is_none());
    }

    #[test]
    fn test_lookahead_boundaries() {
        let now = parse("2025-01-01T12:00:00Z");
        let edge = now + Duration::days(30);

        assert!(within_lookahead(&now, &now, 30));
        assert!(within_lookahead(&edge, &now, 30));
        assert!(!within_lookahead(&(edge + Duration::seconds(1)), &now, 30));
        assert!(!within_lookahead(&(now - Duration::seconds(1)), &now, 30));
    }

    #[test]
    fn test_huge_lookahead_does_not_overflow() {
        let now = parse("2025-01-01T12:00:00Z");
        let later = now + Duration::days(400);

        assert!(within_lookahead(&later, &now, 200_000_000));
        assert!(within_lookahead(&later, &now, i64::MAX));
        assert!(!within_lookahead(&(now - Duration::seconds(1)), &now, i64::MAX));
        assert!(!within_lookahead(&later, &now, i64::MIN));
    }
}
