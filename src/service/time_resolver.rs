//! Wall-clock to absolute time conversion.
//!
//! Offsets are looked up per calendar date in the tz database, so the same
//! local hour can land on different UTC offsets either side of a DST change.
//! Any offset already attached to the input is discarded: only the zone id
//! decides the result.

use chrono::{Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone};
use chrono_tz::Tz;

use crate::error::TimeError;
use crate::models::time::AbsoluteTime;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Resolves `local_datetime` as a wall-clock reading in `zone_id`.
pub fn resolve(local_datetime: &str, zone_id: &str) -> Result<AbsoluteTime, TimeError> {
    let tz = parse_zone(zone_id)?;
    let naive = parse_naive(strip_offset(local_datetime))
        .ok_or_else(|| TimeError::InvalidTimeFormat(local_datetime.to_string()))?;
    localize(&tz, naive).ok_or_else(|| TimeError::InvalidTimeFormat(local_datetime.to_string()))
}

pub fn parse_zone(zone_id: &str) -> Result<Tz, TimeError> {
    zone_id
        .trim()
        .parse::<Tz>()
        .map_err(|_| TimeError::UnknownTimeZone(zone_id.to_string()))
}

/// Drops a trailing `Z`, `+HH:MM` or `-HH:MM` marker.
pub fn strip_offset(value: &str) -> &str {
    let trimmed = value.trim();
    if let Some(rest) = trimmed.strip_suffix('Z') {
        return rest;
    }
    let Some(split) = trimmed.len().checked_sub(6) else {
        return trimmed;
    };
    if !trimmed.is_char_boundary(split) {
        return trimmed;
    }
    let (head, tail) = trimmed.split_at(split);
    let b = tail.as_bytes();
    let is_offset = (b[0] == b'+' || b[0] == b'-')
        && b[1].is_ascii_digit()
        && b[2].is_ascii_digit()
        && b[3] == b':'
        && b[4].is_ascii_digit()
        && b[5].is_ascii_digit();
    if is_offset { head } else { trimmed }
}

fn parse_naive(value: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

// Ambiguous readings (clocks going back) take the earlier instant. Readings
// inside a gap (clocks going forward) keep the offset in force before the gap.
fn localize(tz: &Tz, naive: NaiveDateTime) -> Option<AbsoluteTime> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(AbsoluteTime::new(dt.fixed_offset())),
        LocalResult::Ambiguous(earliest, _) => Some(AbsoluteTime::new(earliest.fixed_offset())),
        LocalResult::None => {
            let before = (1..=48).find_map(|hours| {
                tz.from_local_datetime(&(naive - Duration::hours(hours)))
                    .earliest()
            })?;
            let offset = before.offset().fix();
            offset
                .from_local_datetime(&naive)
                .single()
                .map(AbsoluteTime::new)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_zone_offset_for_the_date() {
        let winter = resolve("2025-11-05T09:00:00", "Asia/Jerusalem").unwrap();
        let summer = resolve("2025-07-01T09:00:00", "Asia/Jerusalem").unwrap();
        assert_eq!(winter.to_string(), "2025-11-05T09:00:00+02:00");
        assert_eq!(summer.to_string(), "2025-07-01T09:00:00+03:00");
    }

    #[test]
    fn same_local_hour_differs_across_dst_boundary() {
        let march = resolve("2025-03-01T09:00:00", "America/New_York").unwrap();
        let november = resolve("2025-11-01T09:00:00", "America/New_York").unwrap();
        assert_eq!(march.offset_seconds(), -5 * 3600);
        assert_eq!(november.offset_seconds(), -4 * 3600);
    }

    #[test]
    fn existing_offset_is_ignored() {
        let expected = resolve("2025-11-05T09:00:00", "Asia/Jerusalem").unwrap();
        for marked in [
            "2025-11-05T09:00:00Z",
            "2025-11-05T09:00:00+05:00",
            "2025-11-05T09:00:00-02:00",
        ] {
            assert_eq!(resolve(marked, "Asia/Jerusalem").unwrap(), expected, "{marked}");
            assert_eq!(
                resolve(marked, "Asia/Jerusalem").unwrap().to_string(),
                expected.to_string()
            );
        }
    }

    #[test]
    fn accepts_fractional_seconds_and_bare_dates() {
        let t = resolve("2025-11-05T09:00:00.250", "UTC").unwrap();
        assert_eq!(t.to_string(), "2025-11-05T09:00:00.250+00:00");
        let d = resolve("2025-11-05", "UTC").unwrap();
        assert_eq!(d.to_string(), "2025-11-05T00:00:00+00:00");
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(
            resolve("tomorrow at noon", "Asia/Jerusalem"),
            Err(TimeError::InvalidTimeFormat("tomorrow at noon".to_string()))
        );
        assert_eq!(
            resolve("2025-13-40T09:00:00", "Asia/Jerusalem"),
            Err(TimeError::InvalidTimeFormat("2025-13-40T09:00:00".to_string()))
        );
    }

    #[test]
    fn rejects_unknown_zone() {
        assert_eq!(
            resolve("2025-11-05T09:00:00", "Mars/Olympus_Mons"),
            Err(TimeError::UnknownTimeZone("Mars/Olympus_Mons".to_string()))
        );
    }

    #[test]
    fn ambiguous_reading_takes_earlier_instant() {
        let t = resolve("2025-11-02T01:30:00", "America/New_York").unwrap();
        assert_eq!(t.to_string(), "2025-11-02T01:30:00-04:00");
    }

    #[test]
    fn gap_reading_keeps_previous_offset() {
        let t = resolve("2025-03-09T02:30:00", "America/New_York").unwrap();
        assert_eq!(t.to_string(), "2025-03-09T02:30:00-05:00");
    }

    #[test]
    fn strip_offset_leaves_plain_values_alone() {
        assert_eq!(strip_offset("2025-11-05"), "2025-11-05");
        assert_eq!(strip_offset("2025-11-05T09:00:00"), "2025-11-05T09:00:00");
        assert_eq!(strip_offset(" 2025-11-05T09:00:00+03:00 "), "2025-11-05T09:00:00");
    }
}
