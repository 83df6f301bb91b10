//! Fixed-width UTC timestamps used by every persisted record.
//!
//! Values are kept at microsecond precision so that a formatted timestamp parses back to an
//! identical value, and so that lexical order of the text equals chronological order.

use chrono::{DateTime, Duration, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serializer};

pub const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

// Naive ISO-8601 as written by older versions of the state files. It carries no offset and is
// read as UTC.
const LEGACY_NAIVE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Returns a timestamp strictly later than `prev`, bumping by one microsecond when the clock
/// has not moved (or moved backwards).
pub fn after(prev: DateTime<Utc>) -> DateTime<Utc> {
    let now = now();
    if now > prev {
        now
    } else {
        prev + Duration::microseconds(1)
    }
}

pub fn format(ts: &DateTime<Utc>) -> String {
    ts.format(FORMAT).to_string()
}

pub fn parse(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    let s = s.trim();
    match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => Ok(dt.with_timezone(&Utc).trunc_subsecs(6)),
        Err(rfc_err) => NaiveDateTime::parse_from_str(s, LEGACY_NAIVE_FORMAT)
            .map(|naive| naive.and_utc().trunc_subsecs(6))
            .map_err(|_| rfc_err),
    }
}

pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format(ts))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).map_err(|e| serde::de::Error::custom(format!("invalid timestamp '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_with_fixed_width() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap();
        assert_eq!(format(&ts), "2026-01-05T08:00:00.000000Z");
    }

    #[test]
    fn parses_own_format_and_rfc3339_offsets() {
        let ts = parse("2026-01-05T08:00:00.123456Z").unwrap();
        assert_eq!(format(&ts), "2026-01-05T08:00:00.123456Z");

        let kst = parse("2026-01-05T17:00:00+09:00").unwrap();
        assert_eq!(kst, Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap());
    }

    #[test]
    fn parses_legacy_naive_timestamps_as_utc() {
        let ts = parse("2025-07-14T09:31:02.481923").unwrap();
        assert_eq!(format(&ts), "2025-07-14T09:31:02.481923Z");
    }

    #[test]
    fn truncates_to_microseconds() {
        let ts = parse("2026-01-05T08:00:00.123456789Z").unwrap();
        assert_eq!(ts, parse(&format(&ts)).unwrap());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse("yesterday").is_err());
        assert!(parse("2026-13-45T00:00:00Z").is_err());
    }

    #[test]
    fn after_is_strictly_later() {
        let future = now() + Duration::hours(1);
        assert_eq!(after(future), future + Duration::microseconds(1));

        let past = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        assert!(after(past) > past);
    }
}
