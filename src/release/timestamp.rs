//! Timestamp parsing for upstream date strings

use chrono::{DateTime, NaiveDateTime, Timelike};

/// Parse an upstream date into a second-precision UTC timestamp
///
/// Accepts RFC 3339 (with `Z` or an offset) and naive ISO-8601 forms with a
/// `T` or space separator. Returns `None` for anything else.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();

    let parsed = DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f"))
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()?;

    parsed.with_nanosecond(0)
}
