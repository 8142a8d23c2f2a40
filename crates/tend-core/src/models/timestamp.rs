//! Timestamp helpers shared by every syncable record.
//!
//! `updatedAt` travels as an RFC 3339 string. Older payloads may carry epoch
//! milliseconds instead, and corrupted ones may carry anything at all; both are
//! accepted here so a bad stamp degrades to "oldest" instead of failing the
//! whole record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Comparison key for an optional stamp. Absent stamps sort as the epoch.
pub fn stamp_millis(stamp: Option<DateTime<Utc>>) -> i64 {
    stamp.map_or(0, |stamp| stamp.timestamp_millis())
}

/// Next mutation stamp: the current time, but always at least one
/// millisecond after `previous` so it wins a comparison at merge precision.
pub fn next_stamp(previous: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = Utc::now();
    let millis = now
        .timestamp_millis()
        .max(stamp_millis(previous).saturating_add(1));
    DateTime::from_timestamp_millis(millis).unwrap_or(now)
}

/// Parse a loosely typed stamp value.
pub fn parse_stamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => DateTime::parse_from_rfc3339(raw.trim())
            .ok()
            .map(|stamp| stamp.with_timezone(&Utc)),
        Value::Number(number) => number.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

/// `deserialize_with` target for optional stamps that must never fail.
pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_stamp))
}
