//! Datetime serialization/deserialization helpers.
//!
//! Rows store timestamps as Unix seconds, so the serde representation does too:
//! - Serialization: `DateTime<Utc>` -> Unix seconds
//! - Deserialization: Unix seconds/milliseconds or RFC3339 string -> `DateTime<Utc>`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum TimestampOrString {
    I64(i64),
    String(String),
}

/// Serializes `DateTime<Utc>` as Unix seconds.
pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_i64(dt.timestamp())
}

/// Deserializes `DateTime<Utc>` from a Unix timestamp or RFC3339.
pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match TimestampOrString::deserialize(deserializer)? {
        TimestampOrString::I64(ts) => {
            from_unix(ts).ok_or_else(|| Error::custom("Invalid Unix timestamp"))
        }
        TimestampOrString::String(s) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| Error::custom(format!("Invalid RFC3339 timestamp: {e}"))),
    }
}

/// `Option<DateTime<Utc>>` where `None` is stored as `0`.
///
/// Matches the column convention: `ban_time = 0` is a permanent ban and
/// `last_resolved_at = 0` means never.
pub mod zero_none {
    use super::{DateTime, Deserialize, Deserializer, Serializer, TimestampOrString, Utc};

    /// Serializes `None` as `0`.
    pub fn serialize<S>(dt: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(super::to_unix(*dt))
    }

    /// Deserializes `0`, `null` or a missing value as `None`.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::Error;

        match Option::<TimestampOrString>::deserialize(deserializer)? {
            None | Some(TimestampOrString::I64(0)) => Ok(None),
            Some(TimestampOrString::I64(ts)) => super::from_unix(ts)
                .map(Some)
                .ok_or_else(|| Error::custom("Invalid Unix timestamp")),
            Some(TimestampOrString::String(s)) => DateTime::parse_from_rfc3339(&s)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(|e| Error::custom(format!("Invalid RFC3339 timestamp: {e}"))),
        }
    }
}

/// `None` -> `0`, otherwise Unix seconds.
#[must_use]
pub fn to_unix(dt: Option<DateTime<Utc>>) -> i64 {
    dt.map_or(0, |dt| dt.timestamp())
}

/// `0` -> `None`, otherwise the instant.
#[must_use]
pub fn from_unix_opt(ts: i64) -> Option<DateTime<Utc>> {
    if ts == 0 { None } else { from_unix(ts) }
}

/// Parses a Unix timestamp with second/millisecond auto-detection.
#[must_use]
pub fn from_unix(ts: i64) -> Option<DateTime<Utc>> {
    // Values larger than 10^11 are interpreted as milliseconds.
    if ts > 100_000_000_000 {
        DateTime::from_timestamp_millis(ts)
    } else {
        DateTime::from_timestamp(ts, 0)
    }
}
