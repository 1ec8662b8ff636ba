//! Timestamp helpers.
//!
//! Timestamps are written as RFC 3339.  Reading also accepts ISO 8601
//! without an offset, which is taken as UTC.
//!
//! Use with `#[serde(with = "crate::utils::time")]` for required timestamps
//! and `#[serde(with = "crate::utils::time::option")]` for optional ones.

use serde::{Deserialize, Deserializer, Serializer};
use time::format_description::well_known::{Iso8601, Rfc3339};
use time::{OffsetDateTime, PrimitiveDateTime};

/// The current UTC time, truncated to whole milliseconds.
///
/// Truncation keeps timestamps stable across an RFC 3339 round trip.
pub fn now() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    let millis = now.millisecond();
    now.replace_millisecond(millis).unwrap_or(now)
}

/// Parse an RFC 3339 or ISO 8601 timestamp.  A missing offset means UTC.
pub fn parse(s: &str) -> Result<OffsetDateTime, time::error::Parse> {
    OffsetDateTime::parse(s, &Rfc3339)
        .or_else(|_| OffsetDateTime::parse(s, &Iso8601::DEFAULT))
        .or_else(|_| PrimitiveDateTime::parse(s, &Iso8601::DEFAULT).map(|dt| dt.assume_utc()))
}

/// Deserialize an RFC 3339 or ISO 8601 string into an OffsetDateTime
pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse(&s).map_err(serde::de::Error::custom)
}

/// Serialize an OffsetDateTime into an RFC 3339 formatted string
pub fn serialize<S>(datetime: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let s = datetime
        .format(&Rfc3339)
        .map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&s)
}

pub mod option {
    use super::*;

    /// Deserialize an optional RFC 3339 or ISO 8601 string.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = Option::<String>::deserialize(deserializer)?;
        s.map(|s| super::parse(&s).map_err(serde::de::Error::custom))
            .transpose()
    }

    /// Serialize an optional OffsetDateTime as an RFC 3339 string or null.
    pub fn serialize<S>(datetime: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match datetime {
            Some(datetime) => super::serialize(datetime, serializer),
            None => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use time::OffsetDateTime;
    use time::macros::datetime;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Stamped {
        #[serde(with = "super")]
        at: OffsetDateTime,
        #[serde(default, with = "super::option")]
        maybe: Option<OffsetDateTime>,
    }

    #[test]
    fn parses_rfc3339_with_offset() {
        let json = r#"{"at":"2024-05-01T12:30:00+02:00","maybe":null}"#;
        let stamped: Stamped = serde_json::from_str(json).unwrap();
        assert_eq!(stamped.at, datetime!(2024-05-01 10:30:00 UTC));
        assert!(stamped.maybe.is_none());
    }

    #[test]
    fn missing_optional_is_none() {
        let stamped: Stamped = serde_json::from_str(r#"{"at":"2024-05-01T10:30:00Z"}"#).unwrap();
        assert!(stamped.maybe.is_none());
    }

    #[test]
    fn offsetless_iso8601_is_utc() {
        let json = r#"{"at":"2024-01-02T03:04:05.123456","maybe":"2024-01-02T03:04:05"}"#;
        let stamped: Stamped = serde_json::from_str(json).unwrap();
        assert_eq!(stamped.at, datetime!(2024-01-02 03:04:05.123456 UTC));
        assert_eq!(stamped.maybe, Some(datetime!(2024-01-02 03:04:05 UTC)));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(serde_json::from_str::<Stamped>(r#"{"at":"yesterday"}"#).is_err());
        assert!(super::parse("2024-13-01T00:00:00").is_err());
    }

    #[test]
    fn now_has_no_sub_millisecond_part() {
        let now = super::now();
        assert_eq!(now.nanosecond() % 1_000_000, 0);
    }
}
