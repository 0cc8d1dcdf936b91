//! RFC 3339 string timestamps for stored documents.
//!
//! Older documents were written with naive ISO-8601 strings (no offset); those
//! are read back as UTC.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use mongodb::bson::Bson;
use serde::{Deserialize, Deserializer, Serializer};

pub fn format(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|naive| Utc.from_utc_datetime(&naive))
        })
}

/// Value for use inside `doc!` updates, matching the serialized form.
pub fn to_bson(value: &DateTime<Utc>) -> Bson {
    Bson::String(format(value))
}

pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format(value))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse(&raw).map_err(serde::de::Error::custom)
}

pub mod option {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_some(&super::format(v)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Option::<String>::deserialize(deserializer)?
            .filter(|raw| !raw.is_empty())
            .map(|raw| super::parse(&raw).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parses_rfc3339_with_offset() {
        let t = parse("2024-03-01T10:00:00+02:00").unwrap();
        assert_eq!(t.hour(), 8);
    }

    #[test]
    fn parses_naive_legacy_timestamps_as_utc() {
        let t = parse("2024-03-01T10:00:00.123456").unwrap();
        assert_eq!(t.day(), 1);
        assert_eq!(t.hour(), 10);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse("yesterday").is_err());
    }

    #[test]
    fn format_round_trips_through_parse() {
        let now = Utc::now();
        let parsed = parse(&format(&now)).unwrap();
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
    }
}
