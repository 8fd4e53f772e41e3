//! `YYYY-MM-DD HH:MM:SS` timestamps, the only date format clients parse.

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serializer};

pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render a timestamp in wire format. Sub-second precision is discarded.
pub fn format(ts: &NaiveDateTime) -> String {
    ts.format(FORMAT).to_string()
}

/// Parse a wire-format timestamp.
pub fn parse(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, FORMAT)
}

pub fn serialize<S: Serializer>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format(ts))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse(&raw).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_fractional_seconds() {
        let ts = parse("2024-01-01 00:00:01").unwrap()
            + chrono::Duration::milliseconds(750);
        assert_eq!(format(&ts), "2024-01-01 00:00:01");
    }

    #[test]
    fn rejects_iso_t_separator() {
        assert!(parse("2024-01-01T00:00:01").is_err());
    }
}
