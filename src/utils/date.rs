//! Timestamp parsing and formatting for post metadata.
//!
//! Metadata files store local wall-clock timestamps as `YYYY-MM-DD HH:MM:SS`.
//! Older records and hand-written content headers use a handful of other
//! shapes, all accepted by [`parse_timestamp`].
//!
//! # Examples
//!
//! ```ignore
//! let ts = parse_timestamp("2024-03-10 10:00:00").unwrap();
//! assert_eq!(format_timestamp(&ts), "2024-03-10 10:00:00");
//! assert_eq!(sort_key(&ts), "20240310100000");
//! assert_eq!(day_of_year(&ts), "070");
//! ```

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, Timelike};

/// On-disk timestamp format.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Naive formats tried in order before RFC 3339.
const NAIVE_FORMATS: &[&str] = &[
    TIMESTAMP_FORMAT,
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Current local wall-clock time, truncated to whole seconds.
pub fn now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Parse any accepted timestamp shape into local wall-clock time.
///
/// Offsets (RFC 3339) are converted to the local zone; bare dates map to
/// midnight.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    for format in NAIVE_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, format) {
            return Some(ts);
        }
    }

    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Local).naive_local());
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Format a timestamp for metadata files.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Lexicographically sortable key: `YYYYmmddHHMMSS`.
pub fn sort_key(ts: &NaiveDateTime) -> String {
    ts.format("%Y%m%d%H%M%S").to_string()
}

/// Four digit year.
pub fn year(ts: &NaiveDateTime) -> String {
    format!("{:04}", ts.year())
}

/// Zero-padded day of year (`001`..`366`).
pub fn day_of_year(ts: &NaiveDateTime) -> String {
    format!("{:03}", ts.ordinal())
}

/// Serde adapters for `NaiveDateTime` fields stored as metadata strings.
pub mod serde_timestamp {
    use super::{format_timestamp, parse_timestamp};
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_timestamp(ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse_timestamp(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp `{raw}`")))
    }

    pub mod option {
        use super::{format_timestamp, parse_timestamp};
        use chrono::NaiveDateTime;
        use serde::{Deserialize, Deserializer, Serializer, de::Error};

        pub fn serialize<S: Serializer>(
            ts: &Option<NaiveDateTime>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match ts {
                Some(ts) => s.serialize_str(&format_timestamp(ts)),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<NaiveDateTime>, D::Error> {
            match Option::<String>::deserialize(d)? {
                None => Ok(None),
                Some(raw) if raw.trim().is_empty() => Ok(None),
                Some(raw) => parse_timestamp(&raw)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("invalid timestamp `{raw}`"))),
            }
        }
    }
}
