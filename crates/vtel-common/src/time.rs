//! Telemetry timestamp handling
//!
//! Vehicles report ISO-8601 instants with a `Z` suffix, usually with
//! millisecond precision (`2022-06-05T21:02:34.546Z`). The store keeps them as
//! fixed-width UTC text so SQLite can order and range-filter them with plain
//! string comparison.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};

use crate::error::{Result, VtelError};

/// Zone-less layouts accepted as UTC (query bounds typed on a command line).
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a telemetry timestamp into a UTC instant.
///
/// RFC 3339 input with any offset is normalized to UTC; input without an
/// offset is taken to already be UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let trimmed = value.trim();

    match DateTime::parse_from_rfc3339(trimmed) {
        Ok(ts) => Ok(ts.with_timezone(&Utc)),
        Err(rfc_err) => NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
            .map(|naive| naive.and_utc())
            .ok_or_else(|| VtelError::InvalidTimestamp {
                value: value.to_string(),
                reason: rfc_err.to_string(),
            }),
    }
}

/// Render an instant the way it is stored and compared in the database.
pub fn to_storage(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}
