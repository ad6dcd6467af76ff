//! # Temporal Types
//!
//! UTC-only timestamp type. Upload instants are captured on the local clock
//! and normalized to UTC before they reach the catalog; timestamps supplied
//! without an offset are interpreted as UTC, never as local time.

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A UTC timestamp.
///
/// Serializes to RFC 3339 with a `Z` suffix (e.g., `2026-01-15T12:00:00Z`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Capture the current instant.
    ///
    /// Read from the local clock and converted to UTC, so the stored value
    /// is independent of the host timezone.
    pub fn now() -> Self {
        Self(Local::now().with_timezone(&Utc))
    }

    /// Create a timestamp from a `chrono::DateTime<Utc>`.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Interpret a timezone-less datetime as UTC.
    pub fn from_naive_utc(naive: NaiveDateTime) -> Self {
        Self(naive.and_utc())
    }

    /// Parse an externally supplied timestamp.
    ///
    /// RFC 3339 input keeps its offset and is converted to UTC. Input
    /// without offset (`2026-01-15T12:00:00` or `2026-01-15 12:00:00`,
    /// optionally with fractional seconds) is assumed to be UTC.
    pub fn parse(s: &str) -> Result<Self, chrono::ParseError> {
        let s = s.trim();
        match DateTime::parse_from_rfc3339(s) {
            Ok(dt) => Ok(Self(dt.with_timezone(&Utc))),
            Err(rfc_err) => {
                for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
                    if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                        return Ok(Self::from_naive_utc(naive));
                    }
                }
                Err(rfc_err)
            }
        }
    }

    /// Access the underlying `chrono::DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// RFC 3339 rendering with `Z` suffix and second precision.
    pub fn to_rfc3339(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}
