//! Timestamp formatting for rendered payloads.

use chrono::{DateTime, SecondsFormat, Utc};

/// Current UTC time as RFC 3339 with millisecond precision.
///
/// This is NOT deterministic - each call returns the current time.
pub fn now_rfc3339() -> String {
    format_timestamp(Utc::now())
}

/// Format a timestamp the way payloads carry it.
pub fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}
