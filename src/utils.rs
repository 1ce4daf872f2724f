// Utility functions
use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Parses an ISO-8601 date (`2024-03-01`) or RFC 3339 timestamp, keeping only the calendar date.
pub fn parse_date(date_str: &str) -> Option<NaiveDate> {
    let trimmed = date_str.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(trimmed).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            // "2024-03-01T00:00:00" without an offset
            NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|dt| dt.date())
        })
}

/// Calendar days from `from` to `to` (negative if `to` is earlier).
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// Relative float comparison; values near zero fall back to an absolute check.
pub fn approx_eq(a: f64, b: f64, rel_tol: f64) -> bool {
    if a == b {
        return true;
    }
    let scale = a.abs().max(b.abs());
    (a - b).abs() <= rel_tol * scale.max(1.0)
}
