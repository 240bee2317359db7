//! Tolerant date handling for source-reported transaction dates.
//!
//! Sources report timestamps in whatever shape their export produced, so
//! parsing is a documented fallback chain rather than a single format:
//!
//! 1. literal `YYYY-MM-DD` prefix,
//! 2. RFC 3339 / ISO 8601 datetime,
//! 3. `YYYY-MM-DD HH:MM:SS` (space-separated),
//!
//! and `None` when nothing matches. Callers decide what a missing date
//! means (month key falls through to the next source; the backdate check
//! records a data-quality failure).

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use tally_schemas::SourceRecord;

/// Parse the date part of a source-reported timestamp, ignoring time-of-day.
pub fn parse_record_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Some(prefix) = raw.get(..10) {
        if let Ok(d) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(d);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.date());
    }
    None
}

/// Absolute gap in whole days between two source-reported dates.
/// `None` when either side fails to parse.
pub fn date_gap_days(a: &str, b: &str) -> Option<i64> {
    let da = parse_record_date(a)?;
    let db = parse_record_date(b)?;
    Some((da - db).num_days().abs())
}

/// Derive the `YYYY-MM` bucket key for a reference from whichever source
/// reported a usable transaction date first (internal → erp → psp).
///
/// A literal `YYYY-MM` prefix is trusted as-is; otherwise the full parser
/// runs. Returns `"unknown"` when no source has a parseable date.
pub fn month_from_sources(rows: [Option<&SourceRecord>; 3]) -> String {
    for row in rows.into_iter().flatten() {
        let raw = row.transaction_date.trim();
        if raw.is_empty() {
            continue;
        }
        if raw.len() >= 7 && raw.as_bytes()[4] == b'-' {
            if let Some(prefix) = raw.get(..7) {
                return prefix.to_string();
            }
        }
        if let Some(date) = parse_record_date(raw) {
            return date.format("%Y-%m").to_string();
        }
    }
    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_date_prefix_and_rfc3339() {
        assert_eq!(
            parse_record_date("2026-03-05T10:30:00"),
            NaiveDate::from_ymd_opt(2026, 3, 5)
        );
        assert_eq!(
            parse_record_date("2026-03-05T10:30:00+02:00"),
            NaiveDate::from_ymd_opt(2026, 3, 5)
        );
        assert_eq!(parse_record_date("not-a-date"), None);
        assert_eq!(parse_record_date(""), None);
    }

    #[test]
    fn gap_ignores_time_of_day() {
        assert_eq!(
            date_gap_days("2026-03-05T23:59:00", "2026-03-06T00:01:00"),
            Some(1)
        );
        assert_eq!(date_gap_days("2026-03-05", "garbage"), None);
    }
}
