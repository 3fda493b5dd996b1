//! Timestamps are stored as ISO-8601 UTC text and compared as strings,
//! so every writer has to produce exactly the same shape.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Current UTC time, `YYYY-MM-DDTHH:MM:SS.ffffff`
pub fn now_iso() -> String {
    format_timestamp(Utc::now().naive_utc())
}

/// Order `created_at` carries a trailing `Z`
pub fn order_timestamp() -> String {
    format!("{}Z", now_iso())
}

/// `now - hours`, formatted like every other stored timestamp
pub fn hours_ago(hours: i64) -> String {
    format_timestamp(Utc::now().naive_utc() - Duration::hours(hours))
}

pub fn days_ago(days: i64) -> String {
    format_timestamp(Utc::now().naive_utc() - Duration::days(days))
}

/// Reads any of the shapes found in the tables: with or without fraction, `Z`,
/// an explicit offset, a space separator or a bare date.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    let naive = raw.trim_end_matches('Z');
    NaiveDateTime::parse_from_str(naive, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(naive, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| NaiveDate::parse_from_str(naive, "%Y-%m-%d").ok().map(|d| d.and_hms(0, 0, 0)))
}

/// Whole minutes from `from` to `to`, `None` when either side is unreadable
pub fn minutes_between(from: &str, to: &str) -> Option<f64> {
    let from = parse_timestamp(from)?;
    let to = parse_timestamp(to)?;
    Some((to - from).num_milliseconds() as f64 / 60_000.0)
}

/// A bare `YYYY-MM-DD` bound covers the whole day
pub fn expand_date_bound(raw: &str, end: bool) -> String {
    if raw.len() == 10 {
        format!("{}{}", raw, if end { "T23:59:59" } else { "T00:00:00" })
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_has_microseconds_and_sorts_as_text() {
        let now = now_iso();
        assert_eq!(now.len(), 26);
        assert_eq!(&now[10..11], "T");
        assert!(hours_ago(1) < now);
        assert!(order_timestamp().ends_with('Z'));
    }

    #[test]
    fn parses_every_stored_shape() {
        let expected = NaiveDate::from_ymd(2024, 3, 1).and_hms(10, 30, 0);
        assert_eq!(parse_timestamp("2024-03-01T10:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T10:30:00.000000Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01 10:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01T07:30:00-03:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-01"), Some(NaiveDate::from_ymd(2024, 3, 1).and_hms(0, 0, 0)));
        assert_eq!(parse_timestamp("ayer"), None);
    }

    #[test]
    fn minutes_between_mixed_shapes() {
        assert_eq!(minutes_between("2024-03-01T10:00:00Z", "2024-03-01T10:45:30.000000"), Some(45.5));
        assert_eq!(minutes_between("", "2024-03-01T10:45:30"), None);
    }

    #[test]
    fn bare_dates_are_expanded() {
        assert_eq!(expand_date_bound("2024-03-01", false), "2024-03-01T00:00:00");
        assert_eq!(expand_date_bound("2024-03-01", true), "2024-03-01T23:59:59");
        assert_eq!(expand_date_bound("2024-03-01T12:00", true), "2024-03-01T12:00");
    }
}
