//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Formats a timestamp as `2026-03-04 10:00`.
///
/// Takes the `Display` form of `DateTime<Utc>` or RFC 3339; anything else is
/// passed through.
///
/// Usage in templates: `{{ entry.created_at|date_time }}`
#[askama::filter_fn]
pub fn date_time(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(format_date_time(&value.to_string()))
}

fn format_date_time(raw: &str) -> String {
    const FORMAT: &str = "%Y-%m-%d %H:%M";
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return dt.format(FORMAT).to_string();
    }
    raw.strip_suffix(" UTC")
        .and_then(|s| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok())
        .map_or_else(|| raw.to_string(), |dt| dt.format(FORMAT).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_date_time() {
        assert_eq!(format_date_time("2026-03-04T10:05:00Z"), "2026-03-04 10:05");
        assert_eq!(format_date_time("2026-03-04 10:05:59.5 UTC"), "2026-03-04 10:05");
        assert_eq!(format_date_time("n/a"), "n/a");
    }
}
