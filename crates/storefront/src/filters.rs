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

/// Returns the stylesheet URL, cache-busted when the build hashed it.
///
/// Usage in templates: `{{ ""|css_href }}`
#[askama::filter_fn]
pub fn css_href(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(stylesheet_href(env!("CSS_HASH")))
}

fn stylesheet_href(hash: &str) -> String {
    if hash.is_empty() {
        "/static/css/main.css".to_string()
    } else {
        format!("/static/css/derived/main.{hash}.css")
    }
}

/// Formats a timestamp as a short date, e.g. `Mar 4, 2026`.
///
/// Accepts RFC 3339 and the `Display` form of `DateTime<Utc>`. Anything
/// unparseable is rendered as-is.
///
/// Usage in templates: `{{ order.created_at|short_date }}`
#[askama::filter_fn]
pub fn short_date(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(format_short_date(&value.to_string()))
}

fn format_short_date(raw: &str) -> String {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return dt.format("%b %-d, %Y").to_string();
    }
    raw.strip_suffix(" UTC")
        .and_then(|s| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok())
        .map_or_else(|| raw.to_string(), |dt| dt.format("%b %-d, %Y").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stylesheet_href() {
        assert_eq!(stylesheet_href(""), "/static/css/main.css");
        assert_eq!(stylesheet_href("ab12cd34"), "/static/css/derived/main.ab12cd34.css");
    }

    #[test]
    fn test_format_short_date() {
        assert_eq!(format_short_date("2026-03-04T10:00:00Z"), "Mar 4, 2026");
        assert_eq!(format_short_date("2026-03-04 10:00:00.123 UTC"), "Mar 4, 2026");
        assert_eq!(format_short_date("yesterday"), "yesterday");
    }
}
