//! Common utilities and helper functions
//!
//! Timestamp formatting shared by the registry, the normalizer and the
//! summary pass, plus A1-notation helpers for the spreadsheet backends.

pub mod error;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use url::Url;

/// Format used for refresh and sync timestamps
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format used for publish dates
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Render a timestamp as `YYYY-MM-DD HH:MM:SS`
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a `YYYY-MM-DD HH:MM:SS` timestamp as UTC
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text.trim(), TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Render epoch milliseconds as a calendar date
pub fn format_epoch_millis(millis: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|ts| ts.date_naive().format(DATE_FORMAT).to_string())
        .unwrap_or_default()
}

/// Convert a 1-based column number to its spreadsheet letter (1 → A, 34 → AH)
pub fn column_letter(mut column: usize) -> String {
    let mut letters = Vec::new();
    while column > 0 {
        let rem = (column - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        column = (column - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Build an A1 range such as `'Stats'!A1:AH12`
///
/// Rows and columns are 1-based and inclusive.
pub fn a1_range(sheet: &str, first_row: usize, first_col: usize, last_row: usize, last_col: usize) -> String {
    format!(
        "{}!{}{}:{}{}",
        quote_sheet_name(sheet),
        column_letter(first_col),
        first_row,
        column_letter(last_col),
        last_row
    )
}

/// Build a single-cell A1 reference
pub fn a1_cell(sheet: &str, row: usize, col: usize) -> String {
    format!("{}!{}{}", quote_sheet_name(sheet), column_letter(col), row)
}

fn quote_sheet_name(sheet: &str) -> String {
    format!("'{}'", sheet.replace('\'', "''"))
}

/// Extract the host from a URL
pub fn extract_domain(url: &str) -> Result<String> {
    let parsed = Url::parse(url).context("Invalid URL")?;

    parsed
        .host_str()
        .map(|s| s.to_string())
        .context("No host in URL")
}

/// Truncate text to a maximum length on a char boundary
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_len.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_roundtrip() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        assert_eq!(format_timestamp(ts), "2024-03-05 07:08:09");
        assert_eq!(parse_timestamp("2024-03-05 07:08:09"), Some(ts));
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("2024-03-05").is_none());
    }

    #[test]
    fn test_format_epoch_millis() {
        assert_eq!(format_epoch_millis(0), "1970-01-01");
        assert_eq!(format_epoch_millis(1_612_137_600_000), "2021-02-01");
    }

    #[test]
    fn test_column_letter() {
        assert_eq!(column_letter(1), "A");
        assert_eq!(column_letter(26), "Z");
        assert_eq!(column_letter(27), "AA");
        assert_eq!(column_letter(34), "AH");
        assert_eq!(column_letter(703), "AAA");
    }

    #[test]
    fn test_a1_range() {
        assert_eq!(a1_range("Stats", 1, 1, 3, 34), "'Stats'!A1:AH3");
        assert_eq!(a1_cell("Form Responses 1", 5, 6), "'Form Responses 1'!F5");
        assert_eq!(a1_cell("Ken's", 1, 1), "'Ken''s'!A1");
    }

    #[test]
    fn test_extract_domain() {
        let domain = extract_domain("https://public.tableau.com/profile/api/someone");
        assert_eq!(domain.unwrap(), "public.tableau.com");
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("very long text here", 10), "very lo...");
    }
}
