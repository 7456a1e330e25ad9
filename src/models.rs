// Core data structures for statsync

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of reading one registry cell
///
/// The tabular store omits trailing empty cells, so a cell past the end of
/// a row is `Missing` while a present-but-empty cell is `Blank`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellRead {
    Found(String),
    Blank,
    Missing,
}

impl CellRead {
    /// Read a 0-based column out of a row
    pub fn from_row(row: &[String], index: usize) -> Self {
        match row.get(index) {
            None => Self::Missing,
            Some(value) if value.trim().is_empty() => Self::Blank,
            Some(value) => Self::Found(value.trim().to_string()),
        }
    }

    /// The value, when one is present
    pub fn found(&self) -> Option<&str> {
        match self {
            Self::Found(value) => Some(value),
            Self::Blank | Self::Missing => None,
        }
    }

    /// The value, or an empty string for blank and missing cells
    pub fn text(&self) -> String {
        self.found().unwrap_or_default().to_string()
    }
}

/// One subscriber row of the sign-up registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    /// 1-based row number in the registry sheet
    pub row: usize,
    pub email: CellRead,
    pub first_name: CellRead,
    pub last_name: CellRead,
    pub profile_id: CellRead,
    pub destination: CellRead,
    pub last_refreshed: CellRead,
}

impl RegistryEntry {
    /// The upstream profile id, if the row carries one
    pub fn profile_id(&self) -> Option<&str> {
        self.profile_id.found()
    }

    /// The stored destination reference, if any
    pub fn destination_ref(&self) -> Option<&str> {
        self.destination.found()
    }

    /// Parsed last-refreshed timestamp; unparsable values count as absent
    pub fn last_refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.last_refreshed
            .found()
            .and_then(crate::utils::parse_timestamp)
    }

    /// `Last, First` label used in logs and destination titles
    pub fn display_name(&self) -> String {
        format!("{}, {}", self.last_name.text(), self.first_name.text())
    }
}

/// Geographic location parsed from the profile's embedded address document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub country: String,
    pub region: String,
    pub city: String,
}

/// Social links derived from the profile's website list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialLinks {
    pub website: String,
    pub linkedin: String,
    pub twitter: String,
    pub facebook: String,
}

/// Public metadata of one upstream profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub name: String,
    pub organization: String,
    pub bio: String,
    pub avatar_url: String,
    pub follower_count: i64,
    pub following_count: i64,
    /// Canonical profile identifier as reported upstream
    pub profile_name: String,
    pub searchable: bool,
    pub featured_publication: String,
    pub location: Location,
    pub social: SocialLinks,
}

/// One published workbook belonging to a profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicationRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub default_view_ref: String,
    pub default_view_name: String,
    pub visible: bool,
    pub permalink: String,
    pub view_count: i64,
    pub favorite_count: i64,
    /// Epoch milliseconds
    pub first_published: i64,
    /// Epoch milliseconds
    pub last_published: i64,
    pub revision: String,
    pub size: i64,
    /// Most recent `last_published` across the whole profile
    pub profile_last_published: i64,
}

/// A typed cell value written to a tabular store
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Int(i64),
    Bool(bool),
    Empty,
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// JSON representation used by raw value writes
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Int(n) => serde_json::Value::from(*n),
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Empty => serde_json::Value::String(String::new()),
        }
    }
}

/// Cells read back from a store render the way a spreadsheet displays them
impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Bool(true) => write!(f, "TRUE"),
            Self::Bool(false) => write!(f, "FALSE"),
            Self::Empty => Ok(()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// One profile's line in the cross-subscriber summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    pub first_name: String,
    pub last_name: String,
    pub profile_id: String,
    pub destination: String,
    pub favorites: String,
    pub views: String,
    pub followers: String,
    pub following: String,
    pub visible_publications: String,
    pub registry_refreshed: String,
    pub summary_refreshed: String,
}

impl SummaryRow {
    pub const WIDTH: usize = 11;

    pub const HEADER: [&'static str; Self::WIDTH] = [
        "First Name",
        "Last Name",
        "Profile ID",
        "Stats Sheet",
        "Favorites",
        "Views",
        "Followers",
        "Following",
        "Visible Vizzes",
        "Stats Last Refreshed",
        "Summary Last Refreshed",
    ];

    /// Rebuild a row from cells previously written to the summary sheet
    pub fn from_cells(cells: &[String]) -> Self {
        let cell = |i: usize| cells.get(i).cloned().unwrap_or_default();
        Self {
            first_name: cell(0),
            last_name: cell(1),
            profile_id: cell(2),
            destination: cell(3),
            favorites: cell(4),
            views: cell(5),
            followers: cell(6),
            following: cell(7),
            visible_publications: cell(8),
            registry_refreshed: cell(9),
            summary_refreshed: cell(10),
        }
    }

    pub fn cells(&self) -> Vec<CellValue> {
        [
            &self.first_name,
            &self.last_name,
            &self.profile_id,
            &self.destination,
            &self.favorites,
            &self.views,
            &self.followers,
            &self.following,
            &self.visible_publications,
            &self.registry_refreshed,
            &self.summary_refreshed,
        ]
        .into_iter()
        .map(|s| CellValue::Text(s.clone()))
        .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_cell_read_three_states() {
        let cells = row(&["a@example.com", "  ", "Smith"]);
        assert_eq!(
            CellRead::from_row(&cells, 0),
            CellRead::Found("a@example.com".into())
        );
        assert_eq!(CellRead::from_row(&cells, 1), CellRead::Blank);
        assert_eq!(CellRead::from_row(&cells, 7), CellRead::Missing);
        assert_eq!(CellRead::Missing.text(), "");
    }

    #[test]
    fn test_registry_entry_timestamp_parse() {
        let entry = RegistryEntry {
            row: 2,
            email: CellRead::Found("a@example.com".into()),
            first_name: CellRead::Found("Ada".into()),
            last_name: CellRead::Found("Lovelace".into()),
            profile_id: CellRead::Found("ada".into()),
            destination: CellRead::Blank,
            last_refreshed: CellRead::Found("not a date".into()),
        };
        assert!(entry.last_refreshed_at().is_none());
        assert!(entry.destination_ref().is_none());
        assert_eq!(entry.display_name(), "Lovelace, Ada");
    }

    #[test]
    fn test_cell_value_display() {
        assert_eq!(CellValue::Bool(true).to_string(), "TRUE");
        assert_eq!(CellValue::Int(42).to_string(), "42");
        assert_eq!(CellValue::Empty.to_string(), "");
        assert_eq!(CellValue::Int(7).to_json(), serde_json::json!(7));
    }

    #[test]
    fn test_summary_row_from_short_cells() {
        let summary = SummaryRow::from_cells(&row(&["Ada", "Lovelace", "ada"]));
        assert_eq!(summary.profile_id, "ada");
        assert_eq!(summary.views, "");
        assert_eq!(summary.cells().len(), SummaryRow::WIDTH);
    }
}
