//! Tabular store access
//!
//! Destinations, the sign-up registry and the summary all live in
//! spreadsheet workbooks. This module defines the [`SheetsBackend`] seam the
//! rest of the crate talks to, with two implementations:
//!
//! - [`sheets::GoogleSheetsClient`] - Sheets v4 / Drive v3 over HTTP
//! - [`memory::MemorySheets`] - in-process workbooks for tests and local runs
//!
//! On top of the backend sit the [`registry::Registry`], the
//! [`provision::DestinationProvisioner`] and the [`writer::BatchWriter`].

pub mod memory;
pub mod provision;
pub mod registry;
pub mod sheets;
pub mod table;
pub mod writer;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::models::CellValue;
use crate::utils::error::StoreError;

pub use memory::MemorySheets;
pub use provision::{DestinationProvisioner, Provisioned};
pub use registry::Registry;
pub use sheets::GoogleSheetsClient;
pub use table::{Table, TableBuilder};
pub use writer::BatchWriter;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Public URL prefix of a workbook
pub const WORKBOOK_URL_PREFIX: &str = "https://docs.google.com/spreadsheets/d/";

/// One sheet (tab) of a workbook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetInfo {
    pub sheet_id: i64,
    pub title: String,
    pub index: usize,
}

/// An opened workbook
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workbook {
    pub id: String,
    pub title: String,
    pub url: String,
    pub sheets: Vec<SheetInfo>,
}

impl Workbook {
    /// The first sheet by index
    pub fn primary(&self) -> StoreResult<&SheetInfo> {
        self.sheets
            .iter()
            .min_by_key(|s| s.index)
            .ok_or_else(|| StoreError::SheetMissing(format!("{} has no sheets", self.id)))
    }

    /// A sheet by title
    pub fn sheet(&self, title: &str) -> StoreResult<&SheetInfo> {
        self.sheets
            .iter()
            .find(|s| s.title == title)
            .ok_or_else(|| StoreError::SheetMissing(title.to_string()))
    }

    /// Keep the cached handle in step after a rename
    pub fn rename_sheet(&mut self, sheet_id: i64, title: &str) {
        if let Some(sheet) = self.sheets.iter_mut().find(|s| s.sheet_id == sheet_id) {
            sheet.title = title.to_string();
        }
    }
}

/// Access level granted on a workbook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessRole {
    Writer,
    Reader,
}

impl AccessRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Writer => "writer",
            Self::Reader => "reader",
        }
    }
}

impl std::fmt::Display for AccessRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Finishing touches applied to a populated sheet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetLayout {
    /// Populated rows, header included
    pub rows: usize,
    /// Populated columns
    pub columns: usize,
    pub top_align: bool,
    pub bold_header: bool,
    pub frozen_rows: usize,
    /// New sheet title, if the sheet is to be renamed
    pub title: Option<String>,
}

/// Operations the sync and summary passes need from a spreadsheet store
///
/// Row and column numbers are 1-based, like spreadsheet addresses.
#[async_trait]
pub trait SheetsBackend: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Open an existing workbook by URL or id
    async fn open(&self, reference: &str) -> StoreResult<Workbook>;

    /// Create a new workbook with one empty sheet
    async fn create(&self, title: &str) -> StoreResult<Workbook>;

    /// Grant a user access to a workbook
    async fn grant_access(
        &self,
        workbook: &Workbook,
        email: &str,
        role: AccessRole,
    ) -> StoreResult<()>;

    /// Read every populated row of a sheet as displayed text
    ///
    /// Trailing empty cells of a row are not returned.
    async fn read_rows(&self, workbook: &Workbook, sheet: &SheetInfo)
        -> StoreResult<Vec<Vec<String>>>;

    /// Remove every value from a sheet
    async fn clear(&self, workbook: &Workbook, sheet: &SheetInfo) -> StoreResult<()>;

    /// Write a block of rows starting at `start_row`, column A
    async fn write_rows(
        &self,
        workbook: &Workbook,
        sheet: &SheetInfo,
        start_row: usize,
        rows: &[Vec<CellValue>],
    ) -> StoreResult<()>;

    /// Write one cell
    async fn update_cell(
        &self,
        workbook: &Workbook,
        sheet: &SheetInfo,
        row: usize,
        column: usize,
        value: &CellValue,
    ) -> StoreResult<()>;

    /// Apply alignment, header styling, frozen rows and title
    async fn apply_layout(
        &self,
        workbook: &Workbook,
        sheet: &SheetInfo,
        layout: &SheetLayout,
    ) -> StoreResult<()>;
}

/// Turn a workbook URL or bare id into the id
///
/// # Errors
///
/// Returns `StoreError::InvalidReference` when neither form matches
pub fn parse_workbook_id(reference: &str) -> StoreResult<String> {
    static URL_RE: OnceLock<Regex> = OnceLock::new();
    static ID_RE: OnceLock<Regex> = OnceLock::new();

    let reference = reference.trim();
    let url_re = URL_RE.get_or_init(|| {
        Regex::new(r"/spreadsheets/d/([A-Za-z0-9_-]+)").expect("Invalid regex pattern")
    });
    if let Some(caps) = url_re.captures(reference) {
        return Ok(caps[1].to_string());
    }

    let id_re =
        ID_RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{8,}$").expect("Invalid regex pattern"));
    if id_re.is_match(reference) {
        return Ok(reference.to_string());
    }

    Err(StoreError::InvalidReference(reference.to_string()))
}

/// Canonical public URL of a workbook id
pub fn workbook_url(id: &str) -> String {
    format!("{WORKBOOK_URL_PREFIX}{id}")
}
