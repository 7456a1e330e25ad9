//! Sign-up registry
//!
//! The registry is one sheet of a workbook filled by a sign-up form. Row 1
//! is the header; every following row describes one subscriber. Only the
//! destination and last-refreshed columns are ever written back.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::{SheetInfo, SheetsBackend, StoreResult, Workbook};
use crate::config::RegistryLayout;
use crate::models::{CellRead, CellValue, RegistryEntry};
use crate::utils::error::StoreError;
use crate::utils::format_timestamp;

/// Loaded registry sheet plus the backend it came from
pub struct Registry {
    backend: Arc<dyn SheetsBackend>,
    workbook: Workbook,
    sheet: SheetInfo,
    layout: RegistryLayout,
    entries: Vec<RegistryEntry>,
}

impl Registry {
    /// Open the registry workbook and read every subscriber row
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the workbook or sheet cannot be opened or read
    pub async fn load(
        backend: Arc<dyn SheetsBackend>,
        reference: &str,
        sheet_title: &str,
        layout: RegistryLayout,
    ) -> StoreResult<Self> {
        let workbook = backend.open(reference).await?;
        let sheet = workbook.sheet(sheet_title)?.clone();
        let rows = backend.read_rows(&workbook, &sheet).await?;
        let entries = parse_rows(&rows, &layout);

        tracing::info!(
            backend = backend.name(),
            workbook = %workbook.id,
            sheet = %sheet.title,
            entries = entries.len(),
            "Loaded registry"
        );

        Ok(Self {
            backend,
            workbook,
            sheet,
            layout,
            entries,
        })
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The workbook holding the registry (the summary sheet lives here too)
    pub fn workbook(&self) -> &Workbook {
        &self.workbook
    }

    fn entry_mut(&mut self, index: usize) -> StoreResult<&mut RegistryEntry> {
        self.entries
            .get_mut(index)
            .ok_or_else(|| StoreError::SheetMissing(format!("registry entry {index}")))
    }

    /// Persist a destination reference for one entry
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the cell write fails; the in-memory entry is
    /// only updated after the write succeeds
    pub async fn record_destination(&mut self, index: usize, reference: &str) -> StoreResult<()> {
        let row = self.entry_mut(index)?.row;
        self.backend
            .update_cell(
                &self.workbook,
                &self.sheet,
                row,
                self.layout.destination,
                &CellValue::text(reference),
            )
            .await?;

        self.entry_mut(index)?.destination = CellRead::Found(reference.to_string());
        tracing::debug!(row, destination = reference, "Recorded destination");
        Ok(())
    }

    /// Persist the refresh timestamp for one entry
    ///
    /// The stored value never moves backwards: an existing later timestamp
    /// is kept. Returns the timestamp actually stored.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the cell write fails
    pub async fn record_refresh(
        &mut self,
        index: usize,
        at: DateTime<Utc>,
    ) -> StoreResult<DateTime<Utc>> {
        let entry = self.entry_mut(index)?;
        let row = entry.row;
        let stamp = entry.last_refreshed_at().map_or(at, |previous| previous.max(at));
        let text = format_timestamp(stamp);

        self.backend
            .update_cell(
                &self.workbook,
                &self.sheet,
                row,
                self.layout.last_refreshed,
                &CellValue::text(text.as_str()),
            )
            .await?;

        self.entry_mut(index)?.last_refreshed = CellRead::Found(text);
        Ok(stamp)
    }
}

/// Turn raw registry rows into entries
///
/// The header row and rows with no content at all are skipped.
pub fn parse_rows(rows: &[Vec<String>], layout: &RegistryLayout) -> Vec<RegistryEntry> {
    let read = |row: &[String], column: usize| CellRead::from_row(row, column.saturating_sub(1));

    rows.iter()
        .enumerate()
        .skip(1)
        .filter(|(_, row)| row.iter().any(|cell| !cell.trim().is_empty()))
        .map(|(i, row)| RegistryEntry {
            row: i + 1,
            email: read(row, layout.email),
            first_name: read(row, layout.first_name),
            last_name: read(row, layout.last_name),
            profile_id: read(row, layout.profile_id),
            destination: read(row, layout.destination),
            last_refreshed: read(row, layout.last_refreshed),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemorySheets;
    use crate::utils::parse_timestamp;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    fn sample_rows() -> Vec<Vec<String>> {
        vec![
            row(&["Timestamp", "Email", "First", "Last", "Profile", "Sheet", "Refreshed"]),
            row(&["2024-01-01", "ada@example.com", "Ada", "Lovelace", "ada"]),
            row(&[]),
            row(&[
                "2024-01-02",
                "alan@example.com",
                "Alan",
                "Turing",
                "alan",
                "https://docs.google.com/spreadsheets/d/abcdefgh123",
                "2024-02-01 10:00:00",
            ]),
        ]
    }

    #[test]
    fn test_parse_rows_skips_header_and_blank() {
        let entries = parse_rows(&sample_rows(), &RegistryLayout::default());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].row, 2);
        assert_eq!(entries[0].destination, CellRead::Missing);
        assert_eq!(entries[1].row, 4);
        assert_eq!(entries[1].profile_id(), Some("alan"));
        assert!(entries[1].last_refreshed_at().is_some());
    }

    #[tokio::test]
    async fn test_record_destination_and_refresh() {
        let backend = Arc::new(MemorySheets::new());
        let id = backend.insert_workbook("Registry", &[("Form Responses 1", sample_rows())]);

        let mut registry = Registry::load(
            backend.clone(),
            &id,
            "Form Responses 1",
            RegistryLayout::default(),
        )
        .await
        .unwrap();
        assert_eq!(registry.len(), 2);

        registry.record_destination(0, "dest-url-0001").await.unwrap();
        let at = parse_timestamp("2024-03-01 08:00:00").unwrap();
        registry.record_refresh(0, at).await.unwrap();

        let rows = backend.snapshot(&id, "Form Responses 1").unwrap();
        assert_eq!(rows[1][5], "dest-url-0001");
        assert_eq!(rows[1][6], "2024-03-01 08:00:00");
        assert_eq!(registry.entries()[0].destination_ref(), Some("dest-url-0001"));
    }

    #[tokio::test]
    async fn test_refresh_never_goes_backwards() {
        let backend = Arc::new(MemorySheets::new());
        let id = backend.insert_workbook("Registry", &[("Form Responses 1", sample_rows())]);
        let mut registry = Registry::load(
            backend.clone(),
            &id,
            "Form Responses 1",
            RegistryLayout::default(),
        )
        .await
        .unwrap();

        let earlier = parse_timestamp("2024-01-15 00:00:00").unwrap();
        let stored = registry.record_refresh(1, earlier).await.unwrap();
        assert_eq!(stored, parse_timestamp("2024-02-01 10:00:00").unwrap());
    }

    #[tokio::test]
    async fn test_missing_sheet() {
        let backend = Arc::new(MemorySheets::new());
        let id = backend.insert_workbook("Registry", &[("Other", vec![])]);
        let result = Registry::load(backend, &id, "Form Responses 1", RegistryLayout::default()).await;
        assert!(matches!(result, Err(StoreError::SheetMissing(_))));
    }
}
