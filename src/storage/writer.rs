//! Bulk destination writes
//!
//! A destination is rewritten in full on every refresh: clear, header,
//! body, then formatting. The sequence is not transactional; a failure
//! part-way leaves the sheet incomplete until the next successful run.

use std::sync::Arc;

use super::{SheetLayout, SheetsBackend, StoreResult, Table, Workbook};

/// Clears and rewrites the primary sheet of a destination
pub struct BatchWriter {
    backend: Arc<dyn SheetsBackend>,
    sheet_title: String,
}

impl BatchWriter {
    pub fn new(backend: Arc<dyn SheetsBackend>, sheet_title: impl Into<String>) -> Self {
        Self {
            backend,
            sheet_title: sheet_title.into(),
        }
    }

    /// Replace the primary sheet's content with `table`
    ///
    /// The header is written first, the body in one bulk call, then the
    /// populated range is top-aligned, the header bolded and frozen, and
    /// the sheet renamed. `workbook` is updated to reflect the rename.
    ///
    /// # Errors
    ///
    /// Returns the first `StoreError`; earlier steps are not rolled back
    pub async fn write(&self, workbook: &mut Workbook, table: &Table) -> StoreResult<()> {
        let sheet = workbook.primary()?.clone();

        self.backend.clear(workbook, &sheet).await?;
        self.backend
            .write_rows(workbook, &sheet, 1, &[table.header().to_vec()])
            .await?;
        if !table.is_empty() {
            self.backend.write_rows(workbook, &sheet, 2, table.rows()).await?;
        }

        let layout = SheetLayout {
            rows: table.len() + 1,
            columns: table.width(),
            top_align: true,
            bold_header: true,
            frozen_rows: 1,
            title: Some(self.sheet_title.clone()),
        };
        self.backend.apply_layout(workbook, &sheet, &layout).await?;
        workbook.rename_sheet(sheet.sheet_id, &self.sheet_title);

        tracing::debug!(
            workbook = %workbook.id,
            rows = table.len(),
            columns = table.width(),
            "Wrote destination"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CellValue;
    use crate::storage::MemorySheets;

    #[tokio::test]
    async fn test_write_replaces_previous_content() {
        let backend = Arc::new(MemorySheets::new());
        let mut workbook = backend.create("Stats: Doe, Jane").await.unwrap();
        let writer = BatchWriter::new(backend.clone(), "Stats");

        let first = Table::from_fixed(
            ["a", "b"],
            vec![
                [CellValue::Int(1), CellValue::Int(2)],
                [CellValue::Int(3), CellValue::Int(4)],
            ],
        );
        writer.write(&mut workbook, &first).await.unwrap();

        let second = Table::from_fixed(["a", "b"], vec![[CellValue::Int(9), CellValue::Bool(false)]]);
        writer.write(&mut workbook, &second).await.unwrap();

        let rows = backend.snapshot(&workbook.id, "Stats").unwrap();
        assert_eq!(rows, vec![vec!["a", "b"], vec!["9", "FALSE"]]);
        assert_eq!(workbook.primary().unwrap().title, "Stats");

        let layout = backend.layout(&workbook.id, "Stats").unwrap();
        assert!(layout.bold_header);
        assert_eq!(layout.frozen_rows, 1);
        assert_eq!(layout.top_aligned, Some((2, 2)));
    }

    #[tokio::test]
    async fn test_write_header_only() {
        let backend = Arc::new(MemorySheets::new());
        let mut workbook = backend.create("empty").await.unwrap();
        let writer = BatchWriter::new(backend.clone(), "Stats");

        let table = Table::from_fixed(["only"], Vec::<[CellValue; 1]>::new());
        writer.write(&mut workbook, &table).await.unwrap();

        let rows = backend.snapshot(&workbook.id, "Stats").unwrap();
        assert_eq!(rows, vec![vec!["only"]]);
    }
}
