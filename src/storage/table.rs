//! Ordered table staging
//!
//! Rows are staged in memory as fixed-width ordered cell lists and flushed
//! to a store in one bulk write.

use crate::models::CellValue;
use crate::utils::error::StoreError;

/// A header row plus body rows, all of the same width
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    header: Vec<CellValue>,
    rows: Vec<Vec<CellValue>>,
}

impl Table {
    /// Build a table whose width is fixed at compile time
    pub fn from_fixed<const N: usize>(
        header: [&str; N],
        rows: impl IntoIterator<Item = [CellValue; N]>,
    ) -> Self {
        Self {
            header: header.iter().map(|h| CellValue::text(*h)).collect(),
            rows: rows.into_iter().map(Vec::from).collect(),
        }
    }

    pub fn width(&self) -> usize {
        self.header.len()
    }

    pub fn header(&self) -> &[CellValue] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    /// Number of body rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Header followed by body rows, as written to a sheet
    pub fn to_grid(&self) -> Vec<Vec<CellValue>> {
        let mut grid = Vec::with_capacity(self.rows.len() + 1);
        grid.push(self.header.clone());
        grid.extend(self.rows.iter().cloned());
        grid
    }
}

/// Growable builder for tables whose rows are produced at runtime
#[derive(Debug, Clone)]
pub struct TableBuilder {
    header: Vec<CellValue>,
    rows: Vec<Vec<CellValue>>,
}

impl TableBuilder {
    pub fn new<S: AsRef<str>>(header: &[S]) -> Self {
        Self {
            header: header.iter().map(|h| CellValue::text(h.as_ref())).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row
    ///
    /// # Errors
    ///
    /// Returns `StoreError::RowWidth` if the row does not match the header width
    pub fn push_row(&mut self, row: Vec<CellValue>) -> Result<(), StoreError> {
        if row.len() != self.header.len() {
            return Err(StoreError::RowWidth {
                expected: self.header.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn build(self) -> Table {
        Table {
            header: self.header,
            rows: self.rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_rejects_wrong_width() {
        let mut builder = TableBuilder::new(&["a", "b"]);
        assert!(builder.push_row(vec![CellValue::Int(1), CellValue::Int(2)]).is_ok());
        let err = builder.push_row(vec![CellValue::Int(1)]).unwrap_err();
        assert!(matches!(
            err,
            StoreError::RowWidth {
                expected: 2,
                actual: 1
            }
        ));
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn test_fixed_table_grid() {
        let table = Table::from_fixed(
            ["x", "y"],
            vec![[CellValue::Int(1), CellValue::Bool(true)]],
        );
        assert_eq!(table.width(), 2);
        assert_eq!(table.len(), 1);
        let grid = table.to_grid();
        assert_eq!(grid.len(), 2);
        assert_eq!(grid[0][0], CellValue::text("x"));
        assert_eq!(grid[1][1], CellValue::Bool(true));
    }

    #[test]
    fn test_empty_table_keeps_header() {
        let table = TableBuilder::new(&["only"]).build();
        assert!(table.is_empty());
        assert_eq!(table.to_grid().len(), 1);
    }
}
