//! In-process spreadsheet backend
//!
//! Holds workbooks in a mutex-guarded map. Used by tests and by local dry
//! runs; cells are stored as typed values and read back the way a
//! spreadsheet displays them.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use super::{
    parse_workbook_id, workbook_url, AccessRole, SheetInfo, SheetLayout, SheetsBackend,
    StoreResult, Workbook,
};
use crate::models::CellValue;
use crate::utils::error::StoreError;

/// Formatting state recorded by `apply_layout`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutState {
    pub top_aligned: Option<(usize, usize)>,
    pub bold_header: bool,
    pub frozen_rows: usize,
}

#[derive(Debug, Clone, Default)]
struct MemorySheet {
    info: Option<SheetInfo>,
    cells: Vec<Vec<CellValue>>,
    layout: LayoutState,
}

#[derive(Debug, Clone)]
struct MemoryWorkbook {
    title: String,
    sheets: Vec<MemorySheet>,
    permissions: Vec<(String, AccessRole)>,
}

impl MemoryWorkbook {
    fn handle(&self, id: &str) -> Workbook {
        Workbook {
            id: id.to_string(),
            title: self.title.clone(),
            url: workbook_url(id),
            sheets: self.sheets.iter().filter_map(|s| s.info.clone()).collect(),
        }
    }

    fn sheet_mut(&mut self, sheet_id: i64) -> StoreResult<&mut MemorySheet> {
        self.sheets
            .iter_mut()
            .find(|s| s.info.as_ref().is_some_and(|i| i.sheet_id == sheet_id))
            .ok_or_else(|| StoreError::SheetMissing(sheet_id.to_string()))
    }
}

#[derive(Debug, Default)]
struct State {
    workbooks: HashMap<String, MemoryWorkbook>,
    failing: HashSet<String>,
    rejected_grantees: HashSet<String>,
    next_id: u64,
    created: usize,
}

impl State {
    fn workbook_mut(&mut self, id: &str) -> StoreResult<&mut MemoryWorkbook> {
        if self.failing.contains(id) {
            return Err(StoreError::Status {
                status: 503,
                body: String::from("backend unavailable"),
            });
        }
        self.workbooks
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("mem-workbook-{:04}", self.next_id)
    }
}

/// Spreadsheet backend kept entirely in memory
#[derive(Debug, Default)]
pub struct MemorySheets {
    state: Mutex<State>,
}

impl MemorySheets {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed a workbook with named sheets and text rows; returns its id
    pub fn insert_workbook(&self, title: &str, sheets: &[(&str, Vec<Vec<String>>)]) -> String {
        let mut state = self.lock();
        let id = state.allocate_id();
        let sheets = sheets
            .iter()
            .enumerate()
            .map(|(index, (name, rows))| MemorySheet {
                info: Some(SheetInfo {
                    sheet_id: index as i64,
                    title: (*name).to_string(),
                    index,
                }),
                cells: rows
                    .iter()
                    .map(|row| row.iter().map(|c| CellValue::text(c.as_str())).collect())
                    .collect(),
                layout: LayoutState::default(),
            })
            .collect();
        state.workbooks.insert(
            id.clone(),
            MemoryWorkbook {
                title: title.to_string(),
                sheets,
                permissions: Vec::new(),
            },
        );
        id
    }

    /// Make every call against a workbook fail with a transient error
    pub fn set_failing(&self, id: &str, failing: bool) {
        let mut state = self.lock();
        if failing {
            state.failing.insert(id.to_string());
        } else {
            state.failing.remove(id);
        }
    }

    /// Make sharing with `email` fail, as Drive does for unknown addresses
    pub fn reject_grants_to(&self, email: &str, rejected: bool) {
        let mut state = self.lock();
        if rejected {
            state.rejected_grantees.insert(email.to_string());
        } else {
            state.rejected_grantees.remove(email);
        }
    }

    /// Delete a workbook, as if its owner removed it
    pub fn remove_workbook(&self, id: &str) -> bool {
        self.lock().workbooks.remove(id).is_some()
    }

    /// Number of workbooks created through the backend
    pub fn created_count(&self) -> usize {
        self.lock().created
    }

    pub fn workbook_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().workbooks.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn title(&self, id: &str) -> Option<String> {
        self.lock().workbooks.get(id).map(|w| w.title.clone())
    }

    pub fn permissions(&self, id: &str) -> Vec<(String, AccessRole)> {
        self.lock()
            .workbooks
            .get(id)
            .map(|w| w.permissions.clone())
            .unwrap_or_default()
    }

    /// Displayed text of a sheet, trailing blanks trimmed
    pub fn snapshot(&self, id: &str, sheet_title: &str) -> Option<Vec<Vec<String>>> {
        let state = self.lock();
        let workbook = state.workbooks.get(id)?;
        let sheet = workbook
            .sheets
            .iter()
            .find(|s| s.info.as_ref().is_some_and(|i| i.title == sheet_title))?;
        Some(display_rows(&sheet.cells))
    }

    /// Raw typed cells of a sheet
    pub fn cells(&self, id: &str, sheet_title: &str) -> Option<Vec<Vec<CellValue>>> {
        let state = self.lock();
        let workbook = state.workbooks.get(id)?;
        workbook
            .sheets
            .iter()
            .find(|s| s.info.as_ref().is_some_and(|i| i.title == sheet_title))
            .map(|s| s.cells.clone())
    }

    pub fn layout(&self, id: &str, sheet_title: &str) -> Option<LayoutState> {
        let state = self.lock();
        let workbook = state.workbooks.get(id)?;
        workbook
            .sheets
            .iter()
            .find(|s| s.info.as_ref().is_some_and(|i| i.title == sheet_title))
            .map(|s| s.layout.clone())
    }
}

fn display_rows(cells: &[Vec<CellValue>]) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = cells
        .iter()
        .map(|row| {
            let mut text: Vec<String> = row.iter().map(ToString::to_string).collect();
            while text.last().is_some_and(String::is_empty) {
                text.pop();
            }
            text
        })
        .collect();
    while rows.last().is_some_and(Vec::is_empty) {
        rows.pop();
    }
    rows
}

fn put_cell(cells: &mut Vec<Vec<CellValue>>, row: usize, column: usize, value: CellValue) {
    if cells.len() < row {
        cells.resize_with(row, Vec::new);
    }
    let target = &mut cells[row - 1];
    if target.len() < column {
        target.resize(column, CellValue::Empty);
    }
    target[column - 1] = value;
}

#[async_trait]
impl SheetsBackend for MemorySheets {
    fn name(&self) -> &str {
        "memory"
    }

    async fn open(&self, reference: &str) -> StoreResult<Workbook> {
        let id = parse_workbook_id(reference)?;
        let mut state = self.lock();
        let workbook = state.workbook_mut(&id)?;
        Ok(workbook.handle(&id))
    }

    async fn create(&self, title: &str) -> StoreResult<Workbook> {
        let mut state = self.lock();
        let id = state.allocate_id();
        let workbook = MemoryWorkbook {
            title: title.to_string(),
            sheets: vec![MemorySheet {
                info: Some(SheetInfo {
                    sheet_id: 0,
                    title: String::from("Sheet1"),
                    index: 0,
                }),
                ..MemorySheet::default()
            }],
            permissions: Vec::new(),
        };
        let handle = workbook.handle(&id);
        state.workbooks.insert(id, workbook);
        state.created += 1;
        Ok(handle)
    }

    async fn grant_access(
        &self,
        workbook: &Workbook,
        email: &str,
        role: AccessRole,
    ) -> StoreResult<()> {
        let mut state = self.lock();
        if state.rejected_grantees.contains(email) {
            return Err(StoreError::Status {
                status: 400,
                body: format!("Invalid sharing request for {email}"),
            });
        }
        let stored = state.workbook_mut(&workbook.id)?;
        if !stored
            .permissions
            .iter()
            .any(|(e, r)| e == email && *r == role)
        {
            stored.permissions.push((email.to_string(), role));
        }
        Ok(())
    }

    async fn read_rows(
        &self,
        workbook: &Workbook,
        sheet: &SheetInfo,
    ) -> StoreResult<Vec<Vec<String>>> {
        let mut state = self.lock();
        let stored = state.workbook_mut(&workbook.id)?;
        let sheet = stored.sheet_mut(sheet.sheet_id)?;
        Ok(display_rows(&sheet.cells))
    }

    async fn clear(&self, workbook: &Workbook, sheet: &SheetInfo) -> StoreResult<()> {
        let mut state = self.lock();
        let stored = state.workbook_mut(&workbook.id)?;
        stored.sheet_mut(sheet.sheet_id)?.cells.clear();
        Ok(())
    }

    async fn write_rows(
        &self,
        workbook: &Workbook,
        sheet: &SheetInfo,
        start_row: usize,
        rows: &[Vec<CellValue>],
    ) -> StoreResult<()> {
        let mut state = self.lock();
        let stored = state.workbook_mut(&workbook.id)?;
        let sheet = stored.sheet_mut(sheet.sheet_id)?;
        for (offset, row) in rows.iter().enumerate() {
            for (col, value) in row.iter().enumerate() {
                put_cell(&mut sheet.cells, start_row.max(1) + offset, col + 1, value.clone());
            }
        }
        Ok(())
    }

    async fn update_cell(
        &self,
        workbook: &Workbook,
        sheet: &SheetInfo,
        row: usize,
        column: usize,
        value: &CellValue,
    ) -> StoreResult<()> {
        let mut state = self.lock();
        let stored = state.workbook_mut(&workbook.id)?;
        let sheet = stored.sheet_mut(sheet.sheet_id)?;
        put_cell(&mut sheet.cells, row.max(1), column.max(1), value.clone());
        Ok(())
    }

    async fn apply_layout(
        &self,
        workbook: &Workbook,
        sheet: &SheetInfo,
        layout: &SheetLayout,
    ) -> StoreResult<()> {
        let mut state = self.lock();
        let stored = state.workbook_mut(&workbook.id)?;
        let target = stored.sheet_mut(sheet.sheet_id)?;
        if layout.top_align {
            target.layout.top_aligned = Some((layout.rows, layout.columns));
        }
        target.layout.bold_header = layout.bold_header;
        target.layout.frozen_rows = layout.frozen_rows;
        if let (Some(title), Some(info)) = (&layout.title, target.info.as_mut()) {
            info.title = title.clone();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_write_read() {
        let backend = MemorySheets::new();
        let workbook = backend.create("Stats: Doe, Jane").await.unwrap();
        let sheet = workbook.primary().unwrap().clone();

        backend
            .write_rows(
                &workbook,
                &sheet,
                1,
                &[
                    vec![CellValue::text("a"), CellValue::Int(3)],
                    vec![CellValue::Bool(true), CellValue::Empty],
                ],
            )
            .await
            .unwrap();

        let rows = backend.read_rows(&workbook, &sheet).await.unwrap();
        assert_eq!(rows, vec![vec!["a", "3"], vec!["TRUE"]]);
        assert_eq!(backend.created_count(), 1);
    }

    #[tokio::test]
    async fn test_open_missing_is_not_found() {
        let backend = MemorySheets::new();
        let err = backend.open("mem-workbook-9999").await.unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_failing_workbook_is_transient() {
        let backend = MemorySheets::new();
        let id = backend.insert_workbook("wb", &[("Sheet1", vec![])]);
        backend.set_failing(&id, true);
        let err = backend.open(&id).await.unwrap_err();
        assert!(!err.is_unavailable());
        backend.set_failing(&id, false);
        assert!(backend.open(&id).await.is_ok());
    }

    #[tokio::test]
    async fn test_layout_renames_sheet() {
        let backend = MemorySheets::new();
        let workbook = backend.create("x").await.unwrap();
        let sheet = workbook.primary().unwrap().clone();
        let layout = SheetLayout {
            rows: 1,
            columns: 2,
            top_align: true,
            bold_header: true,
            frozen_rows: 1,
            title: Some("Stats".into()),
        };
        backend.apply_layout(&workbook, &sheet, &layout).await.unwrap();

        let reopened = backend.open(&workbook.id).await.unwrap();
        assert_eq!(reopened.primary().unwrap().title, "Stats");
        let state = backend.layout(&workbook.id, "Stats").unwrap();
        assert!(state.bold_header);
        assert_eq!(state.frozen_rows, 1);
        assert_eq!(state.top_aligned, Some((1, 2)));
    }

    #[tokio::test]
    async fn test_update_cell_extends_row() {
        let backend = MemorySheets::new();
        let id = backend.insert_workbook("r", &[("Form", vec![vec!["h".to_string()]])]);
        let workbook = backend.open(&id).await.unwrap();
        let sheet = workbook.sheet("Form").unwrap().clone();
        backend
            .update_cell(&workbook, &sheet, 2, 3, &CellValue::text("x"))
            .await
            .unwrap();
        let rows = backend.snapshot(&id, "Form").unwrap();
        assert_eq!(rows[1], vec!["", "", "x"]);
    }
}
