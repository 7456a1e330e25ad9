//! Cross-subscriber summary
//!
//! Reads every destination back, rolls it up into one [`SummaryRow`] per
//! registry entry and writes the whole set to the summary sheet in a single
//! bulk write.
//!
//! Views, favorites and visible publications are totals over all rows.
//! Follower and following counts are repeated on every row of a destination,
//! so they come from the first row only.
//!
//! When an entry cannot be summarized its previous summary row is kept as
//! is, the operator is told, and the pass pauses for the configured cooldown
//! before moving on. A summary shorter than the previous one overwrites the
//! leftover rows with blanks in the same write, so no separate clear runs.

use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::models::{CellValue, RegistryEntry, SummaryRow};
use crate::notifications::templates::{operator_subject, subjects};
use crate::notifications::Notifier;
use crate::storage::{Registry, SheetsBackend, TableBuilder};
use crate::sync::normalize::columns;
use crate::utils::error::StoreError;
use crate::utils::format_timestamp;

/// Why one entry could not be summarized
#[derive(Debug, thiserror::Error)]
pub enum AggregationError {
    #[error("Entry has no destination")]
    NotProvisioned,

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Destination is missing column {column}")]
    MissingColumn { column: &'static str },

    #[error("Destination has no data rows")]
    EmptyDestination,

    #[error("Invalid number in column {column}: {value:?}")]
    InvalidNumber { column: &'static str, value: String },
}

/// Rolled-up metrics of one destination
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DestinationMetrics {
    pub views: i64,
    pub favorites: i64,
    pub followers: i64,
    pub following: i64,
    pub visible: i64,
}

/// Totals of one summary pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SummaryReport {
    pub entries: usize,
    pub refreshed: usize,
    pub fallbacks: usize,
    /// Failed entries with no previous row, written with zero counts
    pub placeholders: usize,
}

fn cell<'a>(row: &'a [String], index: usize, column: &'static str) -> Result<&'a str, AggregationError> {
    row.get(index)
        .map(String::as_str)
        .ok_or(AggregationError::MissingColumn { column })
}

fn number(row: &[String], index: usize, column: &'static str) -> Result<i64, AggregationError> {
    let raw = cell(row, index, column)?;
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return Ok(0);
    }
    cleaned.parse().map_err(|_| AggregationError::InvalidNumber {
        column,
        value: raw.to_string(),
    })
}

/// Roll up the rows of a destination sheet (header included)
///
/// # Errors
///
/// Returns `EmptyDestination` when there is no data row, and
/// `MissingColumn` / `InvalidNumber` for malformed cells
pub fn summarize_rows(rows: &[Vec<String>]) -> Result<DestinationMetrics, AggregationError> {
    let body: Vec<&Vec<String>> = rows
        .iter()
        .skip(1)
        .filter(|row| row.iter().any(|c| !c.trim().is_empty()))
        .collect();
    let first = body.first().ok_or(AggregationError::EmptyDestination)?;

    let mut metrics = DestinationMetrics {
        followers: number(first, columns::FOLLOWERS, "User - Follower Count")?,
        following: number(first, columns::FOLLOWING, "User - Following Count")?,
        ..DestinationMetrics::default()
    };

    for row in body {
        metrics.views += number(row, columns::VIEWS, "Viz - Views")?;
        metrics.favorites += number(row, columns::FAVORITES, "Viz - Favorites")?;
        if cell(row, columns::VISIBLE, "Viz - Visible")? == "TRUE" {
            metrics.visible += 1;
        }
    }

    Ok(metrics)
}

/// Builds the summary sheet
pub struct SummaryAggregator {
    backend: Arc<dyn SheetsBackend>,
    notifier: Arc<dyn Notifier>,
    cooldown: Duration,
    service_name: String,
}

impl SummaryAggregator {
    pub fn new(
        backend: Arc<dyn SheetsBackend>,
        notifier: Arc<dyn Notifier>,
        cooldown: Duration,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            notifier,
            cooldown,
            service_name: service_name.into(),
        }
    }

    async fn summarize_entry(
        &self,
        entry: &RegistryEntry,
        refreshed: &str,
    ) -> Result<SummaryRow, AggregationError> {
        let reference = entry
            .destination_ref()
            .ok_or(AggregationError::NotProvisioned)?;
        let workbook = self.backend.open(reference).await?;
        let sheet = workbook.primary()?;
        let rows = self.backend.read_rows(&workbook, sheet).await?;
        let metrics = summarize_rows(&rows)?;

        Ok(SummaryRow {
            first_name: entry.first_name.text(),
            last_name: entry.last_name.text(),
            profile_id: entry.profile_id.text(),
            destination: reference.to_string(),
            favorites: metrics.favorites.to_string(),
            views: metrics.views.to_string(),
            followers: metrics.followers.to_string(),
            following: metrics.following.to_string(),
            visible_publications: metrics.visible.to_string(),
            registry_refreshed: entry.last_refreshed.text(),
            summary_refreshed: refreshed.to_string(),
        })
    }

    /// Rebuild the summary sheet of the registry workbook
    ///
    /// # Errors
    ///
    /// Returns `StoreError` only when the summary sheet itself cannot be
    /// read or written; per-entry failures fall back to previous rows
    pub async fn run(&self, registry: &Registry, summary_sheet: &str) -> Result<SummaryReport, StoreError> {
        let workbook = registry.workbook();
        let sheet = workbook.sheet(summary_sheet)?;

        let existing = self.backend.read_rows(workbook, sheet).await?;
        let previous: HashMap<String, SummaryRow> = existing
            .iter()
            .skip(1)
            .map(|cells| SummaryRow::from_cells(cells))
            .filter(|row| !row.profile_id.is_empty())
            .map(|row| (row.profile_id.clone(), row))
            .collect();

        let refreshed = format_timestamp(Utc::now());
        let mut report = SummaryReport {
            entries: registry.len(),
            ..SummaryReport::default()
        };
        let mut table = TableBuilder::new(&SummaryRow::HEADER);

        for (position, entry) in registry.entries().iter().enumerate() {
            tracing::debug!(
                position = position + 1,
                total = registry.len(),
                row = entry.row,
                "Summarizing entry"
            );

            let row = match self.summarize_entry(entry, &refreshed).await {
                Ok(row) => {
                    report.refreshed += 1;
                    row
                }
                Err(e) => {
                    let fallback = match entry.profile_id().and_then(|id| previous.get(id)) {
                        Some(prev) => {
                            report.fallbacks += 1;
                            prev.clone()
                        }
                        None => {
                            report.placeholders += 1;
                            placeholder(entry)
                        }
                    };

                    let body = format!(
                        "Error processing profile #{} ({} {}): {}",
                        position + 1,
                        fallback.first_name,
                        fallback.last_name,
                        e
                    );
                    tracing::warn!(row = entry.row, error = %e, "Summary entry failed, keeping previous row");
                    self.notifier
                        .notify_operator(
                            &operator_subject(&self.service_name, subjects::SUMMARY_ERROR),
                            &body,
                        )
                        .await;

                    if !self.cooldown.is_zero() {
                        tracing::debug!(secs = self.cooldown.as_secs(), "Pausing after failure");
                        tokio::time::sleep(self.cooldown).await;
                    }
                    fallback
                }
            };

            table.push_row(row.cells())?;
        }

        // Blank out rows left over from a longer previous summary
        let mut grid = table.build().to_grid();
        if grid.len() < existing.len() {
            grid.resize(existing.len(), vec![CellValue::Empty; SummaryRow::WIDTH]);
        }
        self.backend.write_rows(workbook, sheet, 1, &grid).await?;

        tracing::info!(
            entries = report.entries,
            refreshed = report.refreshed,
            fallbacks = report.fallbacks,
            placeholders = report.placeholders,
            "Summary written"
        );
        Ok(report)
    }
}

/// Row for a failed entry that has never been summarized
fn placeholder(entry: &RegistryEntry) -> SummaryRow {
    let zero = String::from("0");
    SummaryRow {
        first_name: entry.first_name.text(),
        last_name: entry.last_name.text(),
        profile_id: entry.profile_id.text(),
        destination: entry.destination.text(),
        favorites: zero.clone(),
        views: zero.clone(),
        followers: zero.clone(),
        following: zero.clone(),
        visible_publications: zero,
        registry_refreshed: entry.last_refreshed.text(),
        summary_refreshed: String::new(),
    }
}
