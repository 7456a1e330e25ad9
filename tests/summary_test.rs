//! Summary pass tests against the in-memory backend

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{registry_rows, RecordingNotifier, REGISTRY_SHEET};
use statsync::models::{CellValue, SummaryRow};
use statsync::storage::{MemorySheets, Registry, SheetsBackend};
use statsync::summary::SummaryAggregator;
use statsync::sync::STATS_WIDTH;

const SUMMARY_SHEET: &str = "Summary";

/// A destination data row with the columns the summary reads filled in
fn stats_row(views: &str, favorites: &str, visible: &str, followers: &str, following: &str) -> Vec<String> {
    let mut row = vec!["x".to_string(); STATS_WIDTH];
    row[7] = visible.to_string();
    row[9] = views.to_string();
    row[10] = favorites.to_string();
    row[23] = followers.to_string();
    row[24] = following.to_string();
    row
}

fn destination(backend: &MemorySheets, rows: Vec<Vec<String>>) -> String {
    let mut sheet = vec![vec!["header".to_string(); STATS_WIDTH]];
    sheet.extend(rows);
    let id = backend.insert_workbook("Stats", &[("Stats", sheet)]);
    format!("https://docs.google.com/spreadsheets/d/{id}")
}

struct Fixture {
    backend: Arc<MemorySheets>,
    notifier: Arc<RecordingNotifier>,
    registry_id: String,
    ada_destination: String,
}

impl Fixture {
    fn new() -> Self {
        let backend = Arc::new(MemorySheets::new());
        let ada_destination = destination(
            &backend,
            vec![
                stats_row("1,200", "10", "TRUE", "120", "8"),
                stats_row("300", "2", "FALSE", "120", "8"),
            ],
        );
        let alan_destination = destination(
            &backend,
            vec![stats_row("50", "1", "TRUE", "9", "4")],
        );
        let refreshed = "2024-03-01 06:00:00";
        let registry_id = backend.insert_workbook(
            "Sign-ups",
            &[
                (
                    REGISTRY_SHEET,
                    registry_rows(&[
                        ["ada@example.com", "Ada", "Lovelace", "ada", ada_destination.as_str(), refreshed],
                        ["alan@example.com", "Alan", "Turing", "alan", alan_destination.as_str(), refreshed],
                        ["grace@example.com", "Grace", "Hopper", "grace", "", ""],
                    ]),
                ),
                (SUMMARY_SHEET, vec![]),
            ],
        );

        Self {
            backend,
            notifier: Arc::new(RecordingNotifier::default()),
            registry_id,
            ada_destination,
        }
    }

    async fn registry(&self) -> Registry {
        Registry::load(
            self.backend.clone(),
            &self.registry_id,
            REGISTRY_SHEET,
            Default::default(),
        )
        .await
        .unwrap()
    }

    fn aggregator(&self) -> SummaryAggregator {
        SummaryAggregator::new(
            self.backend.clone(),
            self.notifier.clone(),
            Duration::ZERO,
            "Stats Service",
        )
    }

    fn summary(&self) -> Vec<Vec<String>> {
        self.backend.snapshot(&self.registry_id, SUMMARY_SHEET).unwrap()
    }
}

fn row_for<'a>(rows: &'a [Vec<String>], profile_id: &str) -> &'a Vec<String> {
    rows.iter().find(|row| row[2] == profile_id).unwrap()
}

#[tokio::test]
async fn test_summary_rolls_up_destinations() {
    let f = Fixture::new();
    let registry = f.registry().await;

    let report = f.aggregator().run(&registry, SUMMARY_SHEET).await.unwrap();
    assert_eq!(report.entries, 3);
    assert_eq!(report.refreshed, 2);
    assert_eq!(report.placeholders, 1);

    let rows = f.summary();
    assert_eq!(rows[0], SummaryRow::HEADER.to_vec());
    assert_eq!(rows.len(), 1 + registry.len());

    let ada = row_for(&rows, "ada");
    assert_eq!(ada[0], "Ada");
    assert_eq!(ada[3], f.ada_destination);
    assert_eq!(ada[4], "12"); // favorites
    assert_eq!(ada[5], "1500"); // views, thousands separator stripped
    assert_eq!(ada[6], "120"); // followers from first row, not summed
    assert_eq!(ada[7], "8");
    assert_eq!(ada[8], "1"); // visible
    assert_eq!(ada[9], "2024-03-01 06:00:00");
    assert_eq!(ada[10].len(), "2024-03-01 06:00:00".len());

    // Never provisioned: zero placeholder and one operator report
    let grace = row_for(&rows, "grace");
    assert_eq!(&grace[4..9], &["0", "0", "0", "0", "0"]);
    assert_eq!(
        f.notifier.operator_subjects(),
        vec!["Stats Service - Summarization Error".to_string()]
    );
}

#[tokio::test]
async fn test_failed_destination_keeps_previous_row() {
    let f = Fixture::new();
    let registry = f.registry().await;
    f.aggregator().run(&registry, SUMMARY_SHEET).await.unwrap();
    let first = f.summary();

    let ada_id = f.ada_destination.rsplit('/').next().unwrap().to_string();
    f.backend.set_failing(&ada_id, true);

    let report = f.aggregator().run(&registry, SUMMARY_SHEET).await.unwrap();
    assert_eq!(report.fallbacks, 1);
    assert_eq!(report.refreshed, 1);

    let second = f.summary();
    assert_eq!(second.len(), first.len());
    assert_eq!(row_for(&second, "ada"), row_for(&first, "ada"));

    let messages = f.notifier.operator_messages();
    let ada_report = messages
        .iter()
        .find(|(_, body)| body.contains("Ada Lovelace"))
        .unwrap();
    assert_eq!(ada_report.0, "Stats Service - Summarization Error");
    assert!(ada_report.1.contains("#1"));
}

#[tokio::test]
async fn test_shorter_summary_blanks_leftover_rows() {
    let f = Fixture::new();
    let registry = f.registry().await;
    f.aggregator().run(&registry, SUMMARY_SHEET).await.unwrap();
    assert_eq!(f.summary().len(), 4);

    // Grace leaves: blank her sign-up row (sheet row 4)
    let workbook = f.backend.open(&f.registry_id).await.unwrap();
    let sheet = workbook.sheet(REGISTRY_SHEET).unwrap();
    for column in 1..=7 {
        f.backend
            .update_cell(&workbook, sheet, 4, column, &CellValue::Empty)
            .await
            .unwrap();
    }

    let registry = f.registry().await;
    assert_eq!(registry.len(), 2);
    f.aggregator().run(&registry, SUMMARY_SHEET).await.unwrap();

    let rows = f.summary();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|row| row.get(2).map(String::as_str) != Some("grace")));
}

#[tokio::test]
async fn test_missing_summary_sheet_is_an_error() {
    let backend = Arc::new(MemorySheets::new());
    let registry_id = backend.insert_workbook(
        "Sign-ups",
        &[(REGISTRY_SHEET, registry_rows(&[["a@example.com", "A", "B", "ab", "", ""]]))],
    );
    let registry = Registry::load(backend.clone(), &registry_id, REGISTRY_SHEET, Default::default())
        .await
        .unwrap();

    let aggregator = SummaryAggregator::new(
        backend,
        Arc::new(RecordingNotifier::default()),
        Duration::ZERO,
        "Stats Service",
    );
    assert!(aggregator.run(&registry, SUMMARY_SHEET).await.is_err());
}
