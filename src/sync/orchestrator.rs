//! Per-entry sync pipeline
//!
//! For every registry entry, in order:
//!
//! 1. Skip entries the [`StalenessGate`] says are fresh
//! 2. Fetch the profile and every publication
//! 3. Normalize into the 34-column table
//! 4. Resolve (or create) the destination and rewrite it
//! 5. Stamp the registry refresh timestamp
//!
//! An entry is only stamped after its write succeeded, so any failure
//! leaves it due for the next run. A wall-clock budget is checked before
//! each entry; once spent, the run stops and the remaining entries wait for
//! the next invocation.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::normalize::RecordNormalizer;
use super::staleness::StalenessGate;
use crate::config::Config;
use crate::crawler::{ProfileCrawler, PublicApiClient};
use crate::models::RegistryEntry;
use crate::notifications::templates::{self, subjects};
use crate::notifications::Notifier;
use crate::storage::{BatchWriter, DestinationProvisioner, Registry, SheetsBackend};
use crate::utils::error::{FetchError, StoreError};
use crate::utils::truncate_text;

/// Longest error body sent to the operator
const MAX_REPORT_LEN: usize = 2000;

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    Completed,
    RuntimeBudgetExceeded { elapsed_secs: u64, remaining: usize },
}

/// A subscriber whose destination was created during the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewSubscriber {
    pub row: usize,
    pub email: String,
    pub first_name: String,
    pub destination: String,
}

/// Totals of one sync run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub examined: usize,
    pub refreshed: usize,
    pub skipped_fresh: usize,
    pub skipped_invalid: usize,
    pub no_records: usize,
    pub failed: usize,
    pub new_subscribers: Vec<NewSubscriber>,
    pub stop_reason: StopReason,
}

impl SyncReport {
    fn new() -> Self {
        Self {
            examined: 0,
            refreshed: 0,
            skipped_fresh: 0,
            skipped_invalid: 0,
            no_records: 0,
            failed: 0,
            new_subscribers: Vec::new(),
            stop_reason: StopReason::Completed,
        }
    }
}

/// Failure of one entry, by pipeline stage
#[derive(Debug, thiserror::Error)]
pub enum EntryError {
    #[error("Unable to process profile {profile_id}: {source}")]
    Fetch {
        profile_id: String,
        #[source]
        source: FetchError,
    },

    #[error("Could not open or create destination for {profile_id}: {source}")]
    Destination {
        profile_id: String,
        #[source]
        source: StoreError,
    },

    #[error("Could not write destination for {profile_id}: {source}")]
    Write {
        profile_id: String,
        #[source]
        source: StoreError,
    },
}

impl EntryError {
    fn subject_suffix(&self) -> &'static str {
        match self {
            Self::Fetch { .. } => subjects::PROFILE_ERROR,
            Self::Destination { .. } => subjects::OPEN_ERROR,
            Self::Write { .. } => subjects::WRITE_ERROR,
        }
    }
}

enum EntryOutcome {
    Refreshed,
    NoRecords,
}

/// Drives the sync pipeline over a registry
pub struct SyncOrchestrator {
    crawler: ProfileCrawler,
    normalizer: RecordNormalizer,
    provisioner: DestinationProvisioner,
    writer: BatchWriter,
    gate: StalenessGate,
    notifier: Arc<dyn Notifier>,
    budget: Duration,
    service_name: String,
}

impl SyncOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        crawler: ProfileCrawler,
        normalizer: RecordNormalizer,
        provisioner: DestinationProvisioner,
        writer: BatchWriter,
        gate: StalenessGate,
        notifier: Arc<dyn Notifier>,
        budget: Duration,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            crawler,
            normalizer,
            provisioner,
            writer,
            gate,
            notifier,
            budget,
            service_name: service_name.into(),
        }
    }

    /// Wire the pipeline from configuration
    ///
    /// # Errors
    ///
    /// Returns `FetchError` if the upstream HTTP client cannot be built
    pub fn from_config(
        config: &Config,
        backend: Arc<dyn SheetsBackend>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, FetchError> {
        let client = Arc::new(PublicApiClient::from_config(&config.upstream)?);

        Ok(Self::new(
            ProfileCrawler::new(client, config.upstream.page_size),
            RecordNormalizer::new(&config.upstream.site_url),
            DestinationProvisioner::new(
                Arc::clone(&backend),
                config.sync.operator_email.clone(),
                config.sheets.destination_title_prefix.clone(),
            ),
            BatchWriter::new(backend, config.sheets.stats_sheet_title.clone()),
            StalenessGate::new(config.staleness_threshold()),
            notifier,
            config.runtime_budget(),
            config.notifications.service_name.clone(),
        ))
    }

    pub fn gate(&self) -> &StalenessGate {
        &self.gate
    }

    /// Process every registry entry once
    pub async fn run(&self, registry: &mut Registry) -> SyncReport {
        let started = Instant::now();
        let total = registry.len();
        let mut report = SyncReport::new();

        tracing::info!(entries = total, budget_secs = self.budget.as_secs(), "Starting sync run");

        for index in 0..total {
            let elapsed = started.elapsed();
            if elapsed >= self.budget {
                tracing::warn!(
                    elapsed_secs = elapsed.as_secs(),
                    remaining = total - index,
                    "Runtime budget exhausted, stopping"
                );
                report.stop_reason = StopReason::RuntimeBudgetExceeded {
                    elapsed_secs: elapsed.as_secs(),
                    remaining: total - index,
                };
                break;
            }

            let Some(entry) = registry.entries().get(index).cloned() else {
                break;
            };
            report.examined += 1;

            if !self.gate.needs_refresh_at(&entry, Utc::now()) {
                tracing::debug!(row = entry.row, "Entry is fresh, skipping");
                report.skipped_fresh += 1;
                continue;
            }

            let Some(profile_id) = entry.profile_id().map(str::to_string) else {
                tracing::warn!(row = entry.row, "Entry has no profile id, skipping");
                report.skipped_invalid += 1;
                continue;
            };

            let outcome = self
                .process(registry, index, &entry, &profile_id, &mut report.new_subscribers)
                .await;
            match outcome {
                Ok(EntryOutcome::Refreshed) => {
                    report.refreshed += 1;
                }
                Ok(EntryOutcome::NoRecords) => {
                    tracing::info!(row = entry.row, profile_id = %profile_id, "No records, nothing written");
                    report.no_records += 1;
                }
                Err(e) => {
                    tracing::error!(row = entry.row, profile_id = %profile_id, error = %e, "Entry failed");
                    report.failed += 1;
                    let subject = templates::operator_subject(&self.service_name, e.subject_suffix());
                    let body = truncate_text(&e.to_string(), MAX_REPORT_LEN);
                    self.notifier.notify_operator(&subject, &body).await;
                }
            }
        }

        self.announce(&report.new_subscribers).await;

        tracing::info!(
            examined = report.examined,
            refreshed = report.refreshed,
            skipped_fresh = report.skipped_fresh,
            failed = report.failed,
            new_subscribers = report.new_subscribers.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Sync run finished"
        );

        report
    }

    /// Refresh one entry
    ///
    /// A destination created here is pushed onto `new_subscribers` as soon as
    /// it is recorded, so the welcome goes out even if the write then fails;
    /// later runs reopen the stored reference and never see it as new again.
    async fn process(
        &self,
        registry: &mut Registry,
        index: usize,
        entry: &RegistryEntry,
        profile_id: &str,
        new_subscribers: &mut Vec<NewSubscriber>,
    ) -> Result<EntryOutcome, EntryError> {
        tracing::info!(row = entry.row, profile_id, "Refreshing entry");

        let harvest = self
            .crawler
            .harvest(profile_id)
            .await
            .map_err(|source| EntryError::Fetch {
                profile_id: profile_id.to_string(),
                source,
            })?;

        if harvest.publications.is_empty() {
            return Ok(EntryOutcome::NoRecords);
        }

        let synced_at = Utc::now();
        let table = self
            .normalizer
            .normalize(&harvest.profile, &harvest.publications, synced_at);

        let provisioned = self
            .provisioner
            .provision(registry, index)
            .await
            .map_err(|source| EntryError::Destination {
                profile_id: profile_id.to_string(),
                source,
            })?;
        let mut workbook = provisioned.workbook;
        if provisioned.is_new {
            new_subscribers.push(NewSubscriber {
                row: entry.row,
                email: entry.email.text(),
                first_name: entry.first_name.text(),
                destination: workbook.url.clone(),
            });
        }

        let write_error = |source| EntryError::Write {
            profile_id: profile_id.to_string(),
            source,
        };
        self.writer
            .write(&mut workbook, &table)
            .await
            .map_err(write_error)?;
        registry
            .record_refresh(index, synced_at)
            .await
            .map_err(write_error)?;

        tracing::info!(
            row = entry.row,
            profile_id,
            publications = table.len(),
            workbook = %workbook.id,
            "Entry refreshed"
        );
        Ok(EntryOutcome::Refreshed)
    }

    /// Operator count report plus one welcome per new subscriber
    async fn announce(&self, new_subscribers: &[NewSubscriber]) {
        if new_subscribers.is_empty() {
            return;
        }

        let count = new_subscribers.len();
        self.notifier
            .notify_operator(
                &templates::new_subscribers_subject(&self.service_name, count),
                &templates::new_subscribers_body(count),
            )
            .await;

        for subscriber in new_subscribers {
            if subscriber.email.is_empty() {
                tracing::warn!(row = subscriber.row, "New subscriber has no email, welcome not sent");
                continue;
            }
            self.notifier
                .notify_subscriber(&subscriber.email, &subscriber.first_name, &subscriber.destination)
                .await;
        }
    }
}
