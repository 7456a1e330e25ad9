//! statsync - public profile stats mirrored into spreadsheets
//!
//! Keeps one spreadsheet per subscriber filled with their public profile
//! and publication metrics, plus a summary sheet rolling all of them up.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`crawler`] - Upstream profile and workbook retrieval with rate limiting
//! - [`models`] - Core data structures and types
//! - [`storage`] - Spreadsheet backends, registry, provisioning and bulk writes
//! - [`sync`] - Staleness gate, normalization and the per-entry pipeline
//! - [`summary`] - Cross-subscriber rollup with per-entry fallback
//! - [`notifications`] - Operator and subscriber notifications
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use statsync::config::Config;
//! use statsync::storage::{GoogleSheetsClient, Registry};
//! use statsync::sync::SyncOrchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let backend = Arc::new(GoogleSheetsClient::from_config(&config.sheets)?);
//!     let notifier = statsync::notifications::from_config(
//!         &config.notifications,
//!         &config.sync.operator_email,
//!     );
//!     let mut registry = Registry::load(
//!         backend.clone(),
//!         &config.sheets.registry,
//!         &config.sheets.registry_sheet,
//!         config.registry_layout,
//!     )
//!     .await?;
//!     let orchestrator = SyncOrchestrator::from_config(&config, backend, notifier)?;
//!     let report = orchestrator.run(&mut registry).await;
//!     println!("refreshed {}", report.refreshed);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crawler;
pub mod models;
pub mod notifications;
pub mod storage;
pub mod summary;
pub mod sync;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::crawler::{ProfileCrawler, PublicApiClient};
    pub use crate::utils::error::{FetchError, StoreError};
    pub use crate::models::{
        CellRead, CellValue, ProfileSnapshot, PublicationRecord, RegistryEntry, SummaryRow,
    };
    pub use crate::notifications::{LogNotifier, Notifier, WebhookNotifier};
    pub use crate::storage::{GoogleSheetsClient, MemorySheets, Registry, SheetsBackend};
    pub use crate::summary::SummaryAggregator;
    pub use crate::sync::{StalenessGate, SyncOrchestrator, SyncReport};
}

// Direct re-exports for convenience
pub use models::{ProfileSnapshot, PublicationRecord, RegistryEntry};
