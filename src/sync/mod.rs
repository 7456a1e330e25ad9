//! Per-subscriber sync pass
//!
//! - [`staleness`] - which registry entries are due
//! - [`normalize`] - profile and publications to destination rows
//! - [`orchestrator`] - the per-entry pipeline and runtime budget

pub mod normalize;
pub mod orchestrator;
pub mod staleness;

pub use normalize::{NormalizedRow, RecordNormalizer, STATS_HEADER, STATS_WIDTH};
pub use orchestrator::{EntryError, NewSubscriber, StopReason, SyncOrchestrator, SyncReport};
pub use staleness::StalenessGate;
