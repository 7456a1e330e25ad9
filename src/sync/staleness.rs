//! Refresh scheduling decision
//!
//! An entry is due when it has never been written (no destination or no
//! refresh timestamp) or when its last refresh is at least the configured
//! threshold old. Unparsable timestamps count as absent.

use chrono::{DateTime, Duration, Utc};

use crate::models::RegistryEntry;

/// Decides whether a registry entry needs a refresh
#[derive(Debug, Clone, Copy)]
pub struct StalenessGate {
    threshold: Duration,
}

impl StalenessGate {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    /// Gate with an hour-based threshold
    pub fn from_hours(hours: u32) -> Self {
        Self::new(Duration::hours(i64::from(hours)))
    }

    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Whether the entry is due right now
    pub fn needs_refresh(&self, entry: &RegistryEntry) -> bool {
        self.needs_refresh_at(entry, Utc::now())
    }

    /// Whether the entry is due at `now`
    pub fn needs_refresh_at(&self, entry: &RegistryEntry, now: DateTime<Utc>) -> bool {
        if entry.destination_ref().is_none() {
            return true;
        }
        match entry.last_refreshed_at() {
            None => true,
            Some(last) => now.signed_duration_since(last) >= self.threshold,
        }
    }
}

impl Default for StalenessGate {
    fn default() -> Self {
        Self::from_hours(23)
    }
}
