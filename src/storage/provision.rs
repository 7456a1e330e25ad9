//! Destination provisioning
//!
//! Resolves the destination workbook of a registry entry, creating and
//! sharing a new one when the stored reference is absent or no longer
//! opens.

use std::sync::Arc;

use super::{AccessRole, Registry, SheetsBackend, StoreResult, Workbook};
use crate::models::RegistryEntry;
use crate::utils::error::StoreError;

/// Outcome of resolving a destination
#[derive(Debug, Clone)]
pub struct Provisioned {
    pub workbook: Workbook,
    /// True when the workbook was created by this call
    pub is_new: bool,
}

/// Opens or creates per-subscriber destinations
pub struct DestinationProvisioner {
    backend: Arc<dyn SheetsBackend>,
    operator_email: String,
    title_prefix: String,
}

impl DestinationProvisioner {
    pub fn new(
        backend: Arc<dyn SheetsBackend>,
        operator_email: impl Into<String>,
        title_prefix: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            operator_email: operator_email.into(),
            title_prefix: title_prefix.into(),
        }
    }

    /// Resolve the destination of the entry at `index`
    ///
    /// A stored reference that opens is reused. A reference that is absent,
    /// malformed or points at a workbook that no longer exists leads to a
    /// new workbook; the operator is granted write access, the subscriber
    /// read access, and the new reference is written to the registry.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` for transient open failures (the entry is left
    /// untouched) and when a new workbook cannot be created. A workbook that
    /// was created but could not be shared or recorded is reported as
    /// [`StoreError::Unrecorded`] carrying its URL, and the next run starts
    /// over with a fresh one
    pub async fn provision(&self, registry: &mut Registry, index: usize) -> StoreResult<Provisioned> {
        let entry = registry
            .entries()
            .get(index)
            .cloned()
            .ok_or_else(|| StoreError::SheetMissing(format!("registry entry {index}")))?;

        if let Some(reference) = entry.destination_ref() {
            match self.backend.open(reference).await {
                Ok(workbook) => {
                    return Ok(Provisioned {
                        workbook,
                        is_new: false,
                    })
                }
                Err(e) if e.is_unavailable() => {
                    tracing::warn!(
                        row = entry.row,
                        destination = reference,
                        error = %e,
                        "Stored destination unavailable, creating a new one"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        let title = format!("{}{}", self.title_prefix, entry.display_name());
        let workbook = self.backend.create(&title).await?;

        if let Err(source) = self.share_and_record(registry, index, &entry, &workbook).await {
            tracing::error!(
                row = entry.row,
                workbook = %workbook.id,
                error = %source,
                "New destination left unrecorded"
            );
            return Err(StoreError::Unrecorded {
                url: workbook.url,
                source: Box::new(source),
            });
        }

        tracing::info!(
            row = entry.row,
            workbook = %workbook.id,
            title = %title,
            "Provisioned destination"
        );

        Ok(Provisioned {
            workbook,
            is_new: true,
        })
    }

    async fn share_and_record(
        &self,
        registry: &mut Registry,
        index: usize,
        entry: &RegistryEntry,
        workbook: &Workbook,
    ) -> StoreResult<()> {
        if !self.operator_email.is_empty() {
            self.backend
                .grant_access(workbook, &self.operator_email, AccessRole::Writer)
                .await?;
        }
        if let Some(email) = entry.email.found() {
            self.backend
                .grant_access(workbook, email, AccessRole::Reader)
                .await?;
        }
        registry.record_destination(index, &workbook.url).await
    }
}
