//! Physical persistence capability consumed by the perform/undo protocol.

use crate::entity::{DataMap, EntityId};
use crate::error::AuditError;
use crate::revision::RevisionMarker;

/// Write-side persistence contract required by [`ChangeBuffer::flush`].
///
/// Implementations translate generated audit data into rows of the audit
/// tables. All failures are transaction-fatal; the buffer performs no retry.
///
/// [`ChangeBuffer::flush`]: crate::buffer::ChangeBuffer::flush
pub trait AuditPersister {
    /// Persists the revision marker, assigning its revision number.
    ///
    /// Called at most once per transaction, immediately before the first
    /// audit row that references the marker is written.
    fn persist_revision(&mut self, marker: &mut RevisionMarker) -> Result<(), AuditError>;

    /// Inserts one audit row.
    ///
    /// # Arguments
    /// * `entity_name` - Mapped name of the audited entity
    /// * `id` - Identifier of the audited instance
    /// * `data` - Generated audit data, including the revision-type entry
    /// * `revision` - Persisted marker shared by all rows of the transaction
    fn write(
        &mut self,
        entity_name: &str,
        id: &EntityId,
        data: &DataMap,
        revision: &RevisionMarker,
    ) -> Result<(), AuditError>;

    /// Deletes a previously inserted audit row.
    ///
    /// `data` is the row exactly as it was written, captured at perform time;
    /// the in-memory unit may have been merged further since.
    fn retract(
        &mut self,
        entity_name: &str,
        id: &EntityId,
        data: &DataMap,
        revision: &RevisionMarker,
    ) -> Result<(), AuditError>;
}
