//! Audit engine error types.

use thiserror::Error;

use crate::entity::EntityId;

/// Errors raised by the change buffer and merge algebra.
///
/// Every error here is transaction-fatal: the owning transaction must roll
/// back, which discards the buffer. There is no partial retry.
#[derive(Error, Debug, Clone)]
pub enum AuditError {
    /// Two change units for the same entity could not be combined
    #[error("Cannot merge {incoming} change into {existing} change for entity '{entity_name}'")]
    Merge {
        entity_name: String,
        existing: &'static str,
        incoming: &'static str,
    },

    /// Snapshot does not match the property layout of the mapper
    #[error("Snapshot with {got} values does not match the {expected} mapped properties")]
    SnapshotMismatch { expected: usize, got: usize },

    /// Revision marker could not be persisted
    #[error("Failed to persist revision marker: {0}")]
    RevisionPersistence(String),

    /// Audit row could not be written
    #[error("Failed to write audit row for '{entity_name}' id {id}: {reason}")]
    Persistence {
        entity_name: String,
        id: EntityId,
        reason: String,
    },

    /// Previously written audit row could not be retracted
    #[error("Failed to retract audit row for '{entity_name}' id {id}: {reason}")]
    UndoFailed {
        entity_name: String,
        id: EntityId,
        reason: String,
    },

    /// Operation on a buffer that was already discarded
    #[error("Change buffer already discarded")]
    BufferDiscarded,
}
