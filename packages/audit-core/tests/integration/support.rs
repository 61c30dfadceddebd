//! In-memory audit store shared by the integration tests.

use audit_core::entity::{DataMap, EntityId};
use audit_core::error::AuditError;
use audit_core::persister::AuditPersister;
use audit_core::revision::{RevisionId, RevisionMarker};

/// One physically stored audit row.
#[derive(Debug, Clone)]
pub struct StoredRow {
    pub entity_name: String,
    pub id: EntityId,
    pub revision: RevisionId,
    pub data: DataMap,
}

/// Audit store keeping rows and revision markers in memory.
///
/// Enforces the at-most-one-row-per-key-per-revision invariant the way a
/// relational unique constraint would.
#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    next_revision: RevisionId,
    pub rows: Vec<StoredRow>,
    pub revisions: Vec<RevisionMarker>,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows stored for one entity across all revisions, in revision order.
    pub fn history_of(&self, entity_name: &str, id: &EntityId) -> Vec<&StoredRow> {
        let mut rows: Vec<&StoredRow> = self
            .rows
            .iter()
            .filter(|row| row.entity_name == entity_name && &row.id == id)
            .collect();
        rows.sort_by_key(|row| row.revision);
        rows
    }
}

impl AuditPersister for InMemoryAuditStore {
    fn persist_revision(&mut self, marker: &mut RevisionMarker) -> Result<(), AuditError> {
        self.next_revision += 1;
        marker.id = Some(self.next_revision);
        self.revisions.push(marker.clone());
        Ok(())
    }

    fn write(
        &mut self,
        entity_name: &str,
        id: &EntityId,
        data: &DataMap,
        revision: &RevisionMarker,
    ) -> Result<(), AuditError> {
        let revision_id = revision.id.ok_or_else(|| AuditError::Persistence {
            entity_name: entity_name.to_string(),
            id: id.clone(),
            reason: "revision not persisted".to_string(),
        })?;

        let duplicate = self.rows.iter().any(|row| {
            row.entity_name == entity_name && &row.id == id && row.revision == revision_id
        });
        if duplicate {
            return Err(AuditError::Persistence {
                entity_name: entity_name.to_string(),
                id: id.clone(),
                reason: "unique constraint violation".to_string(),
            });
        }

        self.rows.push(StoredRow {
            entity_name: entity_name.to_string(),
            id: id.clone(),
            revision: revision_id,
            data: data.clone(),
        });
        Ok(())
    }

    fn retract(
        &mut self,
        entity_name: &str,
        id: &EntityId,
        _data: &DataMap,
        revision: &RevisionMarker,
    ) -> Result<(), AuditError> {
        let revision_id = revision.id.unwrap_or(0);
        let position = self.rows.iter().position(|row| {
            row.entity_name == entity_name && &row.id == id && row.revision == revision_id
        });
        match position {
            Some(index) => {
                self.rows.remove(index);
                Ok(())
            }
            None => Err(AuditError::UndoFailed {
                entity_name: entity_name.to_string(),
                id: id.clone(),
                reason: "row not found".to_string(),
            }),
        }
    }
}
