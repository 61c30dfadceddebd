use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::config::AuditConfig;
use crate::entity::{DataMap, EntityKey, PropertySnapshot};
use crate::error::AuditError;
use crate::mapper::PropertyMapper;
use crate::persister::AuditPersister;
use crate::revision::{RevisionHandle, RevisionId, RevisionListener, RevisionMarker};
use crate::work::WorkUnit;

use super::slot::{PerformedRow, Slot};

/// Per-transaction buffer of net change units, one per entity key.
///
/// Owned by the transaction thread that produced it and never shared.
/// Row-level events merge into the buffer via the work-unit algebra; each
/// flush physically writes pending rows against the transaction's revision
/// marker and retracts rows an earlier flush wrote that later events
/// superseded. Dropping the buffer is the rollback path: rows already
/// written are rolled back by the ambient transaction.
#[derive(Debug)]
pub struct ChangeBuffer {
    /// Engine configuration
    config: AuditConfig,
    /// Net unit and perform bookkeeping per entity key
    units: HashMap<EntityKey, Slot>,
    /// Rows written by an earlier flush whose net effect has since vanished
    undo_queue: Vec<(EntityKey, PerformedRow)>,
    /// Lazily created marker shared by every row of this transaction
    revision: Option<RevisionHandle>,
    /// Whether the buffer has been discarded
    discarded: bool,
}

impl ChangeBuffer {
    /// Creates an empty buffer for one transaction.
    pub fn new(config: AuditConfig) -> Self {
        Self {
            config,
            units: HashMap::new(),
            undo_queue: Vec::new(),
            revision: None,
            discarded: false,
        }
    }

    fn ensure_active(&self) -> Result<(), AuditError> {
        if self.discarded {
            return Err(AuditError::BufferDiscarded);
        }
        Ok(())
    }

    /// Notifies the buffer of a row insert.
    ///
    /// # Arguments
    /// * `key` - Identity of the inserted entity
    /// * `new_state` - Snapshot at insert time
    /// * `mapper` - Property mapper of the entity type
    ///
    /// # Returns
    /// `Result<(), AuditError>` indicating success or failure.
    pub fn on_insert(
        &mut self,
        key: EntityKey,
        new_state: PropertySnapshot,
        mapper: &dyn PropertyMapper,
    ) -> Result<(), AuditError> {
        let unit = WorkUnit::add(new_state, mapper)?;
        self.merge_or_insert(key, unit, mapper)
    }

    /// Notifies the buffer of a row update.
    ///
    /// # Arguments
    /// * `key` - Identity of the updated entity
    /// * `old_state` - Snapshot before the update
    /// * `new_state` - Snapshot after the update
    /// * `mapper` - Property mapper of the entity type
    ///
    /// # Returns
    /// `Result<(), AuditError>` indicating success or failure.
    pub fn on_update(
        &mut self,
        key: EntityKey,
        old_state: PropertySnapshot,
        new_state: PropertySnapshot,
        mapper: &dyn PropertyMapper,
    ) -> Result<(), AuditError> {
        let unit = WorkUnit::modify(old_state, new_state, mapper)?;
        self.merge_or_insert(key, unit, mapper)
    }

    /// Notifies the buffer of a row delete.
    ///
    /// The full prior state goes on the delete row when the
    /// `store_data_at_delete` policy is configured.
    pub fn on_delete(
        &mut self,
        key: EntityKey,
        prior_state: PropertySnapshot,
        mapper: &dyn PropertyMapper,
    ) -> Result<(), AuditError> {
        let unit = WorkUnit::delete(prior_state, self.config.store_data_at_delete, mapper)?;
        self.merge_or_insert(key, unit, mapper)
    }

    /// Notifies the buffer of a collection mutation that left the owning
    /// entity's scalar state unchanged.
    pub fn on_collection_change(
        &mut self,
        key: EntityKey,
        role: impl Into<String>,
        collection_data: DataMap,
        mapper: &dyn PropertyMapper,
    ) -> Result<(), AuditError> {
        let unit = WorkUnit::collection_change(role, collection_data);
        self.merge_or_insert(key, unit, mapper)
    }

    /// Notifies the buffer of an inverse-side fix-up of a bidirectional
    /// association.
    ///
    /// `nested` is the real row-level unit the fix-up travels with; it must
    /// not itself be a fix-up.
    pub fn on_bidirectional_fixup(
        &mut self,
        key: EntityKey,
        nested: WorkUnit,
        relation_data: DataMap,
        mapper: &dyn PropertyMapper,
    ) -> Result<(), AuditError> {
        if matches!(nested, WorkUnit::FakeBidirectionalRelation { .. }) {
            return Err(AuditError::Merge {
                entity_name: key.entity_name,
                existing: "bidirectional-fixup",
                incoming: "bidirectional-fixup",
            });
        }
        let unit = WorkUnit::bidirectional_fixup(nested, relation_data);
        self.merge_or_insert(key, unit, mapper)
    }

    /// Inserts `incoming` or folds it into the existing unit for `key`.
    ///
    /// The slot ends up holding the net unit, is removed when the merge
    /// cancels or the result carries no work, and is marked dirty when its
    /// row was already physically written by an earlier flush. A removed
    /// slot whose row was written leaves an undo tombstone behind.
    ///
    /// # Arguments
    /// * `key` - Identity the unit belongs to
    /// * `incoming` - The freshly built unit
    /// * `mapper` - Property mapper of the entity type
    ///
    /// # Returns
    /// `Result<(), AuditError>` indicating success or failure.
    pub fn merge_or_insert(
        &mut self,
        key: EntityKey,
        incoming: WorkUnit,
        mapper: &dyn PropertyMapper,
    ) -> Result<(), AuditError> {
        self.ensure_active()?;

        match self.units.remove(&key) {
            None => {
                if incoming.contains_work() {
                    self.units.insert(key, Slot::new(incoming));
                }
            }
            Some(mut slot) => {
                let was_performed = slot.performed.is_some();
                match slot.unit.merge(incoming, mapper)? {
                    Some(merged) if merged.contains_work() => {
                        slot.unit = merged;
                        if was_performed {
                            slot.dirty = true;
                        }
                        self.units.insert(key, slot);
                    }
                    _ => {
                        // Net effect vanished. A row already on disk must be
                        // retracted at the next flush.
                        if let Some(row) = slot.performed.take() {
                            self.undo_queue.push((key, row));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Returns the transaction's revision marker, creating it on first call.
    ///
    /// Creation invokes [`RevisionListener::new_revision`] exactly once. The
    /// marker's identifier stays unassigned until the first physical write
    /// that needs it.
    ///
    /// # Returns
    /// `Result<RevisionHandle, AuditError>` - fails once the buffer has been
    /// discarded.
    pub fn ensure_revision(
        &mut self,
        listener: &mut dyn RevisionListener,
    ) -> Result<RevisionHandle, AuditError> {
        self.ensure_active()?;

        if let Some(revision) = &self.revision {
            return Ok(revision.clone());
        }

        let mut marker = RevisionMarker::new(self.config.track_entities_changed);
        listener.new_revision(&mut marker);

        let handle: RevisionHandle = Rc::new(RefCell::new(marker));
        self.revision = Some(handle.clone());
        Ok(handle)
    }

    /// Flushes pending work: retracts superseded rows, then performs every
    /// unperformed or dirty slot against the shared revision marker.
    ///
    /// The marker is persisted (revision number assigned) at the first write
    /// that needs it; a flush with nothing pending allocates nothing.
    /// Slots are processed in key order so row output is deterministic.
    ///
    /// # Arguments
    /// * `persister` - Physical persistence collaborator
    /// * `listener` - Revision hook, notified per performed row
    ///
    /// # Returns
    /// `Result<(), AuditError>` - any failure is transaction-fatal.
    pub fn flush(
        &mut self,
        persister: &mut dyn AuditPersister,
        listener: &mut dyn RevisionListener,
    ) -> Result<(), AuditError> {
        self.ensure_active()?;

        self.drain_undo_queue(persister)?;

        let mut pending: Vec<EntityKey> = self
            .units
            .iter()
            .filter(|(_, slot)| slot.performed.is_none() || slot.dirty)
            .map(|(key, _)| key.clone())
            .collect();
        if pending.is_empty() {
            tracing::debug!("Flush with no pending audit work");
            return Ok(());
        }
        pending.sort();

        tracing::debug!("Flushing {} pending audit row(s)", pending.len());

        let revision = self.ensure_revision(listener)?;
        if !revision.borrow().is_persisted() {
            persister.persist_revision(&mut revision.borrow_mut())?;
        }

        for key in pending {
            let Some(slot) = self.units.get_mut(&key) else {
                continue;
            };

            let data = slot.unit.generate_data(&self.config.revtype_property_name);
            let kind = slot.unit.kind();

            // A dirty slot was already written by an earlier flush: retract
            // that row before rewriting, unless the merged unit generates
            // the exact row that is already on disk.
            if slot.dirty {
                if let Some(row) = &slot.performed {
                    if row.data == data {
                        slot.dirty = false;
                        continue;
                    }
                }
                if let Some(row) = slot.performed.take() {
                    tracing::debug!(entity = %key, "Retracting superseded audit row");
                    persister
                        .retract(&key.entity_name, &key.id, &row.data, &revision.borrow())
                        .map_err(|e| Self::as_undo_failure(&key, e))?;
                }
            }

            persister.write(&key.entity_name, &key.id, &data, &revision.borrow())?;

            slot.performed = Some(PerformedRow { data, kind });
            slot.dirty = false;

            let mut marker = revision.borrow_mut();
            marker.record_modified_entity(&key.entity_name);
            listener.entity_changed(&key.entity_name, &key.id, kind, &mut marker);
        }

        Ok(())
    }

    /// Retracts rows whose buffer slot was removed after being written.
    fn drain_undo_queue(&mut self, persister: &mut dyn AuditPersister) -> Result<(), AuditError> {
        if self.undo_queue.is_empty() {
            return Ok(());
        }

        let revision = match &self.revision {
            Some(revision) => revision.clone(),
            // A written row implies an allocated revision; anything else
            // means the persisted and in-memory views have diverged.
            None => {
                let (key, _) = &self.undo_queue[0];
                return Err(AuditError::UndoFailed {
                    entity_name: key.entity_name.clone(),
                    id: key.id.clone(),
                    reason: "performed row without an allocated revision".to_string(),
                });
            }
        };

        for (key, row) in std::mem::take(&mut self.undo_queue) {
            tracing::debug!(entity = %key, "Retracting cancelled audit row");
            persister
                .retract(&key.entity_name, &key.id, &row.data, &revision.borrow())
                .map_err(|e| Self::as_undo_failure(&key, e))?;
        }
        Ok(())
    }

    fn as_undo_failure(key: &EntityKey, error: AuditError) -> AuditError {
        match error {
            undo @ AuditError::UndoFailed { .. } => undo,
            other => AuditError::UndoFailed {
                entity_name: key.entity_name.clone(),
                id: key.id.clone(),
                reason: other.to_string(),
            },
        }
    }

    /// Discards the buffer; further events and flushes fail.
    ///
    /// Rows already written are rolled back by the ambient transaction, so
    /// no compensating deletes are issued here.
    pub fn discard(&mut self) {
        self.discarded = true;
        self.units.clear();
        self.undo_queue.clear();
        tracing::debug!("Change buffer discarded");
    }

    /// Returns whether the buffer has been discarded.
    pub fn is_discarded(&self) -> bool {
        self.discarded
    }

    /// Returns the number of entity keys currently holding a net unit.
    pub fn pending_count(&self) -> usize {
        self.units.len()
    }

    /// Returns whether the next flush would touch the persistence layer.
    pub fn has_pending_changes(&self) -> bool {
        !self.undo_queue.is_empty()
            || self
                .units
                .values()
                .any(|slot| slot.performed.is_none() || slot.dirty)
    }

    /// Returns the net unit currently buffered for `key`, if any.
    pub fn pending_unit(&self, key: &EntityKey) -> Option<&WorkUnit> {
        self.units.get(key).map(|slot| &slot.unit)
    }

    /// Returns the revision number, once the marker has been persisted.
    pub fn revision_id(&self) -> Option<RevisionId> {
        self.revision.as_ref().and_then(|r| r.borrow().id)
    }

    /// Returns whether a revision marker has been created for this transaction.
    pub fn revision_allocated(&self) -> bool {
        self.revision.is_some()
    }
}
