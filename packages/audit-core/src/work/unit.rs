use serde_json::Value;

use crate::entity::{ChangeKind, DataMap, PropertySnapshot};
use crate::error::AuditError;
use crate::mapper::PropertyMapper;

/// One pending, mergeable description of the net change to one entity
/// instance within the current transaction.
///
/// Units for the same entity key are folded together by [`WorkUnit::merge`]
/// so that at most one audit row per entity survives the transaction.
#[derive(Debug, Clone)]
pub enum WorkUnit {
    /// Entity came into existence this transaction
    Add {
        /// State at insert time, used for the delete/re-insert cancellation test
        new_state: PropertySnapshot,
        /// Full mapped data, plus any collection data folded in later
        data: DataMap,
    },
    /// Entity existed before and still exists
    Mod {
        /// State at the start of the transaction; pinned across merges
        original_state: PropertySnapshot,
        /// State after the most recent update
        current_state: PropertySnapshot,
        /// Mapped values of the changed properties
        data: DataMap,
        /// Whether any scalar property differs between original and current
        has_changes: bool,
    },
    /// Entity ceased to exist
    Del {
        /// State at delete time, incorporating earlier in-transaction updates
        prior_state: PropertySnapshot,
        /// Full prior data when the store-data-at-delete policy is on
        data: DataMap,
    },
    /// A plural attribute of the entity changed without its scalar state changing
    CollectionChange {
        /// Role name of the collection attribute
        role: String,
        /// Mapped collection data
        data: DataMap,
    },
    /// Synthetic change for the inverse side of a bidirectional association
    FakeBidirectionalRelation {
        /// The real unit this fix-up was merged with
        nested: Box<WorkUnit>,
        /// Mapped data of the owning-side relation, keyed by role
        relation_data: DataMap,
    },
}

impl WorkUnit {
    /// Builds an insert unit; the full data map is computed eagerly.
    pub fn add(
        new_state: PropertySnapshot,
        mapper: &dyn PropertyMapper,
    ) -> Result<Self, AuditError> {
        let mut data = DataMap::new();
        mapper.map_full(&new_state, &mut data)?;
        Ok(WorkUnit::Add { new_state, data })
    }

    /// Builds an update unit diffing `original_state` against `current_state`.
    pub fn modify(
        original_state: PropertySnapshot,
        current_state: PropertySnapshot,
        mapper: &dyn PropertyMapper,
    ) -> Result<Self, AuditError> {
        let mut data = DataMap::new();
        let has_changes = mapper.map_changed(&original_state, &current_state, &mut data)?;
        Ok(WorkUnit::Mod {
            original_state,
            current_state,
            data,
            has_changes,
        })
    }

    /// Builds a delete unit.
    ///
    /// # Arguments
    /// * `prior_state` - State at delete time
    /// * `store_data` - Whether the full prior state goes on the delete row
    /// * `mapper` - Mapper used when `store_data` is on
    pub fn delete(
        prior_state: PropertySnapshot,
        store_data: bool,
        mapper: &dyn PropertyMapper,
    ) -> Result<Self, AuditError> {
        let mut data = DataMap::new();
        if store_data {
            mapper.map_full(&prior_state, &mut data)?;
        }
        Ok(WorkUnit::Del { prior_state, data })
    }

    /// Builds a collection-change unit.
    pub fn collection_change(role: impl Into<String>, data: DataMap) -> Self {
        WorkUnit::CollectionChange {
            role: role.into(),
            data,
        }
    }

    /// Wraps `nested` as the inverse-side fix-up of a bidirectional association.
    pub fn bidirectional_fixup(nested: WorkUnit, relation_data: DataMap) -> Self {
        WorkUnit::FakeBidirectionalRelation {
            nested: Box::new(nested),
            relation_data,
        }
    }

    /// Short variant name used in error reporting.
    pub fn variant_name(&self) -> &'static str {
        match self {
            WorkUnit::Add { .. } => "add",
            WorkUnit::Mod { .. } => "mod",
            WorkUnit::Del { .. } => "del",
            WorkUnit::CollectionChange { .. } => "collection-change",
            WorkUnit::FakeBidirectionalRelation { .. } => "bidirectional-fixup",
        }
    }

    /// Net revision type this unit would stamp on its audit row.
    pub fn kind(&self) -> ChangeKind {
        match self {
            WorkUnit::Add { .. } => ChangeKind::Add,
            WorkUnit::Mod { .. } => ChangeKind::Mod,
            WorkUnit::Del { .. } => ChangeKind::Del,
            WorkUnit::CollectionChange { .. } => ChangeKind::Mod,
            WorkUnit::FakeBidirectionalRelation { nested, .. } => nested.kind(),
        }
    }

    /// Returns `true` if persisting this unit would record an actual change.
    ///
    /// An `Add`, `Del`, or `CollectionChange` always carries work (existence
    /// or non-existence is itself the change); a `Mod` only when the diff
    /// found changed properties.
    pub fn contains_work(&self) -> bool {
        match self {
            WorkUnit::Mod { has_changes, .. } => *has_changes,
            WorkUnit::FakeBidirectionalRelation { nested, .. } => nested.contains_work(),
            _ => true,
        }
    }

    /// Materializes the audit data for this unit, including the
    /// revision-type entry under `revtype_property`.
    pub fn generate_data(&self, revtype_property: &str) -> DataMap {
        let mut generated = match self {
            WorkUnit::Add { data, .. } => data.clone(),
            WorkUnit::Mod { data, .. } => data.clone(),
            WorkUnit::Del { data, .. } => data.clone(),
            WorkUnit::CollectionChange { data, .. } => data.clone(),
            WorkUnit::FakeBidirectionalRelation {
                nested,
                relation_data,
            } => {
                let mut generated = nested.generate_data(revtype_property);
                for (role, value) in relation_data {
                    generated.insert(role.clone(), value.clone());
                }
                return generated;
            }
        };
        generated.insert(
            revtype_property.to_string(),
            Value::String(self.kind().as_str().to_string()),
        );
        generated
    }

    /// Folds `incoming` into `self`, producing the net unit for the entity.
    ///
    /// Implements the full 5x5 merge table in one exhaustive match so the
    /// algebra is auditable in one place. `Ok(None)` means the two changes
    /// cancel: the entity has no net change and must not occupy a buffer
    /// slot or persist a row.
    ///
    /// # Arguments
    /// * `incoming` - The later unit observed for the same entity key
    /// * `mapper` - Diff capability, needed where the merge recomputes a diff
    ///
    /// # Returns
    /// `Result<Option<WorkUnit>, AuditError>` containing the merged unit, or
    /// `None` when the changes cancel.
    pub fn merge(
        self,
        incoming: WorkUnit,
        mapper: &dyn PropertyMapper,
    ) -> Result<Option<WorkUnit>, AuditError> {
        use WorkUnit::*;

        match (self, incoming) {
            // existing Add: the row never existed before this transaction,
            // so later events collapse back into an Add (or cancel it).
            (Add { .. }, incoming @ Add { .. }) => Ok(Some(incoming)),
            (Add { .. }, Mod { current_state, .. }) => {
                WorkUnit::add(current_state, mapper).map(Some)
            }
            (Add { .. }, Del { .. }) => Ok(None),
            (
                Add {
                    new_state,
                    mut data,
                },
                CollectionChange {
                    data: collection_data,
                    ..
                },
            ) => {
                data.extend(collection_data);
                Ok(Some(Add { new_state, data }))
            }
            (
                existing @ Add { .. },
                FakeBidirectionalRelation {
                    nested,
                    relation_data,
                },
            ) => Self::merge_into_fixup(existing, *nested, relation_data, mapper),

            // existing Mod: original_state stays pinned to the start of the
            // transaction; only the current side of the diff advances.
            (existing @ Mod { .. }, Add { .. }) => Ok(Some(existing)),
            (
                Mod { original_state, .. },
                Mod { current_state, .. },
            ) => WorkUnit::modify(original_state, current_state, mapper).map(Some),
            (Mod { .. }, incoming @ Del { .. }) => Ok(Some(incoming)),
            (
                Mod {
                    original_state,
                    current_state,
                    mut data,
                    has_changes,
                },
                CollectionChange {
                    data: collection_data,
                    ..
                },
            ) => {
                data.extend(collection_data);
                Ok(Some(Mod {
                    original_state,
                    current_state,
                    data,
                    has_changes,
                }))
            }
            (
                existing @ Mod { .. },
                FakeBidirectionalRelation {
                    nested,
                    relation_data,
                },
            ) => Self::merge_into_fixup(existing, *nested, relation_data, mapper),

            // existing Del: a delete dominates everything except a re-insert.
            (Del { prior_state, .. }, Add { new_state, .. }) => {
                if prior_state == new_state {
                    // Deleted and re-inserted with identical data: no net change.
                    Ok(None)
                } else {
                    WorkUnit::modify(prior_state, new_state, mapper).map(Some)
                }
            }
            // Update of an already-deleted row is an unexpected ordering;
            // the defensive outcome is "no net change".
            (Del { .. }, Mod { .. }) => Ok(None),
            (existing @ Del { .. }, Del { .. }) => Ok(Some(existing)),
            (existing @ Del { .. }, CollectionChange { .. }) => Ok(Some(existing)),
            (existing @ Del { .. }, FakeBidirectionalRelation { .. }) => Ok(Some(existing)),

            // existing CollectionChange: a real row-level event supersedes
            // pure collection churn; the collection data rides along.
            (
                CollectionChange {
                    data: collection_data,
                    ..
                },
                Add {
                    new_state,
                    mut data,
                },
            ) => {
                data.extend(collection_data);
                Ok(Some(Add { new_state, data }))
            }
            (
                CollectionChange {
                    data: collection_data,
                    ..
                },
                Mod {
                    original_state,
                    current_state,
                    mut data,
                    has_changes,
                },
            ) => {
                data.extend(collection_data);
                Ok(Some(Mod {
                    original_state,
                    current_state,
                    data,
                    has_changes,
                }))
            }
            (CollectionChange { .. }, incoming @ Del { .. }) => Ok(Some(incoming)),
            (
                CollectionChange { role, mut data },
                CollectionChange {
                    data: incoming_data,
                    ..
                },
            ) => {
                data.extend(incoming_data);
                Ok(Some(CollectionChange { role, data }))
            }
            (
                existing @ CollectionChange { .. },
                FakeBidirectionalRelation {
                    nested,
                    relation_data,
                },
            ) => Self::merge_into_fixup(existing, *nested, relation_data, mapper),

            // existing fix-up: two fix-ups merge their nested units and
            // combine their relation data (incoming wins per role); any
            // other incoming unit merges with the nested unit and is
            // re-wrapped so the relation data survives.
            (
                FakeBidirectionalRelation {
                    nested,
                    mut relation_data,
                },
                FakeBidirectionalRelation {
                    nested: incoming_nested,
                    relation_data: incoming_relation_data,
                },
            ) => {
                relation_data.extend(incoming_relation_data);
                let merged = nested.merge(*incoming_nested, mapper)?;
                Ok(merged.map(|unit| FakeBidirectionalRelation {
                    nested: Box::new(unit),
                    relation_data,
                }))
            }
            (
                FakeBidirectionalRelation {
                    nested,
                    relation_data,
                },
                incoming,
            ) => {
                let merged = nested.merge(incoming, mapper)?;
                Ok(merged.map(|unit| FakeBidirectionalRelation {
                    nested: Box::new(unit),
                    relation_data,
                }))
            }
        }
    }

    /// Merges `existing` with the fix-up's nested unit, then re-wraps the
    /// result so the relation data is preserved. A cancelled nested merge
    /// cancels the fix-up as well.
    fn merge_into_fixup(
        existing: WorkUnit,
        nested: WorkUnit,
        relation_data: DataMap,
        mapper: &dyn PropertyMapper,
    ) -> Result<Option<WorkUnit>, AuditError> {
        let merged = existing.merge(nested, mapper)?;
        Ok(merged.map(|unit| WorkUnit::FakeBidirectionalRelation {
            nested: Box::new(unit),
            relation_data,
        }))
    }
}
