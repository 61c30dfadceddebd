use crate::entity::{ChangeKind, DataMap};
use crate::work::WorkUnit;

/// Audit row exactly as it was physically written, captured at perform time.
///
/// Kept so a later undo retracts what is actually on disk, not the current,
/// possibly-merged, in-memory unit.
#[derive(Debug, Clone)]
pub struct PerformedRow {
    /// Generated data of the written row
    pub data: DataMap,
    /// Revision type the row was written with
    pub kind: ChangeKind,
}

/// One buffer entry: the net unit for an entity key plus perform bookkeeping.
#[derive(Debug)]
pub(super) struct Slot {
    /// Net change unit for the entity key
    pub unit: WorkUnit,
    /// Row written by an earlier flush, if any
    pub performed: Option<PerformedRow>,
    /// Whether the unit changed after the row was written
    pub dirty: bool,
}

impl Slot {
    /// Creates an unperformed slot for a freshly inserted unit.
    pub fn new(unit: WorkUnit) -> Self {
        Self {
            unit,
            performed: None,
            dirty: false,
        }
    }
}
