//! Property mapping between snapshots and generated audit data.

use crate::entity::{DataMap, PropertySnapshot};
use crate::error::AuditError;

/// Diff and serialization capability required from the mapping engine.
///
/// Implementations decide which named properties changed between two
/// snapshots and how property values are written into a [`DataMap`].
pub trait PropertyMapper {
    /// Serializes every property of `state` into `data`.
    ///
    /// # Arguments
    /// * `state` - Snapshot to serialize
    /// * `data` - Target map, entries are overwritten per property name
    ///
    /// # Returns
    /// `Result<(), AuditError>` indicating success or failure.
    fn map_full(&self, state: &PropertySnapshot, data: &mut DataMap) -> Result<(), AuditError>;

    /// Serializes the properties that differ between `old` and `new` into `data`.
    ///
    /// # Arguments
    /// * `old` - Snapshot at the start of the diff window
    /// * `new` - Snapshot at the end of the diff window
    /// * `data` - Target map receiving the changed values
    ///
    /// # Returns
    /// `Result<bool, AuditError>` - `true` if any property differs.
    fn map_changed(
        &self,
        old: &PropertySnapshot,
        new: &PropertySnapshot,
        data: &mut DataMap,
    ) -> Result<bool, AuditError>;
}

/// Positional property mapper over a fixed list of property names.
///
/// Snapshot values are matched to names by index. This is the default mapper
/// for entities without custom per-property handling.
#[derive(Debug, Clone)]
pub struct NamedPropertyMapper {
    /// Property names in snapshot order
    properties: Vec<String>,
}

impl NamedPropertyMapper {
    /// Creates a mapper for the given property names, in snapshot order.
    pub fn new(properties: Vec<String>) -> Self {
        Self { properties }
    }

    /// Returns the mapped property names.
    pub fn properties(&self) -> &[String] {
        &self.properties
    }

    fn check_shape(&self, snapshot: &PropertySnapshot) -> Result<(), AuditError> {
        if snapshot.len() != self.properties.len() {
            return Err(AuditError::SnapshotMismatch {
                expected: self.properties.len(),
                got: snapshot.len(),
            });
        }
        Ok(())
    }
}

impl PropertyMapper for NamedPropertyMapper {
    fn map_full(&self, state: &PropertySnapshot, data: &mut DataMap) -> Result<(), AuditError> {
        self.check_shape(state)?;
        for (name, value) in self.properties.iter().zip(state.values()) {
            data.insert(name.clone(), value.clone());
        }
        Ok(())
    }

    fn map_changed(
        &self,
        old: &PropertySnapshot,
        new: &PropertySnapshot,
        data: &mut DataMap,
    ) -> Result<bool, AuditError> {
        self.check_shape(old)?;
        self.check_shape(new)?;

        let mut has_changes = false;
        for (index, name) in self.properties.iter().enumerate() {
            let old_value = &old.values()[index];
            let new_value = &new.values()[index];
            if old_value != new_value {
                data.insert(name.clone(), new_value.clone());
                has_changes = true;
            }
        }
        Ok(has_changes)
    }
}
