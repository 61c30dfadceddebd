//! Entity identity and snapshot types used to index and describe changes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Generated audit data for one entity, keyed by property name.
pub type DataMap = BTreeMap<String, serde_json::Value>;

/// Identifier of one entity instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityId {
    /// Numeric primary key
    Int(i64),
    /// Textual primary key (natural key, UUID, ...)
    Text(String),
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Int(id) => write!(f, "{}", id),
            EntityId::Text(id) => write!(f, "{}", id),
        }
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        EntityId::Int(id)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        EntityId::Text(id.to_string())
    }
}

/// Identity of one entity instance: entity name plus identifier.
///
/// Equality and hashing are by value; this is the sole map key inside a
/// [`ChangeBuffer`](crate::buffer::ChangeBuffer).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    /// Mapped name of the entity type
    pub entity_name: String,
    /// Identifier of the instance
    pub id: EntityId,
}

impl EntityKey {
    /// Creates a new entity key.
    pub fn new(entity_name: impl Into<String>, id: impl Into<EntityId>) -> Self {
        Self {
            entity_name: entity_name.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity_name, self.id)
    }
}

/// Ordered property values of one entity instance at one point in time.
///
/// Produced by the mapping engine; opaque to the merge algebra except for
/// array-wise structural equality (the delete/re-insert cancellation test).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySnapshot(pub Vec<serde_json::Value>);

impl PropertySnapshot {
    /// Creates a snapshot from raw property values.
    pub fn new(values: Vec<serde_json::Value>) -> Self {
        Self(values)
    }

    /// Returns the number of property values in the snapshot.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the snapshot carries no values.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the property values in mapping order.
    pub fn values(&self) -> &[serde_json::Value] {
        &self.0
    }
}

impl From<Vec<serde_json::Value>> for PropertySnapshot {
    fn from(values: Vec<serde_json::Value>) -> Self {
        Self(values)
    }
}

/// Net revision type of an audit row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Entity came into existence in this transaction
    Add,
    /// Entity existed before and still exists
    Mod,
    /// Entity ceased to exist
    Del,
}

impl ChangeKind {
    /// Stable textual representation stored in generated audit data.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Add => "add",
            ChangeKind::Mod => "mod",
            ChangeKind::Del => "del",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
