//! Revision marker lifecycle and listener hook.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::entity::{ChangeKind, EntityId};

/// Revision number assigned by the persistence layer.
pub type RevisionId = u64;

/// Shared handle to the transaction's revision marker.
///
/// The marker is owned by one transaction thread and shared by reference
/// between the buffer and every audit row it generates, never across threads.
pub type RevisionHandle = Rc<RefCell<RevisionMarker>>;

/// The single logical "version" record shared by every audit row produced
/// within one transaction.
///
/// Created in memory on first demand; the identifier stays unassigned until
/// the first physical write that needs it, so transactions with no net
/// changes never allocate a revision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionMarker {
    /// Revision number, assigned at persist time
    pub id: Option<RevisionId>,
    /// Creation timestamp in milliseconds since the Unix epoch
    pub timestamp_ms: u64,
    /// Names of entities modified in this revision, when tracking is enabled
    pub modified_entity_names: Option<BTreeSet<String>>,
}

impl RevisionMarker {
    /// Creates an unpersisted marker timestamped now.
    ///
    /// # Arguments
    /// * `track_entities_changed` - Whether to carry a modified-entity-name set
    pub fn new(track_entities_changed: bool) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            id: None,
            timestamp_ms,
            modified_entity_names: track_entities_changed.then(BTreeSet::new),
        }
    }

    /// Returns `true` once the persistence layer has assigned a revision number.
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Appends an entity name to the modified-entity set, if tracking is enabled.
    pub fn record_modified_entity(&mut self, entity_name: &str) {
        if let Some(names) = self.modified_entity_names.as_mut() {
            names.insert(entity_name.to_string());
        }
    }
}

/// Hook invoked around revision creation and per-entity changes.
///
/// `new_revision` runs exactly once per marker, before it is persisted, so
/// implementations may populate custom fields. `entity_changed` runs once per
/// performed audit row.
pub trait RevisionListener {
    /// Called once when the transaction's marker is created.
    fn new_revision(&mut self, marker: &mut RevisionMarker) {
        let _ = marker;
    }

    /// Called after an audit row for `entity_name`/`id` is performed.
    fn entity_changed(
        &mut self,
        entity_name: &str,
        id: &EntityId,
        kind: ChangeKind,
        marker: &mut RevisionMarker,
    ) {
        let _ = (entity_name, id, kind, marker);
    }
}

/// Listener that ignores every notification.
#[derive(Debug, Default)]
pub struct NoopRevisionListener;

impl RevisionListener for NoopRevisionListener {}
