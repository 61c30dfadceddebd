//! Audit engine configuration.

use serde::{Deserialize, Serialize};

/// Audit engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Store the full prior state on delete rows instead of identity only
    pub store_data_at_delete: bool,
    /// Track the set of modified entity names on the revision marker
    pub track_entities_changed: bool,
    /// Property name carrying the net revision type on every generated row
    pub revtype_property_name: String,
    /// Mapped name of the revision-info entity
    pub revision_entity_name: String,
    /// Attribute of the revision-info entity holding the revision number
    pub revision_id_attribute: String,
    /// Attribute of the revision-info entity holding the revision timestamp
    pub revision_timestamp_attribute: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            store_data_at_delete: false,
            track_entities_changed: false,
            revtype_property_name: "revtype".to_string(),
            revision_entity_name: "revision_info".to_string(),
            revision_id_attribute: "id".to_string(),
            revision_timestamp_attribute: "timestamp".to_string(),
        }
    }
}
