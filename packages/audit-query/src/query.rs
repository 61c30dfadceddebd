//! Revision query construction.

use audit_core::config::AuditConfig;

use crate::error::QueryError;

/// A parameterized read query: SQL text plus the named parameters it binds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionQuery {
    /// SQL text with `:name` placeholders
    pub sql: String,
    /// Parameter names, in placeholder order
    pub params: Vec<&'static str>,
}

/// Stateless builder for revision lookups over the revision-info schema.
///
/// Holds only the revision-info entity/id-attribute/timestamp-attribute
/// triple; every build call is pure.
#[derive(Debug, Clone)]
pub struct RevisionQueryBuilder {
    entity_name: String,
    id_attribute: String,
    timestamp_attribute: String,
}

impl RevisionQueryBuilder {
    /// Creates a builder for the given revision-info schema triple.
    ///
    /// # Arguments
    /// * `entity_name` - Table or entity holding revision records
    /// * `id_attribute` - Attribute holding the revision number
    /// * `timestamp_attribute` - Attribute holding the revision timestamp
    ///
    /// # Returns
    /// `Result<RevisionQueryBuilder, QueryError>` - fails when any name is
    /// not a plain identifier.
    pub fn new(
        entity_name: impl Into<String>,
        id_attribute: impl Into<String>,
        timestamp_attribute: impl Into<String>,
    ) -> Result<Self, QueryError> {
        let entity_name = validated(entity_name.into(), "revision entity name")?;
        let id_attribute = validated(id_attribute.into(), "revision id attribute")?;
        let timestamp_attribute =
            validated(timestamp_attribute.into(), "revision timestamp attribute")?;
        Ok(Self {
            entity_name,
            id_attribute,
            timestamp_attribute,
        })
    }

    /// Creates a builder from the engine configuration's schema triple.
    pub fn from_config(config: &AuditConfig) -> Result<Self, QueryError> {
        Self::new(
            config.revision_entity_name.clone(),
            config.revision_id_attribute.clone(),
            config.revision_timestamp_attribute.clone(),
        )
    }

    /// Query for the timestamp of a given revision number.
    ///
    /// Binds `:revision`.
    pub fn revision_date_query(&self) -> RevisionQuery {
        RevisionQuery {
            sql: format!(
                "SELECT r.{ts} FROM {entity} r WHERE r.{id} = :revision",
                ts = self.timestamp_attribute,
                entity = self.entity_name,
                id = self.id_attribute,
            ),
            params: vec!["revision"],
        }
    }

    /// Query for the maximum revision number at or before a timestamp.
    ///
    /// Binds `:date`.
    pub fn revision_for_date_query(&self) -> RevisionQuery {
        RevisionQuery {
            sql: format!(
                "SELECT MAX(r.{id}) FROM {entity} r WHERE r.{ts} <= :date",
                id = self.id_attribute,
                entity = self.entity_name,
                ts = self.timestamp_attribute,
            ),
            params: vec!["date"],
        }
    }

    /// Query for the revision records of a set of revision numbers,
    /// ordered by revision number.
    ///
    /// Binds `:revisions`.
    pub fn revisions_query(&self) -> RevisionQuery {
        RevisionQuery {
            sql: format!(
                "SELECT r.* FROM {entity} r WHERE r.{id} IN (:revisions) ORDER BY r.{id} ASC",
                entity = self.entity_name,
                id = self.id_attribute,
            ),
            params: vec!["revisions"],
        }
    }
}

/// Accepts plain identifiers only, keeping interpolated schema names out of
/// injection territory.
fn validated(value: String, role: &'static str) -> Result<String, QueryError> {
    let mut chars = value.chars();
    let head_ok = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    let tail_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if head_ok && tail_ok {
        Ok(value)
    } else {
        Err(QueryError::InvalidIdentifier { role, value })
    }
}
