//! Query construction error types.

use thiserror::Error;

/// Errors raised while constructing revision queries.
#[derive(Error, Debug, Clone)]
pub enum QueryError {
    /// Schema name is not a plain SQL identifier
    #[error("'{value}' is not a valid identifier for {role}")]
    InvalidIdentifier {
        role: &'static str,
        value: String,
    },
}
