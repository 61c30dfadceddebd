//! Read-side query construction over the revision schema contract.
//!
//! Builds the parameterized lookups the audit read API needs: revision to
//! timestamp, timestamp to revision, and revision-set fetch. Pure string
//! construction; execution belongs to the host's query layer.

pub mod error;
pub mod query;

pub use query::{RevisionQuery, RevisionQueryBuilder};
