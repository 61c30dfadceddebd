//! Transactional audit-trail change engine.
//!
//! Reduces the row-level events observed during one transaction to at most
//! one net audit row per entity, all rows sharing one lazily-created
//! revision marker, with physically-written rows kept consistent with the
//! logical net effect across any number of flushes.

pub mod buffer;
pub mod config;
pub mod entity;
pub mod error;
pub mod mapper;
pub mod persister;
pub mod revision;
pub mod work;

pub use buffer::ChangeBuffer;
