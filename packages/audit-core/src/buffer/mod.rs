//! Per-transaction change buffer and the perform/undo protocol.

mod change_buffer;
mod slot;

pub use change_buffer::ChangeBuffer;
pub use slot::PerformedRow;
