//! Change units and the merge algebra that folds them per entity.

mod unit;

pub use unit::WorkUnit;
