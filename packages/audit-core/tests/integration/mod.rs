//! Integration tests for the audit change engine.
//!
//! Drives whole transactions end to end against an in-memory audit store.

mod audit_flow_tests;
mod support;
