//! Transaction Integration Tests
//!
//! End-to-end tests of the mutation log against the in-memory heap:
//! recording, rollback, constraints, interning, relocation by a moving
//! collector, configuration and logging.

#[path = "../common/mod.rs"]
mod common;

mod constraints;
mod interning;
mod properties;
mod relocation;
