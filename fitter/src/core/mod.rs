//! Deterministic, pure logic shared by the fitting workflow.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod fixes;
pub mod invariants;
pub mod path;
pub mod resolver;
pub mod serializer;
pub mod types;
