//! Deterministic, pure logic shared by the scheduler.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! plans and return deterministic outputs suitable for tests.

pub mod budget;
pub mod builder;
pub mod graph;
pub mod ids;
pub mod invariants;
pub mod review;
pub mod transitions;
pub mod types;
