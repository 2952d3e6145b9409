//! I/O helpers: configuration, persistence and filesystem executors.

pub mod config;
pub mod executors;
pub mod plan_store;
