//! Dependency-graph task execution engine.
//!
//! A plan groups tasks into phases; tasks depend on each other by id. The
//! scheduler repeatedly runs whatever is ready, retries failures within a
//! budget, and lets a review policy insert remediation tasks when a task keeps
//! failing. The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (ready sets, transitions, retry
//!   budget, review policy, plan skeleton). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (config file, plan store, filesystem
//!   executors).
//!
//! [`scheduler`] drives [`plan`] state through executors looked up in the
//! [`registry`].

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod plan;
pub mod registry;
pub mod report;
pub mod scheduler;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
