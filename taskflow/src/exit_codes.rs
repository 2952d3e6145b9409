//! Stable exit codes for taskflow CLI commands.

/// Command succeeded; for `run`, every task reached `DONE`.
pub const OK: i32 = 0;
/// Invalid arguments, config or plan, or any other error.
pub const INVALID: i32 = 1;
/// `taskflow run` finished with at least one task `FAILED`.
pub const TASKS_FAILED: i32 = 2;
/// `taskflow run` stopped because pending tasks could never become ready.
pub const DEADLOCK: i32 = 3;
