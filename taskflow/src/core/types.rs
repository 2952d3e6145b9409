//! Shared deterministic types for core logic.
//!
//! These types define stable contracts between the scheduler, the review
//! policy and the plan model.

use crate::plan::{Task, TaskId};

/// A graph mutation proposed by the review policy and applied by the
/// scheduler through [`crate::plan::Plan::apply_edit`].
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEdit {
    /// Insert `task` into the anchor's phase, immediately before the anchor.
    InsertBefore { anchor: TaskId, task: Task },
    /// Replace the dependency set of `task_id`.
    RewireDependencies {
        task_id: TaskId,
        depends_on: Vec<TaskId>,
    },
}

/// Result of reviewing a failed try.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewDecision {
    /// Human-readable note for the run log.
    pub note: String,
    /// Edits to apply, in order. Empty for advisory notes.
    pub edits: Vec<GraphEdit>,
}

/// Classification of a failed try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// More tries follow.
    Transient { remaining: u32 },
    /// The retry budget is spent; the task stays `FAILED` for this run.
    Terminal,
}

/// Final result of running one task through the retry protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Done { tries: u32 },
    Failed { tries: u32, last_error: String },
}
