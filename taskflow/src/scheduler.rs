//! Dependency-driven execution loop.
//!
//! Each tick recomputes the ready set from the live plan, then runs every
//! ready task to completion (all of its tries) one at a time. A failed try is
//! handed to the [`ReviewPolicy`], whose edits are applied before the next try.
//! The run ends when no task is `PENDING`, or fails with [`DeadlockError`]
//! when pending tasks remain but none is ready.

use std::fmt;

use anyhow::{Result, anyhow};
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::core::budget::RetryBudget;
use crate::core::graph::{pending_ids, ready_set};
use crate::core::ids::{IdGenerator, RandomIds};
use crate::core::review::ReviewPolicy;
use crate::core::types::{FailureKind, TaskOutcome};
use crate::plan::{Plan, RunLogEntry, Task, TaskId, TaskStatus};
use crate::registry::{Executor, ExecutorRegistry};

/// Executor name recorded on review-policy log entries.
pub const REVIEW_EXECUTOR: &str = "review";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Additional tries after the first.
    pub max_retries: u32,
    /// Executor key for tasks without a `suggested_agent`.
    pub default_executor: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            default_executor: "writeFile".to_string(),
        }
    }
}

/// Pending tasks remain but none can become ready.
///
/// Raised for dependency cycles, dependencies on missing ids, and dependents
/// of tasks that failed terminally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadlockError {
    pub pending: Vec<TaskId>,
}

impl fmt::Display for DeadlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no runnable tasks; {} pending task(s) blocked: {}",
            self.pending.len(),
            self.pending.join(", ")
        )
    }
}

impl std::error::Error for DeadlockError {}

/// Counts taken from the plan when a run finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub done: usize,
    pub failed: usize,
    pub pending: usize,
    pub entries_logged: usize,
}

impl RunSummary {
    pub fn collect(plan: &Plan, entries_logged: usize) -> Self {
        Self {
            done: plan.count_with_status(TaskStatus::Done),
            failed: plan.count_with_status(TaskStatus::Failed),
            pending: plan.count_with_status(TaskStatus::Pending),
            entries_logged,
        }
    }
}

/// Forwards entries to the caller's sink and counts them.
struct RunLog<'a> {
    sink: &'a mut dyn FnMut(&RunLogEntry),
    count: usize,
}

impl RunLog<'_> {
    fn push(&mut self, task_id: &str, executor: &str, status: TaskStatus, note: Option<String>) {
        let entry = RunLogEntry {
            ts: Utc::now(),
            task_id: task_id.to_string(),
            executor: executor.to_string(),
            status,
            note,
        };
        (self.sink)(&entry);
        self.count += 1;
    }
}

pub struct Scheduler {
    registry: ExecutorRegistry,
    config: SchedulerConfig,
    review: ReviewPolicy,
    ids: Box<dyn IdGenerator>,
}

impl Scheduler {
    pub fn new(registry: ExecutorRegistry, config: SchedulerConfig, review: ReviewPolicy) -> Self {
        Self {
            registry,
            config,
            review,
            ids: Box::new(RandomIds),
        }
    }

    /// Replace the id generator used for review-inserted tasks.
    pub fn with_ids<I: IdGenerator + 'static>(mut self, ids: I) -> Self {
        self.ids = Box::new(ids);
        self
    }

    /// Run `plan` to completion and return the full run log.
    pub fn run(&mut self, plan: &mut Plan) -> Result<Vec<RunLogEntry>> {
        let mut entries = Vec::new();
        self.run_with(plan, |entry| entries.push(entry.clone()))?;
        Ok(entries)
    }

    /// Run `plan` to completion, handing each log entry to `on_entry` as it is
    /// produced. Entries emitted before a deadlock have already been delivered
    /// when the error is returned.
    #[instrument(skip_all, fields(plan_id = %plan.id, max_retries = self.config.max_retries))]
    pub fn run_with<F: FnMut(&RunLogEntry)>(
        &mut self,
        plan: &mut Plan,
        mut on_entry: F,
    ) -> Result<RunSummary> {
        let mut log = RunLog {
            sink: &mut on_entry,
            count: 0,
        };

        let mut tick = 0u32;
        while plan.has_pending() {
            tick += 1;
            let ready = ready_set(plan);
            if ready.is_empty() {
                let pending = pending_ids(plan);
                warn!(tick, pending = pending.len(), "no runnable tasks");
                return Err(DeadlockError { pending }.into());
            }
            debug!(tick, ready = ready.len(), "scheduling tick");

            for task_id in ready {
                match self.execute_task(plan, &task_id, &mut log)? {
                    TaskOutcome::Done { tries } => {
                        info!(task_id = %task_id, tries, "task done");
                    }
                    TaskOutcome::Failed { tries, last_error } => {
                        warn!(task_id = %task_id, tries, error = %last_error, "task failed");
                    }
                }
            }
        }

        let summary = RunSummary::collect(plan, log.count);
        info!(
            done = summary.done,
            failed = summary.failed,
            entries = summary.entries_logged,
            "run finished"
        );
        Ok(summary)
    }

    /// Bounded-retry protocol for one task.
    ///
    /// The executor is resolved once up front; a resolution failure fails
    /// every try with the same message.
    fn execute_task(
        &mut self,
        plan: &mut Plan,
        task_id: &str,
        log: &mut RunLog<'_>,
    ) -> Result<TaskOutcome> {
        let key = lookup(plan, task_id)?
            .suggested_agent
            .clone()
            .unwrap_or_else(|| self.config.default_executor.clone());
        let resolved: std::result::Result<&dyn Executor, String> = self
            .registry
            .resolve(&key)
            .map_err(|err| format!("{err:#}"));
        let mut budget = RetryBudget::new(self.config.max_retries);

        loop {
            let try_index = budget.start_try();
            let task = lookup_mut(plan, task_id)?;
            task.transition(TaskStatus::Running)?;
            // A saturated counter fails the try rather than wrapping.
            let counted = match task.attempts.checked_add(1) {
                Some(attempts) => {
                    task.attempts = attempts;
                    true
                }
                None => false,
            };
            debug!(task_id, try_index, executor = %key, "dispatching task");

            let result = match &resolved {
                _ if !counted => Err(format!("attempt counter of task '{task_id}' is saturated")),
                Ok(executor) => executor
                    .execute(lookup(plan, task_id)?)
                    .map_err(|err| format!("{err:#}")),
                Err(message) => Err(message.clone()),
            };

            match result {
                Ok(output) => {
                    let task = lookup_mut(plan, task_id)?;
                    task.merge_output(output);
                    task.transition(TaskStatus::Done)?;
                    log.push(task_id, &key, TaskStatus::Done, Some("ok".to_string()));
                    return Ok(TaskOutcome::Done { tries: try_index });
                }
                Err(message) => {
                    let task = lookup_mut(plan, task_id)?;
                    task.transition(TaskStatus::Failed)?;
                    task.error = Some(message.clone());
                    log.push(task_id, &key, TaskStatus::Failed, Some(message.clone()));

                    if let Some(decision) = self.review.refine(plan, task_id, self.ids.as_mut()) {
                        let edits = decision.edits.len();
                        for edit in decision.edits {
                            plan.apply_edit(edit)?;
                        }
                        debug!(task_id, edits, note = %decision.note, "review decision");
                        log.push(
                            task_id,
                            REVIEW_EXECUTOR,
                            TaskStatus::Pending,
                            Some(decision.note),
                        );
                    }

                    match budget.classify_failure() {
                        FailureKind::Transient { remaining } => {
                            debug!(task_id, try_index, remaining, error = %message, "try failed");
                        }
                        FailureKind::Terminal => {
                            return Ok(TaskOutcome::Failed {
                                tries: try_index,
                                last_error: message,
                            });
                        }
                    }
                }
            }
        }
    }
}

fn lookup<'a>(plan: &'a Plan, task_id: &str) -> Result<&'a Task> {
    plan.task(task_id)
        .ok_or_else(|| anyhow!("task '{}' missing from plan", task_id))
}

fn lookup_mut<'a>(plan: &'a mut Plan, task_id: &str) -> Result<&'a mut Task> {
    plan.task_mut(task_id)
        .ok_or_else(|| anyhow!("task '{}' missing from plan", task_id))
}
