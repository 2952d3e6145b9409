//! Failure-driven review policy.
//!
//! After a failed try the scheduler asks the policy for a decision. At most
//! one rule fires, checked in this order:
//!
//! 1. The task has failed at least [`REMEDIATION_THRESHOLD`] tries: insert a
//!    remediation task before it that inherits its dependencies, and make the
//!    failing task depend on the remediation task only.
//! 2. The task has no output yet: advise a retry, no graph change.
//! 3. Otherwise: nothing.
//!
//! The policy never mutates the plan. It returns [`GraphEdit`]s that the
//! scheduler applies.

use crate::core::ids::{IdGenerator, fresh_id};
use crate::core::types::{GraphEdit, ReviewDecision};
use crate::plan::{Plan, Task, TaskStatus};

pub const REMEDIATION_TITLE: &str = "Gather more context";
pub const REMEDIATION_THRESHOLD: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewPolicy {
    remediation_executor: String,
}

impl ReviewPolicy {
    /// `remediation_executor` is the executor key given to inserted tasks.
    pub fn new(remediation_executor: impl Into<String>) -> Self {
        Self {
            remediation_executor: remediation_executor.into(),
        }
    }

    pub fn remediation_executor(&self) -> &str {
        &self.remediation_executor
    }

    pub fn refine(
        &self,
        plan: &Plan,
        task_id: &str,
        ids: &mut dyn IdGenerator,
    ) -> Option<ReviewDecision> {
        let task = plan.task(task_id)?;

        if task.attempts >= REMEDIATION_THRESHOLD && task.status == TaskStatus::Failed {
            // A task outside every phase has nowhere to receive a helper.
            plan.phase_of(task_id)?;
            let helper_id = fresh_id(ids, |candidate| plan.contains_id(candidate));
            let mut helper = Task::new(
                helper_id.clone(),
                REMEDIATION_TITLE,
                format!("Collect missing info for '{}'.", task.title),
                task.depends_on.clone(),
            );
            helper.suggested_agent = Some(self.remediation_executor.clone());

            return Some(ReviewDecision {
                note: format!("Inserted helper task before '{}'.", task.title),
                edits: vec![
                    GraphEdit::InsertBefore {
                        anchor: task.id.clone(),
                        task: helper,
                    },
                    GraphEdit::RewireDependencies {
                        task_id: task.id.clone(),
                        depends_on: vec![helper_id],
                    },
                ],
            });
        }

        if task.output.is_empty() {
            return Some(ReviewDecision {
                note: format!("Output empty for '{}', will retry.", task.title),
                edits: Vec::new(),
            });
        }

        None
    }
}
