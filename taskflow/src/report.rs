//! Plain-text rendering of plans and run results for the CLI.

use std::fmt::Write;

use crate::plan::Plan;
use crate::scheduler::RunSummary;

/// Goal, then each phase with its tasks and executor hints.
pub fn render_plan(plan: &Plan) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Goal: {}", plan.goal);
    if let Some(context) = &plan.context {
        let _ = writeln!(out, "Context: {}", context);
    }
    for phase in plan.phases() {
        let _ = writeln!(out, "\n> {}", phase.title);
        for task_id in phase.task_ids() {
            let Some(task) = plan.task(task_id) else {
                continue;
            };
            match &task.suggested_agent {
                Some(key) => {
                    let _ = writeln!(out, " - {} [{}]", task.title, key);
                }
                None => {
                    let _ = writeln!(out, " - {}", task.title);
                }
            }
        }
    }
    out
}

pub fn render_summary(summary: &RunSummary) -> String {
    format!(
        "done={} failed={} pending={} log_entries={}",
        summary.done, summary.failed, summary.pending, summary.entries_logged
    )
}
