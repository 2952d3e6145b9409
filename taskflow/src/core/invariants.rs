//! Graph invariants checked on loaded or constructed plans.

use std::collections::{HashMap, HashSet};

use crate::plan::{Plan, TaskId};

/// Check structural invariants of the task arena and its phases:
/// - No task id listed in more than one phase entry
/// - Every phase entry names a task in the arena
/// - Every arena task belongs to a phase
/// - No task depends on itself
///
/// Dangling dependencies and cycles between distinct tasks are not errors
/// here. They leave tasks unready and surface as a deadlock when run (see
/// [`dangling_dependencies`] and [`find_cycle`]).
pub fn validate_invariants(plan: &Plan) -> Vec<String> {
    let mut errors = Vec::new();

    let mut listed: HashMap<&str, usize> = HashMap::new();
    for phase in plan.phases() {
        for id in phase.task_ids() {
            *listed.entry(id.as_str()).or_default() += 1;
            if plan.task(id).is_none() {
                errors.push(format!("phase '{}' lists unknown task '{}'", phase.id, id));
            }
        }
    }
    let mut repeated: Vec<&str> = listed
        .iter()
        .filter(|(_, count)| **count > 1)
        .map(|(id, _)| *id)
        .collect();
    repeated.sort_unstable();
    for id in repeated {
        errors.push(format!("task '{}' is listed more than once", id));
    }

    for id in plan.task_ids() {
        if !listed.contains_key(id.as_str()) {
            errors.push(format!("task '{}' belongs to no phase", id));
        }
    }

    for task in plan.tasks() {
        if task.depends_on.iter().any(|dep| dep == &task.id) {
            errors.push(format!("task '{}' depends on itself", task.id));
        }
    }

    errors
}

/// `(task id, missing dependency id)` pairs, in presentation order.
pub fn dangling_dependencies(plan: &Plan) -> Vec<(TaskId, TaskId)> {
    plan.tasks()
        .flat_map(|task| {
            task.depends_on
                .iter()
                .filter(|dep| plan.task(dep).is_none())
                .map(|dep| (task.id.clone(), dep.clone()))
        })
        .collect()
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Visited,
}

/// First dependency cycle between distinct tasks, as a closed path
/// (`a -> c -> b -> a`), searching in presentation order.
pub fn find_cycle(plan: &Plan) -> Option<Vec<TaskId>> {
    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut stack: Vec<&str> = Vec::new();
    for task in plan.tasks() {
        if let Some(cycle) = visit(plan, &task.id, &mut marks, &mut stack) {
            return Some(cycle);
        }
    }
    None
}

fn visit<'a>(
    plan: &'a Plan,
    id: &'a str,
    marks: &mut HashMap<&'a str, Mark>,
    stack: &mut Vec<&'a str>,
) -> Option<Vec<TaskId>> {
    match marks.get(id) {
        Some(Mark::Visited) => return None,
        Some(Mark::Visiting) => {
            let start = stack.iter().position(|entry| *entry == id).unwrap_or(0);
            let mut cycle: Vec<TaskId> = stack[start..].iter().map(|s| s.to_string()).collect();
            cycle.push(id.to_string());
            return Some(cycle);
        }
        None => {}
    }

    let task = plan.task(id)?;
    marks.insert(id, Mark::Visiting);
    stack.push(id);
    let mut seen = HashSet::new();
    for dep in &task.depends_on {
        // Self-dependencies are reported separately.
        if dep == id || !seen.insert(dep.as_str()) {
            continue;
        }
        if let Some(cycle) = visit(plan, dep, marks, stack) {
            return Some(cycle);
        }
    }
    stack.pop();
    marks.insert(id, Mark::Visited);
    None
}
