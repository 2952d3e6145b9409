//! Ready-set computation over the live plan.
//!
//! Every query reads the plan's task arena directly. Callers must not cache a
//! flattened task list across scheduling ticks: the review policy can insert
//! tasks between ticks.

use crate::plan::{Plan, Task, TaskId, TaskStatus};

/// True if every `depends_on` id resolves to a `DONE` task.
///
/// An id that resolves to nothing is treated as not yet satisfied.
pub fn dependencies_satisfied(plan: &Plan, task: &Task) -> bool {
    task.depends_on.iter().all(|dep| {
        plan.task(dep)
            .is_some_and(|found| found.status == TaskStatus::Done)
    })
}

pub fn is_ready(plan: &Plan, task: &Task) -> bool {
    task.status == TaskStatus::Pending && dependencies_satisfied(plan, task)
}

/// Ids of ready tasks, in presentation order.
pub fn ready_set(plan: &Plan) -> Vec<TaskId> {
    plan.tasks()
        .filter(|task| is_ready(plan, task))
        .map(|task| task.id.clone())
        .collect()
}

/// Ids of all `PENDING` tasks, in presentation order.
pub fn pending_ids(plan: &Plan) -> Vec<TaskId> {
    plan.tasks()
        .filter(|task| task.status == TaskStatus::Pending)
        .map(|task| task.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{plan_with_phases, task, task_with_status};

    #[test]
    fn ready_requires_all_dependencies_done() {
        let plan = plan_with_phases(vec![(
            "p",
            vec![
                task_with_status("a", &[], TaskStatus::Done),
                task("b", &[]),
                task("c", &["a"]),
                task("d", &["a", "b"]),
            ],
        )]);

        assert_eq!(ready_set(&plan), vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn dangling_dependency_never_ready() {
        let plan = plan_with_phases(vec![("p", vec![task("a", &["ghost"])])]);

        assert!(ready_set(&plan).is_empty());
        assert_eq!(pending_ids(&plan), vec!["a".to_string()]);
    }

    #[test]
    fn only_pending_tasks_are_ready() {
        let plan = plan_with_phases(vec![(
            "p",
            vec![
                task_with_status("running", &[], TaskStatus::Running),
                task_with_status("failed", &[], TaskStatus::Failed),
                task_with_status("done", &[], TaskStatus::Done),
            ],
        )]);

        assert!(ready_set(&plan).is_empty());
    }

    #[test]
    fn failed_dependency_blocks_dependent() {
        let plan = plan_with_phases(vec![(
            "p",
            vec![
                task_with_status("a", &[], TaskStatus::Failed),
                task("b", &["a"]),
            ],
        )]);

        assert!(ready_set(&plan).is_empty());
    }

    #[test]
    fn inserted_task_is_visible_to_next_query() {
        let mut plan = plan_with_phases(vec![
            ("one", vec![task_with_status("a", &[], TaskStatus::Done)]),
            ("two", vec![task("b", &["a"])]),
        ]);
        plan.insert_task_before("b", task("helper", &["a"]))
            .expect("insert");

        assert_eq!(
            ready_set(&plan),
            vec!["helper".to_string(), "b".to_string()]
        );
    }
}
