//! Run-level tests for the scheduler: retries, review-driven remediation, and
//! end-to-end runs of built plans.

use serde_json::json;
use taskflow::core::builder::PlanBuilder;
use taskflow::core::graph::dependencies_satisfied;
use taskflow::core::ids::SequentialIds;
use taskflow::core::review::{REMEDIATION_TITLE, ReviewPolicy};
use taskflow::io::config::AppConfig;
use taskflow::io::executors::{FORMAT_CODE, SEARCH_REPO, WRITE_FILE};
use taskflow::plan::{Plan, TaskStatus};
use taskflow::registry::ExecutorRegistry;
use taskflow::scheduler::{REVIEW_EXECUTOR, Scheduler, SchedulerConfig};
use taskflow::test_support::{
    AlwaysFails, AlwaysSucceeds, ObservedCall, ScriptedExecutor, ScriptedStep, payload,
    plan_with_phases, task,
};

const WORK: &str = "work";
const SEARCH: &str = "search";

fn scheduler(registry: ExecutorRegistry, max_retries: u32) -> Scheduler {
    Scheduler::new(
        registry,
        SchedulerConfig {
            max_retries,
            default_executor: WORK.to_string(),
        },
        ReviewPolicy::new(SEARCH),
    )
    .with_ids(SequentialIds::new("rem"))
}

fn remediation_ids(plan: &Plan) -> Vec<String> {
    plan.tasks()
        .filter(|t| t.title == REMEDIATION_TITLE)
        .map(|t| t.id.clone())
        .collect()
}

/// One always-failing task with `max_retries = 1`:
///
/// 1. Try 1 fails (attempts=1); review advises a retry.
/// 2. Try 2 fails (attempts=2); review inserts a remediation task before it and
///    rewires the task to depend on it. Budget exhausted, task stays FAILED.
/// 3. Next tick: the remediation task is ready and runs to DONE.
#[test]
fn failing_task_gets_one_remediation_task_and_stops_after_budget() {
    let mut registry = ExecutorRegistry::new();
    registry
        .register(WORK, AlwaysFails::new("boom"))
        .expect("register work");
    registry
        .register(SEARCH, AlwaysSucceeds::new(payload(json!({ "hits": [] }))))
        .expect("register search");
    let mut plan = plan_with_phases(vec![("impl", vec![task("t", &[])])]);

    let entries = scheduler(registry, 1).run(&mut plan).expect("run");

    let t = plan.task("t").expect("task t");
    assert_eq!(t.status, TaskStatus::Failed);
    assert_eq!(t.attempts, 2);
    assert_eq!(t.error.as_deref(), Some("boom"));

    let failed_entries = entries
        .iter()
        .filter(|e| e.task_id == "t" && e.status == TaskStatus::Failed)
        .count();
    assert_eq!(failed_entries, 2);

    let remediation = remediation_ids(&plan);
    assert_eq!(remediation.len(), 1);
    assert_eq!(t.depends_on, remediation);

    let helper = plan.task(&remediation[0]).expect("helper");
    assert_eq!(helper.status, TaskStatus::Done);
    assert_eq!(helper.suggested_agent.as_deref(), Some(SEARCH));
    assert_eq!(helper.description, "Collect missing info for 't title'.");
    assert!(dependencies_satisfied(&plan, t));

    let phase_order: Vec<&str> = plan.phases()[0]
        .task_ids()
        .iter()
        .map(String::as_str)
        .collect();
    assert_eq!(phase_order, vec![remediation[0].as_str(), "t"]);

    let review_notes: Vec<&str> = entries
        .iter()
        .filter(|e| e.executor == REVIEW_EXECUTOR)
        .filter_map(|e| e.note.as_deref())
        .collect();
    assert_eq!(
        review_notes,
        vec![
            "Output empty for 't title', will retry.",
            "Inserted helper task before 't title'.",
        ]
    );
}

#[test]
fn remediation_inherits_dependencies_of_failing_task() {
    let mut registry = ExecutorRegistry::new();
    registry
        .register(WORK, AlwaysSucceeds::new(payload(json!({ "ok": true }))))
        .expect("register work");
    registry
        .register("flaky", AlwaysFails::new("nope"))
        .expect("register flaky");
    registry
        .register(SEARCH, AlwaysSucceeds::new(payload(json!({ "hits": [] }))))
        .expect("register search");
    let mut failing = task("c", &["a", "b"]);
    failing.suggested_agent = Some("flaky".to_string());
    let mut plan = plan_with_phases(vec![
        ("discover", vec![task("a", &[]), task("b", &[])]),
        ("build", vec![failing]),
    ]);

    scheduler(registry, 1).run(&mut plan).expect("run");

    let remediation = remediation_ids(&plan);
    assert_eq!(remediation.len(), 1);
    let helper = plan.task(&remediation[0]).expect("helper");
    assert_eq!(helper.depends_on, vec!["a".to_string(), "b".to_string()]);
    assert_eq!(
        plan.phase_of(&remediation[0]).map(|p| p.id.as_str()),
        Some("build")
    );
    assert_eq!(
        plan.task("c").map(|t| t.depends_on.clone()),
        Some(remediation.clone())
    );
}

#[test]
fn attempts_never_exceed_retry_budget() {
    for max_retries in 0..=3u32 {
        let mut registry = ExecutorRegistry::new();
        registry
            .register(WORK, AlwaysFails::new("boom"))
            .expect("register work");
        registry
            .register(SEARCH, AlwaysSucceeds::new(payload(json!({}))))
            .expect("register search");
        let mut plan = plan_with_phases(vec![("p", vec![task("t", &[])])]);

        let entries = scheduler(registry, max_retries).run(&mut plan).expect("run");

        let t = plan.task("t").expect("task t");
        assert_eq!(t.attempts, max_retries + 1, "max_retries={max_retries}");
        assert_eq!(
            entries
                .iter()
                .filter(|e| e.task_id == "t" && e.status == TaskStatus::Failed)
                .count(),
            (max_retries + 1) as usize
        );
        // Every failed try from the second onwards inserts a helper.
        assert_eq!(remediation_ids(&plan).len(), max_retries as usize);
        assert!(!plan.has_pending());
    }
}

#[test]
fn executor_sees_running_task_with_incrementing_attempts() {
    let observer = ScriptedExecutor::new(vec![
        ScriptedStep::Fail("first".to_string()),
        ScriptedStep::Fail("second".to_string()),
        ScriptedStep::Succeed(payload(json!({ "done": true }))),
    ]);
    let calls = observer.calls();
    let mut registry = ExecutorRegistry::new();
    registry.register(WORK, observer).expect("register work");
    registry
        .register(SEARCH, AlwaysSucceeds::new(payload(json!({}))))
        .expect("register search");
    let mut plan = plan_with_phases(vec![("p", vec![task("t", &[])])]);

    scheduler(registry, 2).run(&mut plan).expect("run");

    let expected: Vec<ObservedCall> = (1..=3)
        .map(|attempts| ObservedCall {
            task_id: "t".to_string(),
            status: TaskStatus::Running,
            attempts,
        })
        .collect();
    assert_eq!(*calls.borrow(), expected);

    let t = plan.task("t").expect("task t");
    assert_eq!(t.status, TaskStatus::Done);
    assert_eq!(t.output.get("done"), Some(&json!(true)));
    // The error from the last failed try is kept after success.
    assert_eq!(t.error.as_deref(), Some("second"));
}

#[test]
fn built_plan_runs_to_completion_in_dependency_order() {
    let cfg = AppConfig::default();
    let mut registry = ExecutorRegistry::new();
    for key in [FORMAT_CODE, SEARCH_REPO, WRITE_FILE] {
        registry
            .register(key, AlwaysSucceeds::new(payload(json!({ "by": key }))))
            .expect("register");
    }
    let mut plan = PlanBuilder::new(cfg.capability_hints())
        .build("Add dark mode", None, &mut SequentialIds::new("id"))
        .expect("build");
    let review = cfg.review_policy().expect("policy");
    let mut scheduler = Scheduler::new(registry, cfg.scheduler_config(), review);

    let mut finished: Vec<String> = Vec::new();
    let summary = scheduler
        .run_with(&mut plan, |entry| {
            assert_eq!(entry.status, TaskStatus::Done);
            finished.push(entry.task_id.clone());
        })
        .expect("run");

    assert_eq!(summary.done, 6);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.pending, 0);
    assert_eq!(summary.entries_logged, 6);
    for (index, task_id) in finished.iter().enumerate() {
        let task = plan.task(task_id).expect("task");
        for dep in &task.depends_on {
            let dep_index = finished.iter().position(|id| id == dep).expect("dep ran");
            assert!(dep_index < index, "{dep} must finish before {task_id}");
        }
    }

    let search = plan
        .tasks()
        .find(|t| t.title == "Search codebase")
        .expect("search task");
    assert_eq!(search.output.get("by"), Some(&json!(SEARCH_REPO)));
    let format = plan
        .tasks()
        .find(|t| t.title == "Format")
        .expect("format task");
    assert_eq!(format.output.get("by"), Some(&json!(FORMAT_CODE)));
}
