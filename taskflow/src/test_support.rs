//! Test-only helpers for constructing plans and scripted executors.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use anyhow::{Result, anyhow};
use chrono::{TimeZone, Utc};
use serde_json::Value;

use crate::plan::{Payload, Plan, Task, TaskStatus};
use crate::registry::Executor;

/// Create a pending task with deterministic title/description.
pub fn task(id: &str, depends_on: &[&str]) -> Task {
    Task::new(
        id,
        format!("{} title", id),
        format!("{} description", id),
        depends_on.iter().map(|dep| dep.to_string()).collect(),
    )
}

/// Create a task with an explicit status.
pub fn task_with_status(id: &str, depends_on: &[&str], status: TaskStatus) -> Task {
    let mut task = task(id, depends_on);
    task.status = status;
    task
}

/// Build a plan from `(phase id, tasks)` pairs. Phase titles mirror their ids.
///
/// Panics on duplicate ids; tests construct plans they control.
pub fn plan_with_phases(phases: Vec<(&str, Vec<Task>)>) -> Plan {
    let created_at = Utc
        .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .expect("fixed timestamp");
    let mut plan = Plan::new("plan", "test goal", None, created_at);
    for (phase_id, tasks) in phases {
        plan.add_phase(phase_id, phase_id).expect("add phase");
        for task in tasks {
            plan.push_task(phase_id, task).expect("push task");
        }
    }
    plan
}

/// Convert a JSON object literal into a [`Payload`]; non-objects become empty.
pub fn payload(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        _ => Payload::new(),
    }
}

/// Executor that always returns the same output.
pub struct AlwaysSucceeds {
    output: Payload,
}

impl AlwaysSucceeds {
    pub fn new(output: Payload) -> Self {
        Self { output }
    }
}

impl Executor for AlwaysSucceeds {
    fn execute(&self, _task: &Task) -> Result<Payload> {
        Ok(self.output.clone())
    }
}

/// Executor that always fails with the same message.
pub struct AlwaysFails {
    message: String,
}

impl AlwaysFails {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Executor for AlwaysFails {
    fn execute(&self, _task: &Task) -> Result<Payload> {
        Err(anyhow!("{}", self.message))
    }
}

#[derive(Debug, Clone)]
pub enum ScriptedStep {
    Succeed(Payload),
    Fail(String),
}

/// What a scripted executor saw when it was invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedCall {
    pub task_id: String,
    pub status: TaskStatus,
    pub attempts: u32,
}

pub type CallLog = Rc<RefCell<Vec<ObservedCall>>>;

/// Executor that replays a queue of steps and records every call.
///
/// Once the queue is empty every further call fails.
pub struct ScriptedExecutor {
    steps: RefCell<VecDeque<ScriptedStep>>,
    calls: CallLog,
}

impl ScriptedExecutor {
    pub fn new(steps: Vec<ScriptedStep>) -> Self {
        Self {
            steps: RefCell::new(steps.into()),
            calls: CallLog::default(),
        }
    }

    /// Shared handle to the call log; clone it before registering.
    pub fn calls(&self) -> CallLog {
        Rc::clone(&self.calls)
    }
}

impl Executor for ScriptedExecutor {
    fn execute(&self, task: &Task) -> Result<Payload> {
        self.calls.borrow_mut().push(ObservedCall {
            task_id: task.id.clone(),
            status: task.status,
            attempts: task.attempts,
        });
        match self.steps.borrow_mut().pop_front() {
            Some(ScriptedStep::Succeed(output)) => Ok(output),
            Some(ScriptedStep::Fail(message)) => Err(anyhow!("{}", message)),
            None => Err(anyhow!("script exhausted")),
        }
    }
}
