//! Plan, phase and task model.
//!
//! Tasks live in a flat arena keyed by id. Phases only keep the ordered list of
//! task ids they present, so every graph query reads the live arena and tasks
//! inserted mid-run are visible to the very next scheduling tick.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Result, anyhow, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::transitions::check_transition;
use crate::core::types::GraphEdit;

pub type TaskId = String;

/// Open key-value map carried as task input and output.
pub type Payload = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Done => "DONE",
            TaskStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    /// Ids that must be `DONE` before this task is ready. Ids that resolve to
    /// nothing keep the task unready forever.
    #[serde(default)]
    pub depends_on: Vec<TaskId>,
    pub status: TaskStatus,
    /// Number of tries so far. Only ever grows.
    pub attempts: u32,
    /// Executor key hint; the scheduler's default key applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub input: Payload,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub output: Payload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Task {
    pub fn new(
        id: impl Into<TaskId>,
        title: impl Into<String>,
        description: impl Into<String>,
        depends_on: Vec<TaskId>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            depends_on,
            status: TaskStatus::Pending,
            attempts: 0,
            suggested_agent: None,
            input: Payload::new(),
            output: Payload::new(),
            error: None,
        }
    }

    /// Move to `to`, rejecting transitions the task lifecycle does not allow.
    pub fn transition(&mut self, to: TaskStatus) -> Result<()> {
        check_transition(self.status, to)
            .map_err(|err| anyhow!("task '{}': {}", self.id, err))?;
        self.status = to;
        Ok(())
    }

    /// Key-wise merge; values in `output` win on collision.
    pub fn merge_output(&mut self, output: Payload) {
        self.output.extend(output);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    pub id: String,
    pub title: String,
    task_ids: Vec<TaskId>,
}

impl Phase {
    pub fn task_ids(&self) -> &[TaskId] {
        &self.task_ids
    }

    pub fn position(&self, task_id: &str) -> Option<usize> {
        self.task_ids.iter().position(|id| id == task_id)
    }
}

/// A goal broken into phases of interdependent tasks.
///
/// Serialises as the nested [`PlanDocument`] shape (phases embedding their
/// tasks); the arena is an in-memory detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "PlanDocument", try_from = "PlanDocument")]
pub struct Plan {
    pub id: String,
    pub goal: String,
    pub context: Option<String>,
    pub created_at: DateTime<Utc>,
    phases: Vec<Phase>,
    tasks: BTreeMap<TaskId, Task>,
}

impl Plan {
    pub fn new(
        id: impl Into<String>,
        goal: impl Into<String>,
        context: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            goal: goal.into(),
            context,
            created_at,
            phases: Vec::new(),
            tasks: BTreeMap::new(),
        }
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn add_phase(&mut self, id: impl Into<String>, title: impl Into<String>) -> Result<()> {
        let id = id.into();
        if self.phases.iter().any(|phase| phase.id == id) {
            bail!("duplicate phase id '{}'", id);
        }
        self.phases.push(Phase {
            id,
            title: title.into(),
            task_ids: Vec::new(),
        });
        Ok(())
    }

    /// Append `task` to the end of phase `phase_id`.
    pub fn push_task(&mut self, phase_id: &str, task: Task) -> Result<()> {
        if self.tasks.contains_key(&task.id) {
            bail!("duplicate task id '{}'", task.id);
        }
        let phase = self
            .phases
            .iter_mut()
            .find(|phase| phase.id == phase_id)
            .ok_or_else(|| anyhow!("phase '{}' not found", phase_id))?;
        phase.task_ids.push(task.id.clone());
        self.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    /// Insert `task` immediately before `anchor_id` in the anchor's phase.
    pub fn insert_task_before(&mut self, anchor_id: &str, task: Task) -> Result<()> {
        if self.tasks.contains_key(&task.id) {
            bail!("duplicate task id '{}'", task.id);
        }
        let (phase, index) = self
            .phases
            .iter_mut()
            .find_map(|phase| phase.position(anchor_id).map(|index| (phase, index)))
            .ok_or_else(|| anyhow!("anchor task '{}' is not in any phase", anchor_id))?;
        phase.task_ids.insert(index, task.id.clone());
        self.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    pub fn apply_edit(&mut self, edit: GraphEdit) -> Result<()> {
        match edit {
            GraphEdit::InsertBefore { anchor, task } => self.insert_task_before(&anchor, task),
            GraphEdit::RewireDependencies {
                task_id,
                depends_on,
            } => {
                let task = self
                    .task_mut(&task_id)
                    .ok_or_else(|| anyhow!("task '{}' not found", task_id))?;
                task.depends_on = depends_on;
                Ok(())
            }
        }
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.get_mut(id)
    }

    /// True if `id` names the plan itself, a phase or a task.
    pub fn contains_id(&self, id: &str) -> bool {
        self.id == id || self.tasks.contains_key(id) || self.phases.iter().any(|p| p.id == id)
    }

    pub fn phase_of(&self, task_id: &str) -> Option<&Phase> {
        self.phases
            .iter()
            .find(|phase| phase.position(task_id).is_some())
    }

    /// Tasks in presentation order: phase order, then position in phase.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.phases
            .iter()
            .flat_map(|phase| phase.task_ids.iter())
            .filter_map(|id| self.tasks.get(id))
    }

    /// Every task id in the arena, in arena order.
    pub fn task_ids(&self) -> impl Iterator<Item = &TaskId> {
        self.tasks.keys()
    }

    /// Arena order, not presentation order.
    pub fn tasks_mut(&mut self) -> impl Iterator<Item = &mut Task> {
        self.tasks.values_mut()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn has_pending(&self) -> bool {
        self.tasks
            .values()
            .any(|task| task.status == TaskStatus::Pending)
    }

    pub fn count_with_status(&self, status: TaskStatus) -> usize {
        self.tasks
            .values()
            .filter(|task| task.status == status)
            .count()
    }
}

/// Append-only record of one scheduler event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub ts: DateTime<Utc>,
    pub task_id: TaskId,
    /// Executor key, or `review` for review-policy notes.
    pub executor: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Persisted plan shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanDocument {
    pub id: String,
    pub goal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub phases: Vec<PhaseDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseDocument {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl From<Plan> for PlanDocument {
    fn from(mut plan: Plan) -> Self {
        let phases = plan
            .phases
            .iter()
            .map(|phase| PhaseDocument {
                id: phase.id.clone(),
                title: phase.title.clone(),
                tasks: phase
                    .task_ids
                    .iter()
                    .filter_map(|id| plan.tasks.remove(id))
                    .collect(),
            })
            .collect();
        PlanDocument {
            id: plan.id,
            goal: plan.goal,
            context: plan.context,
            created_at: plan.created_at,
            phases,
        }
    }
}

impl TryFrom<PlanDocument> for Plan {
    type Error = anyhow::Error;

    fn try_from(doc: PlanDocument) -> Result<Self> {
        let mut plan = Plan::new(doc.id, doc.goal, doc.context, doc.created_at);
        for phase in doc.phases {
            plan.add_phase(phase.id.clone(), phase.title)?;
            for task in phase.tasks {
                plan.push_task(&phase.id, task)?;
            }
        }
        Ok(plan)
    }
}
