//! Plan and run-log persistence.
//!
//! Plans are written as pretty JSON under `plans_dir`, run logs as JSON arrays
//! under `runs_dir`. Loading validates field types against the embedded schema
//! and then backfills defaults for optional structure that is absent.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use jsonschema::Draft;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::core::ids::{IdGenerator, RandomIds, fresh_id};
use crate::core::invariants::{dangling_dependencies, find_cycle, validate_invariants};
use crate::io::config::AppConfig;
use crate::plan::{Payload, Plan, RunLogEntry, Task, TaskStatus};

const PLAN_SCHEMA: &str = include_str!("../../schemas/plan.v1.schema.json");

#[derive(Debug, Clone)]
pub struct PlanStore {
    plans_dir: PathBuf,
    runs_dir: PathBuf,
}

impl PlanStore {
    pub fn new(plans_dir: impl Into<PathBuf>, runs_dir: impl Into<PathBuf>) -> Self {
        Self {
            plans_dir: plans_dir.into(),
            runs_dir: runs_dir.into(),
        }
    }

    /// Resolve the configured directories against `root`.
    pub fn from_config(root: &Path, cfg: &AppConfig) -> Self {
        Self::new(root.join(&cfg.plans_dir), root.join(&cfg.runs_dir))
    }

    /// Save as `<slug(goal)>.json`, replacing any previous save of the same goal.
    pub fn save_plan(&self, plan: &Plan) -> Result<PathBuf> {
        self.save_plan_as(plan, &format!("{}.json", slugify(&plan.goal)))
    }

    pub fn save_plan_as(&self, plan: &Plan, file_name: &str) -> Result<PathBuf> {
        let file_name = file_name.replace(['/', '\\'], "-");
        let path = self.plans_dir.join(file_name);
        write_json_atomic(&path, plan)?;
        debug!(path = %path.display(), tasks = plan.task_count(), "plan saved");
        Ok(path)
    }

    pub fn load_plan(&self, path: &Path) -> Result<Plan> {
        load_plan(path, &mut RandomIds)
    }

    /// Write `entries` to a new timestamped file under `runs_dir`.
    pub fn append_run_log(&self, entries: &[RunLogEntry]) -> Result<PathBuf> {
        let name = format!("{}.json", Utc::now().format("%Y-%m-%dT%H-%M-%S%.3fZ"));
        let path = self.runs_dir.join(name);
        write_json_atomic(&path, &entries)?;
        debug!(path = %path.display(), entries = entries.len(), "run log written");
        Ok(path)
    }
}

/// Load a plan file, filling missing ids from `ids`.
pub fn load_plan(path: &Path, ids: &mut dyn IdGenerator) -> Result<Plan> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read plan {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse plan {}", path.display()))?;
    let plan =
        plan_from_value(&value, ids).with_context(|| format!("load plan {}", path.display()))?;
    for (task_id, dep) in dangling_dependencies(&plan) {
        warn!(task_id = %task_id, dependency = %dep, "dependency does not resolve to any task");
    }
    if let Some(cycle) = find_cycle(&plan) {
        warn!(cycle = %cycle.join(" -> "), "dependency cycle; its tasks can never become ready");
    }
    Ok(plan)
}

/// Build a plan from parsed JSON.
///
/// Fails when a present field has the wrong type. Absent optional fields get
/// defaults: generated ids, positional titles (`Phase <n>`, `Task <n>`), empty
/// task lists and dependencies, `PENDING` status, zero attempts.
pub fn plan_from_value(value: &Value, ids: &mut dyn IdGenerator) -> Result<Plan> {
    validate_schema(value)?;
    let root = value
        .as_object()
        .ok_or_else(|| anyhow!("plan must be a JSON object"))?;

    let mut taken = explicit_ids(root);
    let mut next_id = |taken: &mut HashSet<String>| {
        let id = fresh_id(ids, |candidate| taken.contains(candidate));
        taken.insert(id.clone());
        id
    };

    let plan_id = match str_field(root, "id") {
        Some(id) => id.to_string(),
        None => next_id(&mut taken),
    };
    let goal = str_field(root, "goal")
        .ok_or_else(|| anyhow!("plan is missing 'goal'"))?
        .to_string();
    let context = str_field(root, "context").map(str::to_string);
    let created_at = match str_field(root, "created_at") {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .with_context(|| format!("invalid created_at '{}'", raw))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };

    let mut plan = Plan::new(plan_id, goal, context, created_at);
    for (phase_index, phase_value) in array_field(root, "phases").iter().enumerate() {
        let phase = phase_value
            .as_object()
            .ok_or_else(|| anyhow!("phase {} must be an object", phase_index + 1))?;
        let phase_id = match str_field(phase, "id") {
            Some(id) => id.to_string(),
            None => next_id(&mut taken),
        };
        let title = str_field(phase, "title")
            .map(str::to_string)
            .unwrap_or_else(|| format!("Phase {}", phase_index + 1));
        plan.add_phase(phase_id.clone(), title)?;

        for (task_index, task_value) in array_field(phase, "tasks").iter().enumerate() {
            let fields = task_value.as_object().ok_or_else(|| {
                anyhow!(
                    "phase '{}' task {} must be an object",
                    phase_id,
                    task_index + 1
                )
            })?;
            let task_id = match str_field(fields, "id") {
                Some(id) => id.to_string(),
                None => next_id(&mut taken),
            };
            let task = task_from_fields(task_id, task_index, fields)?;
            plan.push_task(&phase_id, task)?;
        }
    }

    let errors = validate_invariants(&plan);
    if !errors.is_empty() {
        bail!("plan invariants failed: {}", errors.join("; "));
    }
    Ok(plan)
}

fn task_from_fields(id: String, index: usize, fields: &Map<String, Value>) -> Result<Task> {
    let title = str_field(fields, "title")
        .map(str::to_string)
        .unwrap_or_else(|| format!("Task {}", index + 1));
    let description = str_field(fields, "description").unwrap_or_default();
    let depends_on = array_field(fields, "depends_on")
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();

    let mut task = Task::new(id, title, description, depends_on);
    if let Some(status) = fields.get("status") {
        task.status = serde_json::from_value::<TaskStatus>(status.clone())
            .with_context(|| format!("task '{}' has invalid status", task.id))?;
    }
    task.attempts = fields
        .get("attempts")
        .and_then(Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0);
    task.suggested_agent = str_field(fields, "suggested_agent").map(str::to_string);
    task.input = object_field(fields, "input");
    task.output = object_field(fields, "output");
    task.error = str_field(fields, "error").map(str::to_string);
    Ok(task)
}

fn str_field<'a>(fields: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    fields.get(key).and_then(Value::as_str)
}

/// Array field, or empty when absent. The schema has already rejected
/// present non-array values.
fn array_field<'a>(fields: &'a Map<String, Value>, key: &str) -> &'a [Value] {
    fields
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn object_field(fields: &Map<String, Value>, key: &str) -> Payload {
    fields
        .get(key)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

/// Every id written in the document, so generated ids never collide with them.
fn explicit_ids(root: &Map<String, Value>) -> HashSet<String> {
    let mut taken = HashSet::new();
    let mut record = |fields: &Map<String, Value>| {
        if let Some(id) = str_field(fields, "id") {
            taken.insert(id.to_string());
        }
    };
    record(root);
    for phase in array_field(root, "phases").iter().filter_map(Value::as_object) {
        record(phase);
        for task in array_field(phase, "tasks").iter().filter_map(Value::as_object) {
            record(task);
        }
    }
    taken
}

/// Validate field types against the plan schema (Draft 2020-12).
fn validate_schema(instance: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(PLAN_SCHEMA).context("parse plan schema")?;
    let compiled = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .context("compile plan schema")?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("plan schema validation failed:\n- {}", messages.join("\n- "));
    }
    Ok(())
}

/// Lowercase, collapse runs of non-alphanumerics to `-`, trim `-`.
pub fn slugify(goal: &str) -> String {
    static NON_ALNUM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());
    let lowered = goal.to_lowercase();
    let slug = NON_ALNUM_RE.replace_all(&lowered, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "plan".to_string()
    } else {
        slug.to_string()
    }
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let mut buf = serde_json::to_string_pretty(value).context("serialize json")?;
    buf.push('\n');
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, buf).with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
