//! Fixed four-phase plan skeleton.
//!
//! ```text
//! Discover:  Clarify requirements, Search codebase
//! Design:    Propose approach            <- both Discover tasks
//! Implement: Make changes                <- Propose approach
//!            Format                      <- Make changes
//! Verify:    Smoke test                  <- Format
//! ```
//!
//! The goal and optional context only appear as descriptive text; the graph
//! is the same for every goal.

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::Utc;

use crate::core::ids::{IdGenerator, fresh_id};
use crate::plan::{Plan, Task, TaskId};

pub const ROLE_SEARCH: &str = "search";
pub const ROLE_FORMAT: &str = "format";
pub const ROLE_WRITE: &str = "write";

/// Role name -> title keyword used to derive executor hints.
pub const ROLE_KEYWORDS: [(&str, &str); 3] = [
    (ROLE_SEARCH, "search"),
    (ROLE_FORMAT, "format"),
    (ROLE_WRITE, "make changes"),
];

/// Ordered `(keyword, executor key)` rules; the first keyword contained in a
/// task title (case-insensitive) picks the key.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CapabilityHints {
    rules: Vec<(String, String)>,
}

impl CapabilityHints {
    pub fn with_rule(mut self, keyword: &str, key: impl Into<String>) -> Self {
        self.rules.push((keyword.to_lowercase(), key.into()));
        self
    }

    /// Build rules from a role -> executor key map, in [`ROLE_KEYWORDS`] order.
    /// Roles missing from the map produce no rule.
    pub fn from_roles(roles: &BTreeMap<String, String>) -> Self {
        ROLE_KEYWORDS
            .iter()
            .fold(Self::default(), |hints, (role, keyword)| match roles.get(*role) {
                Some(key) => hints.with_rule(keyword, key.clone()),
                None => hints,
            })
    }

    pub fn hint_for(&self, title: &str) -> Option<&str> {
        let title = title.to_lowercase();
        self.rules
            .iter()
            .find(|(keyword, _)| title.contains(keyword.as_str()))
            .map(|(_, key)| key.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct PlanBuilder {
    hints: CapabilityHints,
}

impl PlanBuilder {
    pub fn new(hints: CapabilityHints) -> Self {
        Self { hints }
    }

    pub fn build(
        &self,
        goal: &str,
        context: Option<&str>,
        ids: &mut dyn IdGenerator,
    ) -> Result<Plan> {
        let mut plan = Plan::new(ids.next_id(), goal, context.map(str::to_string), Utc::now());

        let clarify_description = match context {
            Some(context) => format!(
                "Extract constraints, inputs/outputs for: {goal}\nContext: {context}"
            ),
            None => format!("Extract constraints, inputs/outputs for: {goal}"),
        };

        let discover = add_phase(&mut plan, ids, "Discover")?;
        let clarify = add_task(
            &mut plan,
            ids,
            &discover,
            "Clarify requirements",
            &clarify_description,
            Vec::new(),
        )?;
        let search = add_task(
            &mut plan,
            ids,
            &discover,
            "Search codebase",
            "Locate relevant modules & endpoints.",
            Vec::new(),
        )?;

        let design = add_phase(&mut plan, ids, "Design")?;
        let propose = add_task(
            &mut plan,
            ids,
            &design,
            "Propose approach",
            "Outline minimal changes and interfaces.",
            vec![clarify, search],
        )?;

        let implement = add_phase(&mut plan, ids, "Implement")?;
        let changes = add_task(
            &mut plan,
            ids,
            &implement,
            "Make changes",
            "Apply code edits per design.",
            vec![propose],
        )?;
        let format = add_task(
            &mut plan,
            ids,
            &implement,
            "Format",
            "Format/organize modified files.",
            vec![changes],
        )?;

        let verify = add_phase(&mut plan, ids, "Verify")?;
        add_task(
            &mut plan,
            ids,
            &verify,
            "Smoke test",
            "Run basic checks or validations.",
            vec![format],
        )?;

        for task in plan.tasks_mut() {
            if let Some(key) = self.hints.hint_for(&task.title) {
                task.suggested_agent = Some(key.to_string());
            }
        }

        Ok(plan)
    }
}

fn add_phase(plan: &mut Plan, ids: &mut dyn IdGenerator, title: &str) -> Result<String> {
    let id = fresh_id(ids, |candidate| plan.contains_id(candidate));
    plan.add_phase(id.clone(), title)?;
    Ok(id)
}

fn add_task(
    plan: &mut Plan,
    ids: &mut dyn IdGenerator,
    phase_id: &str,
    title: &str,
    description: &str,
    depends_on: Vec<TaskId>,
) -> Result<TaskId> {
    let id = fresh_id(ids, |candidate| plan.contains_id(candidate));
    plan.push_task(phase_id, Task::new(id.clone(), title, description, depends_on))?;
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ids::{RandomIds, SequentialIds};
    use crate::core::invariants::validate_invariants;
    use crate::plan::TaskStatus;

    fn default_hints() -> CapabilityHints {
        CapabilityHints::default()
            .with_rule("search", "searchRepo")
            .with_rule("format", "formatCode")
            .with_rule("make changes", "writeFile")
    }

    #[test]
    fn builds_four_phase_skeleton() {
        let plan = PlanBuilder::new(default_hints())
            .build("Add dark mode", None, &mut RandomIds)
            .expect("build");

        let titles: Vec<&str> = plan.phases().iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["Discover", "Design", "Implement", "Verify"]);
        assert_eq!(plan.task_count(), 6);
        assert_eq!(plan.goal, "Add dark mode");

        let discover = plan.phases()[0].task_ids();
        let design = plan.phases()[1].task_ids();
        let implement = plan.phases()[2].task_ids();
        let verify = plan.phases()[3].task_ids();
        assert_eq!(design.len(), 1);
        assert_eq!(verify.len(), 1);

        let propose = plan.task(&design[0]).expect("design task");
        assert_eq!(propose.depends_on, discover.to_vec());
        let smoke = plan.task(&verify[0]).expect("verify task");
        assert_eq!(smoke.depends_on, vec![implement[1].clone()]);
        let format = plan.task(&implement[1]).expect("format task");
        assert_eq!(format.depends_on, vec![implement[0].clone()]);

        let search = plan.task(&discover[1]).expect("search task");
        assert_eq!(search.title, "Search codebase");
        assert_eq!(search.suggested_agent.as_deref(), Some("searchRepo"));

        assert!(plan.tasks().all(|t| t.status == TaskStatus::Pending && t.attempts == 0));
        assert!(validate_invariants(&plan).is_empty());
    }

    #[test]
    fn hints_follow_title_keywords() {
        let plan = PlanBuilder::new(default_hints())
            .build("goal", None, &mut SequentialIds::new("id"))
            .expect("build");

        let hints: Vec<(&str, Option<&str>)> = plan
            .tasks()
            .map(|t| (t.title.as_str(), t.suggested_agent.as_deref()))
            .collect();
        assert_eq!(
            hints,
            vec![
                ("Clarify requirements", None),
                ("Search codebase", Some("searchRepo")),
                ("Propose approach", None),
                ("Make changes", Some("writeFile")),
                ("Format", Some("formatCode")),
                ("Smoke test", None),
            ]
        );
    }

    #[test]
    fn goal_and_context_are_descriptive_only() {
        let plan = PlanBuilder::default()
            .build("Ship it", Some("monorepo"), &mut SequentialIds::new("id"))
            .expect("build");

        let clarify = plan.tasks().next().expect("first task");
        assert_eq!(
            clarify.description,
            "Extract constraints, inputs/outputs for: Ship it\nContext: monorepo"
        );
        assert_eq!(plan.context.as_deref(), Some("monorepo"));
        assert!(plan.tasks().all(|t| t.suggested_agent.is_none()));
    }

    #[test]
    fn hints_from_roles_skip_missing_roles() {
        let roles = BTreeMap::from([("search".to_string(), "grep".to_string())]);
        let hints = CapabilityHints::from_roles(&roles);

        assert_eq!(hints.hint_for("SEARCH codebase"), Some("grep"));
        assert_eq!(hints.hint_for("Format"), None);
    }
}
