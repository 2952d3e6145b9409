//! Built-in executors that touch the local filesystem.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};
use regex::RegexBuilder;
use serde_json::{Value, json};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::plan::{Payload, Task};
use crate::registry::{Executor, ExecutorRegistry};

pub const FORMAT_CODE: &str = "formatCode";
pub const SEARCH_REPO: &str = "searchRepo";
pub const WRITE_FILE: &str = "writeFile";

const SKIPPED_DIRS: [&str; 4] = [".git", "target", "node_modules", "dist"];
const SEARCHED_EXTENSIONS: [&str; 7] = ["rs", "toml", "md", "json", "ts", "tsx", "js"];
const DEFAULT_WRITE_PATH: &str = "out/generated.txt";

/// Register the built-in executors under their default keys.
pub fn default_registry(root: &Path) -> Result<ExecutorRegistry> {
    let mut registry = ExecutorRegistry::new();
    registry.register(FORMAT_CODE, FormatCodeExecutor)?;
    registry.register(SEARCH_REPO, SearchRepoExecutor::new(root))?;
    registry.register(WRITE_FILE, WriteFileExecutor::new(root))?;
    Ok(registry)
}

/// Marks the task as formatted without changing any file.
pub struct FormatCodeExecutor;

impl Executor for FormatCodeExecutor {
    fn execute(&self, task: &Task) -> Result<Payload> {
        Ok(object(json!({
            "formatted": true,
            "note": format!("Formatted after task: {}", task.title),
        })))
    }
}

/// Counts case-insensitive literal matches of `input.query` (or the task
/// description) in source and text files under `root`.
pub struct SearchRepoExecutor {
    root: PathBuf,
}

impl SearchRepoExecutor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Executor for SearchRepoExecutor {
    fn execute(&self, task: &Task) -> Result<Payload> {
        let query = task
            .input
            .get("query")
            .and_then(Value::as_str)
            .unwrap_or(task.description.as_str());
        let pattern = RegexBuilder::new(&regex::escape(query))
            .case_insensitive(true)
            .build()
            .context("compile search pattern")?;

        let mut hits = Vec::new();
        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_skipped_dir(entry));
        for entry in walker {
            let entry = entry.with_context(|| format!("walk {}", self.root.display()))?;
            if !entry.file_type().is_file() || !is_searched_file(entry.path()) {
                continue;
            }
            // Non-UTF-8 files are not source files.
            let Ok(text) = fs::read_to_string(entry.path()) else {
                continue;
            };
            let count = pattern.find_iter(&text).count();
            if count > 0 {
                let file = entry
                    .path()
                    .strip_prefix(&self.root)
                    .unwrap_or(entry.path());
                hits.push(json!({ "file": file.display().to_string(), "count": count }));
            }
        }
        debug!(task_id = %task.id, hits = hits.len(), "search finished");
        Ok(object(json!({ "hits": hits })))
    }
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

fn is_searched_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| SEARCHED_EXTENSIONS.contains(&ext))
}

/// Writes `input.content` (or a stub naming the task) to `input.path` (or
/// `out/generated.txt`) relative to `root`.
pub struct WriteFileExecutor {
    root: PathBuf,
}

impl WriteFileExecutor {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Executor for WriteFileExecutor {
    fn execute(&self, task: &Task) -> Result<Payload> {
        let rel = task
            .input
            .get("path")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_WRITE_PATH);
        let rel_path = Path::new(rel);
        if !rel_path
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
        {
            bail!("refusing to write outside the workspace: {}", rel);
        }
        let content = match task.input.get("content").and_then(Value::as_str) {
            Some(content) => content.to_string(),
            None => format!("// generated for task: {}\n", task.title),
        };

        let full = self.root.join(rel_path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        fs::write(&full, &content).with_context(|| format!("write {}", full.display()))?;
        Ok(object(json!({ "path": rel, "bytes": content.len() })))
    }
}

fn object(value: Value) -> Payload {
    match value {
        Value::Object(map) => map,
        _ => Payload::new(),
    }
}
