//! Configuration stored in `taskflow.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use crate::core::builder::{CapabilityHints, ROLE_FORMAT, ROLE_SEARCH, ROLE_WRITE};
use crate::core::review::ReviewPolicy;
use crate::io::executors::{FORMAT_CODE, SEARCH_REPO, WRITE_FILE};
use crate::scheduler::SchedulerConfig;

pub const DEFAULT_CONFIG_FILE: &str = "taskflow.toml";

/// Taskflow configuration (TOML).
///
/// Missing fields default to the values below; a missing file means all
/// defaults.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// Additional tries per task after the first.
    pub max_retries: u32,

    /// Executor key for tasks without a hint.
    pub default_executor: String,

    /// Directory for saved plans, relative to the working directory.
    pub plans_dir: PathBuf,

    /// Directory for run logs, relative to the working directory.
    pub runs_dir: PathBuf,

    /// Role -> executor key. The `search` role also names the executor given
    /// to review-inserted remediation tasks.
    pub executors: BTreeMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            default_executor: WRITE_FILE.to_string(),
            plans_dir: PathBuf::from("plans"),
            runs_dir: PathBuf::from("runs"),
            executors: BTreeMap::from([
                (ROLE_FORMAT.to_string(), FORMAT_CODE.to_string()),
                (ROLE_SEARCH.to_string(), SEARCH_REPO.to_string()),
                (ROLE_WRITE.to_string(), WRITE_FILE.to_string()),
            ]),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default_executor.trim().is_empty() {
            return Err(anyhow!("default_executor must be non-empty"));
        }
        if self.plans_dir.as_os_str().is_empty() {
            return Err(anyhow!("plans_dir must be non-empty"));
        }
        if self.runs_dir.as_os_str().is_empty() {
            return Err(anyhow!("runs_dir must be non-empty"));
        }
        if let Some((role, _)) = self.executors.iter().find(|(_, key)| key.trim().is_empty()) {
            return Err(anyhow!("executors.{} must be non-empty", role));
        }
        if !self.executors.contains_key(ROLE_SEARCH) {
            return Err(anyhow!("executors.{} is required", ROLE_SEARCH));
        }
        Ok(())
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            max_retries: self.max_retries,
            default_executor: self.default_executor.clone(),
        }
    }

    pub fn capability_hints(&self) -> CapabilityHints {
        CapabilityHints::from_roles(&self.executors)
    }

    pub fn review_policy(&self) -> Result<ReviewPolicy> {
        let key = self
            .executors
            .get(ROLE_SEARCH)
            .ok_or_else(|| anyhow!("executors.{} is required", ROLE_SEARCH))?;
        Ok(ReviewPolicy::new(key.clone()))
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AppConfig::default()`.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        let cfg = AppConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AppConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
