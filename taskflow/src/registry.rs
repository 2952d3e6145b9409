//! Executor abstraction and key-based registry.
//!
//! The [`Executor`] trait decouples scheduling from the work a task performs.
//! Tests register scripted executors that return predetermined outputs.

use std::collections::HashMap;

use anyhow::{Result, anyhow, bail};

use crate::plan::{Payload, Task};

/// Performs the work for one task.
pub trait Executor {
    /// Run `task` and return output to merge into the task. An error marks the
    /// try as failed; its message becomes the task's `error`.
    fn execute(&self, task: &Task) -> Result<Payload>;
}

#[derive(Default)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Box<dyn Executor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<E: Executor + 'static>(
        &mut self,
        key: impl Into<String>,
        executor: E,
    ) -> Result<()> {
        let key = key.into();
        if self.executors.contains_key(&key) {
            bail!("executor '{}' already registered", key);
        }
        self.executors.insert(key, Box::new(executor));
        Ok(())
    }

    pub fn resolve(&self, key: &str) -> Result<&dyn Executor> {
        self.executors
            .get(key)
            .map(|executor| executor.as_ref())
            .ok_or_else(|| anyhow!("executor '{}' not found", key))
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.executors.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{AlwaysSucceeds, payload, task};
    use serde_json::json;

    #[test]
    fn register_rejects_duplicate_key() {
        let mut registry = ExecutorRegistry::new();
        registry
            .register("echo", AlwaysSucceeds::new(Payload::new()))
            .expect("first register");

        let err = registry
            .register("echo", AlwaysSucceeds::new(Payload::new()))
            .unwrap_err();
        assert_eq!(err.to_string(), "executor 'echo' already registered");
    }

    #[test]
    fn resolve_unknown_key_fails() {
        let registry = ExecutorRegistry::new();
        let err = registry.resolve("missing").err().expect("error");
        assert_eq!(err.to_string(), "executor 'missing' not found");
    }

    #[test]
    fn resolve_returns_registered_executor() {
        let mut registry = ExecutorRegistry::new();
        registry
            .register("echo", AlwaysSucceeds::new(payload(json!({"ok": true}))))
            .expect("register");
        registry
            .register("alpha", AlwaysSucceeds::new(Payload::new()))
            .expect("register");

        let output = registry
            .resolve("echo")
            .expect("resolve")
            .execute(&task("a", &[]))
            .expect("execute");
        assert_eq!(output.get("ok"), Some(&json!(true)));
        assert_eq!(registry.keys(), vec!["alpha", "echo"]);
    }
}
