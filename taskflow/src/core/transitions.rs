//! Task status transition rules.
//!
//! Allowed moves:
//! - `PENDING -> RUNNING` (first try)
//! - `RUNNING -> DONE` / `RUNNING -> FAILED`
//! - `FAILED -> RUNNING` (next try while the retry budget lasts)
//!
//! `DONE` is final.

use crate::plan::TaskStatus;

/// Returns an error message when `from -> to` is not a legal transition.
pub fn check_transition(from: TaskStatus, to: TaskStatus) -> Result<(), String> {
    let allowed = matches!(
        (from, to),
        (TaskStatus::Pending, TaskStatus::Running)
            | (TaskStatus::Running, TaskStatus::Done)
            | (TaskStatus::Running, TaskStatus::Failed)
            | (TaskStatus::Failed, TaskStatus::Running)
    );
    if allowed {
        Ok(())
    } else {
        Err(format!("illegal status transition {} -> {}", from, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_cycle_is_allowed() {
        assert!(check_transition(TaskStatus::Pending, TaskStatus::Running).is_ok());
        assert!(check_transition(TaskStatus::Running, TaskStatus::Failed).is_ok());
        assert!(check_transition(TaskStatus::Failed, TaskStatus::Running).is_ok());
        assert!(check_transition(TaskStatus::Running, TaskStatus::Done).is_ok());
    }

    #[test]
    fn done_is_final() {
        for to in [
            TaskStatus::Pending,
            TaskStatus::Running,
            TaskStatus::Failed,
            TaskStatus::Done,
        ] {
            assert!(check_transition(TaskStatus::Done, to).is_err());
        }
    }

    #[test]
    fn pending_cannot_skip_running() {
        let err = check_transition(TaskStatus::Pending, TaskStatus::Done).unwrap_err();
        assert_eq!(err, "illegal status transition PENDING -> DONE");
        assert!(check_transition(TaskStatus::Pending, TaskStatus::Failed).is_err());
        assert!(check_transition(TaskStatus::Failed, TaskStatus::Pending).is_err());
    }
}
