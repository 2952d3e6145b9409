//! Per-task retry budget.
//!
//! A task gets `max_retries + 1` tries. Each failed try is classified as
//! transient (another try follows) or terminal (budget spent).

use crate::core::types::FailureKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    max_retries: u32,
    tries: u32,
}

impl RetryBudget {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            tries: 0,
        }
    }

    fn max_tries(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    fn has_tries_left(&self) -> bool {
        self.tries < self.max_tries()
    }

    /// Start the next try and return its 1-based index.
    pub fn start_try(&mut self) -> u32 {
        self.tries += 1;
        self.tries
    }

    /// Classify a failure of the most recently started try.
    pub fn classify_failure(&self) -> FailureKind {
        if self.has_tries_left() {
            FailureKind::Transient {
                remaining: self.max_tries() - self.tries,
            }
        } else {
            FailureKind::Terminal
        }
    }
}
