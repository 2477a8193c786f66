//! Task and run state machines

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a single task within one run.
///
/// Valid transitions are `pending -> dispatched`, `dispatched -> completed`
/// and `dispatched -> failed`. Each happens at most once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    #[default]
    Pending,
    Dispatched,
    Completed,
    Failed,
}

impl TaskState {
    #[must_use]
    pub fn can_transition_to(self, next: TaskState) -> bool {
        matches!(
            (self, next),
            (TaskState::Pending, TaskState::Dispatched)
                | (TaskState::Dispatched, TaskState::Completed)
                | (TaskState::Dispatched, TaskState::Failed)
        )
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Pending => "pending",
            TaskState::Dispatched => "dispatched",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a run ended. Derived from the task states, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunOutcome {
    /// Every task reached `completed`
    #[serde(rename = "complete")]
    Completed,
    /// Some task reported failure
    #[serde(rename = "halted-on-failure")]
    HaltedOnFailure,
    /// The wall-clock budget ran out
    #[serde(rename = "halted-on-timeout")]
    HaltedOnTimeout,
}

impl RunOutcome {
    #[must_use]
    pub fn is_success(self) -> bool {
        self == RunOutcome::Completed
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Completed => "complete",
            RunOutcome::HaltedOnFailure => "halted-on-failure",
            RunOutcome::HaltedOnTimeout => "halted-on-timeout",
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
