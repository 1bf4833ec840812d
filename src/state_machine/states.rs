use crate::models::Task;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Execution state of a bulk task.
///
/// Only `Pending` and `Completed` are derivable from a persisted record;
/// `Running` and `Aborted` exist inside an executor loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskExecutionState {
    /// Persisted, not completed, no batch in flight
    #[default]
    Pending,
    /// A batch is being fetched, applied or committed
    Running,
    /// Traversal exhausted; no further batches will run
    Completed,
    /// Halted for good without completing
    Aborted,
}

impl TaskExecutionState {
    pub fn from_task(task: &Task) -> Self {
        if task.completed {
            Self::Completed
        } else {
            Self::Pending
        }
    }

    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl fmt::Display for TaskExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

impl std::str::FromStr for TaskExecutionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "aborted" => Ok(Self::Aborted),
            _ => Err(format!("Invalid task execution state: {s}")),
        }
    }
}

/// Why an executor stopped driving a task without completing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// The task record was deleted
    Cancelled,
    /// The initiator lost the right to run the task
    AuthorizationRevoked,
    /// Another executor committed progress first
    Superseded,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "cancelled"),
            Self::AuthorizationRevoked => write!(f, "authorization_revoked"),
            Self::Superseded => write!(f, "superseded"),
        }
    }
}
