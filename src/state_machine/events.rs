use super::states::{AbortReason, TaskExecutionState};
use crate::error::{Result, TaskerError};
use serde::{Deserialize, Serialize};

/// Events that move an executor through [`TaskExecutionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ExecutionEvent {
    /// A batch fetch is about to start
    BatchStarted,
    /// The batch commit was persisted and more elements may remain
    BatchCommitted,
    /// The batch was abandoned without advancing progress
    BatchFailed,
    /// Traversal reached its end and completion was persisted
    Exhausted,
    Abort(AbortReason),
}

impl ExecutionEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::BatchStarted => "batch_started",
            Self::BatchCommitted => "batch_committed",
            Self::BatchFailed => "batch_failed",
            Self::Exhausted => "exhausted",
            Self::Abort(_) => "abort",
        }
    }
}

impl TaskExecutionState {
    /// Apply an event, rejecting transitions the protocol does not allow.
    pub fn transition(self, event: ExecutionEvent) -> Result<Self> {
        use ExecutionEvent as E;
        use TaskExecutionState as S;

        let next = match (self, event) {
            (S::Pending, E::BatchStarted) => S::Running,
            (S::Running, E::BatchCommitted) | (S::Running, E::BatchFailed) => S::Pending,
            (S::Running, E::Exhausted) => S::Completed,
            (S::Pending, E::Abort(_)) | (S::Running, E::Abort(_)) => S::Aborted,
            (state, event) => {
                return Err(TaskerError::StateTransition(format!(
                    "cannot apply {} in state {state}",
                    event.event_type()
                )))
            }
        };
        Ok(next)
    }
}
