//! Error types for the bulk task engine.
//!
//! Errors fall into four families that drive executor behavior:
//!
//! - **Invalid input** (`InvalidFilter`, `InvalidActions`, `InvalidInput`): raised
//!   synchronously at task creation; nothing is persisted.
//! - **Transport** (`Transport`): the backing store failed a whole batch fetch or
//!   commit. The iteration is abandoned without advancing progress and the task
//!   stays resumable.
//! - **Fatal** (`TaskNotFound`, `AuthorizationRevoked`, `ConcurrentModification`):
//!   the executor halts permanently for that task and performs no further writes.
//! - **Local** (`StateTransition`, `AlreadyRunning`, `Configuration`, `Serialization`).
//!
//! Per-element action failures are not errors of the run; they are values
//! ([`crate::models::ActionFailure`]) recorded into the task.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TaskerError {
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),
    #[error("Invalid actions: {0}")]
    InvalidActions(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Task {0} not found")]
    TaskNotFound(Uuid),
    #[error("Initiator {initiator_id} is no longer authorized to run task {task_id}")]
    AuthorizationRevoked { task_id: Uuid, initiator_id: String },
    #[error("Task {task_id} was modified concurrently (expected cursor {expected:?})")]
    ConcurrentModification {
        task_id: Uuid,
        expected: Option<String>,
    },
    #[error("State transition error: {0}")]
    StateTransition(String),
    #[error("Task {0} is already being executed in this process")]
    AlreadyRunning(Uuid),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TaskerError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Whether the executor must stop driving the task for good.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::TaskNotFound(_)
                | Self::AuthorizationRevoked { .. }
                | Self::ConcurrentModification { .. }
        )
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            Self::InvalidFilter(_) | Self::InvalidActions(_) | Self::InvalidInput(_)
        )
    }
}

impl From<sqlx::Error> for TaskerError {
    fn from(err: sqlx::Error) -> Self {
        TaskerError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for TaskerError {
    fn from(error: serde_json::Error) -> Self {
        TaskerError::Serialization(format!("JSON serialization error: {error}"))
    }
}

impl From<config::ConfigError> for TaskerError {
    fn from(error: config::ConfigError) -> Self {
        TaskerError::Configuration(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TaskerError>;
