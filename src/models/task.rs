//! # Task Model
//!
//! The task record is the sole persistent entity of the engine: one unit of
//! bulk work, either query-driven or list-driven, with its progress and
//! element-level error state.
//!
//! ## Persisted Shape
//!
//! ```json
//! {
//!   "id": "6b0f...",
//!   "kind": "LIST",
//!   "initiator_id": "U1",
//!   "created_at": "2024-01-01T00:00:00Z",
//!   "completed": false,
//!   "last_execution_time": null,
//!   "cursor": null,
//!   "processed_count": 0,
//!   "expected_count": 3,
//!   "actions": [{ "type": "DELETE" }],
//!   "errors": { "entries": [], "total_failures": 0, "overflow_count": 0 },
//!   "target_ids": ["a", "b", "c"]
//! }
//! ```
//!
//! Exactly one of `filter_document` / `target_ids` is present, selected by
//! `kind`; [`TaskPayload`] makes any other combination unrepresentable.

use super::action::ActionDescriptor;
use super::filter::FilterDocument;
use crate::constants::task_kinds;
use crate::state_machine::TaskExecutionState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKind {
    #[serde(rename = "QUERY")]
    Query,
    #[serde(rename = "LIST")]
    List,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query => f.write_str(task_kinds::QUERY),
            Self::List => f.write_str(task_kinds::LIST),
        }
    }
}

impl std::str::FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            task_kinds::QUERY => Ok(Self::Query),
            task_kinds::LIST => Ok(Self::List),
            _ => Err(format!("Invalid task kind: {s}")),
        }
    }
}

/// What a task traverses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum TaskPayload {
    #[serde(rename = "QUERY")]
    Query { filter_document: FilterDocument },
    #[serde(rename = "LIST")]
    List { target_ids: Vec<String> },
}

impl TaskPayload {
    pub fn kind(&self) -> TaskKind {
        match self {
            Self::Query { .. } => TaskKind::Query,
            Self::List { .. } => TaskKind::List,
        }
    }
}

/// Opaque resumption token.
///
/// QUERY tasks store the token handed out by the entity store; LIST tasks
/// store the decimal offset into `target_ids`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskCursor(String);

impl TaskCursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn from_offset(offset: u64) -> Self {
        Self(offset.to_string())
    }

    pub fn as_offset(&self) -> Option<u64> {
        self.0.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for TaskCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One retained element failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementError {
    pub entity_id: String,
    pub message: String,
    pub recorded_at: DateTime<Utc>,
}

/// Bounded element-failure log of a task.
///
/// `entries` holds at most the configured number of failures in detail;
/// `total_failures` counts every failure ever recorded and `overflow_count`
/// the ones that were counted but not retained.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskErrors {
    pub entries: Vec<ElementError>,
    pub total_failures: u64,
    pub overflow_count: u64,
}

impl TaskErrors {
    pub fn is_empty(&self) -> bool {
        self.total_failures == 0
    }

    pub fn retained(&self) -> usize {
        self.entries.len()
    }

    /// Ids of the retained failures, in recording order, for building a follow-up LIST task.
    pub fn failed_entity_ids(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.entity_id.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub initiator_id: String,
    pub created_at: DateTime<Utc>,
    pub completed: bool,
    pub last_execution_time: Option<DateTime<Utc>>,
    pub cursor: Option<TaskCursor>,
    pub processed_count: u64,
    pub expected_count: u64,
    pub actions: Vec<ActionDescriptor>,
    pub errors: TaskErrors,
    #[serde(flatten)]
    pub payload: TaskPayload,
}

impl Task {
    fn new(
        initiator_id: impl Into<String>,
        actions: Vec<ActionDescriptor>,
        payload: TaskPayload,
        expected_count: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            initiator_id: initiator_id.into(),
            created_at: Utc::now(),
            completed: false,
            last_execution_time: None,
            cursor: None,
            processed_count: 0,
            expected_count,
            actions,
            errors: TaskErrors::default(),
            payload,
        }
    }

    pub fn new_query(
        initiator_id: impl Into<String>,
        actions: Vec<ActionDescriptor>,
        filter_document: FilterDocument,
        expected_count: u64,
    ) -> Self {
        Self::new(
            initiator_id,
            actions,
            TaskPayload::Query { filter_document },
            expected_count,
        )
    }

    pub fn new_list(
        initiator_id: impl Into<String>,
        actions: Vec<ActionDescriptor>,
        target_ids: Vec<String>,
    ) -> Self {
        let expected_count = target_ids.len() as u64;
        Self::new(
            initiator_id,
            actions,
            TaskPayload::List { target_ids },
            expected_count,
        )
    }

    pub fn kind(&self) -> TaskKind {
        self.payload.kind()
    }

    pub fn filter_document(&self) -> Option<&FilterDocument> {
        match &self.payload {
            TaskPayload::Query { filter_document } => Some(filter_document),
            TaskPayload::List { .. } => None,
        }
    }

    pub fn target_ids(&self) -> Option<&[String]> {
        match &self.payload {
            TaskPayload::List { target_ids } => Some(target_ids),
            TaskPayload::Query { .. } => None,
        }
    }

    /// Elements still allowed before `processed_count` reaches `expected_count`.
    pub fn remaining(&self) -> u64 {
        self.expected_count.saturating_sub(self.processed_count)
    }

    /// Persisted state; `Running`/`Aborted` are only known to an executor.
    pub fn state(&self) -> TaskExecutionState {
        TaskExecutionState::from_task(self)
    }

    pub fn progress(&self) -> TaskProgress {
        let percent = if self.expected_count == 0 {
            if self.completed {
                100.0
            } else {
                0.0
            }
        } else {
            (self.processed_count as f64 / self.expected_count as f64) * 100.0
        };
        TaskProgress {
            processed: self.processed_count,
            expected: self.expected_count,
            percent,
            error_count: self.errors.total_failures,
            state: self.state(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskProgress {
    pub processed: u64,
    pub expected: u64,
    pub percent: f64,
    pub error_count: u64,
    pub state: TaskExecutionState,
}

/// Compare-and-swap guard applied to a patch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CursorGuard {
    #[default]
    Unguarded,
    /// Apply only if the stored cursor still equals this value
    Expect(Option<TaskCursor>),
}

impl CursorGuard {
    pub fn admits(&self, current: Option<&TaskCursor>) -> bool {
        match self {
            Self::Unguarded => true,
            Self::Expect(expected) => expected.as_ref() == current,
        }
    }

    pub fn expected(&self) -> Option<&TaskCursor> {
        match self {
            Self::Unguarded => None,
            Self::Expect(expected) => expected.as_ref(),
        }
    }
}

/// Partial update of a task's progress fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub guard: CursorGuard,
    pub cursor: Option<TaskCursor>,
    pub processed_count: Option<u64>,
    pub last_execution_time: Option<DateTime<Utc>>,
    pub completed: Option<bool>,
    pub errors: Option<TaskErrors>,
}

impl TaskPatch {
    /// The single record write that closes a batch.
    pub fn progress_commit(
        started_from: Option<TaskCursor>,
        cursor: Option<TaskCursor>,
        processed_count: u64,
        completed: bool,
        errors: TaskErrors,
    ) -> Self {
        Self {
            guard: CursorGuard::Expect(started_from),
            cursor,
            processed_count: Some(processed_count),
            last_execution_time: Some(Utc::now()),
            completed: Some(completed),
            errors: Some(errors),
        }
    }

    pub fn apply_to(&self, task: &mut Task) {
        if let Some(cursor) = &self.cursor {
            task.cursor = Some(cursor.clone());
        }
        if let Some(processed_count) = self.processed_count {
            task.processed_count = processed_count;
        }
        if let Some(at) = self.last_execution_time {
            task.last_execution_time = Some(at);
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        if let Some(errors) = &self.errors {
            task.errors = errors.clone();
        }
    }
}

/// Arguments for listing tasks, ordered by `created_at` then `id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskQuery {
    pub completed: Option<bool>,
    pub initiator_id: Option<String>,
    pub kind: Option<TaskKind>,
    pub first: Option<usize>,
    /// Return tasks strictly after this task in listing order
    pub after: Option<Uuid>,
}

impl TaskQuery {
    pub fn incomplete() -> Self {
        Self {
            completed: Some(false),
            ..Self::default()
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.completed.map_or(true, |c| task.completed == c)
            && self
                .initiator_id
                .as_deref()
                .map_or(true, |id| task.initiator_id == id)
            && self.kind.map_or(true, |k| task.kind() == k)
    }
}
