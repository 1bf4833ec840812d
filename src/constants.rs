//! # System Constants
//!
//! Operational boundaries of the bulk task engine and the string identifiers
//! used on the wire and in structured logs.

/// Default upper bound on elements fetched and processed per executor iteration.
pub const MAX_TASK_ELEMENTS: usize = 500;

/// Default number of element failures retained in detail per task.
pub const DEFAULT_MAX_RETAINED_ERRORS: usize = 100;

/// Default upper bound on ids accepted by a single LIST task.
pub const DEFAULT_MAX_LIST_TASK_IDS: usize = 100_000;

/// Default per-element action timeout.
pub const DEFAULT_ELEMENT_TIMEOUT_MS: u64 = 30_000;

/// Default scheduler polling interval.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;

/// Filter key that restricts the entity types instead of filtering a field.
pub const ENTITY_TYPE_FILTER_KEY: &str = "entity_type";

/// Store field every query is ordered by; assigned monotonically on insert.
pub const INTERNAL_ID_FIELD: &str = "internal_id";

/// Task kind identifiers as persisted.
pub mod task_kinds {
    pub const QUERY: &str = "QUERY";
    pub const LIST: &str = "LIST";
}

/// Structured log event names emitted by the engine
pub mod events {
    pub const TASK_CREATED: &str = "task.created";
    pub const TASK_DELETED: &str = "task.deleted";
    pub const TASK_BATCH_COMMITTED: &str = "task.batch_committed";
    pub const TASK_COMPLETED: &str = "task.completed";
    pub const TASK_ABORTED: &str = "task.aborted";
    pub const TASK_ITERATION_FAILED: &str = "task.iteration_failed";
    pub const ELEMENT_FAILED: &str = "element.failed";
}
