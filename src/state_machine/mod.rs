//! Explicit execution state machine for bulk tasks.
//!
//! Persisted records only carry `completed`; the executor tracks the full
//! Pending -> Running -> {Completed | Aborted} lifecycle with these types.

pub mod events;
pub mod states;

pub use events::ExecutionEvent;
pub use states::{AbortReason, TaskExecutionState};
