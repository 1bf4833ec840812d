//! # Orchestration Engine
//!
//! Creation and resumable execution of bulk tasks.
//!
//! ## Core Components
//!
//! - **TaskFactory**: Validates creation requests and persists QUERY and LIST tasks
//! - **TaskExecutor**: Runs the batch iteration protocol with cursor-guarded commits
//! - **ErrorAccumulator**: Bounded element-failure recording
//! - **TaskLeaseRegistry**: In-process exclusion of concurrent executor loops
//! - **TaskScheduler**: Polling loop that advances incomplete tasks round-robin
//!
//! The executor depends on its collaborators only through the traits in
//! [`types`] and [`crate::store`], so the engine runs the same over the
//! in-memory stores and the PostgreSQL adapters.

pub mod error_accumulator;
pub mod task_executor;
pub mod task_factory;
pub mod task_lease;
pub mod task_scheduler;
pub mod types;

pub use error_accumulator::ErrorAccumulator;
pub use task_executor::TaskExecutor;
pub use task_factory::{CreateListTaskInput, CreateQueryTaskInput, TaskFactory};
pub use task_lease::{TaskLease, TaskLeaseRegistry};
pub use task_scheduler::{SchedulerTickSummary, TaskScheduler};
pub use types::{
    ActionEngine, AllowAllAuthorizer, CompletionSummary, ExecutionOutcome, IterationOutcome,
    PrincipalAuthorizer,
};
