#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Bulk Task Core
//!
//! Resumable bulk-action task engine.
//!
//! ## Overview
//!
//! Given either a declarative filter over a large entity collection or an
//! explicit list of entity ids, the engine applies an ordered list of
//! administrative actions to every target entity in bounded batches. Progress
//! is persisted after every batch, so an interrupted task resumes from its
//! last committed cursor, and element failures are recorded without failing
//! the task.
//!
//! ## Module Organization
//!
//! - [`models`] - Task record, filter documents, action descriptors, access contexts
//! - [`query_builder`] - Filter compilation into cursor-resumable store queries
//! - [`orchestration`] - Task factory, executor, error accumulator, scheduler
//! - [`state_machine`] - Executor lifecycle states and transitions
//! - [`store`] - Store traits and in-memory implementations
//! - [`database`] - PostgreSQL implementations of the store traits
//! - [`registry`] - Per-action-type handler registry
//! - [`services`] - Public task operations
//! - [`config`] - Layered configuration
//! - [`logging`] - Structured logging setup
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bulk_task_core::config::BulkTaskConfig;
//! use bulk_task_core::models::{AccessContext, FilterDocument, Principal};
//! use bulk_task_core::orchestration::{
//!     AllowAllAuthorizer, CreateQueryTaskInput, ExecutionOutcome, TaskExecutor,
//! };
//! use bulk_task_core::query_builder::FilterCompiler;
//! use bulk_task_core::registry::RegistryActionEngine;
//! use bulk_task_core::services::TaskService;
//! use bulk_task_core::store::{InMemoryEntityStore, InMemoryTaskRepository};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BulkTaskConfig::from_env()?;
//! let repository = Arc::new(InMemoryTaskRepository::new());
//! let entities = Arc::new(InMemoryEntityStore::new());
//!
//! let service = TaskService::from_config(&config, repository.clone(), entities.clone());
//! let task = service
//!     .create_query_task(
//!         &Principal::new("U1"),
//!         CreateQueryTaskInput {
//!             actions: serde_json::from_str(r#"[{"type": "DELETE"}]"#)?,
//!             filter_document: FilterDocument::parse(r#"{"entity_type": [{"id": "Report"}]}"#)?,
//!         },
//!     )
//!     .await?;
//!
//! let executor = TaskExecutor::new(
//!     repository,
//!     entities,
//!     Arc::new(RegistryActionEngine::default()),
//!     Arc::new(AllowAllAuthorizer),
//!     FilterCompiler::default(),
//!     config.execution.clone(),
//! );
//! let outcome = executor.run(&AccessContext::system("U1"), task.id).await?;
//! assert!(matches!(outcome, ExecutionOutcome::Completed(_)));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
#[cfg(feature = "postgres")]
pub mod database;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod query_builder;
pub mod registry;
pub mod services;
pub mod state_machine;
pub mod store;

pub use config::{BulkTaskConfig, DatabaseConfig, ExecutionConfig, FilterConfig};
pub use error::{Result, TaskerError};
pub use models::{
    AccessContext, ActionDescriptor, ActionType, FilterDocument, Principal, Task, TaskCursor,
    TaskKind, TaskPatch, TaskQuery,
};
pub use orchestration::{ExecutionOutcome, TaskExecutor, TaskFactory, TaskScheduler};
pub use services::TaskService;
pub use state_machine::{AbortReason, TaskExecutionState};
