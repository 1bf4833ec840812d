//! # Task Service
//!
//! The public operation surface of the engine: task creation, lookup,
//! listing, cancellation and progress patching.
//!
//! ```rust
//! use bulk_task_core::models::{AccessContext, ActionDescriptor, ActionType, Principal, TaskQuery};
//! use bulk_task_core::orchestration::CreateListTaskInput;
//! use bulk_task_core::services::TaskService;
//! use bulk_task_core::store::{InMemoryEntityStore, InMemoryTaskRepository};
//! use std::sync::Arc;
//!
//! # async fn example() -> bulk_task_core::error::Result<()> {
//! let service = TaskService::new(
//!     Arc::new(InMemoryTaskRepository::new()),
//!     Arc::new(InMemoryEntityStore::new()),
//! );
//! let principal = Principal::new("U1");
//! let task = service
//!     .create_list_task(
//!         &principal,
//!         CreateListTaskInput {
//!             actions: vec![ActionDescriptor::new(ActionType::Delete)],
//!             ids: vec!["a".into(), "b".into()],
//!         },
//!     )
//!     .await?;
//! let ctx = AccessContext::user(principal);
//! assert!(service.find_task_by_id(&ctx, task.id).await?.is_some());
//! assert_eq!(service.find_all_tasks(&ctx, &TaskQuery::incomplete()).await?.len(), 1);
//! # Ok(())
//! # }
//! ```

use crate::config::BulkTaskConfig;
use crate::constants::events;
use crate::error::{Result, TaskerError};
use crate::logging::log_task_operation;
use crate::models::{AccessContext, Principal, Task, TaskPatch, TaskQuery};
use crate::orchestration::{CreateListTaskInput, CreateQueryTaskInput, TaskFactory};
use crate::query_builder::{FilterAliasTable, FilterCompiler};
use crate::store::{EntityStore, TaskRepository};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

pub struct TaskService {
    factory: TaskFactory,
    repository: Arc<dyn TaskRepository>,
}

impl TaskService {
    pub fn new(repository: Arc<dyn TaskRepository>, entity_store: Arc<dyn EntityStore>) -> Self {
        let factory = TaskFactory::new(
            Arc::clone(&repository),
            entity_store,
            FilterCompiler::default(),
        );
        Self {
            factory,
            repository,
        }
    }

    pub fn from_config(
        config: &BulkTaskConfig,
        repository: Arc<dyn TaskRepository>,
        entity_store: Arc<dyn EntityStore>,
    ) -> Self {
        let compiler = FilterCompiler::new(
            FilterAliasTable::from_config(&config.filters),
            config.execution.batch_limit,
        );
        let factory = TaskFactory::new(Arc::clone(&repository), entity_store, compiler)
            .with_execution_config(&config.execution);
        Self {
            factory,
            repository,
        }
    }

    pub async fn create_query_task(
        &self,
        principal: &Principal,
        input: CreateQueryTaskInput,
    ) -> Result<Task> {
        self.factory.create_query_task(principal, input).await
    }

    pub async fn create_list_task(
        &self,
        principal: &Principal,
        input: CreateListTaskInput,
    ) -> Result<Task> {
        self.factory.create_list_task(principal, input).await
    }

    pub async fn find_task_by_id(&self, ctx: &AccessContext, id: Uuid) -> Result<Option<Task>> {
        self.repository.find_by_id(ctx, id).await
    }

    pub async fn find_all_tasks(&self, ctx: &AccessContext, query: &TaskQuery) -> Result<Vec<Task>> {
        self.repository.find_all(ctx, query).await
    }

    /// Cancel a task by deleting its record.
    ///
    /// A running executor notices at its next re-read or commit and stops
    /// without writing.
    #[instrument(skip(self), fields(actor = %ctx))]
    pub async fn delete_task(&self, ctx: &AccessContext, id: Uuid) -> Result<Uuid> {
        if !self.repository.delete(ctx, id).await? {
            return Err(TaskerError::TaskNotFound(id));
        }
        log_task_operation(events::TASK_DELETED, id, "-", ctx.actor_id(), None);
        Ok(id)
    }

    pub async fn patch_task(&self, ctx: &AccessContext, id: Uuid, patch: &TaskPatch) -> Result<Task> {
        self.repository.patch(ctx, id, patch).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActionDescriptor, ActionType, FilterDocument};
    use crate::store::{InMemoryEntityStore, InMemoryTaskRepository};

    fn service() -> TaskService {
        let store = Arc::new(InMemoryEntityStore::new());
        store.insert("Report", "report-0", []);
        TaskService::new(Arc::new(InMemoryTaskRepository::new()), store)
    }

    #[tokio::test]
    async fn test_delete_task_cancels_once() {
        let service = service();
        let principal = Principal::new("U1");
        let task = service
            .create_query_task(
                &principal,
                CreateQueryTaskInput {
                    actions: vec![ActionDescriptor::new(ActionType::Delete)],
                    filter_document: FilterDocument::new(),
                },
            )
            .await
            .unwrap();
        assert_eq!(task.expected_count, 1);

        let ctx = AccessContext::user(principal);
        assert_eq!(service.delete_task(&ctx, task.id).await.unwrap(), task.id);
        assert_eq!(
            service.delete_task(&ctx, task.id).await.unwrap_err(),
            TaskerError::TaskNotFound(task.id)
        );
        assert!(service.find_task_by_id(&ctx, task.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_patch_task_unguarded() {
        let service = service();
        let principal = Principal::new("U1");
        let task = service
            .create_list_task(
                &principal,
                CreateListTaskInput {
                    actions: vec![ActionDescriptor::new(ActionType::Delete)],
                    ids: vec!["a".into()],
                },
            )
            .await
            .unwrap();

        let ctx = AccessContext::system("U1");
        let patched = service
            .patch_task(
                &ctx,
                task.id,
                &TaskPatch {
                    completed: Some(true),
                    ..TaskPatch::default()
                },
            )
            .await
            .unwrap();
        assert!(patched.completed);
    }
}
