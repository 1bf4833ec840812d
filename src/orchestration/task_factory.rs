//! # Task Factory
//!
//! Validates creation requests and persists new task records.
//!
//! A QUERY task's `expected_count` is the store's total match count at creation
//! time, computed under the initiator's own access rights. A LIST task's
//! `expected_count` is the length of the supplied id list.

use crate::config::ExecutionConfig;
use crate::constants::{events, DEFAULT_MAX_LIST_TASK_IDS};
use crate::error::{Result, TaskerError};
use crate::logging::log_task_operation;
use crate::models::{
    validate_actions, AccessContext, ActionDescriptor, FilterDocument, Principal, Task,
};
use crate::query_builder::FilterCompiler;
use crate::store::{EntityStore, TaskRepository};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateQueryTaskInput {
    pub actions: Vec<ActionDescriptor>,
    pub filter_document: FilterDocument,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateListTaskInput {
    pub actions: Vec<ActionDescriptor>,
    pub ids: Vec<String>,
}

pub struct TaskFactory {
    repository: Arc<dyn TaskRepository>,
    entity_store: Arc<dyn EntityStore>,
    compiler: FilterCompiler,
    max_list_task_ids: usize,
}

impl TaskFactory {
    pub fn new(
        repository: Arc<dyn TaskRepository>,
        entity_store: Arc<dyn EntityStore>,
        compiler: FilterCompiler,
    ) -> Self {
        Self {
            repository,
            entity_store,
            compiler,
            max_list_task_ids: DEFAULT_MAX_LIST_TASK_IDS,
        }
    }

    pub fn with_execution_config(mut self, config: &ExecutionConfig) -> Self {
        self.max_list_task_ids = config.max_list_task_ids;
        self
    }

    #[instrument(skip(self, input), fields(initiator = %principal.id))]
    pub async fn create_query_task(
        &self,
        principal: &Principal,
        input: CreateQueryTaskInput,
    ) -> Result<Task> {
        validate_actions(&input.actions)?;
        // Only the count is needed here, so fetch a single row.
        let spec = self
            .compiler
            .compile(&input.filter_document, None)?
            .with_page_size(1)
            .with_total_count();

        let ctx = AccessContext::user(principal.clone());
        let page = self.entity_store.paginate(&ctx, &spec).await?;
        let expected_count = page.total_count.ok_or_else(|| {
            TaskerError::Transport("entity store returned a page without a total count".into())
        })?;
        debug!(total_count = expected_count, "Counted query task targets");

        let task = Task::new_query(
            principal.id.clone(),
            input.actions,
            input.filter_document,
            expected_count,
        );
        self.persist(&ctx, task).await
    }

    #[instrument(skip(self, input), fields(initiator = %principal.id, ids = input.ids.len()))]
    pub async fn create_list_task(
        &self,
        principal: &Principal,
        input: CreateListTaskInput,
    ) -> Result<Task> {
        validate_actions(&input.actions)?;
        if input.ids.is_empty() {
            return Err(TaskerError::InvalidInput(
                "missing payload for the task kind: LIST task needs at least one id".to_string(),
            ));
        }
        if let Some(position) = input.ids.iter().position(|id| id.trim().is_empty()) {
            return Err(TaskerError::InvalidInput(format!(
                "target id at position {position} is empty"
            )));
        }
        if input.ids.len() > self.max_list_task_ids {
            return Err(TaskerError::InvalidInput(format!(
                "LIST task accepts at most {} ids, got {}",
                self.max_list_task_ids,
                input.ids.len()
            )));
        }

        let ctx = AccessContext::user(principal.clone());
        let task = Task::new_list(principal.id.clone(), input.actions, input.ids);
        self.persist(&ctx, task).await
    }

    async fn persist(&self, ctx: &AccessContext, task: Task) -> Result<Task> {
        self.repository.create(ctx, &task).await?;
        log_task_operation(
            events::TASK_CREATED,
            task.id,
            &task.kind().to_string(),
            ctx.actor_id(),
            Some(&format!("expected_count={}", task.expected_count)),
        );
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActionType, TaskKind};
    use crate::store::{InMemoryEntityStore, InMemoryTaskRepository};

    fn factory() -> (TaskFactory, Arc<InMemoryTaskRepository>) {
        let repository = Arc::new(InMemoryTaskRepository::new());
        let store = Arc::new(InMemoryEntityStore::new());
        for i in 0..3 {
            store.insert("Report", format!("report-{i}"), []);
        }
        store.insert("Malware", "malware-0", []);
        let factory = TaskFactory::new(repository.clone(), store, FilterCompiler::default());
        (factory, repository)
    }

    fn delete() -> Vec<ActionDescriptor> {
        vec![ActionDescriptor::new(ActionType::Delete)]
    }

    #[tokio::test]
    async fn test_query_task_counts_matches() {
        let (factory, repository) = factory();
        let task = factory
            .create_query_task(
                &Principal::new("U1"),
                CreateQueryTaskInput {
                    actions: delete(),
                    filter_document: FilterDocument::new().with("entity_type", ["Report"]),
                },
            )
            .await
            .unwrap();

        assert_eq!(task.kind(), TaskKind::Query);
        assert_eq!(task.expected_count, 3);
        assert_eq!(task.processed_count, 0);
        assert!(!task.completed);
        assert_eq!(repository.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_actions_rejected_without_persisting() {
        let (factory, repository) = factory();
        let err = factory
            .create_list_task(
                &Principal::new("U1"),
                CreateListTaskInput {
                    actions: Vec::new(),
                    ids: vec!["a".into()],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TaskerError::InvalidActions(_)));
        assert!(repository.is_empty());
    }

    #[tokio::test]
    async fn test_list_bounds() {
        let (factory, _) = factory();
        let factory = factory.with_execution_config(&ExecutionConfig {
            max_list_task_ids: 2,
            ..ExecutionConfig::default()
        });
        let principal = Principal::new("U1");

        let rejected: [Vec<String>; 3] = [
            vec![],
            vec!["a".into(), " ".into()],
            vec!["a".into(), "b".into(), "c".into()],
        ];
        for ids in rejected {
            let err = factory
                .create_list_task(&principal, CreateListTaskInput { actions: delete(), ids })
                .await
                .unwrap_err();
            assert!(matches!(err, TaskerError::InvalidInput(_)));
        }

        let task = factory
            .create_list_task(
                &principal,
                CreateListTaskInput {
                    actions: delete(),
                    ids: vec!["a".into(), "a".into()],
                },
            )
            .await
            .unwrap();
        assert_eq!(task.expected_count, 2);
    }
}
