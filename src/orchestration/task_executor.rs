//! # Task Executor
//!
//! Drives a task to completion in bounded, resumable iterations.
//!
//! ## Iteration Protocol
//!
//! 1. Re-read the task record; a missing record aborts with `Cancelled`.
//! 2. Check that the initiator is still authorized.
//! 3. Fetch the next batch: QUERY tasks page the entity store from the persisted
//!    cursor, LIST tasks slice `target_ids[processed_count..]`.
//! 4. An empty batch marks the task completed.
//! 5. Apply the action list to every element. Element failures go to the error
//!    accumulator and never stop the batch.
//! 6. Commit cursor, `processed_count`, errors and completion in one record
//!    write, guarded on the cursor the batch started from.
//!
//! A transport failure anywhere in the iteration returns an error without
//! advancing progress, so calling the executor again resumes from the last
//! committed cursor. A lost cursor guard means another executor advanced the
//! task; this executor stops with `Superseded` and writes nothing.
//!
//! Elements of a committed-then-failed batch may be applied again on resume,
//! so actions are expected to tolerate being applied more than once.

use super::error_accumulator::ErrorAccumulator;
use super::task_lease::TaskLeaseRegistry;
use super::types::{
    ActionEngine, CompletionSummary, ExecutionOutcome, IterationOutcome, PrincipalAuthorizer,
};
use crate::config::ExecutionConfig;
use crate::constants::events;
use crate::error::{Result, TaskerError};
use crate::logging::{log_batch_commit, log_task_operation};
use crate::models::{AccessContext, ActionFailure, Task, TaskCursor, TaskPatch, TaskPayload};
use crate::query_builder::FilterCompiler;
use crate::state_machine::{AbortReason, ExecutionEvent, TaskExecutionState};
use crate::store::{EntityStore, TaskRepository};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Elements fetched for one iteration.
#[derive(Debug, Clone, PartialEq)]
struct Batch {
    elements: Vec<String>,
    next_cursor: Option<TaskCursor>,
    /// The source has nothing beyond this batch
    exhausted: bool,
}

pub struct TaskExecutor {
    repository: Arc<dyn TaskRepository>,
    entity_store: Arc<dyn EntityStore>,
    action_engine: Arc<dyn ActionEngine>,
    authorizer: Arc<dyn PrincipalAuthorizer>,
    compiler: FilterCompiler,
    accumulator: ErrorAccumulator,
    leases: TaskLeaseRegistry,
    config: ExecutionConfig,
}

impl TaskExecutor {
    pub fn new(
        repository: Arc<dyn TaskRepository>,
        entity_store: Arc<dyn EntityStore>,
        action_engine: Arc<dyn ActionEngine>,
        authorizer: Arc<dyn PrincipalAuthorizer>,
        compiler: FilterCompiler,
        mut config: ExecutionConfig,
    ) -> Self {
        if config.batch_limit == 0 || config.element_concurrency == 0 {
            warn!(
                batch_limit = config.batch_limit,
                element_concurrency = config.element_concurrency,
                "Zero execution limits raised to 1"
            );
            config.batch_limit = config.batch_limit.max(1);
            config.element_concurrency = config.element_concurrency.max(1);
        }
        Self {
            repository,
            entity_store,
            action_engine,
            authorizer,
            compiler,
            accumulator: ErrorAccumulator::new(config.max_retained_errors),
            leases: TaskLeaseRegistry::new(),
            config,
        }
    }

    /// Share a lease registry with other executors in this process.
    pub fn with_lease_registry(mut self, leases: TaskLeaseRegistry) -> Self {
        self.leases = leases;
        self
    }

    pub fn lease_registry(&self) -> &TaskLeaseRegistry {
        &self.leases
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Run iterations until the task completes or aborts.
    ///
    /// `ctx` is the privileged context used for every task record read and
    /// write. Returns `AlreadyRunning` if another loop in this process holds
    /// the task.
    #[instrument(skip(self, ctx), fields(actor = %ctx))]
    pub async fn run(&self, ctx: &AccessContext, task_id: Uuid) -> Result<ExecutionOutcome> {
        let _lease = self.leases.acquire(task_id)?;
        loop {
            match self.iterate(ctx, task_id).await? {
                IterationOutcome::Continue { processed_count } => {
                    debug!(task_id = %task_id, processed_count, "Continuing task");
                }
                IterationOutcome::Completed(summary) => {
                    return Ok(ExecutionOutcome::Completed(summary))
                }
                IterationOutcome::Aborted(reason) => return Ok(ExecutionOutcome::Aborted(reason)),
            }
        }
    }

    /// Run exactly one iteration under the task's lease.
    pub async fn execute_iteration(
        &self,
        ctx: &AccessContext,
        task_id: Uuid,
    ) -> Result<IterationOutcome> {
        let _lease = self.leases.acquire(task_id)?;
        self.iterate(ctx, task_id).await
    }

    #[instrument(skip(self, ctx))]
    async fn iterate(&self, ctx: &AccessContext, task_id: Uuid) -> Result<IterationOutcome> {
        let state = TaskExecutionState::Pending;

        let Some(task) = self.repository.find_by_id(ctx, task_id).await? else {
            return self.abort(state, task_id, AbortReason::Cancelled);
        };
        if task.completed {
            return Ok(IterationOutcome::Completed(summary_of(&task)));
        }
        let authorized = match self.authorizer.is_authorized(ctx, &task.initiator_id).await {
            Ok(authorized) => authorized,
            Err(TaskerError::AuthorizationRevoked { .. }) => false,
            Err(error) => return Err(error),
        };
        if !authorized {
            return self.abort(state, task_id, AbortReason::AuthorizationRevoked);
        }

        let state = state.transition(ExecutionEvent::BatchStarted)?;
        let batch = match self.fetch_batch(&task).await {
            Ok(batch) => batch,
            Err(error) => return self.fail_batch(state, &task, error),
        };

        if batch.elements.is_empty() {
            let patch = TaskPatch::progress_commit(
                task.cursor.clone(),
                task.cursor.clone(),
                task.processed_count,
                true,
                task.errors.clone(),
            );
            return match self.commit(ctx, &task, &patch).await {
                Ok(committed) => self.complete(state, &committed, 0, 0),
                Err(CommitError::Aborted(reason)) => self.abort(state, task_id, reason),
                Err(CommitError::Failed(error)) => self.fail_batch(state, &task, error),
            };
        }

        let actor = AccessContext::system(task.initiator_id.clone());
        let failures = self.apply_batch(&actor, &task, &batch.elements).await;

        let mut errors = task.errors.clone();
        for (entity_id, failure) in &failures {
            warn!(
                task_id = %task.id,
                entity_id = %entity_id,
                error = %failure,
                event = events::ELEMENT_FAILED,
                "Action sequence failed for element"
            );
            self.accumulator
                .record(&mut errors, entity_id.clone(), failure.message.clone());
        }

        let batch_len = batch.elements.len();
        let processed_count = (task.processed_count + batch_len as u64).min(task.expected_count);
        let completed = batch.exhausted || processed_count >= task.expected_count;
        let patch = TaskPatch::progress_commit(
            task.cursor.clone(),
            batch.next_cursor.clone(),
            processed_count,
            completed,
            errors,
        );

        let committed = match self.commit(ctx, &task, &patch).await {
            Ok(committed) => committed,
            Err(CommitError::Aborted(reason)) => return self.abort(state, task_id, reason),
            Err(CommitError::Failed(error)) => return self.fail_batch(state, &task, error),
        };
        log_batch_commit(
            task.id,
            batch_len,
            committed.processed_count,
            committed.expected_count,
            failures.len(),
            committed.cursor.as_ref().map(TaskCursor::as_str),
        );

        if committed.completed {
            self.complete(state, &committed, batch_len, failures.len())
        } else {
            state.transition(ExecutionEvent::BatchCommitted)?;
            Ok(IterationOutcome::Continue {
                processed_count: committed.processed_count,
            })
        }
    }

    async fn fetch_batch(&self, task: &Task) -> Result<Batch> {
        match &task.payload {
            TaskPayload::Query { filter_document } => {
                let remaining = task.remaining();
                if remaining == 0 {
                    return Ok(Batch {
                        elements: Vec::new(),
                        next_cursor: task.cursor.clone(),
                        exhausted: true,
                    });
                }
                // Never page past expected_count, so processed_count stays bounded by it.
                let page_size = usize::try_from(remaining)
                    .map_or(self.config.batch_limit, |r| r.min(self.config.batch_limit));
                let spec = self
                    .compiler
                    .compile(filter_document, task.cursor.as_ref())?
                    .with_page_size(page_size);
                let actor = AccessContext::system(task.initiator_id.clone());
                let page = self.entity_store.paginate(&actor, &spec).await?;

                let exhausted = page.next_cursor.is_none();
                Ok(Batch {
                    next_cursor: page.next_cursor.or_else(|| task.cursor.clone()),
                    elements: page.elements,
                    exhausted,
                })
            }
            TaskPayload::List { target_ids } => {
                let start = usize::try_from(task.processed_count)
                    .map_err(|_| TaskerError::InvalidInput("processed_count overflow".into()))?
                    .min(target_ids.len());
                let end = (start + self.config.batch_limit).min(target_ids.len());
                Ok(Batch {
                    elements: target_ids[start..end].to_vec(),
                    next_cursor: Some(TaskCursor::from_offset(end as u64)),
                    exhausted: end == target_ids.len(),
                })
            }
        }
    }

    /// Apply the action list to each element; returns failures in batch order.
    async fn apply_batch(
        &self,
        actor: &AccessContext,
        task: &Task,
        elements: &[String],
    ) -> Vec<(String, ActionFailure)> {
        let concurrency = self.config.element_concurrency;
        let timeout = self.config.element_timeout();

        stream::iter(elements)
            .map(|entity_id| async move {
                let applied = tokio::time::timeout(
                    timeout,
                    self.action_engine.apply(actor, entity_id, &task.actions),
                )
                .await
                .unwrap_or_else(|_| {
                    Err(ActionFailure::new(format!(
                        "action sequence timed out after {}ms",
                        timeout.as_millis()
                    )))
                });
                (entity_id, applied)
            })
            // `buffered` yields in input order regardless of completion order.
            .buffered(concurrency)
            .filter_map(|(entity_id, applied)| async move {
                applied.err().map(|failure| (entity_id.clone(), failure))
            })
            .boxed()
            .collect()
            .await
    }

    async fn commit(
        &self,
        ctx: &AccessContext,
        task: &Task,
        patch: &TaskPatch,
    ) -> std::result::Result<Task, CommitError> {
        match self.repository.patch(ctx, task.id, patch).await {
            Ok(committed) => Ok(committed),
            Err(TaskerError::TaskNotFound(_)) => Err(CommitError::Aborted(AbortReason::Cancelled)),
            Err(TaskerError::ConcurrentModification { .. }) => {
                Err(CommitError::Aborted(AbortReason::Superseded))
            }
            Err(TaskerError::AuthorizationRevoked { .. }) => {
                Err(CommitError::Aborted(AbortReason::AuthorizationRevoked))
            }
            Err(error) => Err(CommitError::Failed(error)),
        }
    }

    fn complete(
        &self,
        state: TaskExecutionState,
        task: &Task,
        batch_len: usize,
        batch_failures: usize,
    ) -> Result<IterationOutcome> {
        state.transition(ExecutionEvent::Exhausted)?;
        log_task_operation(
            events::TASK_COMPLETED,
            task.id,
            &task.kind().to_string(),
            &task.initiator_id,
            Some(&format!(
                "processed_count={} expected_count={} total_failures={}",
                task.processed_count, task.expected_count, task.errors.total_failures
            )),
        );
        debug!(task_id = %task.id, batch_len, batch_failures, "Final batch committed");
        Ok(IterationOutcome::Completed(summary_of(task)))
    }

    fn abort(
        &self,
        state: TaskExecutionState,
        task_id: Uuid,
        reason: AbortReason,
    ) -> Result<IterationOutcome> {
        state.transition(ExecutionEvent::Abort(reason))?;
        info!(task_id = %task_id, reason = %reason, event = events::TASK_ABORTED, "Task aborted");
        Ok(IterationOutcome::Aborted(reason))
    }

    fn fail_batch(
        &self,
        state: TaskExecutionState,
        task: &Task,
        error: TaskerError,
    ) -> Result<IterationOutcome> {
        state.transition(ExecutionEvent::BatchFailed)?;
        warn!(
            task_id = %task.id,
            cursor = task.cursor.as_ref().map(TaskCursor::as_str),
            processed_count = task.processed_count,
            error = %error,
            event = events::TASK_ITERATION_FAILED,
            "Iteration failed, task remains resumable"
        );
        Err(error)
    }
}

enum CommitError {
    Aborted(AbortReason),
    Failed(TaskerError),
}

fn summary_of(task: &Task) -> CompletionSummary {
    CompletionSummary {
        processed_count: task.processed_count,
        expected_count: task.expected_count,
        error_count: task.errors.total_failures,
    }
}
