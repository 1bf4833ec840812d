//! Test collaborators: recording action engine, fault-injecting store
//! decorators and a switchable authorizer.

use async_trait::async_trait;
use bulk_task_core::config::ExecutionConfig;
use bulk_task_core::error::{Result, TaskerError};
use bulk_task_core::models::{
    AccessContext, ActionDescriptor, ActionFailure, ActionType, Task, TaskPatch, TaskQuery,
};
use bulk_task_core::orchestration::{ActionEngine, PrincipalAuthorizer, TaskExecutor};
use bulk_task_core::query_builder::{FilterCompiler, QuerySpec};
use bulk_task_core::store::{
    EntityStore, InMemoryEntityStore, InMemoryTaskRepository, Page, TaskRepository,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

pub fn ctx() -> AccessContext {
    AccessContext::system("integration-tests")
}

pub fn delete_actions() -> Vec<ActionDescriptor> {
    vec![ActionDescriptor::new(ActionType::Delete)]
}

/// Store with `count` Report entities named `report-{i}`.
pub fn seeded_store(count: usize) -> Arc<InMemoryEntityStore> {
    let store = Arc::new(InMemoryEntityStore::new());
    for i in 0..count {
        store.insert("Report", format!("report-{i}"), []);
    }
    store
}

/// Records every element it is applied to and fails the configured ids.
#[derive(Default)]
pub struct RecordingActionEngine {
    applied: Mutex<Vec<String>>,
    failing: HashSet<String>,
}

impl RecordingActionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            applied: Mutex::new(Vec::new()),
            failing: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn applied(&self) -> Vec<String> {
        self.applied.lock().clone()
    }
}

#[async_trait]
impl ActionEngine for RecordingActionEngine {
    async fn apply(
        &self,
        _ctx: &AccessContext,
        entity_id: &str,
        _actions: &[ActionDescriptor],
    ) -> std::result::Result<(), ActionFailure> {
        self.applied.lock().push(entity_id.to_string());
        if self.failing.contains(entity_id) {
            Err(ActionFailure::new(format!("cannot process {entity_id}")))
        } else {
            Ok(())
        }
    }
}

/// Never finishes; used to exercise the per-element timeout.
pub struct HangingActionEngine;

#[async_trait]
impl ActionEngine for HangingActionEngine {
    async fn apply(
        &self,
        _ctx: &AccessContext,
        _entity_id: &str,
        _actions: &[ActionDescriptor],
    ) -> std::result::Result<(), ActionFailure> {
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Authorizer that can be revoked mid-run.
#[derive(Default)]
pub struct SwitchableAuthorizer {
    revoked: AtomicBool,
}

impl SwitchableAuthorizer {
    pub fn revoke(&self) {
        self.revoked.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl PrincipalAuthorizer for SwitchableAuthorizer {
    async fn is_authorized(&self, _ctx: &AccessContext, _initiator_id: &str) -> Result<bool> {
        Ok(!self.revoked.load(Ordering::SeqCst))
    }
}

/// Repository decorator that fails the next `n` patches with a transport error.
pub struct FlakyTaskRepository {
    inner: Arc<InMemoryTaskRepository>,
    failing_patches: AtomicUsize,
    patch_calls: AtomicUsize,
}

impl FlakyTaskRepository {
    pub fn new(inner: Arc<InMemoryTaskRepository>) -> Self {
        Self {
            inner,
            failing_patches: AtomicUsize::new(0),
            patch_calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_next_patches(&self, n: usize) {
        self.failing_patches.store(n, Ordering::SeqCst);
    }

    pub fn patch_calls(&self) -> usize {
        self.patch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TaskRepository for FlakyTaskRepository {
    async fn create(&self, ctx: &AccessContext, task: &Task) -> Result<()> {
        self.inner.create(ctx, task).await
    }

    async fn find_by_id(&self, ctx: &AccessContext, id: Uuid) -> Result<Option<Task>> {
        self.inner.find_by_id(ctx, id).await
    }

    async fn find_all(&self, ctx: &AccessContext, query: &TaskQuery) -> Result<Vec<Task>> {
        self.inner.find_all(ctx, query).await
    }

    async fn patch(&self, ctx: &AccessContext, id: Uuid, patch: &TaskPatch) -> Result<Task> {
        self.patch_calls.fetch_add(1, Ordering::SeqCst);
        let should_fail = self
            .failing_patches
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(TaskerError::Transport("connection reset".to_string()));
        }
        self.inner.patch(ctx, id, patch).await
    }

    async fn delete(&self, ctx: &AccessContext, id: Uuid) -> Result<bool> {
        self.inner.delete(ctx, id).await
    }
}

/// Entity store decorator that fails the next `n` page fetches.
pub struct FlakyEntityStore {
    inner: Arc<InMemoryEntityStore>,
    failing_pages: AtomicUsize,
}

impl FlakyEntityStore {
    pub fn new(inner: Arc<InMemoryEntityStore>) -> Self {
        Self {
            inner,
            failing_pages: AtomicUsize::new(0),
        }
    }

    pub fn fail_next_pages(&self, n: usize) {
        self.failing_pages.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl EntityStore for FlakyEntityStore {
    async fn paginate(&self, ctx: &AccessContext, spec: &QuerySpec) -> Result<Page> {
        let should_fail = self
            .failing_pages
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(TaskerError::Transport("store unreachable".to_string()));
        }
        self.inner.paginate(ctx, spec).await
    }
}

pub fn executor_with(
    repository: Arc<dyn TaskRepository>,
    store: Arc<dyn EntityStore>,
    engine: Arc<dyn ActionEngine>,
    authorizer: Arc<dyn PrincipalAuthorizer>,
    config: ExecutionConfig,
) -> TaskExecutor {
    TaskExecutor::new(
        repository,
        store,
        engine,
        authorizer,
        FilterCompiler::default(),
        config,
    )
}

pub fn batch_config(batch_limit: usize) -> ExecutionConfig {
    ExecutionConfig {
        batch_limit,
        ..ExecutionConfig::default()
    }
}
