use crate::error::Result;
use crate::models::{AccessContext, Task, TaskCursor, TaskPatch, TaskQuery};
use crate::query_builder::QuerySpec;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One page of a filtered traversal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Entity ids, in traversal order
    pub elements: Vec<String>,
    /// Token resuming strictly after the last element; `None` when the page is empty
    pub next_cursor: Option<TaskCursor>,
    /// Matches for the filters, ignoring the cursor; only counted when the
    /// spec asks for it
    pub total_count: Option<u64>,
}

/// Paginated read access to the entity collection a QUERY task traverses.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn paginate(&self, ctx: &AccessContext, spec: &QuerySpec) -> Result<Page>;
}

/// Persistence of task records.
///
/// Implementations must make [`TaskRepository::patch`] a single atomic record
/// write, failing with `TaskNotFound` when the record is gone and with
/// `ConcurrentModification` when the patch guard does not admit the stored
/// cursor.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, ctx: &AccessContext, task: &Task) -> Result<()>;

    async fn find_by_id(&self, ctx: &AccessContext, id: Uuid) -> Result<Option<Task>>;

    async fn find_all(&self, ctx: &AccessContext, query: &TaskQuery) -> Result<Vec<Task>>;

    async fn patch(&self, ctx: &AccessContext, id: Uuid, patch: &TaskPatch) -> Result<Task>;

    /// Returns whether a record was removed.
    async fn delete(&self, ctx: &AccessContext, id: Uuid) -> Result<bool>;
}
