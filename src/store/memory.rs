//! In-memory store implementations.
//!
//! Suitable for embedding the engine without a database and for tests. Both
//! stores keep the same ordering and atomicity guarantees as the PostgreSQL
//! adapters.

use super::traits::{EntityStore, Page, TaskRepository};
use crate::constants::INTERNAL_ID_FIELD;
use crate::error::{Result, TaskerError};
use crate::models::{AccessContext, Task, TaskCursor, TaskPatch, TaskQuery};
use crate::query_builder::{QuerySpec, SortDirection};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use tracing::debug;
use uuid::Uuid;

/// Task records keyed by id.
#[derive(Debug, Default)]
pub struct InMemoryTaskRepository {
    tasks: DashMap<Uuid, Task>,
}

impl InMemoryTaskRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn create(&self, ctx: &AccessContext, task: &Task) -> Result<()> {
        debug!(task_id = %task.id, actor = %ctx, "Creating task record");
        if self.tasks.contains_key(&task.id) {
            return Err(TaskerError::InvalidInput(format!(
                "task {} already exists",
                task.id
            )));
        }
        self.tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn find_by_id(&self, _ctx: &AccessContext, id: Uuid) -> Result<Option<Task>> {
        Ok(self.tasks.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_all(&self, _ctx: &AccessContext, query: &TaskQuery) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .tasks
            .iter()
            .filter(|entry| query.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        tasks.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));

        if let Some(after) = query.after {
            match tasks.iter().position(|t| t.id == after) {
                Some(index) => {
                    tasks.drain(..=index);
                }
                None => {
                    let anchor = self.tasks.get(&after).map(|t| (t.created_at, t.id));
                    tasks.retain(|t| anchor.map_or(true, |a| (t.created_at, t.id) > a));
                }
            }
        }
        if let Some(first) = query.first {
            tasks.truncate(first);
        }
        Ok(tasks)
    }

    async fn patch(&self, ctx: &AccessContext, id: Uuid, patch: &TaskPatch) -> Result<Task> {
        // The entry guard holds the shard lock, so check-and-apply is atomic.
        let mut entry = self.tasks.get_mut(&id).ok_or(TaskerError::TaskNotFound(id))?;
        if !patch.guard.admits(entry.cursor.as_ref()) {
            return Err(TaskerError::ConcurrentModification {
                task_id: id,
                expected: patch.guard.expected().map(|c| c.to_string()),
            });
        }
        patch.apply_to(entry.value_mut());
        debug!(task_id = %id, actor = %ctx, "Patched task record");
        Ok(entry.value().clone())
    }

    async fn delete(&self, ctx: &AccessContext, id: Uuid) -> Result<bool> {
        debug!(task_id = %id, actor = %ctx, "Deleting task record");
        Ok(self.tasks.remove(&id).is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct StoredEntity {
    entity_id: String,
    entity_type: String,
    attributes: HashMap<String, Vec<String>>,
}

impl StoredEntity {
    fn matches(&self, spec: &QuerySpec) -> bool {
        (spec.types.is_empty() || spec.types.contains(&self.entity_type))
            && spec.field_filters.iter().all(|filter| {
                self.attributes
                    .get(&filter.field)
                    .is_some_and(|values| values.iter().any(|v| filter.values.contains(v)))
            })
    }
}

#[derive(Debug, Default)]
struct EntityIndex {
    next_internal_id: u64,
    by_internal_id: BTreeMap<u64, StoredEntity>,
}

/// Entity collection ordered by a monotonically assigned internal id.
#[derive(Debug, Default)]
pub struct InMemoryEntityStore {
    index: RwLock<EntityIndex>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entity and return its internal id.
    pub fn insert(
        &self,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        attributes: impl IntoIterator<Item = (String, Vec<String>)>,
    ) -> u64 {
        let mut index = self.index.write();
        index.next_internal_id += 1;
        let internal_id = index.next_internal_id;
        index.by_internal_id.insert(
            internal_id,
            StoredEntity {
                entity_id: entity_id.into(),
                entity_type: entity_type.into(),
                attributes: attributes.into_iter().collect(),
            },
        );
        internal_id
    }

    /// Remove an entity by its external id.
    pub fn remove(&self, entity_id: &str) -> bool {
        let mut index = self.index.write();
        let found = index
            .by_internal_id
            .iter()
            .find(|(_, entity)| entity.entity_id == entity_id)
            .map(|(internal_id, _)| *internal_id);
        found.is_some_and(|internal_id| index.by_internal_id.remove(&internal_id).is_some())
    }

    pub fn len(&self) -> usize {
        self.index.read().by_internal_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn paginate(&self, _ctx: &AccessContext, spec: &QuerySpec) -> Result<Page> {
        if spec.order.field != INTERNAL_ID_FIELD || spec.order.direction != SortDirection::Asc {
            return Err(TaskerError::InvalidInput(format!(
                "unsupported order {:?} on {}",
                spec.order.direction, spec.order.field
            )));
        }
        let lower = match &spec.resume_after {
            Some(cursor) => Bound::Excluded(cursor.as_offset().ok_or_else(|| {
                TaskerError::InvalidInput(format!("malformed entity cursor '{cursor}'"))
            })?),
            None => Bound::Unbounded,
        };

        let index = self.index.read();
        let total_count = spec.include_total.then(|| {
            index
                .by_internal_id
                .values()
                .filter(|entity| entity.matches(spec))
                .count() as u64
        });

        let page: Vec<(u64, String)> = index
            .by_internal_id
            .range((lower, Bound::Unbounded))
            .filter(|(_, entity)| entity.matches(spec))
            .take(spec.page_size)
            .map(|(internal_id, entity)| (*internal_id, entity.entity_id.clone()))
            .collect();

        let next_cursor = page
            .last()
            .map(|(internal_id, _)| TaskCursor::from_offset(*internal_id));
        Ok(Page {
            elements: page.into_iter().map(|(_, entity_id)| entity_id).collect(),
            next_cursor,
            total_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActionDescriptor, ActionType, FilterDocument};
    use crate::query_builder::FilterCompiler;
    use std::sync::Arc;

    fn ctx() -> AccessContext {
        AccessContext::system("tests")
    }

    fn seeded_store() -> InMemoryEntityStore {
        let store = InMemoryEntityStore::new();
        for i in 0..5 {
            store.insert(
                "Report",
                format!("report-{i}"),
                [("creator_id".to_string(), vec![format!("U{}", i % 2)])],
            );
        }
        store.insert("Malware", "malware-0", []);
        store
    }

    #[tokio::test]
    async fn test_paginate_filters_and_orders() {
        let store = seeded_store();
        let compiler = FilterCompiler::new(crate::query_builder::FilterAliasTable::shared(), 2);
        let document = FilterDocument::new()
            .with("entity_type", ["Report"])
            .with("creator", ["U0"]);

        let first = store
            .paginate(
                &ctx(),
                &compiler.compile(&document, None).unwrap().with_total_count(),
            )
            .await
            .unwrap();
        assert_eq!(first.total_count, Some(3));
        assert_eq!(first.elements, vec!["report-0", "report-2"]);

        let second = store
            .paginate(
                &ctx(),
                &compiler
                    .compile(&document, first.next_cursor.as_ref())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(second.elements, vec!["report-4"]);
        assert_eq!(second.total_count, None);

        let third = store
            .paginate(
                &ctx(),
                &compiler
                    .compile(&document, second.next_cursor.as_ref())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(third.elements.is_empty());
        assert!(third.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_traversal_survives_concurrent_mutation() {
        let store = Arc::new(InMemoryEntityStore::new());
        store.insert("Report", "r1", []);
        store.insert("Report", "r2", []);
        let compiler = FilterCompiler::new(crate::query_builder::FilterAliasTable::shared(), 1);
        let document = FilterDocument::new();

        let page = store
            .paginate(&ctx(), &compiler.compile(&document, None).unwrap())
            .await
            .unwrap();
        assert_eq!(page.elements, vec!["r1"]);

        store.remove("r1");
        store.insert("Report", "r3", []);

        let mut seen = Vec::new();
        let mut cursor = page.next_cursor;
        loop {
            let page = store
                .paginate(&ctx(), &compiler.compile(&document, cursor.as_ref()).unwrap())
                .await
                .unwrap();
            if page.elements.is_empty() {
                break;
            }
            seen.extend(page.elements);
            cursor = page.next_cursor;
        }
        assert_eq!(seen, vec!["r2", "r3"]);
    }

    #[tokio::test]
    async fn test_repository_guarded_patch() {
        let repo = InMemoryTaskRepository::new();
        let task = Task::new_list(
            "U1",
            vec![ActionDescriptor::new(ActionType::Delete)],
            vec!["a".into(), "b".into()],
        );
        repo.create(&ctx(), &task).await.unwrap();

        let commit = TaskPatch::progress_commit(
            None,
            Some(TaskCursor::from_offset(1)),
            1,
            false,
            Default::default(),
        );
        let patched = repo.patch(&ctx(), task.id, &commit).await.unwrap();
        assert_eq!(patched.processed_count, 1);

        // Replaying the same commit no longer matches the stored cursor
        let err = repo.patch(&ctx(), task.id, &commit).await.unwrap_err();
        assert!(matches!(err, TaskerError::ConcurrentModification { .. }));

        assert!(repo.delete(&ctx(), task.id).await.unwrap());
        let err = repo.patch(&ctx(), task.id, &commit).await.unwrap_err();
        assert_eq!(err, TaskerError::TaskNotFound(task.id));
    }

    #[tokio::test]
    async fn test_find_all_ordering_and_paging() {
        let repo = InMemoryTaskRepository::new();
        let mut ids = Vec::new();
        for i in 0..4 {
            let mut task = Task::new_list(
                format!("U{}", i % 2),
                vec![ActionDescriptor::new(ActionType::Delete)],
                vec!["a".into()],
            );
            task.created_at += chrono::Duration::seconds(i);
            ids.push(task.id);
            repo.create(&ctx(), &task).await.unwrap();
        }

        let all = repo.find_all(&ctx(), &TaskQuery::default()).await.unwrap();
        assert_eq!(all.iter().map(|t| t.id).collect::<Vec<_>>(), ids);

        let page = repo
            .find_all(
                &ctx(),
                &TaskQuery {
                    after: Some(ids[0]),
                    first: Some(2),
                    ..TaskQuery::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page.iter().map(|t| t.id).collect::<Vec<_>>(), ids[1..3]);

        let by_initiator = repo
            .find_all(
                &ctx(),
                &TaskQuery {
                    initiator_id: Some("U1".into()),
                    ..TaskQuery::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(by_initiator.len(), 2);
    }
}
