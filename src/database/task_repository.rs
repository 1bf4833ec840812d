//! PostgreSQL [`TaskRepository`] over the `bulk_tasks` table.
//!
//! Structured fields (`actions`, `errors`, payload) are stored as JSONB. A
//! guarded patch is a single `UPDATE ... WHERE cursor_token IS NOT DISTINCT
//! FROM $expected RETURNING ...`, so the compare-and-swap is atomic in the
//! database.

use crate::error::{Result, TaskerError};
use crate::models::{
    AccessContext, ActionDescriptor, CursorGuard, FilterDocument, Task, TaskCursor, TaskErrors,
    TaskKind, TaskPatch, TaskPayload, TaskQuery,
};
use crate::store::TaskRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tracing::{debug, instrument};
use uuid::Uuid;

const TASK_COLUMNS: &str = "id, kind, initiator_id, created_at, completed, last_execution_time, \
     cursor_token, processed_count, expected_count, actions, errors, filter_document, target_ids";

#[derive(Debug, Clone, FromRow)]
struct TaskRow {
    id: Uuid,
    kind: String,
    initiator_id: String,
    created_at: DateTime<Utc>,
    completed: bool,
    last_execution_time: Option<DateTime<Utc>>,
    cursor_token: Option<String>,
    processed_count: i64,
    expected_count: i64,
    actions: Json<Vec<ActionDescriptor>>,
    errors: Json<TaskErrors>,
    filter_document: Option<Json<FilterDocument>>,
    target_ids: Option<Json<Vec<String>>>,
}

impl TryFrom<TaskRow> for Task {
    type Error = TaskerError;

    fn try_from(row: TaskRow) -> Result<Self> {
        let kind: TaskKind = row.kind.parse().map_err(TaskerError::Serialization)?;
        let payload = match (kind, row.filter_document, row.target_ids) {
            (TaskKind::Query, Some(Json(filter_document)), None) => {
                TaskPayload::Query { filter_document }
            }
            (TaskKind::List, None, Some(Json(target_ids))) => TaskPayload::List { target_ids },
            _ => {
                return Err(TaskerError::Serialization(format!(
                    "task {} has a payload that does not match kind {kind}",
                    row.id
                )))
            }
        };

        Ok(Task {
            id: row.id,
            initiator_id: row.initiator_id,
            created_at: row.created_at,
            completed: row.completed,
            last_execution_time: row.last_execution_time,
            cursor: row.cursor_token.map(TaskCursor::new),
            processed_count: to_count(row.processed_count)?,
            expected_count: to_count(row.expected_count)?,
            actions: row.actions.0,
            errors: row.errors.0,
            payload,
        })
    }
}

fn to_count(value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|_| TaskerError::Serialization(format!("negative count {value}")))
}

fn to_column(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| TaskerError::InvalidInput(format!("count {value} out of range")))
}

#[derive(Debug, Clone)]
pub struct PgTaskRepository {
    pool: PgPool,
}

impl PgTaskRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn exists(&self, id: Uuid) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM bulk_tasks WHERE id = $1)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

#[async_trait]
impl TaskRepository for PgTaskRepository {
    #[instrument(skip(self, task), fields(task_id = %task.id, actor = %ctx))]
    async fn create(&self, ctx: &AccessContext, task: &Task) -> Result<()> {
        let (filter_document, target_ids) = match &task.payload {
            TaskPayload::Query { filter_document } => (Some(Json(filter_document)), None),
            TaskPayload::List { target_ids } => (None, Some(Json(target_ids))),
        };

        sqlx::query(
            r#"
            INSERT INTO bulk_tasks (
                id, kind, initiator_id, created_at, completed, last_execution_time,
                cursor_token, processed_count, expected_count, actions, errors,
                filter_document, target_ids
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(task.id)
        .bind(task.kind().to_string())
        .bind(&task.initiator_id)
        .bind(task.created_at)
        .bind(task.completed)
        .bind(task.last_execution_time)
        .bind(task.cursor.as_ref().map(TaskCursor::as_str))
        .bind(to_column(task.processed_count)?)
        .bind(to_column(task.expected_count)?)
        .bind(Json(&task.actions))
        .bind(Json(&task.errors))
        .bind(filter_document)
        .bind(target_ids)
        .execute(&self.pool)
        .await?;

        debug!("Inserted task record");
        Ok(())
    }

    async fn find_by_id(&self, _ctx: &AccessContext, id: Uuid) -> Result<Option<Task>> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM bulk_tasks WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Task::try_from).transpose()
    }

    async fn find_all(&self, _ctx: &AccessContext, query: &TaskQuery) -> Result<Vec<Task>> {
        let mut builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {TASK_COLUMNS} FROM bulk_tasks WHERE TRUE"));

        if let Some(completed) = query.completed {
            builder.push(" AND completed = ").push_bind(completed);
        }
        if let Some(initiator_id) = &query.initiator_id {
            builder.push(" AND initiator_id = ").push_bind(initiator_id.clone());
        }
        if let Some(kind) = query.kind {
            builder.push(" AND kind = ").push_bind(kind.to_string());
        }
        if let Some(after) = query.after {
            // A vanished anchor leaves the listing unbounded.
            builder
                .push(" AND (NOT EXISTS (SELECT 1 FROM bulk_tasks a WHERE a.id = ")
                .push_bind(after)
                .push(") OR (created_at, id) > (SELECT a.created_at, a.id FROM bulk_tasks a WHERE a.id = ")
                .push_bind(after)
                .push("))");
        }
        builder.push(" ORDER BY created_at ASC, id ASC");
        if let Some(first) = query.first {
            builder.push(" LIMIT ").push_bind(first as i64);
        }

        let rows = builder
            .build_query_as::<TaskRow>()
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Task::try_from).collect()
    }

    #[instrument(skip(self, patch), fields(actor = %ctx))]
    async fn patch(&self, ctx: &AccessContext, id: Uuid, patch: &TaskPatch) -> Result<Task> {
        let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new("UPDATE bulk_tasks SET id = id");

        if let Some(cursor) = &patch.cursor {
            builder
                .push(", cursor_token = ")
                .push_bind(cursor.as_str().to_string());
        }
        if let Some(processed_count) = patch.processed_count {
            builder
                .push(", processed_count = ")
                .push_bind(to_column(processed_count)?);
        }
        if let Some(at) = patch.last_execution_time {
            builder.push(", last_execution_time = ").push_bind(at);
        }
        if let Some(completed) = patch.completed {
            builder.push(", completed = ").push_bind(completed);
        }
        if let Some(errors) = &patch.errors {
            builder.push(", errors = ").push_bind(Json(errors.clone()));
        }

        builder.push(" WHERE id = ").push_bind(id);
        if let CursorGuard::Expect(expected) = &patch.guard {
            builder
                .push(" AND cursor_token IS NOT DISTINCT FROM ")
                .push_bind(expected.as_ref().map(|c| c.as_str().to_string()));
        }
        builder.push(format!(" RETURNING {TASK_COLUMNS}"));

        let row = builder
            .build_query_as::<TaskRow>()
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                debug!(task_id = %id, "Patched task record");
                Task::try_from(row)
            }
            None if self.exists(id).await? => Err(TaskerError::ConcurrentModification {
                task_id: id,
                expected: patch.guard.expected().map(|c| c.to_string()),
            }),
            None => Err(TaskerError::TaskNotFound(id)),
        }
    }

    #[instrument(skip(self), fields(actor = %ctx))]
    async fn delete(&self, ctx: &AccessContext, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM bulk_tasks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
