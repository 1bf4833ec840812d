//! PostgreSQL [`EntityStore`] over the `bulk_entities` table.

use crate::error::Result;
use crate::models::{AccessContext, TaskCursor};
use crate::query_builder::sql::{count_query, page_query};
use crate::query_builder::QuerySpec;
use crate::store::{EntityStore, Page};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use tracing::{debug, instrument};

#[derive(Debug, Clone, FromRow)]
struct EntityRow {
    internal_id: i64,
    entity_id: String,
}

#[derive(Debug, Clone)]
pub struct PgEntityStore {
    pool: PgPool,
}

impl PgEntityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert an entity and return its internal id.
    pub async fn insert(
        &self,
        entity_type: &str,
        entity_id: &str,
        attributes: &Value,
    ) -> Result<i64> {
        let internal_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO bulk_entities (entity_id, entity_type, attributes)
            VALUES ($1, $2, $3)
            RETURNING internal_id
            "#,
        )
        .bind(entity_id)
        .bind(entity_type)
        .bind(attributes)
        .fetch_one(&self.pool)
        .await?;
        Ok(internal_id)
    }

    pub async fn remove(&self, entity_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM bulk_entities WHERE entity_id = $1")
            .bind(entity_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl EntityStore for PgEntityStore {
    #[instrument(skip(self, spec), fields(actor = %ctx, page_size = spec.page_size))]
    async fn paginate(&self, ctx: &AccessContext, spec: &QuerySpec) -> Result<Page> {
        let rows = page_query(spec)?
            .build_query_as::<EntityRow>()
            .fetch_all(&self.pool)
            .await?;
        let total_count = if spec.include_total {
            let count = count_query(spec)
                .build_query_scalar::<i64>()
                .fetch_one(&self.pool)
                .await?;
            Some(u64::try_from(count).unwrap_or_default())
        } else {
            None
        };

        let next_cursor = rows
            .last()
            .map(|row| TaskCursor::new(row.internal_id.to_string()));
        debug!(rows = rows.len(), ?total_count, "Fetched entity page");

        Ok(Page {
            elements: rows.into_iter().map(|row| row.entity_id).collect(),
            next_cursor,
            total_count,
        })
    }
}
