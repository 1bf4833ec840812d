//! PostgreSQL rendering of a [`QuerySpec`] against the `bulk_entities` table.
//!
//! Every value, including field names, is bound as a parameter. Field filters
//! match against the `attributes` JSONB column with `?|`, which accepts both a
//! scalar string and an array of strings.

use super::query_spec::{QuerySpec, SortDirection};
use crate::constants::INTERNAL_ID_FIELD;
use crate::error::{Result, TaskerError};
use crate::models::TaskCursor;
use sqlx::{Postgres, QueryBuilder};

pub const ENTITY_TABLE: &str = "bulk_entities";

/// `SELECT internal_id, entity_id` for one page, honoring the cursor.
pub fn page_query(spec: &QuerySpec) -> Result<QueryBuilder<'static, Postgres>> {
    if spec.order.field != INTERNAL_ID_FIELD {
        return Err(TaskerError::InvalidInput(format!(
            "unsupported order field '{}'",
            spec.order.field
        )));
    }
    let (comparator, direction) = match spec.order.direction {
        SortDirection::Asc => (" > ", " ASC"),
        SortDirection::Desc => (" < ", " DESC"),
    };

    let mut builder = QueryBuilder::new(format!(
        "SELECT internal_id, entity_id FROM {ENTITY_TABLE} WHERE TRUE"
    ));
    push_conditions(&mut builder, spec);

    if let Some(cursor) = &spec.resume_after {
        builder
            .push(" AND internal_id")
            .push(comparator)
            .push_bind(parse_cursor(cursor)?);
    }

    builder
        .push(" ORDER BY internal_id")
        .push(direction)
        .push(" LIMIT ")
        .push_bind(spec.page_size as i64);
    Ok(builder)
}

/// `SELECT COUNT(*)` over the same filters, ignoring the cursor.
pub fn count_query(spec: &QuerySpec) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!(
        "SELECT COUNT(*) FROM {ENTITY_TABLE} WHERE TRUE"
    ));
    push_conditions(&mut builder, spec);
    builder
}

fn push_conditions(builder: &mut QueryBuilder<'static, Postgres>, spec: &QuerySpec) {
    if !spec.types.is_empty() {
        builder
            .push(" AND entity_type = ANY(")
            .push_bind(spec.types.clone())
            .push(")");
    }
    for filter in &spec.field_filters {
        builder
            .push(" AND (attributes -> ")
            .push_bind(filter.field.clone())
            .push(") ?| ")
            .push_bind(filter.values.clone());
    }
}

pub fn parse_cursor(cursor: &TaskCursor) -> Result<i64> {
    cursor
        .as_str()
        .parse::<i64>()
        .map_err(|_| TaskerError::InvalidInput(format!("malformed entity cursor '{cursor}'")))
}
