use super::aliases::FilterAliasTable;
use super::query_spec::{FieldFilter, QueryOrder, QuerySpec};
use crate::constants::{ENTITY_TYPE_FILTER_KEY, MAX_TASK_ELEMENTS};
use crate::error::Result;
use crate::models::{FilterDocument, TaskCursor};
use std::sync::Arc;

/// Translates filter documents into store queries.
///
/// `entity_type` becomes the type restriction; every other key is resolved
/// through the alias table into a field filter. The resulting query always
/// orders by ascending internal id, which is what makes a persisted cursor
/// safe to resume from while the collection changes.
#[derive(Debug, Clone)]
pub struct FilterCompiler {
    aliases: Arc<FilterAliasTable>,
    page_size: usize,
}

impl Default for FilterCompiler {
    fn default() -> Self {
        Self::new(FilterAliasTable::shared(), MAX_TASK_ELEMENTS)
    }
}

impl FilterCompiler {
    pub fn new(aliases: Arc<FilterAliasTable>, page_size: usize) -> Self {
        Self { aliases, page_size }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn compile(
        &self,
        document: &FilterDocument,
        cursor: Option<&TaskCursor>,
    ) -> Result<QuerySpec> {
        document.validate()?;

        let mut types = Vec::new();
        let mut field_filters = Vec::new();
        for (key, selectors) in document.iter() {
            let ids = selectors.iter().map(|s| s.id.clone());
            if key == ENTITY_TYPE_FILTER_KEY {
                types.extend(ids);
            } else {
                field_filters.push(FieldFilter {
                    field: self.aliases.resolve(key).to_string(),
                    values: ids.collect(),
                });
            }
        }

        Ok(QuerySpec {
            types,
            field_filters,
            page_size: self.page_size,
            order: QueryOrder::internal_id_asc(),
            resume_after: cursor.cloned(),
            include_total: false,
        })
    }
}
