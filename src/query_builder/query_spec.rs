use crate::constants::INTERNAL_ID_FIELD;
use crate::models::TaskCursor;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFilter {
    /// Store-level field name, already resolved through the alias table
    pub field: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOrder {
    pub field: String,
    pub direction: SortDirection,
}

impl QueryOrder {
    /// The only order a resumable traversal may use.
    pub fn internal_id_asc() -> Self {
        Self {
            field: INTERNAL_ID_FIELD.to_string(),
            direction: SortDirection::Asc,
        }
    }
}

/// Store-level description of one page of a task's traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Entity types to restrict to; empty means every type
    pub types: Vec<String>,
    pub field_filters: Vec<FieldFilter>,
    pub page_size: usize,
    pub order: QueryOrder,
    /// Return only elements strictly after this cursor
    pub resume_after: Option<TaskCursor>,
    /// Also count every match, ignoring the cursor
    #[serde(default)]
    pub include_total: bool,
}

impl QuerySpec {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_total_count(mut self) -> Self {
        self.include_total = true;
        self
    }
}
