//! # Action Descriptors
//!
//! An action is one administrative operation applied to a single entity. A
//! task carries an ordered, non-empty list of them and applies the whole list
//! to every entity it reaches.

use crate::error::{Result, TaskerError};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    Add,
    Remove,
    Replace,
    Merge,
    Delete,
    Restore,
    Promote,
    Enrichment,
    RuleElementRescan,
    Share,
    Unshare,
}

impl ActionType {
    /// Field-editing actions must name the field they edit.
    pub fn requires_field(&self) -> bool {
        matches!(self, Self::Add | Self::Remove | Self::Replace)
    }

    /// Actions that are meaningless without at least one value.
    pub fn requires_values(&self) -> bool {
        matches!(
            self,
            Self::Add | Self::Merge | Self::Enrichment | Self::Share | Self::Unshare
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Remove => "REMOVE",
            Self::Replace => "REPLACE",
            Self::Merge => "MERGE",
            Self::Delete => "DELETE",
            Self::Restore => "RESTORE",
            Self::Promote => "PROMOTE",
            Self::Enrichment => "ENRICHMENT",
            Self::RuleElementRescan => "RULE_ELEMENT_RESCAN",
            Self::Share => "SHARE",
            Self::Unshare => "UNSHARE",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of an action.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDescriptor {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<ActionContext>,
}

impl ActionDescriptor {
    pub fn new(action_type: ActionType) -> Self {
        Self {
            action_type,
            context: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.context.get_or_insert_with(ActionContext::default).field = Some(field.into());
        self
    }

    pub fn with_values<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.context
            .get_or_insert_with(ActionContext::default)
            .values
            .extend(values.into_iter().map(Into::into));
        self
    }

    pub fn field(&self) -> Option<&str> {
        self.context.as_ref().and_then(|c| c.field.as_deref())
    }

    pub fn values(&self) -> &[String] {
        self.context.as_ref().map_or(&[], |c| c.values.as_slice())
    }

    fn validate(&self, position: usize) -> Result<()> {
        if self.action_type.requires_field() && self.field().map_or(true, str::is_empty) {
            return Err(TaskerError::InvalidActions(format!(
                "action #{position} ({}) requires a field",
                self.action_type
            )));
        }
        if self.action_type.requires_values() && self.values().is_empty() {
            return Err(TaskerError::InvalidActions(format!(
                "action #{position} ({}) requires at least one value",
                self.action_type
            )));
        }
        Ok(())
    }
}

/// Reject empty or structurally invalid action lists.
pub fn validate_actions(actions: &[ActionDescriptor]) -> Result<()> {
    if actions.is_empty() {
        return Err(TaskerError::InvalidActions(
            "a task needs at least one action".to_string(),
        ));
    }
    actions
        .iter()
        .enumerate()
        .try_for_each(|(position, action)| action.validate(position))
}

/// Failure of an action sequence on one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionFailure {
    pub message: String,
}

impl ActionFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ActionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ActionFailure {}
