//! Filter key → store field alias table.
//!
//! The table is built once and shared behind an [`Arc`]. Keys that have no
//! alias pass through to the store unchanged.

use crate::config::FilterConfig;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("createdBy", "rel_created-by.internal_id"),
    ("markedBy", "rel_object-marking.internal_id"),
    ("labelledBy", "rel_object-label.internal_id"),
    ("indicates", "rel_indicates.internal_id"),
    ("containedBy", "rel_object.internal_id"),
    ("objectContains", "rel_object.internal_id"),
    ("killChainPhase", "rel_kill-chain-phase.internal_id"),
    ("hasExternalReference", "rel_external-reference.internal_id"),
    ("creator", "creator_id"),
];

static BUILTIN_TABLE: OnceLock<Arc<FilterAliasTable>> = OnceLock::new();

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterAliasTable {
    aliases: HashMap<String, String>,
}

impl FilterAliasTable {
    pub fn builtin() -> Self {
        Self {
            aliases: BUILTIN_ALIASES
                .iter()
                .map(|(key, field)| (key.to_string(), field.to_string()))
                .collect(),
        }
    }

    /// Process-wide built-in table, built on first use.
    pub fn shared() -> Arc<Self> {
        BUILTIN_TABLE
            .get_or_init(|| Arc::new(Self::builtin()))
            .clone()
    }

    /// Built-in table with configured overrides applied on top.
    pub fn from_config(config: &FilterConfig) -> Arc<Self> {
        if config.aliases.is_empty() {
            return Self::shared();
        }
        let mut table = Self::builtin();
        table.aliases.extend(
            config
                .aliases
                .iter()
                .map(|(key, field)| (key.clone(), field.clone())),
        );
        Arc::new(table)
    }

    pub fn with_alias(mut self, key: impl Into<String>, field: impl Into<String>) -> Self {
        self.aliases.insert(key.into(), field.into());
        self
    }

    pub fn resolve<'a>(&'a self, key: &'a str) -> &'a str {
        self.aliases.get(key).map_or(key, String::as_str)
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
