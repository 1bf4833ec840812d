//! # Configuration
//!
//! Layered configuration for the engine. Values are resolved in order:
//!
//! 1. built-in defaults ([`BulkTaskConfig::default`])
//! 2. an optional TOML file
//! 3. environment variables prefixed `BULK_TASK__`, with `__` between
//!    sections (`BULK_TASK__EXECUTION__BATCH_LIMIT=250`)
//!
//! `DATABASE_URL` is honored as a shortcut for `database.url`.

use crate::constants::{
    DEFAULT_ELEMENT_TIMEOUT_MS, DEFAULT_MAX_LIST_TASK_IDS, DEFAULT_MAX_RETAINED_ERRORS,
    DEFAULT_POLL_INTERVAL_MS, MAX_TASK_ELEMENTS,
};
use crate::error::{Result, TaskerError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

pub const ENV_PREFIX: &str = "BULK_TASK";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkTaskConfig {
    pub database: DatabaseConfig,
    pub execution: ExecutionConfig,
    pub filters: FilterConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/bulk_tasks_development".to_string(),
            max_connections: 10,
            acquire_timeout_ms: 5_000,
        }
    }
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Upper bound on elements per executor iteration
    pub batch_limit: usize,
    /// Elements of one batch processed concurrently; 1 keeps batch order
    pub element_concurrency: usize,
    pub element_timeout_ms: u64,
    /// Element failures retained in detail per task
    pub max_retained_errors: usize,
    /// Largest id list a LIST task accepts
    pub max_list_task_ids: usize,
    pub poll_interval_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            batch_limit: MAX_TASK_ELEMENTS,
            element_concurrency: 1,
            element_timeout_ms: DEFAULT_ELEMENT_TIMEOUT_MS,
            max_retained_errors: DEFAULT_MAX_RETAINED_ERRORS,
            max_list_task_ids: DEFAULT_MAX_LIST_TASK_IDS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl ExecutionConfig {
    pub fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.element_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Filter key aliases layered over the built-in table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub aliases: HashMap<String, String>,
}

impl BulkTaskConfig {
    /// Defaults overlaid with environment variables.
    pub fn from_env() -> Result<Self> {
        Self::load(None::<&Path>)
    }

    /// Defaults overlaid with an optional TOML file, then the environment.
    pub fn load(path: Option<impl AsRef<Path>>) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            let path = path.as_ref();
            debug!(path = %path.display(), "Loading configuration file");
            builder = builder.add_source(config::File::from(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let mut loaded: Self = builder.build()?.try_deserialize()?;

        if let Ok(db_url) = std::env::var("DATABASE_URL") {
            loaded.database.url = db_url;
        }

        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<()> {
        let execution = &self.execution;
        if execution.batch_limit == 0 {
            return Err(TaskerError::Configuration(
                "execution.batch_limit must be greater than zero".to_string(),
            ));
        }
        if execution.element_concurrency == 0 {
            return Err(TaskerError::Configuration(
                "execution.element_concurrency must be greater than zero".to_string(),
            ));
        }
        if execution.element_concurrency > execution.batch_limit {
            return Err(TaskerError::Configuration(format!(
                "execution.element_concurrency ({}) cannot exceed execution.batch_limit ({})",
                execution.element_concurrency, execution.batch_limit
            )));
        }
        if execution.max_list_task_ids == 0 {
            return Err(TaskerError::Configuration(
                "execution.max_list_task_ids must be greater than zero".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(TaskerError::Configuration(
                "database.max_connections must be greater than zero".to_string(),
            ));
        }
        if let Some((key, _)) = self
            .filters
            .aliases
            .iter()
            .find(|(key, field)| key.is_empty() || field.is_empty())
        {
            return Err(TaskerError::Configuration(format!(
                "filter alias '{key}' must map a non-empty key to a non-empty field"
            )));
        }
        Ok(())
    }
}
