//! # Database Operations
//!
//! PostgreSQL adapters for the store traits, built on SQLx runtime queries.
//!
//! ## Key Components
//!
//! - [`connection`] - Pool construction from [`DatabaseConfig`](crate::config::DatabaseConfig)
//! - [`migrations`] - Versioned schema migrations under an advisory lock
//! - [`task_repository`] - `bulk_tasks` persistence with cursor-guarded updates
//! - [`entity_store`] - Paginated traversal of `bulk_entities`
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use bulk_task_core::config::BulkTaskConfig;
//! use bulk_task_core::database::{DatabaseConnection, DatabaseMigrations, PgTaskRepository};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = BulkTaskConfig::from_env()?;
//! let db = DatabaseConnection::new(&config.database).await?;
//! DatabaseMigrations::run_all(db.pool()).await?;
//! let repository = PgTaskRepository::new(db.pool().clone());
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod entity_store;
pub mod migrations;
pub mod task_repository;

pub use connection::DatabaseConnection;
pub use entity_store::PgEntityStore;
pub use migrations::{DatabaseMigrations, Migration};
pub use task_repository::PgTaskRepository;
