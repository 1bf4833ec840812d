//! # Database Migration System
//!
//! Applies the SQL files under `migrations/` in version order and records each
//! applied version in `bulk_task_schema_migrations`.
//!
//! ## Concurrency Control
//!
//! Several processes may start against the same database at once. The runner
//! serializes them on a PostgreSQL advisory lock held for the whole run:
//!
//! ```sql
//! SELECT pg_advisory_lock(7361582045133927)
//! ```
//!
//! ## Migration Discovery
//!
//! Files are named `YYYYMMDDHHMMSS_description.sql`. Each one runs inside a
//! transaction together with the insert of its version row.

use crate::error::{Result, TaskerError};
use sqlx::{Connection, PgConnection, PgPool, Row};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const LOCK_KEY: i64 = 7_361_582_045_133_927;

/// A single migration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Migration {
    /// Version timestamp (YYYYMMDDHHMMSS format)
    pub version: String,
    pub name: String,
    pub path: PathBuf,
}

pub struct DatabaseMigrations;

impl DatabaseMigrations {
    /// Directory shipped with the crate.
    pub fn default_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations")
    }

    /// Apply every outstanding migration from [`Self::default_dir`].
    pub async fn run_all(pool: &PgPool) -> Result<Vec<String>> {
        Self::run_from(pool, &Self::default_dir()).await
    }

    /// Apply every outstanding migration from `dir`; returns the versions applied.
    pub async fn run_from(pool: &PgPool, dir: &Path) -> Result<Vec<String>> {
        let mut conn = pool.acquire().await?;
        sqlx::query("SELECT pg_advisory_lock($1)")
            .bind(LOCK_KEY)
            .execute(&mut *conn)
            .await?;

        let result = Self::run_outstanding(&mut conn, dir).await;

        sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(LOCK_KEY)
            .execute(&mut *conn)
            .await?;
        result
    }

    async fn run_outstanding(conn: &mut PgConnection, dir: &Path) -> Result<Vec<String>> {
        Self::ensure_migration_table(conn).await?;
        let applied = Self::applied_versions(conn).await?;
        let mut newly_applied = Vec::new();

        for migration in Self::discover(dir)?.into_values() {
            if applied.contains(&migration.version) {
                debug!(version = %migration.version, "Migration already applied");
                continue;
            }
            info!(version = %migration.version, name = %migration.name, "Applying migration");

            let sql = fs::read_to_string(&migration.path).map_err(|e| {
                TaskerError::Configuration(format!(
                    "cannot read migration {}: {e}",
                    migration.path.display()
                ))
            })?;
            let mut tx = conn.begin().await?;
            sqlx::raw_sql(&sql).execute(&mut *tx).await?;
            sqlx::query("INSERT INTO bulk_task_schema_migrations (version) VALUES ($1)")
                .bind(&migration.version)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            newly_applied.push(migration.version);
        }
        Ok(newly_applied)
    }

    /// Migration files in `dir`, keyed and ordered by version.
    pub fn discover(dir: &Path) -> Result<BTreeMap<String, Migration>> {
        let mut migrations = BTreeMap::new();
        if !dir.exists() {
            return Ok(migrations);
        }

        let entries = fs::read_dir(dir).map_err(|e| {
            TaskerError::Configuration(format!("cannot read {}: {e}", dir.display()))
        })?;
        for entry in entries {
            let path = entry
                .map_err(|e| TaskerError::Configuration(e.to_string()))?
                .path();
            if !path.is_file() || path.extension().map_or(true, |ext| ext != "sql") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Some((version, name)) = parse_migration_filename(stem) {
                migrations.insert(
                    version.clone(),
                    Migration {
                        version,
                        name,
                        path,
                    },
                );
            }
        }
        Ok(migrations)
    }

    async fn ensure_migration_table(conn: &mut PgConnection) -> Result<()> {
        sqlx::raw_sql(
            r#"
            CREATE TABLE IF NOT EXISTS bulk_task_schema_migrations (
                version VARCHAR(14) PRIMARY KEY,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
        "#,
        )
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    async fn applied_versions(conn: &mut PgConnection) -> Result<HashSet<String>> {
        let rows = sqlx::query("SELECT version FROM bulk_task_schema_migrations")
            .fetch_all(&mut *conn)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| row.get::<String, _>("version"))
            .collect())
    }
}

/// Split `YYYYMMDDHHMMSS_name` into version and a readable name.
fn parse_migration_filename(filename: &str) -> Option<(String, String)> {
    if filename.len() < 15 || !filename.is_char_boundary(14) {
        return None;
    }
    let (version, rest) = filename.split_at(14);
    if !version.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let name = rest.strip_prefix('_').unwrap_or(rest).replace('_', " ");
    Some((version.to_string(), name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_migration_filename() {
        assert_eq!(
            parse_migration_filename("20240601000001_create_bulk_tasks"),
            Some(("20240601000001".to_string(), "create bulk tasks".to_string()))
        );
        assert_eq!(parse_migration_filename("create_bulk_tasks"), None);
        assert_eq!(parse_migration_filename("2024"), None);
    }

    #[test]
    fn test_discover_orders_by_version_and_skips_other_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("20240601000002_second.sql"), "SELECT 1;").unwrap();
        fs::write(dir.path().join("20240601000001_first.sql"), "SELECT 1;").unwrap();
        fs::write(dir.path().join("README.md"), "notes").unwrap();

        let found = DatabaseMigrations::discover(dir.path()).unwrap();
        let versions: Vec<&String> = found.keys().collect();
        assert_eq!(versions, vec!["20240601000001", "20240601000002"]);
    }

    #[test]
    fn test_shipped_migrations_are_discoverable() {
        let found = DatabaseMigrations::discover(&DatabaseMigrations::default_dir()).unwrap();
        assert_eq!(found.len(), 2);
    }
}
