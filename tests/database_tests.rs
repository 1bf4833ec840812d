//! PostgreSQL adapter tests. Each test gets an isolated database from
//! `sqlx::test`; run with `DATABASE_URL` set and `--ignored`.

#![cfg(feature = "postgres")]

mod common;

use bulk_task_core::database::{DatabaseMigrations, PgEntityStore, PgTaskRepository};
use bulk_task_core::error::TaskerError;
use bulk_task_core::models::{
    FilterDocument, Task, TaskCursor, TaskErrors, TaskPatch, TaskQuery,
};
use bulk_task_core::orchestration::{AllowAllAuthorizer, ExecutionOutcome};
use bulk_task_core::query_builder::FilterCompiler;
use bulk_task_core::store::{EntityStore, TaskRepository};
use common::*;
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;

async fn migrated(pool: &PgPool) {
    DatabaseMigrations::run_all(pool).await.unwrap();
}

#[sqlx::test(migrations = false)]
#[ignore = "requires DATABASE_URL"]
async fn test_migrations_are_idempotent(pool: PgPool) {
    let first = DatabaseMigrations::run_all(&pool).await.unwrap();
    assert_eq!(first.len(), 2);
    let second = DatabaseMigrations::run_all(&pool).await.unwrap();
    assert!(second.is_empty());
}

#[sqlx::test(migrations = false)]
#[ignore = "requires DATABASE_URL"]
async fn test_task_round_trip_and_guarded_patch(pool: PgPool) {
    migrated(&pool).await;
    let repository = PgTaskRepository::new(pool);
    let task = Task::new_list("U1", delete_actions(), vec!["a".into(), "b".into()]);
    repository.create(&ctx(), &task).await.unwrap();

    let loaded = repository.find_by_id(&ctx(), task.id).await.unwrap().unwrap();
    assert_eq!(loaded.target_ids(), task.target_ids());
    assert_eq!(loaded.actions, task.actions);
    assert_eq!(loaded.expected_count, 2);

    let commit = TaskPatch::progress_commit(
        None,
        Some(TaskCursor::from_offset(1)),
        1,
        false,
        TaskErrors::default(),
    );
    let patched = repository.patch(&ctx(), task.id, &commit).await.unwrap();
    assert_eq!(patched.processed_count, 1);
    assert!(patched.last_execution_time.is_some());

    let err = repository.patch(&ctx(), task.id, &commit).await.unwrap_err();
    assert!(matches!(err, TaskerError::ConcurrentModification { .. }));

    assert!(repository.delete(&ctx(), task.id).await.unwrap());
    let err = repository.patch(&ctx(), task.id, &commit).await.unwrap_err();
    assert_eq!(err, TaskerError::TaskNotFound(task.id));
}

#[sqlx::test(migrations = false)]
#[ignore = "requires DATABASE_URL"]
async fn test_find_all_lists_oldest_first(pool: PgPool) {
    migrated(&pool).await;
    let repository = PgTaskRepository::new(pool);
    let mut ids = Vec::new();
    for i in 0..3 {
        let mut task = Task::new_list("U1", delete_actions(), vec!["a".into()]);
        task.created_at += chrono::Duration::seconds(i);
        repository.create(&ctx(), &task).await.unwrap();
        ids.push(task.id);
    }

    let page = repository
        .find_all(
            &ctx(),
            &TaskQuery {
                after: Some(ids[0]),
                first: Some(1),
                ..TaskQuery::incomplete()
            },
        )
        .await
        .unwrap();
    assert_eq!(page.iter().map(|t| t.id).collect::<Vec<_>>(), vec![ids[1]]);
}

#[sqlx::test(migrations = false)]
#[ignore = "requires DATABASE_URL"]
async fn test_entity_pagination_filters_by_attribute(pool: PgPool) {
    migrated(&pool).await;
    let store = PgEntityStore::new(pool);
    for i in 0..4 {
        let creator = if i % 2 == 0 { "U1" } else { "U2" };
        store
            .insert(
                "Report",
                &format!("report-{i}"),
                &json!({ "rel_created-by.internal_id": [creator] }),
            )
            .await
            .unwrap();
    }

    let document = FilterDocument::new()
        .with("entity_type", ["Report"])
        .with("createdBy", ["U1"]);
    let compiler = FilterCompiler::new(
        bulk_task_core::query_builder::FilterAliasTable::shared(),
        1,
    );

    let first = store
        .paginate(
            &ctx(),
            &compiler.compile(&document, None).unwrap().with_total_count(),
        )
        .await
        .unwrap();
    assert_eq!(first.total_count, Some(2));
    assert_eq!(first.elements, vec!["report-0"]);

    let second = store
        .paginate(
            &ctx(),
            &compiler.compile(&document, first.next_cursor.as_ref()).unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(second.elements, vec!["report-2"]);
}

#[sqlx::test(migrations = false)]
#[ignore = "requires DATABASE_URL"]
async fn test_query_task_end_to_end(pool: PgPool) {
    migrated(&pool).await;
    let repository = Arc::new(PgTaskRepository::new(pool.clone()));
    let store = Arc::new(PgEntityStore::new(pool));
    for i in 0..5 {
        store
            .insert("Report", &format!("report-{i}"), &json!({}))
            .await
            .unwrap();
    }
    let task = Task::new_query(
        "U1",
        delete_actions(),
        FilterDocument::new().with("entity_type", ["Report"]),
        5,
    );
    repository.create(&ctx(), &task).await.unwrap();

    let engine = Arc::new(RecordingActionEngine::new());
    let executor = executor_with(
        repository.clone(),
        store,
        engine.clone(),
        Arc::new(AllowAllAuthorizer),
        batch_config(2),
    );
    let outcome = executor.run(&ctx(), task.id).await.unwrap();

    assert!(matches!(outcome, ExecutionOutcome::Completed(_)));
    assert_eq!(engine.applied().len(), 5);
    let stored = repository.find_by_id(&ctx(), task.id).await.unwrap().unwrap();
    assert!(stored.completed);
    assert_eq!(stored.processed_count, 5);
}
