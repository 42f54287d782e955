//! Row-level fixtures and probes shared across integration tests.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

pub async fn create_repo(pool: &PgPool, url: &str) -> Uuid {
    sqlx::query_scalar("INSERT INTO repos (repo, is_github) VALUES ($1, true) RETURNING id")
        .bind(url)
        .fetch_one(pool)
        .await
        .expect("Failed to insert repo")
}

pub async fn create_sync(pool: &PgPool, repo_id: Uuid, sync_type: &str, enabled: bool) -> Uuid {
    sqlx::query_scalar(
        r#"
        INSERT INTO repo_syncs (repo_id, sync_type, schedule_enabled)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(repo_id)
    .bind(sync_type)
    .bind(enabled)
    .fetch_one(pool)
    .await
    .expect("Failed to insert repo sync")
}

/// Insert a QUEUED row directly, with created_at offset forward by
/// `offset_ms` for deterministic ordering assertions.
pub async fn enqueue_at_offset(
    pool: &PgPool,
    repo_sync_id: Uuid,
    priority: i32,
    offset_ms: i64,
) -> i64 {
    sqlx::query_scalar(
        r#"
        INSERT INTO repo_sync_queue (repo_sync_id, status, priority, created_at)
        VALUES ($1, 'QUEUED', $2, now() + ($3 || ' milliseconds')::interval)
        RETURNING id
        "#,
    )
    .bind(repo_sync_id)
    .bind(priority)
    .bind(offset_ms.to_string())
    .fetch_one(pool)
    .await
    .expect("Failed to insert queue row")
}

pub async fn queue_status(pool: &PgPool, queue_id: i64) -> String {
    sqlx::query_scalar("SELECT status FROM repo_sync_queue WHERE id = $1")
        .bind(queue_id)
        .fetch_one(pool)
        .await
        .expect("Failed to read queue status")
}

pub async fn queue_done_at(pool: &PgPool, queue_id: i64) -> Option<DateTime<Utc>> {
    sqlx::query_scalar("SELECT done_at FROM repo_sync_queue WHERE id = $1")
        .bind(queue_id)
        .fetch_one(pool)
        .await
        .expect("Failed to read done_at")
}

pub async fn queue_keep_alive(pool: &PgPool, queue_id: i64) -> Option<DateTime<Utc>> {
    sqlx::query_scalar("SELECT last_keep_alive FROM repo_sync_queue WHERE id = $1")
        .bind(queue_id)
        .fetch_one(pool)
        .await
        .expect("Failed to read last_keep_alive")
}

pub async fn count_with_status(pool: &PgPool, status: &str) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM repo_sync_queue WHERE status = $1")
        .bind(status)
        .fetch_one(pool)
        .await
        .expect("Failed to count queue rows")
}

/// Backdate a queue row so it looks like it was claimed long ago and
/// never heartbeat.
pub async fn backdate_queue_row(pool: &PgPool, queue_id: i64, secs: i64) {
    sqlx::query(
        r#"
        UPDATE repo_sync_queue
        SET created_at = now() - ($2 || ' seconds')::interval,
            last_keep_alive = NULL
        WHERE id = $1
        "#,
    )
    .bind(queue_id)
    .bind(secs.to_string())
    .execute(pool)
    .await
    .expect("Failed to backdate queue row");
}

pub async fn queue_ids_for_sync(pool: &PgPool, repo_sync_id: Uuid) -> Vec<i64> {
    sqlx::query_scalar("SELECT id FROM repo_sync_queue WHERE repo_sync_id = $1 ORDER BY id")
        .bind(repo_sync_id)
        .fetch_all(pool)
        .await
        .expect("Failed to list queue rows")
}
