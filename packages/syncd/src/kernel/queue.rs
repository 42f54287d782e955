//! PostgreSQL-backed sync job queue.
//!
//! Every operation is a single SQL statement; scheduling correctness
//! (no double-claims, no duplicate enqueues, batch gating) rests entirely
//! on the database's locking and statement-level visibility semantics.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

/// Lifecycle of one queue row. Transitions are strictly
/// `QUEUED -> RUNNING -> DONE`; `DONE` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Queued,
    Running,
    Done,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Queued => "QUEUED",
            SyncStatus::Running => "RUNNING",
            SyncStatus::Done => "DONE",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QUEUED" => Ok(SyncStatus::Queued),
            "RUNNING" => Ok(SyncStatus::Running),
            "DONE" => Ok(SyncStatus::Done),
            other => Err(format!("unknown sync status: {other}")),
        }
    }
}

/// The (queue, sync, repo) tuple a worker receives when it claims a job.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DequeuedJob {
    pub queue_id: i64,
    pub queue_created_at: DateTime<Utc>,
    pub repo_sync_id: Uuid,
    pub repo_id: Uuid,
    pub sync_type: String,
    pub sync_settings: Value,
    /// Repository URL.
    pub repo: String,
    pub git_ref: Option<String>,
    pub is_github: Option<bool>,
    pub repo_settings: Value,
}

/// Queue operations over `repo_sync_queue`.
#[derive(Clone)]
pub struct SyncQueue {
    pool: PgPool,
}

impl SyncQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Atomically claim the single highest-priority QUEUED row, moving it
    /// to RUNNING and stamping `started_at`.
    ///
    /// Dequeue order is ascending priority, then created_at, then id.
    /// `FOR UPDATE SKIP LOCKED` guarantees two concurrent callers never
    /// observe the same row. Returns `None` when nothing is eligible.
    pub async fn dequeue_one(&self) -> Result<Option<DequeuedJob>> {
        let job = sqlx::query_as::<_, DequeuedJob>(
            r#"
            WITH dequeued AS (
                UPDATE repo_sync_queue
                SET status = 'RUNNING', started_at = now()
                WHERE id IN (
                    SELECT id FROM repo_sync_queue
                    WHERE status = 'QUEUED'
                    ORDER BY priority ASC, created_at ASC, id ASC
                    LIMIT 1
                    FOR UPDATE SKIP LOCKED
                )
                RETURNING id, created_at, repo_sync_id
            )
            SELECT
                dequeued.id AS queue_id,
                dequeued.created_at AS queue_created_at,
                repo_syncs.id AS repo_sync_id,
                repo_syncs.repo_id,
                repo_syncs.sync_type,
                repo_syncs.settings AS sync_settings,
                repos.repo,
                repos.ref AS git_ref,
                repos.is_github,
                repos.settings AS repo_settings
            FROM dequeued
            JOIN repo_syncs ON repo_syncs.id = dequeued.repo_sync_id
            JOIN repos ON repos.id = repo_syncs.repo_id
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    /// Insert a QUEUED row for every enabled sync that is not already
    /// queued or running.
    ///
    /// The CTE holds the whole batch back while any previously enqueued
    /// row is still unfinished (`done_at IS NULL`), so a slow sync cannot
    /// be starved by faster ones re-enqueueing around it. The NOT-IN
    /// predicate is evaluated within this one statement; concurrent
    /// enqueuer ticks that race past it are settled by the partial unique
    /// index on live rows (`ON CONFLICT DO NOTHING`).
    ///
    /// Returns the number of rows enqueued.
    pub async fn enqueue_pending(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            WITH ranked_queue AS (
                SELECT
                    rsq.done_at,
                    DENSE_RANK() OVER (ORDER BY rsq.created_at DESC) AS rank_num
                FROM repo_syncs
                INNER JOIN repo_sync_queue AS rsq ON repo_syncs.id = rsq.repo_sync_id
            )
            INSERT INTO repo_sync_queue (repo_sync_id, status)
            SELECT
                id,
                'QUEUED' AS status
            FROM repo_syncs
            WHERE schedule_enabled
                AND id NOT IN (
                    SELECT repo_sync_id FROM repo_sync_queue
                    WHERE status = 'RUNNING' OR status = 'QUEUED'
                )
                AND NOT EXISTS (
                    SELECT done_at
                    FROM ranked_queue
                    WHERE ranked_queue.rank_num >= 1
                        AND ranked_queue.done_at IS NULL
                )
            ON CONFLICT DO NOTHING
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Prove liveness for a claimed job. Only touches RUNNING rows, so a
    /// heartbeat racing the reaper cannot resurrect a DONE row.
    pub async fn set_keep_alive(&self, queue_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE repo_sync_queue
            SET last_keep_alive = now()
            WHERE id = $1 AND status = 'RUNNING'
            "#,
        )
        .bind(queue_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Transition a queue row. DONE also stamps `done_at`. Setting an
    /// already-DONE row to DONE is a no-op by value, which keeps the
    /// worker-vs-reaper race benign.
    pub async fn set_status(&self, queue_id: i64, status: SyncStatus) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE repo_sync_queue
            SET status = $2,
                done_at = CASE WHEN $2 = 'DONE' THEN now() ELSE done_at END
            WHERE id = $1
            "#,
        )
        .bind(queue_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Time out RUNNING rows whose heartbeat has lapsed beyond `timeout`
    /// (or that never heartbeat and were created longer than `timeout`
    /// ago), transitioning them to DONE and appending an ERROR log row.
    ///
    /// Returns the affected queue ids.
    pub async fn reap(&self, timeout: Duration) -> Result<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            WITH timed_out_sync_jobs AS (
                UPDATE repo_sync_queue
                SET status = 'DONE', done_at = now()
                WHERE status = 'RUNNING' AND (
                    (last_keep_alive < now() - ($1 || ' seconds')::interval)
                    OR
                    (last_keep_alive IS NULL AND created_at < now() - ($1 || ' seconds')::interval)
                )
                RETURNING id
            )
            INSERT INTO repo_sync_logs (repo_sync_queue_id, log_type, message)
            SELECT id, 'ERROR', 'No response from job within reasonable interval. Timing out.'
            FROM timed_out_sync_jobs
            RETURNING repo_sync_queue_id
            "#,
        )
        .bind(timeout.as_secs().to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        for status in [SyncStatus::Queued, SyncStatus::Running, SyncStatus::Done] {
            assert_eq!(status.as_str().parse::<SyncStatus>().unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_rejected() {
        assert!("PAUSED".parse::<SyncStatus>().is_err());
    }
}
