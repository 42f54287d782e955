use std::fmt;

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// Severity of a job-facing log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncLogType {
    Info,
    Warn,
    Error,
}

impl SyncLogType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncLogType::Info => "INFO",
            SyncLogType::Warn => "WARN",
            SyncLogType::Error => "ERROR",
        }
    }
}

impl fmt::Display for SyncLogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only per-job log line, attached to a queue row so operators
/// can read a job's history next to its status.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SyncLog {
    pub id: i64,
    pub repo_sync_queue_id: i64,
    pub log_type: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl SyncLog {
    pub async fn insert(
        pool: &PgPool,
        repo_sync_queue_id: i64,
        log_type: SyncLogType,
        message: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO repo_sync_logs (log_type, message, repo_sync_queue_id)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(log_type.as_str())
        .bind(message)
        .bind(repo_sync_queue_id)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn list_for_queue(pool: &PgPool, repo_sync_queue_id: i64) -> Result<Vec<Self>> {
        let logs = sqlx::query_as::<_, SyncLog>(
            r#"
            SELECT id, repo_sync_queue_id, log_type, message, created_at
            FROM repo_sync_logs
            WHERE repo_sync_queue_id = $1
            ORDER BY id
            "#,
        )
        .bind(repo_sync_queue_id)
        .fetch_all(pool)
        .await?;

        Ok(logs)
    }
}
