use anyhow::Result;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

/// A sync definition: which handler runs against which repo, and whether
/// the enqueuer schedules it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RepoSync {
    pub id: Uuid,
    pub repo_id: Uuid,
    pub sync_type: String,
    pub settings: Value,
    pub schedule_enabled: bool,
}

impl RepoSync {
    pub async fn create(
        pool: &PgPool,
        repo_id: Uuid,
        sync_type: &str,
        schedule_enabled: bool,
    ) -> Result<Self> {
        let sync = sqlx::query_as::<_, RepoSync>(
            r#"
            INSERT INTO repo_syncs (repo_id, sync_type, schedule_enabled)
            VALUES ($1, $2, $3)
            RETURNING id, repo_id, sync_type, settings, schedule_enabled
            "#,
        )
        .bind(repo_id)
        .bind(sync_type)
        .bind(schedule_enabled)
        .fetch_one(pool)
        .await?;

        Ok(sync)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Self> {
        let sync = sqlx::query_as::<_, RepoSync>(
            "SELECT id, repo_id, sync_type, settings, schedule_enabled FROM repo_syncs WHERE id = $1",
        )
        .bind(id)
        .fetch_one(pool)
        .await?;

        Ok(sync)
    }

    pub async fn list_for_repo(pool: &PgPool, repo_id: Uuid) -> Result<Vec<Self>> {
        let syncs = sqlx::query_as::<_, RepoSync>(
            r#"
            SELECT id, repo_id, sync_type, settings, schedule_enabled
            FROM repo_syncs
            WHERE repo_id = $1
            ORDER BY sync_type
            "#,
        )
        .bind(repo_id)
        .fetch_all(pool)
        .await?;

        Ok(syncs)
    }

    /// Seed an enabled sync of each given type for every repo of an
    /// import that does not already have one. Returns the number of sync
    /// definitions created.
    pub async fn insert_defaults(
        pool: &PgPool,
        import_id: Uuid,
        sync_types: &[String],
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO repo_syncs (repo_id, sync_type, schedule_enabled)
            SELECT r.id, t.sync_type, true
            FROM repos r
            CROSS JOIN unnest($2::text[]) AS t(sync_type)
            WHERE r.repo_import_id = $1
            ON CONFLICT (repo_id, sync_type) DO NOTHING
            "#,
        )
        .bind(import_id)
        .bind(sync_types)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}
