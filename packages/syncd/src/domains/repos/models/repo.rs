use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

/// A tracked repository. Rows are owned by the import that discovered
/// them (`repo_import_id`) and pruned when the provider stops listing
/// the URL.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Repo {
    pub id: Uuid,
    /// Repository URL.
    pub repo: String,
    pub git_ref: Option<String>,
    pub is_github: Option<bool>,
    pub settings: Value,
    /// JSON array of strings; upserts merge as set union.
    pub tags: Value,
    pub repo_import_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

const SELECT_COLUMNS: &str =
    "id, repo, ref AS git_ref, is_github, settings, tags, repo_import_id, created_at";

impl Repo {
    /// Insert or refresh a repo discovered by an import.
    ///
    /// Identity is `(repo, ref IS NULL)` for ref-less rows; on conflict
    /// the tag arrays are merged as a set union, so repeated upserts with
    /// overlapping tag sets converge regardless of order.
    pub async fn upsert(
        pool: &PgPool,
        url: &str,
        is_github: bool,
        repo_import_id: Option<Uuid>,
        tags: &[String],
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO repos (repo, is_github, repo_import_id, tags)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (repo, (ref IS NULL)) WHERE ref IS NULL
            DO UPDATE SET tags = (
                SELECT COALESCE(jsonb_agg(DISTINCT x), jsonb_build_array())
                FROM jsonb_array_elements(repos.tags || excluded.tags) x
            )
            "#,
        )
        .bind(url)
        .bind(is_github)
        .bind(repo_import_id)
        .bind(serde_json::to_value(tags)?)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Prune repos of an import whose URL the provider no longer lists.
    /// Returns the number of deleted rows.
    pub async fn delete_removed(pool: &PgPool, import_id: Uuid, keep: &[String]) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM repos
            WHERE repo_import_id = $1 AND NOT (repo = ANY($2))
            "#,
        )
        .bind(import_id)
        .bind(keep)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn find_by_url(pool: &PgPool, url: &str) -> Result<Option<Self>> {
        let repo = sqlx::query_as::<_, Repo>(&format!(
            "SELECT {SELECT_COLUMNS} FROM repos WHERE repo = $1 AND ref IS NULL"
        ))
        .bind(url)
        .fetch_optional(pool)
        .await?;

        Ok(repo)
    }

    pub async fn list_for_import(pool: &PgPool, import_id: Uuid) -> Result<Vec<Self>> {
        let repos = sqlx::query_as::<_, Repo>(&format!(
            "SELECT {SELECT_COLUMNS} FROM repos WHERE repo_import_id = $1 ORDER BY repo"
        ))
        .bind(import_id)
        .fetch_all(pool)
        .await?;

        Ok(repos)
    }

    /// Tags as a plain string list. The column is a JSON array; anything
    /// non-string in it is skipped.
    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .as_array()
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}
