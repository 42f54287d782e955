use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

/// A source of repository URLs re-polled on an interval.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RepoImport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Discovery strategy discriminator (`type` column).
    pub kind: String,
    pub settings: Value,
    pub last_import: Option<DateTime<Utc>>,
    pub last_import_started_at: Option<DateTime<Utc>>,
}

/// The slice of an import the scheduler works with after claiming it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClaimedImport {
    pub id: Uuid,
    pub kind: String,
    pub settings: Value,
}

/// Closed set of discovery strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportType {
    GithubUser,
    GithubOrg,
}

impl ImportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportType::GithubUser => "GITHUB_USER",
            ImportType::GithubOrg => "GITHUB_ORG",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "GITHUB_USER" => Some(ImportType::GithubUser),
            "GITHUB_ORG" => Some(ImportType::GithubOrg),
            _ => None,
        }
    }
}

/// Settings payload of a repo import.
///
/// `user` drives `GITHUB_USER` imports, `org` drives `GITHUB_ORG`. Tags
/// are merged onto every discovered repo; `default_sync_types` seeds a
/// sync definition per discovered repo.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportSettings {
    pub user: Option<String>,
    pub org: Option<String>,
    pub tags: Vec<String>,
    pub default_sync_types: Vec<String>,
}

impl RepoImport {
    /// Claim every import whose interval has elapsed, stamping
    /// `last_import_started_at` in the same statement under row locks
    /// with skip-locked. Replicated schedulers therefore claim disjoint
    /// sets, and an import whose run is still in flight (or recently
    /// failed) is not reclaimed until the interval passes again.
    pub async fn claim_due(pool: &PgPool) -> Result<Vec<ClaimedImport>> {
        let claimed = sqlx::query_as::<_, ClaimedImport>(
            r#"
            WITH due AS (
                UPDATE repo_imports
                SET last_import_started_at = now()
                WHERE id IN (
                    SELECT id FROM repo_imports AS t
                    WHERE
                        (now() - t.last_import > t.import_interval OR t.last_import IS NULL)
                        AND
                        (now() - t.last_import_started_at > t.import_interval
                            OR t.last_import_started_at IS NULL)
                    ORDER BY last_import ASC
                    FOR UPDATE SKIP LOCKED
                )
                RETURNING id, type, settings
            )
            SELECT id, type AS kind, settings FROM due
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(claimed)
    }

    /// Record a successful import pass.
    pub async fn mark_updated(pool: &PgPool, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE repo_imports SET last_import = now(), updated_at = now() WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Create a new import definition.
    pub async fn create(
        pool: &PgPool,
        kind: ImportType,
        settings: Value,
        interval: Duration,
    ) -> Result<Uuid> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO repo_imports (type, settings, import_interval)
            VALUES ($1, $2, ($3 || ' seconds')::interval)
            RETURNING id
            "#,
        )
        .bind(kind.as_str())
        .bind(settings)
        .bind(interval.as_secs().to_string())
        .fetch_one(pool)
        .await?;

        Ok(id)
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Self> {
        let import = sqlx::query_as::<_, RepoImport>(
            r#"
            SELECT id, created_at, updated_at, type AS kind, settings,
                   last_import, last_import_started_at
            FROM repo_imports
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_one(pool)
        .await?;

        Ok(import)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_type_round_trips() {
        for t in [ImportType::GithubUser, ImportType::GithubOrg] {
            assert_eq!(ImportType::parse(t.as_str()), Some(t));
        }
        assert_eq!(ImportType::parse("GITLAB_GROUP"), None);
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: ImportSettings = serde_json::from_value(serde_json::json!({
            "org": "acme"
        }))
        .unwrap();

        assert_eq!(settings.org.as_deref(), Some("acme"));
        assert_eq!(settings.user, None);
        assert!(settings.tags.is_empty());
        assert!(settings.default_sync_types.is_empty());
    }

    #[test]
    fn settings_read_camel_case_sync_types() {
        let settings: ImportSettings = serde_json::from_value(serde_json::json!({
            "user": "octocat",
            "tags": ["oss"],
            "defaultSyncTypes": ["GITHUB_REPO_METADATA"]
        }))
        .unwrap();

        assert_eq!(settings.default_sync_types, vec!["GITHUB_REPO_METADATA"]);
    }
}
