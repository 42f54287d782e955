use anyhow::Result;
use chrono::{DateTime, Utc};
use github_rs::{Release, Repository};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Forge metadata for one repo, refreshed wholesale by the metadata sync.
///
/// Every scalar the forge may omit stays an `Option`; "absent" is a
/// meaningful value and must not collapse to zero or empty string.
#[derive(Debug, Clone, Default, PartialEq, sqlx::FromRow)]
pub struct GithubRepoInfo {
    pub repo_id: Uuid,
    pub owner: String,
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub default_branch_name: Option<String>,
    pub description: Option<String>,
    pub disk_usage: Option<i32>,
    pub fork_count: Option<i32>,
    pub homepage_url: Option<String>,
    pub is_archived: Option<bool>,
    pub is_disabled: Option<bool>,
    pub is_mirror: Option<bool>,
    pub is_private: Option<bool>,
    pub total_issues_count: Option<i32>,
    pub latest_release_author: Option<String>,
    pub latest_release_created_at: Option<DateTime<Utc>>,
    pub latest_release_name: Option<String>,
    pub latest_release_published_at: Option<DateTime<Utc>>,
    pub license_key: Option<String>,
    pub license_name: Option<String>,
    pub license_nickname: Option<String>,
    pub open_graph_image_url: Option<String>,
    pub primary_language: Option<String>,
    pub pushed_at: Option<DateTime<Utc>>,
    pub releases_count: Option<i32>,
    pub stargazers_count: Option<i32>,
    pub updated_at: Option<DateTime<Utc>>,
    pub watchers_count: Option<i32>,
}

impl GithubRepoInfo {
    /// Build the row from the forge API responses.
    ///
    /// `job_url` is the repository URL of the sync job; the mirror flag
    /// reports whether the forge's mirror URL equals it. A zero
    /// `releases_count` stays absent rather than `Some(0)`.
    pub fn from_api(
        repo_id: Uuid,
        owner: &str,
        name: &str,
        repo: &Repository,
        latest_release: Option<&Release>,
        releases_count: usize,
        job_url: &str,
    ) -> Self {
        Self {
            repo_id,
            owner: owner.to_string(),
            name: name.to_string(),
            created_at: repo.created_at,
            default_branch_name: repo.default_branch.clone(),
            description: repo.description.clone(),
            disk_usage: repo.size,
            fork_count: repo.forks_count,
            homepage_url: repo.homepage.clone(),
            is_archived: repo.archived,
            is_disabled: repo.disabled,
            is_mirror: repo.mirror_url.as_deref().map(|mirror| mirror == job_url),
            is_private: repo.private,
            total_issues_count: repo.open_issues_count,
            latest_release_author: latest_release
                .and_then(|r| r.author.as_ref())
                .and_then(|a| a.login.clone()),
            latest_release_created_at: latest_release.and_then(|r| r.created_at),
            latest_release_name: latest_release.and_then(|r| r.name.clone()),
            latest_release_published_at: latest_release.and_then(|r| r.published_at),
            license_key: repo.license.as_ref().and_then(|l| l.key.clone()),
            license_name: repo.license.as_ref().and_then(|l| l.name.clone()),
            // The REST API carries neither of these; the columns stay for
            // readers that expect them.
            license_nickname: None,
            open_graph_image_url: None,
            primary_language: repo.language.clone(),
            pushed_at: repo.pushed_at,
            releases_count: (releases_count > 0).then_some(releases_count as i32),
            stargazers_count: repo.stargazers_count,
            updated_at: repo.updated_at,
            watchers_count: repo.watchers_count,
        }
    }

    /// Drop the prior metadata row for a repo. Paired with [`insert`]
    /// inside one transaction so a retry after a crash yields one
    /// consistent row.
    ///
    /// [`insert`]: GithubRepoInfo::insert
    pub async fn delete_for_repo<'e>(executor: impl PgExecutor<'e>, repo_id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM github_repo_info WHERE repo_id = $1")
            .bind(repo_id)
            .execute(executor)
            .await?;

        Ok(())
    }

    pub async fn insert<'e>(&self, executor: impl PgExecutor<'e>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO github_repo_info (
                repo_id, owner, name,
                created_at, default_branch_name, description, disk_usage, fork_count,
                homepage_url, is_archived, is_disabled, is_mirror, is_private,
                total_issues_count, latest_release_author, latest_release_created_at,
                latest_release_name, latest_release_published_at, license_key,
                license_name, license_nickname, open_graph_image_url, primary_language,
                pushed_at, releases_count, stargazers_count, updated_at, watchers_count
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14,
                $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28
            )
            "#,
        )
        .bind(self.repo_id)
        .bind(&self.owner)
        .bind(&self.name)
        .bind(self.created_at)
        .bind(&self.default_branch_name)
        .bind(&self.description)
        .bind(self.disk_usage)
        .bind(self.fork_count)
        .bind(&self.homepage_url)
        .bind(self.is_archived)
        .bind(self.is_disabled)
        .bind(self.is_mirror)
        .bind(self.is_private)
        .bind(self.total_issues_count)
        .bind(&self.latest_release_author)
        .bind(self.latest_release_created_at)
        .bind(&self.latest_release_name)
        .bind(self.latest_release_published_at)
        .bind(&self.license_key)
        .bind(&self.license_name)
        .bind(&self.license_nickname)
        .bind(&self.open_graph_image_url)
        .bind(&self.primary_language)
        .bind(self.pushed_at)
        .bind(self.releases_count)
        .bind(self.stargazers_count)
        .bind(self.updated_at)
        .bind(self.watchers_count)
        .execute(executor)
        .await?;

        Ok(())
    }

    pub async fn find_by_repo(pool: &PgPool, repo_id: Uuid) -> Result<Option<Self>> {
        let info = sqlx::query_as::<_, GithubRepoInfo>(
            "SELECT * FROM github_repo_info WHERE repo_id = $1",
        )
        .bind(repo_id)
        .fetch_optional(pool)
        .await?;

        Ok(info)
    }
}
