//! Reference sync handler: refresh a repo's forge metadata.
//!
//! Fetches the repository object, its latest release, and the full
//! release list from the forge API, then replaces the metadata row in one
//! transaction. The delete+insert pair makes the handler idempotent
//! against partial prior runs; the queue row's DONE transition stays with
//! the worker.

use std::future::Future;

use async_trait::async_trait;
use github_rs::GithubClient;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::common::{credentials, SyncError};
use crate::domains::syncs::models::GithubRepoInfo;
use crate::kernel::{DequeuedJob, JobContext, SyncHandler};

#[derive(Debug)]
pub struct GithubRepoMetadataHandler;

#[async_trait]
impl SyncHandler for GithubRepoMetadataHandler {
    async fn handle(&self, ctx: &JobContext, job: &DequeuedJob) -> Result<(), SyncError> {
        let (owner, name) = parse_owner_and_name(&job.repo)?;

        let token = credentials::fetch_github_token(&ctx.pool, &ctx.encryption_secret)
            .await
            .map_err(SyncError::Transient)?
            .ok_or(SyncError::CredentialMissing)?;
        let client = GithubClient::new(token)?;

        // Seed the tracked rate-limit state before the first real call;
        // the probe itself does not consume budget.
        call_forge(&ctx.cancel, || client.rate_limit()).await?;

        client.wait_for_budget(&ctx.cancel).await?;
        let repo = call_forge(&ctx.cancel, || client.get_repository(&owner, &name)).await?;

        client.wait_for_budget(&ctx.cancel).await?;
        let latest_release =
            call_forge(&ctx.cancel, || client.latest_release(&owner, &name)).await?;

        let releases =
            call_forge(&ctx.cancel, || client.list_releases(&owner, &name, &ctx.cancel)).await?;

        debug!(
            repo = %job.repo,
            releases = releases.len(),
            "retrieved repo metadata from forge"
        );

        let info = GithubRepoInfo::from_api(
            job.repo_id,
            &owner,
            &name,
            &repo,
            latest_release.as_ref(),
            releases.len(),
            &job.repo,
        );

        let mut tx = ctx.pool.begin().await.map_err(SyncError::from)?;
        GithubRepoInfo::delete_for_repo(&mut *tx, job.repo_id)
            .await
            .map_err(SyncError::Transient)?;
        info.insert(&mut *tx).await.map_err(SyncError::Transient)?;
        tx.commit().await.map_err(SyncError::from)?;

        Ok(())
    }
}

/// Run one forge call, absorbing hard rate-limit responses by sleeping
/// to the advertised reset and retrying. Cancellation during the sleep
/// surfaces as a transient failure so the job completes with an error
/// log and is retried on re-enqueue.
async fn call_forge<T, F, Fut>(cancel: &CancellationToken, mut call: F) -> Result<T, SyncError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = github_rs::Result<T>>,
{
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(github_rs::Error::RateLimited { reset }) => {
                let wait = github_rs::backoff_until(reset);
                debug!(wait_secs = wait.as_secs(), "forge rate limit hit, backing off");
                tokio::select! {
                    _ = cancel.cancelled() => {
                        return Err(SyncError::Transient(anyhow::anyhow!(
                            "cancelled while waiting out forge rate limit"
                        )));
                    }
                    _ = tokio::time::sleep(wait) => {}
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Split a repository URL into (owner, name).
fn parse_owner_and_name(repo_url: &str) -> Result<(String, String), SyncError> {
    let parsed = url::Url::parse(repo_url)
        .map_err(|e| SyncError::InvalidInput(format!("could not parse repo url {repo_url}: {e}")))?;

    let mut segments = parsed
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()))
        .ok_or_else(|| SyncError::InvalidInput(format!("repo url has no path: {repo_url}")))?;

    let owner = segments
        .next()
        .ok_or_else(|| SyncError::InvalidInput(format!("repo url has no owner: {repo_url}")))?;
    let name = segments
        .next()
        .ok_or_else(|| SyncError::InvalidInput(format!("repo url has no name: {repo_url}")))?;

    Ok((owner.to_string(), name.trim_end_matches(".git").to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorKind;

    #[test]
    fn parses_owner_and_name() {
        let (owner, name) = parse_owner_and_name("https://github.com/acme/widget").unwrap();
        assert_eq!(owner, "acme");
        assert_eq!(name, "widget");
    }

    #[test]
    fn strips_git_suffix() {
        let (_, name) = parse_owner_and_name("https://github.com/acme/widget.git").unwrap();
        assert_eq!(name, "widget");
    }

    #[test]
    fn trailing_slash_tolerated() {
        let (owner, name) = parse_owner_and_name("https://github.com/acme/widget/").unwrap();
        assert_eq!(owner, "acme");
        assert_eq!(name, "widget");
    }

    #[test]
    fn rejects_url_without_name() {
        let err = parse_owner_and_name("https://github.com/acme").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn rejects_garbage() {
        let err = parse_owner_and_name("not a url").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
