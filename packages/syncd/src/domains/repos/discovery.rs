//! Provider-specific repository discovery.
//!
//! A strategy turns an import's settings into the full list of
//! repository URLs the provider currently hosts. Listings are paginated
//! and can take a while on large orgs, so every strategy threads the
//! caller's cancellation token through the client.

use github_rs::GithubClient;
use tokio_util::sync::CancellationToken;

use super::models::{ImportSettings, ImportType};
use crate::common::SyncError;

/// One repository reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredRepo {
    pub url: String,
    pub is_github: bool,
}

/// Run the discovery strategy for `kind` and return the provider's
/// current repository list.
pub async fn discover(
    kind: ImportType,
    settings: &ImportSettings,
    client: &GithubClient,
    cancel: &CancellationToken,
) -> Result<Vec<DiscoveredRepo>, SyncError> {
    let listed = match kind {
        ImportType::GithubUser => {
            let user = settings
                .user
                .as_deref()
                .ok_or_else(|| SyncError::InvalidInput("GITHUB_USER import has no user".into()))?;
            client.list_user_repositories(user, cancel).await?
        }
        ImportType::GithubOrg => {
            let org = settings
                .org
                .as_deref()
                .ok_or_else(|| SyncError::InvalidInput("GITHUB_ORG import has no org".into()))?;
            client.list_org_repositories(org, cancel).await?
        }
    };

    Ok(listed
        .into_iter()
        .filter_map(|repo| repo.html_url)
        .map(|url| DiscoveredRepo {
            url,
            is_github: true,
        })
        .collect())
}
