//! Response payloads for the subset of the REST API this crate consumes.
//!
//! Every scalar the API may omit is an `Option` so that "absent" survives
//! all the way to the database instead of collapsing to a zero value.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// A repository as returned by `GET /repos/{owner}/{repo}` and the
/// list-repositories endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub name: Option<String>,
    pub full_name: Option<String>,
    pub html_url: Option<String>,
    pub description: Option<String>,
    pub homepage: Option<String>,
    pub language: Option<String>,
    pub default_branch: Option<String>,
    pub mirror_url: Option<String>,
    /// Repository size in kilobytes.
    pub size: Option<i32>,
    pub forks_count: Option<i32>,
    pub stargazers_count: Option<i32>,
    pub watchers_count: Option<i32>,
    pub open_issues_count: Option<i32>,
    pub archived: Option<bool>,
    pub disabled: Option<bool>,
    pub private: Option<bool>,
    pub fork: Option<bool>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub pushed_at: Option<DateTime<Utc>>,
    pub license: Option<License>,
    pub owner: Option<Account>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct License {
    pub key: Option<String>,
    pub name: Option<String>,
    pub spdx_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub login: Option<String>,
}

/// A release as returned by the releases endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub name: Option<String>,
    pub tag_name: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub draft: Option<bool>,
    pub prerelease: Option<bool>,
    pub author: Option<Account>,
}

/// The `core` resource of `GET /rate_limit`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RateLimit {
    pub limit: u64,
    pub remaining: u64,
    /// Unix epoch seconds at which the window resets.
    pub reset: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RateLimitResponse {
    pub resources: RateLimitResources,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RateLimitResources {
    pub core: RateLimit,
}
