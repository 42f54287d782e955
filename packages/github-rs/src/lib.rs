//! Minimal, rate-limit-aware GitHub REST client.
//!
//! Covers the handful of endpoints the sync daemon needs: repository
//! metadata, releases (with `Link`-header pagination), repository listings
//! for users and organizations, and the rate-limit probe.
//!
//! The client records the `x-ratelimit-*` headers of every response it
//! sees. Callers invoke [`GithubClient::wait_for_budget`] between calls;
//! when the remaining budget falls to the floor the client sleeps until
//! the advertised reset, honoring the caller's cancellation token.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, LINK, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Account, License, RateLimit, Release, Repository};

use types::RateLimitResponse;

const DEFAULT_API_BASE: &str = "https://api.github.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Remaining-call threshold at which we start sleeping to the reset.
const RATE_LIMIT_FLOOR: u64 = 10;
/// Upper bound on a single rate-limit sleep.
const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(30 * 60);
const PER_PAGE: u32 = 100;

/// Rate-limit-aware GitHub REST client.
pub struct GithubClient {
    http: Client,
    token: String,
    api_base: String,
    /// Last rate-limit state observed on any response.
    rate: Mutex<Option<RateLimit>>,
}

impl GithubClient {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::with_api_base(token, DEFAULT_API_BASE)
    }

    /// Point the client at a different API root. Used by tests.
    pub fn with_api_base(token: impl Into<String>, api_base: impl Into<String>) -> Result<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            http,
            token: token.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            rate: Mutex::new(None),
        })
    }

    /// The most recently observed rate-limit state, if any.
    pub fn last_rate_limit(&self) -> Option<RateLimit> {
        *self.rate.lock().expect("rate limit lock poisoned")
    }

    /// Probe `GET /rate_limit` and seed the tracked state.
    ///
    /// The endpoint itself does not count against the core budget.
    pub async fn rate_limit(&self) -> Result<RateLimit> {
        let url = format!("{}/rate_limit", self.api_base);
        let resp = self.get(&url).await?;
        let body: RateLimitResponse = resp.json().await?;

        let mut rate = self.rate.lock().expect("rate limit lock poisoned");
        *rate = Some(body.resources.core);

        Ok(body.resources.core)
    }

    /// Sleep until the rate-limit window resets if the remaining budget is
    /// at or below the floor. Returns immediately otherwise.
    pub async fn wait_for_budget(&self, cancel: &CancellationToken) -> Result<()> {
        let state = self.last_rate_limit();

        let Some(rate) = state else { return Ok(()) };
        if rate.remaining > RATE_LIMIT_FLOOR {
            return Ok(());
        }

        let reset = Utc
            .timestamp_opt(rate.reset, 0)
            .single()
            .unwrap_or_else(Utc::now);
        let until = (reset - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO)
            .min(MAX_RATE_LIMIT_WAIT);

        if until.is_zero() {
            return Ok(());
        }

        warn!(
            remaining = rate.remaining,
            reset = %reset,
            wait_secs = until.as_secs(),
            "rate limit budget low, sleeping until reset"
        );

        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            _ = tokio::time::sleep(until) => Ok(()),
        }
    }

    /// `GET /repos/{owner}/{name}`.
    pub async fn get_repository(&self, owner: &str, name: &str) -> Result<Repository> {
        let url = format!("{}/repos/{}/{}", self.api_base, owner, name);
        self.get_json(&url).await
    }

    /// `GET /repos/{owner}/{name}/releases/latest`. A 404 means the
    /// repository has no releases and maps to `None`.
    pub async fn latest_release(&self, owner: &str, name: &str) -> Result<Option<Release>> {
        let url = format!("{}/repos/{}/{}/releases/latest", self.api_base, owner, name);
        match self.get_json(&url).await {
            Ok(release) => Ok(Some(release)),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// `GET /repos/{owner}/{name}/releases`, following `Link: rel="next"`
    /// until exhausted. The token is consulted on every page.
    pub async fn list_releases(
        &self,
        owner: &str,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Release>> {
        let url = format!(
            "{}/repos/{}/{}/releases?per_page={}",
            self.api_base, owner, name, PER_PAGE
        );
        self.get_paginated(url, cancel).await
    }

    /// `GET /users/{user}/repos`, all pages.
    pub async fn list_user_repositories(
        &self,
        user: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Repository>> {
        let url = format!("{}/users/{}/repos?per_page={}", self.api_base, user, PER_PAGE);
        self.get_paginated(url, cancel).await
    }

    /// `GET /orgs/{org}/repos`, all pages.
    pub async fn list_org_repositories(
        &self,
        org: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Repository>> {
        let url = format!("{}/orgs/{}/repos?per_page={}", self.api_base, org, PER_PAGE);
        self.get_paginated(url, cancel).await
    }

    async fn get_paginated<T: DeserializeOwned>(
        &self,
        first_url: String,
        cancel: &CancellationToken,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(first_url);

        while let Some(url) = next.take() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            self.wait_for_budget(cancel).await?;

            let resp = self.get(&url).await?;
            next = next_page_url(resp.headers());

            let page: Vec<T> = resp.json().await?;
            items.extend(page);
        }

        Ok(items)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let resp = self.get(url).await?;
        Ok(resp.json().await?)
    }

    /// Issue a GET, record rate-limit headers, and map non-success
    /// statuses to typed errors.
    async fn get(&self, url: &str) -> Result<Response> {
        let resp = self
            .http
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.token))
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, "syncd")
            .send()
            .await?;

        self.record_rate_headers(resp.headers());

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(url.to_string()));
        }

        // Primary rate limit exhaustion surfaces as 403 (or 429) with a
        // zeroed remaining header.
        let remaining = header_u64(resp.headers(), "x-ratelimit-remaining");
        if (status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS)
            && remaining == Some(0)
        {
            let reset = header_i64(resp.headers(), "x-ratelimit-reset")
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
                .unwrap_or_else(Utc::now);
            return Err(Error::RateLimited { reset });
        }

        let body = resp.text().await.unwrap_or_default();
        Err(Error::Api { status, body })
    }

    fn record_rate_headers(&self, headers: &HeaderMap) {
        let (Some(limit), Some(remaining), Some(reset)) = (
            header_u64(headers, "x-ratelimit-limit"),
            header_u64(headers, "x-ratelimit-remaining"),
            header_i64(headers, "x-ratelimit-reset"),
        ) else {
            return;
        };

        debug!(limit, remaining, reset, "observed rate limit headers");

        let mut rate = self.rate.lock().expect("rate limit lock poisoned");
        *rate = Some(RateLimit {
            limit,
            remaining,
            reset,
        });
    }
}

/// When the rate-limit reset from a [`Error::RateLimited`] lands in the
/// past, callers should still back off briefly before retrying.
pub fn backoff_until(reset: DateTime<Utc>) -> Duration {
    (reset - Utc::now())
        .to_std()
        .unwrap_or(Duration::from_secs(1))
        .min(MAX_RATE_LIMIT_WAIT)
}

/// Extract the `rel="next"` target from a `Link` header, if present.
fn next_page_url(headers: &HeaderMap) -> Option<String> {
    let link = headers.get(LINK)?.to_str().ok()?;

    for part in link.split(',') {
        let mut sections = part.split(';');
        let url = sections.next()?.trim();
        let is_next = sections
            .any(|attr| attr.trim() == "rel=\"next\"");

        if is_next {
            return Some(url.trim_start_matches('<').trim_end_matches('>').to_string());
        }
    }

    None
}

fn header_u64(headers: &HeaderMap, name: &str) -> Option<u64> {
    headers.get(name)?.to_str().ok()?.parse().ok()
}

fn header_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers.get(name)?.to_str().ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers_with_link(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(LINK, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn next_page_parsed_from_link_header() {
        let headers = headers_with_link(
            "<https://api.github.com/repositories/1/releases?page=2>; rel=\"next\", \
             <https://api.github.com/repositories/1/releases?page=5>; rel=\"last\"",
        );

        assert_eq!(
            next_page_url(&headers).as_deref(),
            Some("https://api.github.com/repositories/1/releases?page=2")
        );
    }

    #[test]
    fn no_next_on_last_page() {
        let headers = headers_with_link(
            "<https://api.github.com/repositories/1/releases?page=4>; rel=\"prev\", \
             <https://api.github.com/repositories/1/releases?page=1>; rel=\"first\"",
        );

        assert_eq!(next_page_url(&headers), None);
    }

    #[test]
    fn missing_link_header_means_single_page() {
        assert_eq!(next_page_url(&HeaderMap::new()), None);
    }

    #[test]
    fn rate_headers_parse() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-limit", HeaderValue::from_static("5000"));
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("4999"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("1700000000"));

        assert_eq!(header_u64(&headers, "x-ratelimit-limit"), Some(5000));
        assert_eq!(header_u64(&headers, "x-ratelimit-remaining"), Some(4999));
        assert_eq!(header_i64(&headers, "x-ratelimit-reset"), Some(1700000000));
    }
}
