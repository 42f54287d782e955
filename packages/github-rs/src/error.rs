use chrono::{DateTime, Utc};
use reqwest::StatusCode;

/// Errors returned by the GitHub REST client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested resource does not exist (404).
    #[error("github resource not found: {0}")]
    NotFound(String),

    /// The API refused the request because the rate limit is exhausted (403/429).
    #[error("github rate limit exhausted, resets at {reset}")]
    RateLimited { reset: DateTime<Utc> },

    /// The caller's cancellation token fired while waiting or paginating.
    #[error("github request cancelled")]
    Cancelled,

    /// Any other non-success response from the API.
    #[error("github api error: {status}: {body}")]
    Api { status: StatusCode, body: String },

    /// Transport-level failure (DNS, TLS, timeout, ...).
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
