use chrono::{DateTime, Utc};

/// Coarse classification of a sync failure.
///
/// The worker records the kind alongside the job's error log; callers use
/// it to reason about what the next enqueue cycle will do (every kind is
/// terminal for the current job, re-execution happens via re-enqueue).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network or database blip; the job will be retried on re-enqueue.
    Transient,
    /// The forge asked us to slow down.
    RateLimited,
    /// No forge credential is configured.
    CredentialMissing,
    /// The job's input cannot be processed (e.g. unparsable repo URL).
    InvalidInput,
    /// An expected-absent resource.
    NotFound,
    /// Programmer error or invariant violation.
    Fatal,
}

/// Error type returned by sync handlers and the import pipeline.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("transient failure: {0}")]
    Transient(#[source] anyhow::Error),

    #[error("rate limited, resets at {reset}")]
    RateLimited { reset: DateTime<Utc> },

    #[error("no forge credential configured")]
    CredentialMissing,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("fatal: {0}")]
    Fatal(#[source] anyhow::Error),
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Transient(_) => ErrorKind::Transient,
            SyncError::RateLimited { .. } => ErrorKind::RateLimited,
            SyncError::CredentialMissing => ErrorKind::CredentialMissing,
            SyncError::InvalidInput(_) => ErrorKind::InvalidInput,
            SyncError::NotFound(_) => ErrorKind::NotFound,
            SyncError::Fatal(_) => ErrorKind::Fatal,
        }
    }
}

impl From<anyhow::Error> for SyncError {
    fn from(e: anyhow::Error) -> Self {
        SyncError::Transient(e)
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(e: sqlx::Error) -> Self {
        SyncError::Transient(e.into())
    }
}

impl From<github_rs::Error> for SyncError {
    fn from(e: github_rs::Error) -> Self {
        match e {
            github_rs::Error::NotFound(resource) => SyncError::NotFound(resource),
            github_rs::Error::RateLimited { reset } => SyncError::RateLimited { reset },
            github_rs::Error::Cancelled => {
                SyncError::Transient(anyhow::anyhow!("cancelled mid-request"))
            }
            e @ github_rs::Error::Api { .. } => SyncError::Transient(e.into()),
            github_rs::Error::Http(e) => SyncError::Transient(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_one_to_one() {
        assert_eq!(
            SyncError::Transient(anyhow::anyhow!("boom")).kind(),
            ErrorKind::Transient
        );
        assert_eq!(SyncError::CredentialMissing.kind(), ErrorKind::CredentialMissing);
        assert_eq!(
            SyncError::InvalidInput("bad url".into()).kind(),
            ErrorKind::InvalidInput
        );
    }

    #[test]
    fn github_not_found_stays_not_found() {
        let e: SyncError = github_rs::Error::NotFound("repo".into()).into();
        assert_eq!(e.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn github_cancellation_is_transient() {
        let e: SyncError = github_rs::Error::Cancelled.into();
        assert_eq!(e.kind(), ErrorKind::Transient);
    }
}
