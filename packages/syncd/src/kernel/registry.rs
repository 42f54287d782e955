//! Handler registry for dispatching claimed sync jobs.
//!
//! Sync types are a closed enumeration; the registry maps each variant to
//! the handler instance registered at startup. A claimed job whose type
//! cannot be resolved is terminal for that job (logged, marked DONE), not
//! a process error.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use super::queue::DequeuedJob;
use crate::common::SyncError;

/// Closed set of sync job discriminators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncType {
    GithubRepoMetadata,
    GitCommits,
    WorkflowRuns,
}

impl SyncType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncType::GithubRepoMetadata => "GITHUB_REPO_METADATA",
            SyncType::GitCommits => "GIT_COMMITS",
            SyncType::WorkflowRuns => "WORKFLOW_RUNS",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "GITHUB_REPO_METADATA" => Some(SyncType::GithubRepoMetadata),
            "GIT_COMMITS" => Some(SyncType::GitCommits),
            "WORKFLOW_RUNS" => Some(SyncType::WorkflowRuns),
            _ => None,
        }
    }
}

impl fmt::Display for SyncType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-job execution context handed to a handler.
///
/// The cancellation token is scoped to this claim; handlers must check it
/// across long operations (pagination, backoff sleeps).
pub struct JobContext {
    pub pool: PgPool,
    pub encryption_secret: String,
    pub cancel: CancellationToken,
}

/// One sync strategy.
///
/// Contract: a handler owns its own transactions for whatever it wants
/// atomic with completion, but the status transition to DONE belongs to
/// the worker. Handlers must be idempotent against partial prior runs;
/// the queue delivers at-least-once.
#[async_trait]
pub trait SyncHandler: Send + Sync + std::fmt::Debug {
    async fn handle(&self, ctx: &JobContext, job: &DequeuedJob) -> Result<(), SyncError>;
}

/// Maps sync types to handler instances. Populated once at startup.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<SyncType, Arc<dyn SyncHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, sync_type: SyncType, handler: Arc<dyn SyncHandler>) {
        self.handlers.insert(sync_type, handler);
    }

    /// Resolve the handler for a job's `sync_type` discriminator.
    pub fn resolve(&self, sync_type: &str) -> Result<Arc<dyn SyncHandler>, SyncError> {
        let parsed = SyncType::parse(sync_type)
            .ok_or_else(|| SyncError::InvalidInput(format!("unknown sync type: {sync_type}")))?;

        self.handlers
            .get(&parsed)
            .cloned()
            .ok_or_else(|| {
                SyncError::InvalidInput(format!("no handler registered for sync type: {parsed}"))
            })
    }

    pub fn is_registered(&self, sync_type: SyncType) -> bool {
        self.handlers.contains_key(&sync_type)
    }

    pub fn registered_types(&self) -> Vec<SyncType> {
        self.handlers.keys().copied().collect()
    }
}
