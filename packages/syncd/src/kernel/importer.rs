//! Periodic repo discovery.
//!
//! Each tick claims the repo imports whose interval has elapsed (one
//! statement, skip-locked, so scheduler replicas never double-import),
//! runs the provider-specific discovery, and reconciles the repos table:
//! upsert everything discovered, then prune what the provider no longer
//! lists. Upsert-before-delete means a URL renamed mid-discovery is never
//! both inserted and deleted in one pass.
//!
//! A failed import is logged and left with `last_import` unadvanced, so
//! it becomes due again once `last_import_started_at` ages past the
//! interval.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use github_rs::GithubClient;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::service_host::Service;
use crate::common::credentials;
use crate::common::SyncError;
use crate::domains::repos::discovery;
use crate::domains::repos::models::{ClaimedImport, ImportSettings, ImportType, Repo, RepoImport};
use crate::domains::syncs::models::RepoSync;

pub struct ImportScheduler {
    pool: PgPool,
    encryption_secret: String,
    interval: Duration,
}

impl ImportScheduler {
    pub fn new(pool: PgPool, encryption_secret: String, interval: Duration) -> Self {
        Self {
            pool,
            encryption_secret,
            interval,
        }
    }

    async fn tick(&self, cancel: &CancellationToken) -> Result<()> {
        let due = RepoImport::claim_due(&self.pool).await?;
        if due.is_empty() {
            return Ok(());
        }

        info!(count = due.len(), "claimed repo imports due for discovery");

        for import in due {
            if cancel.is_cancelled() {
                break;
            }

            match self.run_import(&import, cancel).await {
                Ok(count) => {
                    if let Err(e) = RepoImport::mark_updated(&self.pool, import.id).await {
                        error!(import_id = %import.id, error = %e, "failed to mark import as updated");
                        continue;
                    }
                    info!(import_id = %import.id, repos = count, "repo import completed");
                }
                Err(e) => {
                    error!(import_id = %import.id, error = %e, "repo import failed");
                }
            }
        }

        Ok(())
    }

    /// Discover and reconcile a single claimed import. Returns the number
    /// of repositories the provider listed.
    async fn run_import(
        &self,
        import: &ClaimedImport,
        cancel: &CancellationToken,
    ) -> Result<usize, SyncError> {
        let kind = ImportType::parse(&import.kind)
            .ok_or_else(|| SyncError::InvalidInput(format!("unknown import type: {}", import.kind)))?;

        let settings: ImportSettings = serde_json::from_value(import.settings.clone())
            .map_err(|e| SyncError::InvalidInput(format!("invalid import settings: {e}")))?;

        let token = credentials::fetch_github_token(&self.pool, &self.encryption_secret)
            .await
            .map_err(SyncError::Transient)?
            .ok_or(SyncError::CredentialMissing)?;
        let client = GithubClient::new(token)?;

        let discovered = discovery::discover(kind, &settings, &client, cancel).await?;

        for repo in &discovered {
            Repo::upsert(
                &self.pool,
                &repo.url,
                repo.is_github,
                Some(import.id),
                &settings.tags,
            )
            .await?;
        }

        let keep: Vec<String> = discovered.iter().map(|r| r.url.clone()).collect();
        Repo::delete_removed(&self.pool, import.id, &keep).await?;

        if !settings.default_sync_types.is_empty() {
            RepoSync::insert_defaults(&self.pool, import.id, &settings.default_sync_types).await?;
        }

        Ok(discovered.len())
    }
}

#[async_trait]
impl Service for ImportScheduler {
    fn name(&self) -> &'static str {
        "import-scheduler"
    }

    async fn run(self: Box<Self>, shutdown: CancellationToken) -> Result<()> {
        info!(interval_secs = self.interval.as_secs(), "import scheduler starting");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.tick(&shutdown).await {
                        error!(error = %e, "import scheduler tick failed");
                    }
                }
            }
        }

        info!("import scheduler stopped");
        Ok(())
    }
}
