//! Sync workers: claim jobs, run handlers, keep claims alive.
//!
//! # Architecture
//!
//! ```text
//! WorkerPool (Service)
//!     │ spawns N
//!     ▼
//! SyncWorker loop
//!     ├─► SyncQueue.dequeue_one()          (QUEUED -> RUNNING, atomic)
//!     ├─► spawn heartbeat task              (scoped to the claim)
//!     ├─► HandlerRegistry.resolve + handle
//!     ├─► terminal log line                 (INFO success / ERROR failure)
//!     └─► SyncQueue.set_status(DONE)        (every exit path)
//! ```
//!
//! The worker owns the DONE transition; handlers never touch queue
//! status. If the worker dies mid-job the reaper recovers the row via
//! heartbeat lapse.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use futures::FutureExt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::queue::{DequeuedJob, SyncQueue, SyncStatus};
use super::registry::{HandlerRegistry, JobContext};
use super::service_host::Service;
use super::SyncDeps;
use crate::common::SyncError;
use crate::domains::syncs::models::{SyncLog, SyncLogType};

/// Configuration for the worker pool.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of concurrent workers.
    pub workers: usize,
    /// How long an idle worker sleeps between polls.
    pub poll_interval: Duration,
    /// How often a claim's liveness is proven.
    pub heartbeat_interval: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            poll_interval: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(30),
        }
    }
}

/// Fixed set of workers pulling from the shared queue.
pub struct WorkerPool {
    queue: SyncQueue,
    registry: Arc<HandlerRegistry>,
    deps: Arc<SyncDeps>,
    config: WorkerPoolConfig,
}

impl WorkerPool {
    pub fn new(
        queue: SyncQueue,
        registry: Arc<HandlerRegistry>,
        deps: Arc<SyncDeps>,
        config: WorkerPoolConfig,
    ) -> Self {
        Self {
            queue,
            registry,
            deps,
            config,
        }
    }
}

#[async_trait]
impl Service for WorkerPool {
    fn name(&self) -> &'static str {
        "worker-pool"
    }

    async fn run(self: Box<Self>, shutdown: CancellationToken) -> Result<()> {
        info!(workers = self.config.workers, "worker pool starting");

        let mut tasks = JoinSet::new();
        for worker_id in 0..self.config.workers {
            let worker = SyncWorker::new(
                worker_id,
                self.queue.clone(),
                self.registry.clone(),
                self.deps.clone(),
                self.config.clone(),
            );
            tasks.spawn(worker.run(shutdown.clone()));
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "worker task panicked");
            }
        }

        info!("worker pool stopped");
        Ok(())
    }
}

/// One worker loop.
pub struct SyncWorker {
    worker_id: usize,
    queue: SyncQueue,
    registry: Arc<HandlerRegistry>,
    deps: Arc<SyncDeps>,
    config: WorkerPoolConfig,
}

impl SyncWorker {
    pub fn new(
        worker_id: usize,
        queue: SyncQueue,
        registry: Arc<HandlerRegistry>,
        deps: Arc<SyncDeps>,
        config: WorkerPoolConfig,
    ) -> Self {
        Self {
            worker_id,
            queue,
            registry,
            deps,
            config,
        }
    }

    /// Poll-and-process until shutdown.
    pub async fn run(self, shutdown: CancellationToken) {
        debug!(worker_id = self.worker_id, "worker starting");

        while !shutdown.is_cancelled() {
            match self.run_next(&shutdown).await {
                Ok(true) => {}
                Ok(false) => {
                    // Queue empty, back off until the next poll.
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                    }
                }
                Err(e) => {
                    error!(worker_id = self.worker_id, error = %e, "failed to dequeue job");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                    }
                }
            }
        }

        debug!(worker_id = self.worker_id, "worker stopped");
    }

    /// Claim and process at most one job. Returns whether a job was
    /// processed.
    pub async fn run_next(&self, shutdown: &CancellationToken) -> Result<bool> {
        let Some(job) = self.queue.dequeue_one().await? else {
            return Ok(false);
        };

        self.process(job, shutdown).await;
        Ok(true)
    }

    async fn process(&self, job: DequeuedJob, shutdown: &CancellationToken) {
        let queue_id = job.queue_id;
        let sync_type = job.sync_type.clone();

        info!(
            worker_id = self.worker_id,
            queue_id,
            sync_type = %sync_type,
            repo = %job.repo,
            "processing sync job"
        );

        self.log(
            queue_id,
            SyncLogType::Info,
            format!("Starting sync {} for {}", sync_type, job.repo),
        )
        .await;

        // Scope the job to a child token so per-job cancellation (used to
        // stop the heartbeat) cannot leak into the process-wide token.
        let job_cancel = shutdown.child_token();
        let result = self.execute_with_keep_alive(&job, job_cancel).await;

        match &result {
            Ok(()) => {
                self.log(
                    queue_id,
                    SyncLogType::Info,
                    format!("Finished sync {} for {}", sync_type, job.repo),
                )
                .await;
            }
            Err(e) => {
                warn!(
                    worker_id = self.worker_id,
                    queue_id,
                    sync_type = %sync_type,
                    error = %e,
                    "sync job failed"
                );
                self.log(queue_id, SyncLogType::Error, e.to_string()).await;
            }
        }

        // The row must reach DONE on every exit path. If the reaper got
        // there first this is a no-op by value.
        if let Err(e) = self.queue.set_status(queue_id, SyncStatus::Done).await {
            error!(queue_id, error = %e, "failed to mark job as DONE");
        }
    }

    /// Run the handler with a heartbeat task scoped to the claim.
    ///
    /// The heartbeat stops on every exit path: success, handler error,
    /// handler panic, and shutdown.
    async fn execute_with_keep_alive(
        &self,
        job: &DequeuedJob,
        cancel: CancellationToken,
    ) -> Result<(), SyncError> {
        let queue = self.queue.clone();
        let queue_id = job.queue_id;
        let heartbeat_interval = self.config.heartbeat_interval;

        let heartbeat_cancel = cancel.clone();
        let heartbeat = tokio::spawn(async move {
            let mut interval = tokio::time::interval(heartbeat_interval);
            interval.tick().await; // Skip first immediate tick

            loop {
                tokio::select! {
                    _ = heartbeat_cancel.cancelled() => break,
                    _ = interval.tick() => {
                        if let Err(e) = queue.set_keep_alive(queue_id).await {
                            warn!(queue_id, error = %e, "heartbeat failed");
                        }
                    }
                }
            }
        });

        let result = match self.registry.resolve(&job.sync_type) {
            Ok(handler) => {
                let ctx = JobContext {
                    pool: self.deps.pool.clone(),
                    encryption_secret: self.deps.encryption_secret.clone(),
                    cancel: cancel.clone(),
                };

                AssertUnwindSafe(handler.handle(&ctx, job))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| {
                        Err(SyncError::Fatal(anyhow::anyhow!("sync handler panicked")))
                    })
            }
            Err(e) => Err(e),
        };

        cancel.cancel();
        let _ = heartbeat.await;

        result
    }

    async fn log(&self, queue_id: i64, log_type: SyncLogType, message: String) {
        if let Err(e) = SyncLog::insert(&self.deps.pool, queue_id, log_type, &message).await {
            error!(queue_id, error = %e, "failed to insert sync log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = WorkerPoolConfig::default();
        assert_eq!(config.workers, 5);
        assert!(config.heartbeat_interval < Duration::from_secs(600) / 2);
    }
}
