//! Periodic task that fills the sync queue.
//!
//! Each tick is a single statement against the store; batch gating and
//! duplicate suppression live in the SQL (see [`SyncQueue::enqueue_pending`]),
//! so concurrent enqueuer replicas are safe by construction.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::queue::SyncQueue;
use super::service_host::Service;

pub struct SyncEnqueuer {
    queue: SyncQueue,
    interval: Duration,
}

impl SyncEnqueuer {
    pub fn new(queue: SyncQueue, interval: Duration) -> Self {
        Self { queue, interval }
    }
}

#[async_trait]
impl Service for SyncEnqueuer {
    fn name(&self) -> &'static str {
        "sync-enqueuer"
    }

    async fn run(self: Box<Self>, shutdown: CancellationToken) -> Result<()> {
        info!(interval_secs = self.interval.as_secs(), "sync enqueuer starting");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    match self.queue.enqueue_pending().await {
                        Ok(0) => debug!("no syncs to enqueue"),
                        Ok(count) => info!(count, "enqueued pending syncs"),
                        // Next tick retries; a failed tick must not take
                        // the service down.
                        Err(e) => error!(error = %e, "failed to enqueue pending syncs"),
                    }
                }
            }
        }

        info!("sync enqueuer stopped");
        Ok(())
    }
}
