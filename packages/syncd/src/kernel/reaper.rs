//! Periodic task that times out silent RUNNING jobs.
//!
//! A worker that crashed or lost its database connection stops
//! heartbeating; the reaper transitions such rows to DONE with an ERROR
//! log so the enqueuer can schedule the sync again.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::queue::SyncQueue;
use super::service_host::Service;

pub struct Reaper {
    queue: SyncQueue,
    interval: Duration,
    /// Heartbeat lapse after which a RUNNING row is considered dead.
    timeout: Duration,
}

impl Reaper {
    pub fn new(queue: SyncQueue, interval: Duration, timeout: Duration) -> Self {
        Self {
            queue,
            interval,
            timeout,
        }
    }
}

#[async_trait]
impl Service for Reaper {
    fn name(&self) -> &'static str {
        "sync-reaper"
    }

    async fn run(self: Box<Self>, shutdown: CancellationToken) -> Result<()> {
        info!(
            interval_secs = self.interval.as_secs(),
            timeout_secs = self.timeout.as_secs(),
            "reaper starting"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    match self.queue.reap(self.timeout).await {
                        Ok(ids) if ids.is_empty() => {}
                        Ok(ids) => info!(count = ids.len(), ?ids, "timed out silent sync jobs"),
                        Err(e) => error!(error = %e, "failed to reap timed out jobs"),
                    }
                }
            }
        }

        info!("reaper stopped");
        Ok(())
    }
}
