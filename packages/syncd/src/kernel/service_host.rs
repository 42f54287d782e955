//! Long-running service hosting with shared shutdown.
//!
//! Each background task (enqueuer, import scheduler, reaper, worker pool)
//! implements [`Service`]; the [`ServiceHost`] spawns them with a shared
//! cancellation token, cancels on SIGINT, and bounds the drain with the
//! configured grace window.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// A long-running background task.
#[async_trait]
pub trait Service: Send {
    fn name(&self) -> &'static str;

    /// Run until the shutdown token is cancelled.
    async fn run(self: Box<Self>, shutdown: CancellationToken) -> Result<()>;
}

/// Spawns services and coordinates graceful shutdown.
pub struct ServiceHost {
    services: Vec<Box<dyn Service>>,
    shutdown_grace: Duration,
}

impl ServiceHost {
    pub fn new(shutdown_grace: Duration) -> Self {
        Self {
            services: Vec::new(),
            shutdown_grace,
        }
    }

    pub fn with_service(mut self, service: impl Service + 'static) -> Self {
        self.services.push(Box::new(service));
        self
    }

    /// Run all services until SIGINT, then cancel and drain within the
    /// grace window. Services still running after the window are aborted;
    /// their in-flight jobs are reclaimed later by the reaper.
    pub async fn run_until_shutdown(self) -> Result<()> {
        let shutdown = CancellationToken::new();
        let mut tasks = JoinSet::new();

        for service in self.services {
            let name = service.name();
            let token = shutdown.clone();
            tasks.spawn(async move {
                if let Err(e) = service.run(token).await {
                    error!(service = name, error = %e, "service exited with error");
                }
                name
            });
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("received shutdown signal");
            }
            _ = wait_all(&mut tasks) => {
                warn!("all services stopped on their own");
                return Ok(());
            }
        }

        shutdown.cancel();

        if tokio::time::timeout(self.shutdown_grace, wait_all(&mut tasks))
            .await
            .is_err()
        {
            warn!(
                grace_secs = self.shutdown_grace.as_secs(),
                "grace window elapsed, abandoning remaining services"
            );
            tasks.abort_all();
        }

        info!("shutdown complete");
        Ok(())
    }
}

async fn wait_all(tasks: &mut JoinSet<&'static str>) {
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(name) => info!(service = name, "service stopped"),
            Err(e) if e.is_cancelled() => {}
            Err(e) => error!(error = %e, "service task panicked"),
        }
    }
}
