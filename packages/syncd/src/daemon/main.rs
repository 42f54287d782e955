// Main entry point for the sync daemon

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use syncd_core::domains::syncs::handlers;
use syncd_core::kernel::{
    ImportScheduler, Reaper, ServiceHost, SyncDeps, SyncEnqueuer, SyncQueue, WorkerPool,
    WorkerPoolConfig,
};
use syncd_core::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,syncd_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting repo sync daemon");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(workers = config.concurrency, "Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    let queue = SyncQueue::new(pool.clone());
    let deps = Arc::new(SyncDeps {
        pool: pool.clone(),
        encryption_secret: config.encryption_secret.clone(),
    });
    let registry = Arc::new(handlers::build_registry());

    ServiceHost::new(config.shutdown_grace)
        .with_service(SyncEnqueuer::new(queue.clone(), config.enqueue_interval))
        .with_service(ImportScheduler::new(
            pool.clone(),
            config.encryption_secret.clone(),
            config.import_interval,
        ))
        .with_service(Reaper::new(
            queue.clone(),
            config.reap_interval,
            config.sync_timeout,
        ))
        .with_service(WorkerPool::new(
            queue,
            registry,
            deps,
            WorkerPoolConfig {
                workers: config.concurrency,
                poll_interval: config.worker_poll_interval,
                heartbeat_interval: config.heartbeat_interval,
            },
        ))
        .run_until_shutdown()
        .await
}
