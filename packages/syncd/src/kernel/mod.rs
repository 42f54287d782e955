// Kernel - scheduling and execution infrastructure
//
// Everything here coordinates through the database; there is no in-memory
// job state. Business logic (what a sync actually does) belongs in
// domains/*.

pub mod enqueuer;
pub mod importer;
pub mod queue;
pub mod reaper;
pub mod registry;
pub mod service_host;
pub mod worker;

use sqlx::PgPool;

pub use enqueuer::SyncEnqueuer;
pub use importer::ImportScheduler;
pub use queue::{DequeuedJob, SyncQueue, SyncStatus};
pub use reaper::Reaper;
pub use registry::{HandlerRegistry, JobContext, SyncHandler, SyncType};
pub use service_host::{Service, ServiceHost};
pub use worker::{SyncWorker, WorkerPool, WorkerPoolConfig};

/// Shared dependencies handed to every sync handler.
pub struct SyncDeps {
    pub pool: PgPool,
    /// Symmetric key for the credential store.
    pub encryption_secret: String,
}
