// Repo fleet sync daemon - core library
//
// Periodically discovers repositories from external providers and runs
// per-repository sync jobs through a Postgres-backed queue. All job
// coordination lives in the database (skip-locked claims, heartbeats,
// timeout reaping); worker replicas compose without leader election.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;

pub use config::*;
