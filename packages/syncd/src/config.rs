use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use dotenvy::dotenv;

/// Daemon configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Symmetric key for decrypting stored forge credentials.
    pub encryption_secret: String,
    /// Number of concurrent sync workers.
    pub concurrency: usize,
    /// How often the enqueuer schedules pending syncs.
    pub enqueue_interval: Duration,
    /// How often the import scheduler looks for due repo imports.
    pub import_interval: Duration,
    /// How often the reaper times out silent RUNNING jobs.
    pub reap_interval: Duration,
    /// How long an idle worker sleeps between queue polls.
    pub worker_poll_interval: Duration,
    /// How often a worker proves liveness for its claimed job.
    pub heartbeat_interval: Duration,
    /// Heartbeat lapse after which a RUNNING job is reaped.
    pub sync_timeout: Duration,
    /// How long shutdown waits for in-flight jobs before abandoning them.
    pub shutdown_grace: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        let config = Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            encryption_secret: env::var("ENCRYPTION_SECRET")
                .context("ENCRYPTION_SECRET must be set")?,
            concurrency: env_parse("CONCURRENCY", 5)?,
            enqueue_interval: env_duration_secs("SYNC_ENQUEUE_INTERVAL_SECS", 10)?,
            import_interval: env_duration_secs("IMPORT_INTERVAL_SECS", 30)?,
            reap_interval: env_duration_secs("REAP_INTERVAL_SECS", 60)?,
            worker_poll_interval: env_duration_secs("WORKER_POLL_INTERVAL_SECS", 10)?,
            heartbeat_interval: env_duration_secs("HEARTBEAT_INTERVAL_SECS", 30)?,
            sync_timeout: env_duration_secs("SYNC_TIMEOUT_SECS", 600)?,
            shutdown_grace: env_duration_secs("SHUTDOWN_GRACE_SECS", 30)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would break liveness detection.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            bail!("CONCURRENCY must be at least 1");
        }
        // A reaped job must have missed at least two heartbeats.
        if self.heartbeat_interval >= self.sync_timeout / 2 {
            bail!(
                "HEARTBEAT_INTERVAL_SECS ({}s) must be less than half of SYNC_TIMEOUT_SECS ({}s)",
                self.heartbeat_interval.as_secs(),
                self.sync_timeout.as_secs()
            );
        }
        Ok(())
    }
}

fn env_parse(name: &str, default: usize) -> Result<usize> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{name} must be a valid number")),
        Err(_) => Ok(default),
    }
}

fn env_duration_secs(name: &str, default_secs: u64) -> Result<Duration> {
    match env::var(name) {
        Ok(raw) => {
            let secs: u64 = raw
                .parse()
                .with_context(|| format!("{name} must be a number of seconds"))?;
            Ok(Duration::from_secs(secs))
        }
        Err(_) => Ok(Duration::from_secs(default_secs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> Config {
        Config {
            database_url: "postgres://localhost/syncd".to_string(),
            encryption_secret: "secret".to_string(),
            concurrency: 5,
            enqueue_interval: Duration::from_secs(10),
            import_interval: Duration::from_secs(30),
            reap_interval: Duration::from_secs(60),
            worker_poll_interval: Duration::from_secs(10),
            heartbeat_interval: Duration::from_secs(30),
            sync_timeout: Duration::from_secs(600),
            shutdown_grace: Duration::from_secs(30),
        }
    }

    #[test]
    fn default_intervals_are_valid() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn heartbeat_must_be_well_under_timeout() {
        let mut config = base_config();
        config.heartbeat_interval = Duration::from_secs(300);
        assert!(config.validate().is_err());

        config.heartbeat_interval = Duration::from_secs(299);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_workers_rejected() {
        let mut config = base_config();
        config.concurrency = 0;
        assert!(config.validate().is_err());
    }
}
