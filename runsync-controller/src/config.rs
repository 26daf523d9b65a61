//! Controller configuration
//!
//! Defines all configurable parameters for the controller including
//! database and CI engine connection settings, resync interval, worker count
//! and conflict retry bounds.

use std::time::Duration;

use crate::service::retry::Backoff;

/// Controller configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection string
    pub database_url: String,

    /// CI engine base URL (e.g., "http://jenkins:8080")
    pub jenkins_url: String,

    /// CI engine user for basic auth
    pub jenkins_user: Option<String>,

    /// CI engine API token for basic auth
    pub jenkins_token: Option<String>,

    /// How often every marked pipeline is re-enqueued
    pub resync_interval: Duration,

    /// Number of concurrent sync workers
    pub workers: usize,

    /// Attempts made to clear a marker before giving up
    pub conflict_retry_steps: u32,

    /// Delay between those attempts
    pub conflict_retry_delay: Duration,

    /// Upper bound on the requeue delay after failed passes
    pub max_requeue_delay: Duration,

    /// Runs fetched per CI engine request
    pub run_page_size: usize,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(database_url: String, jenkins_url: String) -> Self {
        Self {
            database_url,
            jenkins_url,
            jenkins_user: None,
            jenkins_token: None,
            resync_interval: Duration::from_secs(30),
            workers: 4,
            conflict_retry_steps: 5,
            conflict_retry_delay: Duration::from_millis(10),
            max_requeue_delay: Duration::from_secs(300),
            run_page_size: runsync_client::DEFAULT_PAGE_SIZE,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - DATABASE_URL (required)
    /// - JENKINS_URL (required)
    /// - JENKINS_USER, JENKINS_TOKEN (optional, both or neither)
    /// - RESYNC_INTERVAL (optional, seconds, default: 30)
    /// - WORKERS (optional, default: 4)
    /// - CONFLICT_RETRY_STEPS (optional, default: 5)
    /// - CONFLICT_RETRY_DELAY_MS (optional, default: 10)
    /// - MAX_REQUEUE_DELAY (optional, seconds, default: 300)
    /// - RUN_PAGE_SIZE (optional, default: 100)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Creates configuration from the variables `lookup` resolves
    ///
    /// Unparseable optional values fall back to their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable not set"))?;

        let jenkins_url = lookup("JENKINS_URL")
            .ok_or_else(|| anyhow::anyhow!("JENKINS_URL environment variable not set"))?;

        let parse = |name: &str| lookup(name).and_then(|s| s.parse::<u64>().ok());

        let mut config = Self::new(database_url, jenkins_url);

        config.jenkins_user = lookup("JENKINS_USER").filter(|s| !s.is_empty());
        config.jenkins_token = lookup("JENKINS_TOKEN").filter(|s| !s.is_empty());

        if let Some(secs) = parse("RESYNC_INTERVAL") {
            config.resync_interval = Duration::from_secs(secs);
        }
        if let Some(workers) = parse("WORKERS") {
            config.workers = workers as usize;
        }
        if let Some(steps) = parse("CONFLICT_RETRY_STEPS") {
            config.conflict_retry_steps = steps.min(u32::MAX as u64) as u32;
        }
        if let Some(ms) = parse("CONFLICT_RETRY_DELAY_MS") {
            config.conflict_retry_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = parse("MAX_REQUEUE_DELAY") {
            config.max_requeue_delay = Duration::from_secs(secs);
        }
        if let Some(size) = parse("RUN_PAGE_SIZE") {
            config.run_page_size = size as usize;
        }

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database_url.is_empty() {
            anyhow::bail!("database_url cannot be empty");
        }

        if !self.jenkins_url.starts_with("http://") && !self.jenkins_url.starts_with("https://") {
            anyhow::bail!("jenkins_url must start with http:// or https://");
        }

        if self.jenkins_user.is_some() != self.jenkins_token.is_some() {
            anyhow::bail!("JENKINS_USER and JENKINS_TOKEN must be set together");
        }

        if self.resync_interval.is_zero() {
            anyhow::bail!("resync_interval must be greater than 0");
        }

        if self.workers == 0 {
            anyhow::bail!("workers must be greater than 0");
        }

        if self.conflict_retry_steps == 0 {
            anyhow::bail!("conflict_retry_steps must be greater than 0");
        }

        if self.run_page_size == 0 {
            anyhow::bail!("run_page_size must be greater than 0");
        }

        Ok(())
    }

    /// Retry schedule for clearing the sync request marker
    pub fn conflict_backoff(&self) -> Backoff {
        Backoff {
            steps: self.conflict_retry_steps,
            duration: self.conflict_retry_delay,
            ..Default::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(
            "postgres://localhost/runsync".to_string(),
            "http://localhost:8080".to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.resync_interval, Duration::from_secs(30));
        assert_eq!(config.workers, 4);
        assert_eq!(config.run_page_size, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.jenkins_url = "jenkins:8080".to_string();
        assert!(config.validate().is_err());
        config.jenkins_url = "https://ci.example.com".to_string();

        config.workers = 0;
        assert!(config.validate().is_err());
        config.workers = 1;

        // Credentials must come in pairs
        config.jenkins_user = Some("admin".to_string());
        assert!(config.validate().is_err());
        config.jenkins_token = Some("token".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("DATABASE_URL", "postgres://db/runsync"),
            ("JENKINS_URL", "http://jenkins:8080"),
            ("JENKINS_USER", "admin"),
            ("JENKINS_TOKEN", "secret"),
            ("RESYNC_INTERVAL", "10"),
            ("WORKERS", "8"),
            ("RUN_PAGE_SIZE", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let config = Config::from_lookup(|name| vars.get(name).map(|v| v.to_string())).unwrap();
        assert_eq!(config.database_url, "postgres://db/runsync");
        assert_eq!(config.jenkins_user.as_deref(), Some("admin"));
        assert_eq!(config.resync_interval, Duration::from_secs(10));
        assert_eq!(config.workers, 8);
        assert_eq!(config.run_page_size, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_requires_urls() {
        let err = Config::from_lookup(|name| {
            (name == "DATABASE_URL").then(|| "postgres://db/runsync".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("JENKINS_URL"));
    }

    #[test]
    fn test_conflict_backoff() {
        let mut config = Config::default();
        config.conflict_retry_steps = 3;
        config.conflict_retry_delay = Duration::from_millis(50);

        let backoff = config.conflict_backoff();
        assert_eq!(backoff.steps, 3);
        assert_eq!(backoff.delay(1), Duration::from_millis(50));
        assert_eq!(backoff.delay(2), Duration::from_millis(50));
    }
}
