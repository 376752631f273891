use std::path::Path;
use std::time::Duration;

use config::Config;
use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_USER_AGENT: &str = concat!(
    "oj-scraper/",
    env!("CARGO_PKG_VERSION"),
    " (algorithm review bot; problem metadata fetcher)"
);

const MAX_CONCURRENCY: usize = 64;

/// Raw settings as read from file + environment (`OJ_SCRAPER_*`).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub timeout_secs: u64,
    pub concurrency: usize,
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub user_agent: String,
    pub batch_deadline_secs: Option<u64>,
    pub readme_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            timeout_secs: 10,
            concurrency: 8,
            max_retries: 2,
            backoff_ms: 500,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            batch_deadline_secs: None,
            readme_name: "README.md".to_string(),
        }
    }
}

impl Settings {
    /// Load from an optional config file, then `OJ_SCRAPER_*` env vars.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix("OJ_SCRAPER"))
            .build()?
            .try_deserialize::<Settings>()?;
        Ok(settings)
    }

    pub fn validate(self) -> Result<ScrapeConfig, ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be positive".into()));
        }
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(ConfigError::Invalid(format!(
                "concurrency must be between 1 and {}, got {}",
                MAX_CONCURRENCY, self.concurrency
            )));
        }
        if self.max_retries > 10 {
            return Err(ConfigError::Invalid(format!(
                "max_retries must be at most 10, got {}",
                self.max_retries
            )));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::Invalid("user_agent must not be empty".into()));
        }
        if self.readme_name.contains('/') || self.readme_name.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "readme_name must be a bare file name, got {:?}",
                self.readme_name
            )));
        }
        Ok(ScrapeConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            concurrency: self.concurrency,
            retry: RetryPolicy {
                max_retries: self.max_retries,
                base_backoff: Duration::from_millis(self.backoff_ms),
            },
            user_agent: self.user_agent,
            batch_deadline: self.batch_deadline_secs.map(Duration::from_secs),
            readme_name: self.readme_name,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    /// `base * 2^attempt`, attempt counted from 0.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_backoff.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 2,
            base_backoff: Duration::from_millis(500),
        }
    }
}

/// Validated parameters handed to the core. The core never reads the
/// environment itself.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub timeout: Duration,
    pub concurrency: usize,
    pub retry: RetryPolicy,
    pub user_agent: String,
    pub batch_deadline: Option<Duration>,
    pub readme_name: String,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        ScrapeConfig {
            timeout: Duration::from_secs(10),
            concurrency: 8,
            retry: RetryPolicy::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            batch_deadline: None,
            readme_name: "README.md".to_string(),
        }
    }
}
