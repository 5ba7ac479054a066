use crate::engine::RetryPolicy;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

/// Main orchestration configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Config {
    /// Engine connection configuration
    #[validate(nested)]
    pub engine: EngineConfig,

    /// Bulk loading configuration
    #[validate(nested)]
    #[serde(default)]
    pub bulk: BulkConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the embedded defaults, an optional file and the environment
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("SEARCH_ORCH_CONFIG")
            .unwrap_or_else(|_| "config/search-orchestrator.toml".to_string());

        let config: Config = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: SEARCH_ORCH_)
            .add_source(
                config::Environment::with_prefix("SEARCH_ORCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string layered over the defaults
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .add_source(config::File::from_str(contents, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct EngineConfig {
    /// Base URL of the engine (e.g. http://localhost:9200)
    #[validate(url)]
    #[serde(default = "default_engine_url")]
    pub url: String,

    /// Timeout for ordinary requests (milliseconds)
    #[validate(range(min = 1))]
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Timeout for aggregate bulk submissions (milliseconds)
    #[validate(range(min = 1))]
    #[serde(default = "default_bulk_timeout")]
    pub bulk_timeout_ms: u64,

    /// Basic auth user name
    pub username: Option<String>,

    /// Name of the environment variable holding the basic auth password
    pub password_env: Option<String>,

    /// Attempts for idempotent calls (including the first one)
    #[validate(range(min = 1, max = 10))]
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial retry backoff (milliseconds)
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

impl EngineConfig {
    /// Config pointing at a specific engine URL with default timeouts
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn bulk_timeout(&self) -> Duration {
        Duration::from_millis(self.bulk_timeout_ms)
    }

    /// Basic auth credentials, resolving the password from the environment
    pub fn credentials(&self) -> Result<Option<(String, String)>> {
        let Some(username) = self.username.clone() else {
            return Ok(None);
        };

        let password = match &self.password_env {
            Some(var) => std::env::var(var).map_err(|_| {
                AppError::Configuration(format!("Password environment variable {} is not set", var))
            })?,
            None => String::new(),
        };

        Ok(Some((username, password)))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(self.max_attempts)
            .with_initial_backoff(Duration::from_millis(self.retry_backoff_ms))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            url: default_engine_url(),
            request_timeout_ms: default_request_timeout(),
            bulk_timeout_ms: default_bulk_timeout(),
            username: None,
            password_env: None,
            max_attempts: default_max_attempts(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BulkConfig {
    /// Maximum operations per aggregate submission
    #[validate(range(min = 1))]
    #[serde(default = "default_max_batch_docs")]
    pub max_batch_docs: usize,

    /// Maximum encoded body size per aggregate submission (bytes)
    #[validate(range(min = 1024))]
    #[serde(default = "default_max_batch_bytes")]
    pub max_batch_bytes: usize,

    /// Concurrent workers on the per-document fallback path
    #[validate(range(min = 1, max = 256))]
    #[serde(default = "default_fallback_concurrency")]
    pub fallback_concurrency: usize,

    /// Attempts per document on the fallback path
    #[validate(range(min = 1, max = 10))]
    #[serde(default = "default_document_attempts")]
    pub document_attempts: u32,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            max_batch_docs: default_max_batch_docs(),
            max_batch_bytes: default_max_batch_bytes(),
            fallback_concurrency: default_fallback_concurrency(),
            document_attempts: default_document_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

// Default value functions
fn default_engine_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_request_timeout() -> u64 {
    10_000
}

fn default_bulk_timeout() -> u64 {
    60_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_backoff() -> u64 {
    250
}

fn default_max_batch_docs() -> usize {
    500
}

fn default_max_batch_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_fallback_concurrency() -> usize {
    4
}

fn default_document_attempts() -> u32 {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}
