//! Configuration management.
//!
//! This module handles:
//! - Environment variable loading
//! - Configuration validation
//! - Default value handling
//! - Secure API key storage via [`SecretString`]
//!
//! # Example
//!
//! ```
//! use mindviz::config::{Config, SecretString, DEFAULT_MODEL};
//!
//! // Create a config directly (use Config::from_env() in production)
//! let config = Config {
//!     api_key: SecretString::new("sk-ant-example-key"),
//!     storage_base_url: "https://storage.example.com/mindviz".to_string(),
//!     log_level: "info".to_string(),
//!     request_timeout_ms: 30000,
//!     max_attempts: 3,
//!     retry_base_delay_ms: 1000,
//!     model: DEFAULT_MODEL.to_string(),
//!     rate_limit_max_requests: 5,
//!     rate_limit_window_secs: 3600,
//! };
//!
//! // API key is protected from accidental logging
//! let debug = format!("{:?}", config);
//! assert!(debug.contains("<REDACTED>"));
//! assert!(!debug.contains("sk-ant-example-key"));
//! ```

mod secret;
mod validation;

pub use secret::SecretString;
pub use validation::{validate_config, MAX_ATTEMPTS, MAX_TIMEOUT_MS, MIN_TIMEOUT_MS};

use crate::error::ConfigError;

/// Default object storage base URL.
pub const DEFAULT_STORAGE_BASE_URL: &str = "https://storage.googleapis.com/mindviz-artifacts";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default per-attempt model request timeout in milliseconds (30s).
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Default maximum model call attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay for exponential backoff in milliseconds.
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;

/// Default Anthropic model.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Default rate-limit budget per window.
pub const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u32 = 5;

/// Default rate-limit window in seconds (1 hour).
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 3600;

/// Application configuration.
///
/// Use [`Config::from_env`] to load configuration from environment
/// variables. The `api_key` field uses [`SecretString`] to prevent
/// accidental logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Anthropic API key (protected from logging via [`SecretString`]).
    pub api_key: SecretString,
    /// Base URL of the public artifact bucket.
    pub storage_base_url: String,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: String,
    /// Per-attempt model request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Maximum model call attempts (first try plus retries).
    pub max_attempts: u32,
    /// Base delay for exponential backoff in milliseconds.
    pub retry_base_delay_ms: u64,
    /// Anthropic model to use.
    pub model: String,
    /// Requests admitted per client per window.
    pub rate_limit_max_requests: u32,
    /// Rate-limit window duration in seconds.
    pub rate_limit_window_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required environment variables:
    /// - `ANTHROPIC_API_KEY`: Anthropic API key
    ///
    /// Optional environment variables (with defaults):
    /// - `STORAGE_BASE_URL`: public artifact bucket base URL
    /// - `LOG_LEVEL`: logging level (default: `info`)
    /// - `REQUEST_TIMEOUT_MS`: per-attempt model timeout (default: `30000`)
    /// - `MAX_ATTEMPTS`: model call attempts (default: `3`)
    /// - `RETRY_BASE_DELAY_MS`: backoff base delay (default: `1000`)
    /// - `ANTHROPIC_MODEL`: model to use (default: `claude-sonnet-4-20250514`)
    /// - `RATE_LIMIT_MAX_REQUESTS`: admissions per window (default: `5`)
    /// - `RATE_LIMIT_WINDOW_SECS`: window duration (default: `3600`)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `ANTHROPIC_API_KEY` is missing, a numeric
    /// variable fails to parse, or any value fails validation (see
    /// [`validate_config`]).
    #[must_use = "configuration should be used"]
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        let api_key =
            std::env::var("ANTHROPIC_API_KEY").map_err(|_| ConfigError::MissingRequired {
                var: "ANTHROPIC_API_KEY".into(),
            })?;

        let storage_base_url =
            std::env::var("STORAGE_BASE_URL").unwrap_or_else(|_| DEFAULT_STORAGE_BASE_URL.into());

        let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.into());

        let request_timeout_ms = parse_env_u64("REQUEST_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS)?;
        let max_attempts = parse_env_u32("MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?;
        let retry_base_delay_ms =
            parse_env_u64("RETRY_BASE_DELAY_MS", DEFAULT_RETRY_BASE_DELAY_MS)?;

        let model = std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());

        let rate_limit_max_requests =
            parse_env_u32("RATE_LIMIT_MAX_REQUESTS", DEFAULT_RATE_LIMIT_MAX_REQUESTS)?;
        let rate_limit_window_secs =
            parse_env_u64("RATE_LIMIT_WINDOW_SECS", DEFAULT_RATE_LIMIT_WINDOW_SECS)?;

        let config = Self {
            api_key: SecretString::new(api_key),
            storage_base_url,
            log_level,
            request_timeout_ms,
            max_attempts,
            retry_base_delay_ms,
            model,
            rate_limit_max_requests,
            rate_limit_window_secs,
        };

        validate_config(&config)?;
        Ok(config)
    }
}

/// Parse an environment variable as u64, using a default if not set.
fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    std::env::var(name).map_or(Ok(default), |val| {
        val.parse().map_err(|_| ConfigError::InvalidValue {
            var: name.into(),
            reason: "must be a positive integer".into(),
        })
    })
}

/// Parse an environment variable as u32, using a default if not set.
fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    std::env::var(name).map_or(Ok(default), |val| {
        val.parse().map_err(|_| ConfigError::InvalidValue {
            var: name.into(),
            reason: "must be a positive integer".into(),
        })
    })
}
