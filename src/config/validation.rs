//! Configuration validation.
//!
//! Bounds-checks configuration values so operator mistakes fail fast at
//! startup instead of surfacing mid-request.

use super::Config;
use crate::error::ConfigError;

/// Minimum allowed per-attempt model timeout in milliseconds (1 second).
pub const MIN_TIMEOUT_MS: u64 = 1000;

/// Maximum allowed per-attempt model timeout in milliseconds (10 minutes).
pub const MAX_TIMEOUT_MS: u64 = 600_000;

/// Maximum allowed model call attempts.
pub const MAX_ATTEMPTS: u32 = 10;

/// Validate configuration values.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] if any value is out of range:
/// - `ANTHROPIC_API_KEY` must not be empty
/// - `REQUEST_TIMEOUT_MS` must be between 1000 and 600000
/// - `MAX_ATTEMPTS` must be between 1 and 10
/// - `RATE_LIMIT_MAX_REQUESTS` must be at least 1
/// - `STORAGE_BASE_URL` must not be empty
#[must_use = "validation result should be checked"]
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.api_key.is_empty() {
        return Err(ConfigError::InvalidValue {
            var: "ANTHROPIC_API_KEY".into(),
            reason: "must not be empty".into(),
        });
    }

    if config.request_timeout_ms < MIN_TIMEOUT_MS || config.request_timeout_ms > MAX_TIMEOUT_MS {
        return Err(ConfigError::InvalidValue {
            var: "REQUEST_TIMEOUT_MS".into(),
            reason: format!("must be between {MIN_TIMEOUT_MS} and {MAX_TIMEOUT_MS} ms"),
        });
    }

    if config.max_attempts == 0 || config.max_attempts > MAX_ATTEMPTS {
        return Err(ConfigError::InvalidValue {
            var: "MAX_ATTEMPTS".into(),
            reason: format!("must be between 1 and {MAX_ATTEMPTS}"),
        });
    }

    if config.rate_limit_max_requests == 0 {
        return Err(ConfigError::InvalidValue {
            var: "RATE_LIMIT_MAX_REQUESTS".into(),
            reason: "must be at least 1".into(),
        });
    }

    if config.storage_base_url.is_empty() {
        return Err(ConfigError::InvalidValue {
            var: "STORAGE_BASE_URL".into(),
            reason: "must not be empty".into(),
        });
    }

    Ok(())
}
