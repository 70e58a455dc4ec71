//! Error types for the mindviz pipeline.
//!
//! This module defines a hierarchical error system:
//! - [`PipelineError`]: the closed client-facing failure taxonomy
//! - [`ApiError`]: Anthropic API specific errors
//! - [`StorageError`]: object storage upload errors
//! - [`ConfigError`]: configuration errors
//!
//! The orchestrator branches on `PipelineError` variants, never on message
//! substrings; retry decisions inside the model invoker branch on
//! [`ApiError::is_retryable`].

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Client-facing pipeline failure taxonomy.
///
/// One variant per failure kind. Each variant knows whether the caller can
/// recover, what to do next, and which HTTP status class it maps to.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// The rate limiter denied the request.
    #[error("rate limit exceeded: {remaining} of {limit} requests remaining, resets at {reset_at}")]
    AdmissionDenied {
        /// Configured requests-per-window limit.
        limit: u32,
        /// Requests remaining in the current window.
        remaining: u32,
        /// When the oldest in-window request falls out of the window.
        reset_at: DateTime<Utc>,
    },

    /// The pipeline is misconfigured (e.g. missing or rejected credentials).
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the operator-fixable problem.
        message: String,
    },

    /// A model call timed out after exhausting its retries.
    #[error("model request timed out after {timeout_ms}ms")]
    Timeout {
        /// Per-attempt timeout in milliseconds.
        timeout_ms: u64,
    },

    /// A model call kept failing until the retry budget ran out.
    #[error("model unavailable after {attempts} attempts: {message}")]
    ExhaustedRetries {
        /// Number of attempts made.
        attempts: u32,
        /// Description of the last failure.
        message: String,
    },

    /// The model reply did not parse or validate.
    #[error("malformed model response: {reason}")]
    MalformedResponse {
        /// What was missing or unparseable.
        reason: String,
    },

    /// The generated-code sanitizer rejected the code (fail-closed gate).
    #[error("generated code rejected: blocked pattern {signature}")]
    UnsafeContent {
        /// Name of the blocklist signature that survived cleanup.
        signature: String,
    },

    /// The artifact upload failed.
    #[error("artifact storage failed: {message}")]
    Storage {
        /// Description of the upload failure.
        message: String,
    },
}

impl PipelineError {
    /// Returns true if the caller can recover by resubmitting.
    ///
    /// Only configuration problems require operator intervention.
    #[must_use]
    pub const fn recoverable(&self) -> bool {
        !matches!(self, Self::Configuration { .. })
    }

    /// A short actionable hint for the caller.
    #[must_use]
    pub const fn hint(&self) -> &'static str {
        match self {
            Self::AdmissionDenied { .. } => "wait for the rate-limit window to reset, then retry",
            Self::Configuration { .. } => "contact the operator; this is not a client-side problem",
            Self::Timeout { .. } => "retry, ideally with a shorter reflection",
            Self::ExhaustedRetries { .. } | Self::Storage { .. } => "the service is unstable; retry shortly",
            Self::MalformedResponse { .. } | Self::UnsafeContent { .. } => {
                "retry; a fresh generation is unlikely to fail the same way"
            }
        }
    }

    /// HTTP-status-equivalent classification for the caller to map onto a
    /// wire status code.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::AdmissionDenied { .. } => 429,
            Self::Configuration { .. } => 500,
            Self::Timeout { .. } => 504,
            Self::ExhaustedRetries { .. } | Self::Storage { .. } => 502,
            Self::MalformedResponse { .. } | Self::UnsafeContent { .. } => 422,
        }
    }

    /// Earliest time a retry can succeed, if one is known.
    #[must_use]
    pub const fn retry_after(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::AdmissionDenied { reset_at, .. } => Some(*reset_at),
            _ => None,
        }
    }

    /// Map a model-invoker error into the taxonomy.
    ///
    /// Timeouts keep their own kind; rejected credentials are an operator
    /// problem; everything else exits the retry loop as upstream
    /// instability.
    #[must_use]
    pub fn from_api(err: ApiError, attempts: u32) -> Self {
        match err {
            ApiError::Timeout { timeout_ms } => Self::Timeout { timeout_ms },
            ApiError::AuthenticationFailed => Self::Configuration {
                message: "model credentials rejected".to_string(),
            },
            other => Self::ExhaustedRetries {
                attempts,
                message: other.to_string(),
            },
        }
    }
}

impl From<StorageError> for PipelineError {
    fn from(err: StorageError) -> Self {
        Self::Storage {
            message: err.to_string(),
        }
    }
}

/// Anthropic API errors.
///
/// These errors represent failures when communicating with the Anthropic
/// Messages API; they stay inside the model invoker and its retry loop.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Authentication failed due to invalid API key.
    #[error("authentication failed: invalid API key")]
    AuthenticationFailed,

    /// Request was rate limited by the API.
    #[error("rate limited: retry after {retry_after_seconds}s")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_seconds: u64,
    },

    /// The requested model is overloaded.
    #[error("model overloaded: {model}")]
    ModelOverloaded {
        /// The model that is overloaded.
        model: String,
    },

    /// An attempt exceeded its hard timeout.
    #[error("request timeout after {timeout_ms}ms")]
    Timeout {
        /// Timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// Invalid request parameters.
    #[error("invalid request: {message}")]
    InvalidRequest {
        /// Description of what's invalid.
        message: String,
    },

    /// Network communication error.
    #[error("network error: {message}")]
    Network {
        /// Description of the network error.
        message: String,
    },

    /// Unexpected response from the API.
    #[error("unexpected response: {message}")]
    UnexpectedResponse {
        /// Description of what was unexpected.
        message: String,
    },
}

impl ApiError {
    /// Returns true if this error is retryable.
    ///
    /// Rate limiting, overload, timeouts and transport failures are
    /// retryable. Authentication and invalid request errors are not.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::ModelOverloaded { .. }
                | Self::Timeout { .. }
                | Self::Network { .. }
        )
    }
}

/// Object storage errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The upload was rejected by the storage endpoint.
    #[error("upload failed for {key}: {message}")]
    UploadFailed {
        /// Object key that failed to upload.
        key: String,
        /// Description of the failure.
        message: String,
    },

    /// Network communication error.
    #[error("storage network error: {message}")]
    Network {
        /// Description of the network error.
        message: String,
    },
}

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Required configuration is missing.
    #[error("missing required: {var}")]
    MissingRequired {
        /// The missing variable name.
        var: String,
    },

    /// Configuration value is invalid.
    #[error("invalid value for {var}: {reason}")]
    InvalidValue {
        /// The variable name.
        var: String,
        /// Why the value is invalid.
        reason: String,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use static_assertions::assert_impl_all;

    // Type assertions - all errors must cross async boundaries
    assert_impl_all!(PipelineError: Send, Sync, std::error::Error, Clone);
    assert_impl_all!(ApiError: Send, Sync, std::error::Error, Clone);
    assert_impl_all!(StorageError: Send, Sync, std::error::Error, Clone);
    assert_impl_all!(ConfigError: Send, Sync, std::error::Error, Clone);

    fn reset_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_admission_denied_display() {
        let err = PipelineError::AdmissionDenied {
            limit: 5,
            remaining: 0,
            reset_at: reset_time(),
        };
        let text = err.to_string();
        assert!(text.contains("rate limit exceeded"));
        assert!(text.contains("0 of 5"));
    }

    #[test]
    fn test_recoverable_all_but_configuration() {
        let recoverable = [
            PipelineError::AdmissionDenied {
                limit: 5,
                remaining: 0,
                reset_at: reset_time(),
            },
            PipelineError::Timeout { timeout_ms: 30_000 },
            PipelineError::ExhaustedRetries {
                attempts: 3,
                message: "overloaded".to_string(),
            },
            PipelineError::MalformedResponse {
                reason: "no json".to_string(),
            },
            PipelineError::UnsafeContent {
                signature: "eval-call".to_string(),
            },
            PipelineError::Storage {
                message: "503".to_string(),
            },
        ];
        for err in recoverable {
            assert!(err.recoverable(), "{err} should be recoverable");
        }

        let config = PipelineError::Configuration {
            message: "missing key".to_string(),
        };
        assert!(!config.recoverable());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            PipelineError::AdmissionDenied {
                limit: 5,
                remaining: 0,
                reset_at: reset_time(),
            }
            .status_code(),
            429
        );
        assert_eq!(
            PipelineError::Configuration {
                message: String::new()
            }
            .status_code(),
            500
        );
        assert_eq!(PipelineError::Timeout { timeout_ms: 1 }.status_code(), 504);
        assert_eq!(
            PipelineError::ExhaustedRetries {
                attempts: 3,
                message: String::new()
            }
            .status_code(),
            502
        );
        assert_eq!(
            PipelineError::UnsafeContent {
                signature: String::new()
            }
            .status_code(),
            422
        );
    }

    #[test]
    fn test_retry_after_only_for_admission() {
        let denied = PipelineError::AdmissionDenied {
            limit: 5,
            remaining: 0,
            reset_at: reset_time(),
        };
        assert_eq!(denied.retry_after(), Some(reset_time()));
        assert_eq!(PipelineError::Timeout { timeout_ms: 1 }.retry_after(), None);
    }

    #[test]
    fn test_from_api_timeout() {
        let err = PipelineError::from_api(ApiError::Timeout { timeout_ms: 30_000 }, 3);
        assert_eq!(err, PipelineError::Timeout { timeout_ms: 30_000 });
    }

    #[test]
    fn test_from_api_auth_is_configuration() {
        let err = PipelineError::from_api(ApiError::AuthenticationFailed, 1);
        assert!(matches!(err, PipelineError::Configuration { .. }));
        assert!(!err.recoverable());
    }

    #[test]
    fn test_from_api_other_is_exhausted_retries() {
        let err = PipelineError::from_api(
            ApiError::ModelOverloaded {
                model: "claude-sonnet".to_string(),
            },
            3,
        );
        assert!(
            matches!(err, PipelineError::ExhaustedRetries { attempts, .. } if attempts == 3)
        );
    }

    #[test]
    fn test_from_storage_error() {
        let err: PipelineError = StorageError::UploadFailed {
            key: "visualizations/a1b2c3d4e5.html".to_string(),
            message: "status 503".to_string(),
        }
        .into();
        assert!(matches!(err, PipelineError::Storage { .. }));
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn test_api_error_is_retryable() {
        assert!(ApiError::RateLimited {
            retry_after_seconds: 60
        }
        .is_retryable());
        assert!(ApiError::ModelOverloaded {
            model: "claude-3".to_string()
        }
        .is_retryable());
        assert!(ApiError::Timeout { timeout_ms: 30_000 }.is_retryable());
        assert!(ApiError::Network {
            message: "refused".to_string()
        }
        .is_retryable());

        assert!(!ApiError::AuthenticationFailed.is_retryable());
        assert!(!ApiError::InvalidRequest {
            message: "too large".to_string()
        }
        .is_retryable());
        assert!(!ApiError::UnexpectedResponse {
            message: "empty".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn test_hint_is_actionable() {
        let err = PipelineError::UnsafeContent {
            signature: "eval-call".to_string(),
        };
        assert!(err.hint().contains("retry"));
    }
}
