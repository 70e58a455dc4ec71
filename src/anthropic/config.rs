//! Anthropic client configuration.

/// Default base URL for the Anthropic API.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
/// Default per-attempt timeout in milliseconds (30s).
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
/// Default maximum attempts (first try plus retries).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default base delay for exponential backoff in milliseconds.
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1_000;
/// Default model.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
/// Default max tokens.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Client configuration for the Anthropic API.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL for the API.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Default max tokens per completion.
    pub max_tokens: u32,
    /// Hard per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum attempts per call (first try plus retries).
    pub max_attempts: u32,
    /// Base delay for exponential backoff in milliseconds.
    pub retry_base_delay_ms: u64,
}

impl ClientConfig {
    /// Create a new client configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set default max tokens.
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set per-attempt timeout in milliseconds.
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Set maximum attempts.
    #[must_use]
    pub const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set backoff base delay in milliseconds.
    #[must_use]
    pub const fn with_retry_base_delay_ms(mut self, retry_base_delay_ms: u64) -> Self {
        self.retry_base_delay_ms = retry_base_delay_ms;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
        }
    }
}
