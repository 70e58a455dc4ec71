//! Shared types for the traits module.
//!
//! - [`CompletionRequest`]: a single prompt for the model
//! - [`ModelReply`]: the model's free-text reply
//! - [`Usage`]: token usage information
//! - [`StoredObject`]: result of an object-storage upload

/// A single completion request for the model.
///
/// The pipeline issues exactly two of these per submission: one analysis
/// prompt and one code-generation prompt.
#[derive(Debug, Clone, PartialEq)]
// Cannot derive Eq: f64 temperature field does not implement Eq
#[allow(clippy::derive_partial_eq_without_eq)]
pub struct CompletionRequest {
    /// The user prompt body.
    pub prompt: String,
    /// Optional system prompt.
    pub system: Option<String>,
    /// Maximum tokens to generate; the client default applies when `None`.
    pub max_tokens: Option<u32>,
    /// Temperature for sampling (0.0 to 1.0).
    pub temperature: Option<f64>,
}

impl CompletionRequest {
    /// Create a request with just a prompt.
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            max_tokens: None,
            temperature: None,
        }
    }

    /// Set the system prompt.
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set max tokens.
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    /// Input tokens (prompt).
    pub input_tokens: u32,
    /// Output tokens (completion).
    pub output_tokens: u32,
}

impl Usage {
    /// Create new usage info.
    #[must_use]
    pub const fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Total tokens used.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// The model's reply to a completion request.
///
/// `raw_text` is whatever the model produced; extracting structure out of it
/// is the parser's job, not the client's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReply {
    /// Concatenated text content of the reply.
    pub raw_text: String,
    /// Token usage.
    pub usage: Usage,
}

impl ModelReply {
    /// Create a new reply.
    #[must_use]
    pub fn new(raw_text: impl Into<String>, usage: Usage) -> Self {
        Self {
            raw_text: raw_text.into(),
            usage,
        }
    }
}

/// Result of an object-storage upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Publicly addressable URL of the stored blob.
    pub url: String,
}
