//! Anthropic Messages API integration.
//!
//! This module provides:
//! - [`AnthropicClient`]: HTTP client with timeout and retry logic
//! - [`ClientConfig`]: client configuration with defaults
//! - Request/response wire types

mod client;
mod config;
mod types;

pub use client::AnthropicClient;
pub use config::{
    ClientConfig, DEFAULT_BASE_URL, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_TOKENS, DEFAULT_MODEL,
    DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_TIMEOUT_MS,
};
pub use types::{ApiMessage, ApiRequest, ApiResponse, ApiUsage, ContentBlock};
