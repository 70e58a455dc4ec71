//! Anthropic API client with timeout and retry logic.
//!
//! This module provides:
//! - HTTP client for the Anthropic Messages API
//! - A hard per-attempt timeout racing each call against a timer
//! - Retry logic with exponential backoff
//! - Response parsing

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::cast_possible_truncation)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;

use super::config::ClientConfig;
use super::types::{ApiMessage, ApiRequest, ApiResponse, ContentBlock};
use crate::config::SecretString;
use crate::error::ApiError;
use crate::traits::{CompletionRequest, ModelClient, ModelReply, Usage};

/// Maximum prompt size in bytes (100KB).
pub const MAX_PROMPT_BYTES: usize = 100_000;

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic API client.
///
/// Each completion attempt races the HTTP call against a hard timeout; a
/// timed-out attempt is abandoned (its result discarded, no transport-level
/// cancellation) and retried with exponential backoff until the attempt
/// budget runs out. The analysis and code-generation calls each get their
/// own full budget.
#[derive(Debug)]
pub struct AnthropicClient {
    client: Client,
    api_key: SecretString,
    config: ClientConfig,
}

impl AnthropicClient {
    /// Create a new Anthropic client.
    pub fn new(api_key: SecretString, config: ClientConfig) -> Result<Self, ApiError> {
        let client = Client::builder().build().map_err(|e| ApiError::Network {
            message: format!("failed to create HTTP client: {e}"),
        })?;

        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Get the client configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Validate prompt size limits.
    fn validate_request(request: &ApiRequest) -> Result<(), ApiError> {
        let total: usize = request.messages.iter().map(|m| m.content.len()).sum();
        if total > MAX_PROMPT_BYTES {
            return Err(ApiError::InvalidRequest {
                message: format!("prompt too large: {total} > {MAX_PROMPT_BYTES} bytes"),
            });
        }
        Ok(())
    }

    /// Execute a request with per-attempt timeout and backoff retry.
    async fn execute_with_retry(&self, request: &ApiRequest) -> Result<ModelReply, ApiError> {
        let mut last_error = None;
        let mut delay = self.config.retry_base_delay_ms;
        let attempts = self.config.max_attempts.max(1);

        for attempt in 0..attempts {
            if attempt > 0 {
                tracing::warn!(attempt, delay_ms = delay, "retrying model request");
                tokio::time::sleep(Duration::from_millis(delay)).await;
                delay *= 2; // Exponential backoff
            }

            let started = Instant::now();
            let outcome = match tokio::time::timeout(
                Duration::from_millis(self.config.timeout_ms),
                self.execute_once(request),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => {
                    // Attempt abandoned: the in-flight call is dropped, not
                    // cancelled at the transport level.
                    tracing::warn!(
                        attempt,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        timeout_ms = self.config.timeout_ms,
                        "model request attempt timed out"
                    );
                    Err(ApiError::Timeout {
                        timeout_ms: self.config.timeout_ms,
                    })
                }
            };

            match outcome {
                Ok(reply) => {
                    tracing::debug!(
                        attempt,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        input_tokens = reply.usage.input_tokens,
                        output_tokens = reply.usage.output_tokens,
                        "model request succeeded"
                    );
                    return Ok(reply);
                }
                Err(e) => {
                    if !e.is_retryable() {
                        tracing::error!(error = %e, attempt, "non-retryable model error");
                        return Err(e);
                    }
                    tracing::warn!(
                        error = %e,
                        attempt,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "retryable model error"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ApiError::Network {
            message: "unknown error after retries".to_string(),
        }))
    }

    /// Execute a single request attempt.
    async fn execute_once(&self, request: &ApiRequest) -> Result<ModelReply, ApiError> {
        let url = format!("{}/messages", self.config.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", self.api_key.expose())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| ApiError::Network {
                message: e.to_string(),
            })?;

        let status = response.status();

        // Fail fast on well-known error statuses, no fallbacks
        if status.as_u16() == 401 {
            return Err(ApiError::AuthenticationFailed);
        }
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(60);
            return Err(ApiError::RateLimited {
                retry_after_seconds: retry_after,
            });
        }
        if status.as_u16() == 529 {
            return Err(ApiError::ModelOverloaded {
                model: request.model.clone(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::UnexpectedResponse {
                message: format!("status {status}: {body}"),
            });
        }

        let body: ApiResponse = response
            .json()
            .await
            .map_err(|e| ApiError::UnexpectedResponse {
                message: format!("failed to parse response: {e}"),
            })?;

        Self::collect_reply(&body)
    }

    /// Concatenate text blocks into a [`ModelReply`].
    fn collect_reply(response: &ApiResponse) -> Result<ModelReply, ApiError> {
        let mut raw_text = String::new();
        for block in &response.content {
            if let ContentBlock::Text { text } = block {
                if !raw_text.is_empty() {
                    raw_text.push('\n');
                }
                raw_text.push_str(text);
            }
        }

        if raw_text.is_empty() {
            return Err(ApiError::UnexpectedResponse {
                message: "no text content in response".to_string(),
            });
        }

        Ok(ModelReply::new(
            raw_text,
            Usage::new(response.usage.input_tokens, response.usage.output_tokens),
        ))
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<ModelReply, ApiError> {
        let max_tokens = request.max_tokens.unwrap_or(self.config.max_tokens);
        let mut api_request = ApiRequest::new(
            self.config.model.clone(),
            max_tokens,
            vec![ApiMessage::user(request.prompt)],
        );

        if let Some(system) = request.system {
            api_request = api_request.with_system(system);
        }
        if let Some(temperature) = request.temperature {
            api_request = api_request.with_temperature(temperature);
        }

        Self::validate_request(&api_request)?;
        self.execute_with_retry(&api_request).await
    }
}

/// Blanket implementation for `Arc<AnthropicClient>`.
#[async_trait]
impl ModelClient for Arc<AnthropicClient> {
    async fn complete(&self, request: CompletionRequest) -> Result<ModelReply, ApiError> {
        <AnthropicClient as ModelClient>::complete(self.as_ref(), request).await
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::unused_async
)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // Helper to create a client pointing at the mock server, no retries
    async fn create_mock_client(server: &MockServer) -> AnthropicClient {
        let config = ClientConfig::default()
            .with_base_url(server.uri())
            .with_max_attempts(1)
            .with_timeout_ms(5_000);
        AnthropicClient::new(SecretString::new("test-api-key"), config).unwrap()
    }

    fn success_response_body(text: &str) -> serde_json::Value {
        json!({
            "id": "msg_123",
            "content": [{"type": "text", "text": text}],
            "model": "claude-3",
            "usage": {"input_tokens": 10, "output_tokens": 20},
            "stop_reason": "end_turn"
        })
    }

    #[test]
    fn test_client_new() {
        let client =
            AnthropicClient::new(SecretString::new("test-key"), ClientConfig::default()).unwrap();
        assert_eq!(client.base_url(), "https://api.anthropic.com/v1");
    }

    #[tokio::test]
    async fn test_complete_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("x-api-key", "test-api-key"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_response_body("Hello!")))
            .mount(&server)
            .await;

        let client = create_mock_client(&server).await;
        let reply = client
            .complete(CompletionRequest::new("Hi"))
            .await
            .unwrap();

        assert_eq!(reply.raw_text, "Hello!");
        assert_eq!(reply.usage.input_tokens, 10);
        assert_eq!(reply.usage.output_tokens, 20);
    }

    #[tokio::test]
    async fn test_complete_concatenates_text_blocks() {
        let server = MockServer::start().await;

        let body = json!({
            "content": [
                {"type": "text", "text": "part one"},
                {"type": "thinking", "thinking": "ignored"},
                {"type": "text", "text": "part two"}
            ],
            "usage": {"input_tokens": 5, "output_tokens": 7}
        });

        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = create_mock_client(&server).await;
        let reply = client.complete(CompletionRequest::new("Hi")).await.unwrap();
        assert_eq!(reply.raw_text, "part one\npart two");
    }

    #[tokio::test]
    async fn test_prompt_too_large_rejected_locally() {
        let server = MockServer::start().await;
        let client = create_mock_client(&server).await;

        let huge = "x".repeat(MAX_PROMPT_BYTES + 1);
        let result = client.complete(CompletionRequest::new(huge)).await;

        let err = result.unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest { .. }));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_auth_failure_not_retried() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let config = ClientConfig::default()
            .with_base_url(server.uri())
            .with_max_attempts(3)
            .with_retry_base_delay_ms(10);
        let client = AnthropicClient::new(SecretString::new("bad-key"), config).unwrap();

        let result = client.complete(CompletionRequest::new("Hi")).await;
        assert!(matches!(result, Err(ApiError::AuthenticationFailed)));
    }

    #[tokio::test]
    async fn test_retry_on_rate_limit_then_success() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let server = MockServer::start().await;
        let call_count = Arc::new(AtomicU32::new(0));
        let call_count_clone = Arc::clone(&call_count);

        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(move |_req: &wiremock::Request| {
                let count = call_count_clone.fetch_add(1, Ordering::SeqCst);
                if count == 0 {
                    ResponseTemplate::new(429)
                } else {
                    ResponseTemplate::new(200).set_body_json(success_response_body("Recovered"))
                }
            })
            .mount(&server)
            .await;

        let config = ClientConfig::default()
            .with_base_url(server.uri())
            .with_max_attempts(2)
            .with_retry_base_delay_ms(10);
        let client = AnthropicClient::new(SecretString::new("test-key"), config).unwrap();

        let reply = client.complete(CompletionRequest::new("Hi")).await.unwrap();
        assert_eq!(reply.raw_text, "Recovered");
        assert_eq!(call_count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_attempt_budget_exhausted() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(529))
            .mount(&server)
            .await;

        let config = ClientConfig::default()
            .with_base_url(server.uri())
            .with_max_attempts(3)
            .with_retry_base_delay_ms(10);
        let client = AnthropicClient::new(SecretString::new("test-key"), config).unwrap();

        let result = client.complete(CompletionRequest::new("Hi")).await;
        assert!(matches!(result, Err(ApiError::ModelOverloaded { .. })));
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_timeout_makes_exactly_max_attempts_with_backoff() {
        let server = MockServer::start().await;

        // Every attempt stalls past the 50ms budget
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(success_response_body("late"))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let config = ClientConfig::default()
            .with_base_url(server.uri())
            .with_max_attempts(3)
            .with_timeout_ms(50)
            .with_retry_base_delay_ms(20);
        let client = AnthropicClient::new(SecretString::new("test-key"), config).unwrap();

        let started = Instant::now();
        let result = client.complete(CompletionRequest::new("Hi")).await;
        let elapsed = started.elapsed();

        assert!(matches!(result, Err(ApiError::Timeout { timeout_ms: 50 })));
        assert_eq!(server.received_requests().await.unwrap().len(), 3);
        // Cumulative backoff is at least base + base*2
        assert!(
            elapsed >= Duration::from_millis(20 + 40),
            "elapsed {elapsed:?} should include the backoff delays"
        );
    }

    #[tokio::test]
    async fn test_rate_limit_retry_after_header() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(
                ResponseTemplate::new(429)
                    .append_header("retry-after", "30")
                    .set_body_string("Rate limited"),
            )
            .mount(&server)
            .await;

        let client = create_mock_client(&server).await;
        let result = client.complete(CompletionRequest::new("Hi")).await;

        match result.unwrap_err() {
            ApiError::RateLimited {
                retry_after_seconds,
            } => assert_eq!(retry_after_seconds, 30),
            e => panic!("wrong error type: {e:?}"),
        }
    }

    #[tokio::test]
    async fn test_server_error_is_unexpected_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .mount(&server)
            .await;

        let client = create_mock_client(&server).await;
        let result = client.complete(CompletionRequest::new("Hi")).await;
        assert!(matches!(result, Err(ApiError::UnexpectedResponse { .. })));
    }

    #[tokio::test]
    async fn test_empty_content_is_unexpected_response() {
        let server = MockServer::start().await;

        let body = json!({
            "content": [],
            "usage": {"input_tokens": 10, "output_tokens": 0}
        });

        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = create_mock_client(&server).await;
        let result = client.complete(CompletionRequest::new("Hi")).await;
        assert!(matches!(result, Err(ApiError::UnexpectedResponse { .. })));
    }
}
