//! Mindviz binary entry point.
//!
//! Operational surface for the pipeline: reads one submission from stdin,
//! runs it against the real Anthropic API and object storage, and prints
//! the JSON envelope to stdout. Logs go to stderr.

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use mindviz::anthropic::{AnthropicClient, ClientConfig};
use mindviz::config::Config;
use mindviz::limiter::{InMemoryWindowStore, RateLimiter, RateLimiterConfig};
use mindviz::pipeline::{ErrorBody, Pipeline, SubmissionRequest};
use mindviz::storage::HttpObjectStore;

#[tokio::main]
async fn main() {
    // Logs to stderr; stdout carries the response envelope
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("LOG_LEVEL")
                .unwrap_or_else(|_| "info".to_string())
                .parse()
                .unwrap_or_else(|_| tracing_subscriber::filter::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    let mut text = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut text) {
        tracing::error!("failed to read submission from stdin: {e}");
        std::process::exit(1);
    }
    if text.trim().is_empty() {
        tracing::error!("empty submission");
        std::process::exit(1);
    }

    let client_config = ClientConfig::new()
        .with_model(config.model.clone())
        .with_timeout_ms(config.request_timeout_ms)
        .with_max_attempts(config.max_attempts)
        .with_retry_base_delay_ms(config.retry_base_delay_ms);

    let model = match AnthropicClient::new(config.api_key.clone(), client_config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!("failed to build model client: {e}");
            std::process::exit(1);
        }
    };

    let store = match HttpObjectStore::new(config.storage_base_url.clone()) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!("failed to build object store: {e}");
            std::process::exit(1);
        }
    };

    let limiter = RateLimiter::new(
        Arc::new(InMemoryWindowStore::new()),
        RateLimiterConfig::new()
            .with_max_requests(config.rate_limit_max_requests)
            .with_window(Duration::from_secs(config.rate_limit_window_secs)),
    );

    let pipeline =
        Pipeline::new(model, store, limiter).with_model_attempts(config.max_attempts);

    let submission = SubmissionRequest::new(text, "local");
    match pipeline.process(submission).await {
        Ok(outcome) => {
            let body =
                serde_json::to_string_pretty(&outcome).unwrap_or_else(|_| "{}".to_string());
            println!("{body}");
        }
        Err(e) => {
            tracing::error!(status = e.status_code(), "pipeline failed: {e}");
            let body = serde_json::to_string_pretty(&ErrorBody::from(&e))
                .unwrap_or_else(|_| "{}".to_string());
            println!("{body}");
            std::process::exit(1);
        }
    }
}
