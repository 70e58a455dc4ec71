//! Trait definitions for mockable dependencies.
//!
//! This module defines traits for:
//! - [`ModelClient`]: LLM completion abstraction
//! - [`ObjectStore`]: artifact upload abstraction
//! - [`TimeProvider`]: time abstraction for deterministic tests
//!
//! # Mocking
//!
//! All traits are annotated with `#[cfg_attr(test, mockall::automock)]`
//! which generates mock implementations automatically for testing.

mod types;

pub use types::{CompletionRequest, ModelReply, StoredObject, Usage};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{ApiError, StorageError};

/// LLM completion client.
///
/// Implementations own their retry and timeout policy; a call either
/// returns a reply or the error of the final failed attempt.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send a completion request and return the model's reply.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] when the call fails after the implementation's
    /// own retries are exhausted, or immediately for non-retryable errors.
    async fn complete(&self, request: CompletionRequest) -> Result<ModelReply, ApiError>;
}

/// Write-once object storage.
///
/// The pipeline never updates or deletes objects; each successful request
/// creates exactly one new blob.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload `content` under `key` as a publicly readable blob.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the upload fails.
    async fn put(
        &self,
        key: &str,
        content: &str,
        content_type: &str,
    ) -> Result<StoredObject, StorageError>;
}

/// Time provider trait for deterministic testing.
#[cfg_attr(test, mockall::automock)]
pub trait TimeProvider: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Real time provider using the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealTimeProvider;

impl TimeProvider for RealTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
