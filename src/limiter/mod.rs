//! Per-client sliding-window admission control.
//!
//! The limiter charges a client's budget as soon as a request is accepted
//! for processing, regardless of downstream success. When the backing store
//! is unavailable it fails open: rate limiting here is an abuse guard, not
//! a billing control, so availability wins over strictness.

mod store;

pub use store::{InMemoryWindowStore, StoreUnavailable, WindowSnapshot, WindowStore};

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::traits::{RealTimeProvider, TimeProvider};

/// Default requests admitted per window.
pub const DEFAULT_MAX_REQUESTS: u32 = 5;

/// Default window duration (1 hour).
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(3600);

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Requests admitted per client per window.
    pub max_requests: u32,
    /// Window duration.
    pub window: Duration,
}

impl RateLimiterConfig {
    /// Create a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-window budget.
    #[must_use]
    pub const fn with_max_requests(mut self, max_requests: u32) -> Self {
        self.max_requests = max_requests;
        self
    }

    /// Set the window duration.
    #[must_use]
    pub const fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            window: DEFAULT_WINDOW,
        }
    }
}

/// Admission decision for one request.
///
/// Computed fresh per request; `remaining` and `reset_at` give the
/// orchestrator enough to produce a precise "try again in N minutes"
/// message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionDecision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// Configured per-window budget.
    pub limit: u32,
    /// Requests remaining in the current window.
    pub remaining: u32,
    /// When the oldest in-window request falls out of the window.
    pub reset_at: DateTime<Utc>,
}

/// Sliding-window rate limiter.
///
/// Explicitly constructed and injectable: the store handle and clock are
/// passed in, so the limiter can be unit-tested against an in-memory store
/// and swapped to a distributed one without touching call sites.
pub struct RateLimiter {
    store: Arc<dyn WindowStore>,
    time: Arc<dyn TimeProvider>,
    config: RateLimiterConfig,
}

impl RateLimiter {
    /// Create a limiter over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn WindowStore>, config: RateLimiterConfig) -> Self {
        Self {
            store,
            time: Arc::new(RealTimeProvider),
            config,
        }
    }

    /// Replace the clock (deterministic tests).
    #[must_use]
    pub fn with_time(mut self, time: Arc<dyn TimeProvider>) -> Self {
        self.time = time;
        self
    }

    /// Get the limiter configuration.
    #[must_use]
    pub const fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Decide whether to admit a request from `client_id`.
    ///
    /// The window counter is charged on every call, including denied ones'
    /// successors: admission is spent when a request is accepted for
    /// processing, not on completion.
    pub async fn admit(&self, client_id: &str) -> AdmissionDecision {
        let now = self.time.now();
        let limit = self.config.max_requests;

        match self
            .store
            .record_and_count(client_id, now, self.config.window)
            .await
        {
            Ok(snapshot) => {
                let allowed = snapshot.count <= limit;
                let remaining = limit.saturating_sub(snapshot.count);
                let reset_at = snapshot.oldest
                    + chrono::Duration::from_std(self.config.window)
                        .unwrap_or(chrono::TimeDelta::MAX);

                if !allowed {
                    tracing::info!(
                        client_id,
                        count = snapshot.count,
                        limit,
                        %reset_at,
                        "request denied by rate limiter"
                    );
                }

                AdmissionDecision {
                    allowed,
                    limit,
                    remaining,
                    reset_at,
                }
            }
            Err(e) => {
                // Fail open: admit rather than block the feature when the
                // store is down.
                tracing::warn!(client_id, error = %e, "window store unavailable, failing open");
                AdmissionDecision {
                    allowed: true,
                    limit,
                    remaining: limit,
                    reset_at: now,
                }
            }
        }
    }
}
