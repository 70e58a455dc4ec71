//! Sliding-window backing stores.
//!
//! A [`WindowStore`] records request timestamps per client key and reports
//! how many fall inside the current window, in one atomic round trip. The
//! in-memory implementation backs single-process deployments and tests; a
//! distributed store can be swapped in without touching call sites.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::Mutex;

/// The backing store could not be reached.
///
/// The limiter treats this as a signal to fail open, not as a request
/// failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("window store unavailable: {message}")]
pub struct StoreUnavailable {
    /// Description of the store failure.
    pub message: String,
}

/// Snapshot of a client's window after recording a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSnapshot {
    /// Hits inside the window, including the one just recorded.
    pub count: u32,
    /// Timestamp of the oldest hit still inside the window.
    pub oldest: DateTime<Utc>,
}

/// Per-client sliding-window counter store.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WindowStore: Send + Sync {
    /// Record a hit for `key` at `now` and return the in-window snapshot.
    ///
    /// Recording and counting happen in a single atomic operation so that
    /// concurrent requests from the same client cannot both observe
    /// "under limit".
    ///
    /// # Errors
    ///
    /// Returns [`StoreUnavailable`] if the store cannot be reached.
    async fn record_and_count(
        &self,
        key: &str,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<WindowSnapshot, StoreUnavailable>;
}

/// In-memory window store.
///
/// Entries are pruned on access: timestamps older than the window are
/// dropped, and keys whose windows have fully drained are removed.
#[derive(Debug, Default)]
pub struct InMemoryWindowStore {
    entries: Mutex<HashMap<String, Vec<DateTime<Utc>>>>,
}

impl InMemoryWindowStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently tracked (for tests and diagnostics).
    pub async fn tracked_keys(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[async_trait]
impl WindowStore for InMemoryWindowStore {
    async fn record_and_count(
        &self,
        key: &str,
        now: DateTime<Utc>,
        window: Duration,
    ) -> Result<WindowSnapshot, StoreUnavailable> {
        let cutoff = now - chrono::Duration::from_std(window).unwrap_or(chrono::TimeDelta::MAX);

        let mut entries = self.entries.lock().await;

        // TTL eviction for other keys happens lazily; drained keys are
        // removed so the map does not grow unbounded.
        entries.retain(|_, hits| hits.iter().any(|t| *t > cutoff));

        let hits = entries.entry(key.to_string()).or_default();
        hits.retain(|t| *t > cutoff);
        hits.push(now);

        #[allow(clippy::cast_possible_truncation)]
        let count = hits.len() as u32;
        let oldest = hits.iter().min().copied().unwrap_or(now);

        Ok(WindowSnapshot { count, oldest })
    }
}
