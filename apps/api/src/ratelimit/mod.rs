//! Fixed-window rate limiting with a Redis-backed counter and an in-process
//! degraded-mode fallback.
//!
//! Admission checks increment a counter keyed by `(identity, window bucket)`
//! in Redis; if Redis errors or exceeds the call timeout, the check falls
//! back to a per-process [`MemoryCounters`] registry and tags the result so
//! the degradation is observable. Fail-open by design: an outage in the
//! rate-limit backend must not take the service down with it.

pub mod memory;
pub mod store;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use memory::MemoryCounters;
use store::{CounterStore, StoreError};

/// Which backing mechanism produced a [`RateLimitResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RateLimitSource {
    DurableStore,
    InMemoryFallback,
}

/// Outcome of one admission check. Never persisted; only the underlying
/// counter state is.
#[derive(Debug, Clone, Serialize)]
pub struct RateLimitResult {
    pub allowed: bool,
    /// Quota left in the current window. Always `<= limit`, never negative.
    pub remaining: u64,
    /// End of the current window, epoch milliseconds.
    pub reset_at: u64,
    pub source: RateLimitSource,
}

impl RateLimitResult {
    /// Whole seconds until the window resets, rounded up. For `Retry-After`
    /// headers.
    pub fn retry_after_secs(&self) -> u64 {
        let now_ms = Utc::now().timestamp_millis().max(0) as u64;
        self.reset_at.saturating_sub(now_ms).div_ceil(1000).max(1)
    }
}

/// Misconfigured check inputs. Fail fast, never retried.
#[derive(Debug, Error)]
pub enum RateLimitError {
    #[error("identity key must not be empty")]
    EmptyIdentity,

    #[error("limit must be a positive integer")]
    ZeroLimit,

    #[error("window must be a positive number of seconds")]
    ZeroWindow,
}

const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(250);

pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    memory: MemoryCounters,
    store_timeout: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self::with_timeout(store, DEFAULT_STORE_TIMEOUT)
    }

    pub fn with_timeout(store: Arc<dyn CounterStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            memory: MemoryCounters::new(),
            store_timeout,
        }
    }

    /// Admission check: increments the counter for `identity_key` in the
    /// current window and reports whether the request may proceed.
    ///
    /// Suspends while consulting Redis; a store error or timeout degrades
    /// to the in-memory counter rather than failing the request.
    pub async fn check(
        &self,
        identity_key: &str,
        limit: u64,
        window_secs: u64,
    ) -> Result<RateLimitResult, RateLimitError> {
        validate(identity_key, limit, window_secs)?;
        Ok(self
            .check_at(now_ms(), identity_key, limit, window_secs)
            .await)
    }

    /// Non-suspending admission check for contexts that cannot await.
    /// Serves the process-local counters only, so results are always tagged
    /// [`RateLimitSource::InMemoryFallback`].
    pub fn check_sync(
        &self,
        identity_key: &str,
        limit: u64,
        window_secs: u64,
    ) -> Result<RateLimitResult, RateLimitError> {
        validate(identity_key, limit, window_secs)?;
        let now = now_ms();
        let (key, reset_at) = window_key(identity_key, now, window_secs);
        let count = self.memory.incr(&key, reset_at, now);
        Ok(build_result(
            count,
            limit,
            reset_at,
            RateLimitSource::InMemoryFallback,
        ))
    }

    /// Read-only view of the current window for `identity_key`. Never
    /// increments; `allowed` reports whether the *next* request would be
    /// admitted.
    pub async fn status(
        &self,
        identity_key: &str,
        limit: u64,
        window_secs: u64,
    ) -> Result<RateLimitResult, RateLimitError> {
        validate(identity_key, limit, window_secs)?;
        let now = now_ms();
        let (key, reset_at) = window_key(identity_key, now, window_secs);

        let (count, source) =
            match tokio::time::timeout(self.store_timeout, self.store.get(&key)).await {
                Ok(Ok(count)) => (
                    count.unwrap_or(0).max(0) as u64,
                    RateLimitSource::DurableStore,
                ),
                Ok(Err(e)) => {
                    warn!("rate limit store read failed, serving in-memory count: {e}");
                    (self.memory.get(&key, now), RateLimitSource::InMemoryFallback)
                }
                Err(_) => {
                    warn!(
                        "rate limit store read timed out after {}ms, serving in-memory count",
                        self.store_timeout.as_millis()
                    );
                    (self.memory.get(&key, now), RateLimitSource::InMemoryFallback)
                }
            };

        Ok(RateLimitResult {
            allowed: count < limit,
            remaining: limit.saturating_sub(count),
            reset_at,
            source,
        })
    }

    /// Clock-injected check so window-boundary behavior is deterministic
    /// under test. Inputs are assumed validated.
    async fn check_at(
        &self,
        now_ms: u64,
        identity_key: &str,
        limit: u64,
        window_secs: u64,
    ) -> RateLimitResult {
        let (key, reset_at) = window_key(identity_key, now_ms, window_secs);

        let store_count =
            match tokio::time::timeout(self.store_timeout, self.store.incr(&key, window_secs))
                .await
            {
                Ok(Ok(count)) => Ok(count),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(StoreError::Timeout(self.store_timeout.as_millis() as u64)),
            };

        match store_count {
            Ok(count) => build_result(
                count.max(0) as u64,
                limit,
                reset_at,
                RateLimitSource::DurableStore,
            ),
            Err(e) => {
                warn!("rate limit store unavailable, falling back to in-memory counter: {e}");
                let count = self.memory.incr(&key, reset_at, now_ms);
                build_result(count, limit, reset_at, RateLimitSource::InMemoryFallback)
            }
        }
    }
}

fn validate(identity_key: &str, limit: u64, window_secs: u64) -> Result<(), RateLimitError> {
    if identity_key.is_empty() {
        return Err(RateLimitError::EmptyIdentity);
    }
    if limit == 0 {
        return Err(RateLimitError::ZeroLimit);
    }
    if window_secs == 0 {
        return Err(RateLimitError::ZeroWindow);
    }
    Ok(())
}

/// Fixed-window bucketing: counter key for the window containing `now_ms`
/// plus the window's end timestamp.
fn window_key(identity_key: &str, now_ms: u64, window_secs: u64) -> (String, u64) {
    let window_ms = window_secs * 1000;
    let bucket = now_ms / window_ms;
    let key = format!("rl:{identity_key}:{bucket}");
    (key, (bucket + 1) * window_ms)
}

fn build_result(count: u64, limit: u64, reset_at: u64, source: RateLimitSource) -> RateLimitResult {
    RateLimitResult {
        allowed: count <= limit,
        remaining: limit.saturating_sub(count),
        reset_at,
        source,
    }
}

fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    /// Counting fake with real fixed-window semantics, minus the network.
    #[derive(Default)]
    struct CountingStore {
        counters: Mutex<HashMap<String, i64>>,
    }

    #[async_trait]
    impl CounterStore for CountingStore {
        async fn incr(&self, key: &str, _ttl_secs: u64) -> Result<i64, StoreError> {
            let mut counters = self.counters.lock().unwrap();
            let count = counters.entry(key.to_string()).or_insert(0);
            *count += 1;
            Ok(*count)
        }

        async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
            Ok(self.counters.lock().unwrap().get(key).copied())
        }
    }

    /// Fake that simulates an unreachable Redis.
    struct FailingStore;

    #[async_trait]
    impl CounterStore for FailingStore {
        async fn incr(&self, _key: &str, _ttl_secs: u64) -> Result<i64, StoreError> {
            Err(StoreError::Timeout(250))
        }

        async fn get(&self, _key: &str) -> Result<Option<i64>, StoreError> {
            Err(StoreError::Timeout(250))
        }
    }

    fn limiter_with_counting_store() -> RateLimiter {
        RateLimiter::new(Arc::new(CountingStore::default()))
    }

    #[tokio::test]
    async fn test_limit_of_sixty_admits_sixty_then_denies() {
        let limiter = limiter_with_counting_store();
        let now = 1_700_000_000_000;

        for i in 1..=60u64 {
            let result = limiter.check_at(now, "key-123", 60, 60).await;
            assert!(result.allowed, "call {i} should be allowed");
            assert_eq!(result.remaining, 60 - i);
            assert_eq!(result.source, RateLimitSource::DurableStore);
        }

        let denied = limiter.check_at(now, "key-123", 60, 60).await;
        assert!(!denied.allowed);
        assert_eq!(denied.remaining, 0);
    }

    #[tokio::test]
    async fn test_remaining_strictly_decreases() {
        let limiter = limiter_with_counting_store();
        let now = 1_700_000_000_000;
        let mut previous = u64::MAX;
        for _ in 0..5 {
            let result = limiter.check_at(now, "key-dec", 10, 60).await;
            assert!(result.remaining < previous);
            previous = result.remaining;
        }
    }

    #[tokio::test]
    async fn test_exhausted_key_is_admitted_in_next_window() {
        let limiter = limiter_with_counting_store();
        let now = 1_700_000_000_000;

        for _ in 0..3 {
            limiter.check_at(now, "key-window", 2, 60).await;
        }
        assert!(!limiter.check_at(now, "key-window", 2, 60).await.allowed);

        let next_window = now + 60_000;
        let result = limiter.check_at(next_window, "key-window", 2, 60).await;
        assert!(result.allowed);
        assert_eq!(result.remaining, 1);
    }

    #[tokio::test]
    async fn test_reset_at_is_end_of_current_window() {
        let limiter = limiter_with_counting_store();
        // 1_700_000_012_345 sits in the bucket ending at 1_700_000_060_000
        let result = limiter.check_at(1_700_000_012_345, "key-reset", 60, 60).await;
        assert_eq!(result.reset_at, 1_700_000_060_000);
    }

    #[tokio::test]
    async fn test_store_failure_falls_back_to_memory() {
        let limiter = RateLimiter::new(Arc::new(FailingStore));
        let now = 1_700_000_000_000;

        let first = limiter.check_at(now, "key-fb", 2, 60).await;
        assert!(first.allowed);
        assert_eq!(first.remaining, 1);
        assert_eq!(first.source, RateLimitSource::InMemoryFallback);

        limiter.check_at(now, "key-fb", 2, 60).await;
        let third = limiter.check_at(now, "key-fb", 2, 60).await;
        assert!(!third.allowed);
        assert_eq!(third.remaining, 0);
        assert_eq!(third.source, RateLimitSource::InMemoryFallback);
    }

    #[tokio::test]
    async fn test_fallback_counters_reset_across_windows() {
        let limiter = RateLimiter::new(Arc::new(FailingStore));
        let now = 1_700_000_000_000;

        limiter.check_at(now, "key-fb2", 1, 60).await;
        assert!(!limiter.check_at(now, "key-fb2", 1, 60).await.allowed);
        assert!(limiter.check_at(now + 60_000, "key-fb2", 1, 60).await.allowed);
    }

    #[tokio::test]
    async fn test_status_does_not_increment() {
        let limiter = limiter_with_counting_store();
        limiter.check("key-status", 10, 60).await.unwrap();

        let a = limiter.status("key-status", 10, 60).await.unwrap();
        let b = limiter.status("key-status", 10, 60).await.unwrap();
        assert_eq!(a.remaining, 9);
        assert_eq!(b.remaining, 9);
        assert!(a.allowed);
        assert_eq!(a.source, RateLimitSource::DurableStore);
    }

    #[tokio::test]
    async fn test_status_on_fresh_key_reports_full_quota() {
        let limiter = limiter_with_counting_store();
        let status = limiter.status("key-fresh", 10, 60).await.unwrap();
        assert!(status.allowed);
        assert_eq!(status.remaining, 10);
    }

    #[tokio::test]
    async fn test_status_degrades_to_memory_on_store_failure() {
        let limiter = RateLimiter::new(Arc::new(FailingStore));
        limiter.check("key-st-fb", 5, 60).await.unwrap();
        let status = limiter.status("key-st-fb", 5, 60).await.unwrap();
        assert_eq!(status.source, RateLimitSource::InMemoryFallback);
        assert_eq!(status.remaining, 4);
    }

    #[tokio::test]
    async fn test_check_sync_serves_memory_only() {
        let limiter = limiter_with_counting_store();
        let result = limiter.check_sync("key-sync", 3, 60).unwrap();
        assert!(result.allowed);
        assert_eq!(result.remaining, 2);
        assert_eq!(result.source, RateLimitSource::InMemoryFallback);
    }

    #[tokio::test]
    async fn test_invalid_inputs_fail_fast() {
        let limiter = limiter_with_counting_store();
        assert!(matches!(
            limiter.check("", 10, 60).await,
            Err(RateLimitError::EmptyIdentity)
        ));
        assert!(matches!(
            limiter.check("k", 0, 60).await,
            Err(RateLimitError::ZeroLimit)
        ));
        assert!(matches!(
            limiter.check("k", 10, 0).await,
            Err(RateLimitError::ZeroWindow)
        ));
        assert!(matches!(
            limiter.check_sync("", 10, 60),
            Err(RateLimitError::EmptyIdentity)
        ));
    }

    #[test]
    fn test_window_key_bucketing() {
        let (key_a, reset_a) = window_key("id", 59_999, 60);
        let (key_b, reset_b) = window_key("id", 60_000, 60);
        assert_eq!(key_a, "rl:id:0");
        assert_eq!(key_b, "rl:id:1");
        assert_eq!(reset_a, 60_000);
        assert_eq!(reset_b, 120_000);
    }
}
