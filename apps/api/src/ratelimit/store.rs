//! Durable counter store for rate limiting.
//!
//! The limiter only needs atomic increment-with-expiry and a plain read;
//! the trait keeps Redis behind a seam so tests can inject counting or
//! failing fakes.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("store call timed out after {0}ms")]
    Timeout(u64),
}

/// Atomic-increment key-value store consumed by the rate limiter.
///
/// Carried in `RateLimiter` as `Arc<dyn CounterStore>`.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increments `key` and (re)arms its expiry, returning the
    /// post-increment count.
    async fn incr(&self, key: &str, ttl_secs: u64) -> Result<i64, StoreError>;

    /// Reads the current count without mutating it.
    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError>;
}

/// Redis-backed counter store. `INCR` + `EXPIRE` run in one MULTI/EXEC
/// pipeline so concurrent callers never lose an update.
pub struct RedisCounterStore {
    client: redis::Client,
}

impl RedisCounterStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn incr(&self, key: &str, ttl_secs: u64) -> Result<i64, StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire(key, ttl_secs as i64)
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(count)
    }

    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let count: Option<i64> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(count)
    }
}
