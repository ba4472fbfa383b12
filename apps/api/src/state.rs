use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::ratelimit::RateLimiter;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Fixed-window rate limiter. Redis-backed with an in-process fallback;
    /// the Redis client lives inside its counter store.
    pub limiter: Arc<RateLimiter>,
    pub config: Config,
}
