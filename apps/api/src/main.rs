mod admin;
mod analytics;
mod auth;
mod billing;
mod config;
mod db;
mod errors;
mod models;
mod qr;
mod ratelimit;
mod referrals;
mod routes;
mod state;
mod subscription;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::ratelimit::store::RedisCounterStore;
use crate::ratelimit::RateLimiter;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("qrwolf_api={}", &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting QRWolf API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize Redis-backed rate limiter with its in-process fallback
    let redis = redis::Client::open(config.redis_url.clone())?;
    let limiter = Arc::new(RateLimiter::with_timeout(
        Arc::new(RedisCounterStore::new(redis)),
        Duration::from_millis(config.rate_limit_store_timeout_ms),
    ));
    info!(
        "Rate limiter initialized (store timeout {}ms)",
        config.rate_limit_store_timeout_ms
    );

    // Build app state
    let state = AppState {
        db,
        limiter,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    // ConnectInfo feeds client IPs to the scan rate limiter
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
