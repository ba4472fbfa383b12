use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    /// Shared secret the billing provider sends in `X-Webhook-Secret`.
    pub billing_webhook_secret: String,
    /// Public origin used when building share links (referrals).
    pub public_url: String,
    pub port: u16,
    pub rust_log: String,
    /// Budget for one Redis round-trip before the rate limiter degrades to
    /// its in-memory fallback.
    pub rate_limit_store_timeout_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            billing_webhook_secret: require_env("BILLING_WEBHOOK_SECRET")?,
            public_url: std::env::var("PUBLIC_URL")
                .unwrap_or_else(|_| "https://qrwolf.com".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            rate_limit_store_timeout_ms: std::env::var("RATE_LIMIT_STORE_TIMEOUT_MS")
                .unwrap_or_else(|_| "250".to_string())
                .parse::<u64>()
                .context("RATE_LIMIT_STORE_TIMEOUT_MS must be a number of milliseconds")?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
