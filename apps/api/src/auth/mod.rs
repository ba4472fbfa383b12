//! API-key authentication and per-request authorization context.
//!
//! `AuthedUser` is the enforcement point: extracting it authenticates the
//! caller, resolves their effective tier once, and applies the per-tier API
//! rate limit. Handlers that take an `AuthedUser` inherit all three.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::User;
use crate::state::AppState;
use crate::subscription::{resolve_effective_tier, Tier, TierLimits};

pub const API_KEY_HEADER: &str = "x-api-key";

/// Window for the per-user API rate limit; the per-minute budget comes from
/// the tier's limits.
pub const API_WINDOW_SECS: u64 = 60;

pub struct AuthedUser {
    pub user: User,
    /// Effective tier after trial handling; resolved once per request.
    pub tier: Tier,
    pub limits: TierLimits,
}

/// Rate-limit identity for a user's authenticated API traffic.
pub fn api_identity(user_id: Uuid) -> String {
    format!("api:{user_id}")
}

pub fn require_admin(user: &User) -> Result<(), AppError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let api_key = parts
            .headers
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .ok_or(AppError::Unauthorized)?;

        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE api_key = $1")
            .bind(api_key)
            .fetch_optional(&state.db)
            .await?;
        let user = user.ok_or(AppError::Unauthorized)?;

        let tier = resolve_effective_tier(
            &user.tier,
            user.trial_ends_at,
            user.subscription_status.as_deref(),
        );
        let limits = tier.limits();

        let result = state
            .limiter
            .check(
                &api_identity(user.id),
                limits.api_requests_per_minute,
                API_WINDOW_SECS,
            )
            .await?;
        if !result.allowed {
            return Err(AppError::RateLimited {
                retry_after_secs: result.retry_after_secs(),
            });
        }

        Ok(AuthedUser { user, tier, limits })
    }
}
