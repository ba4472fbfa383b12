pub mod health;

use axum::{
    extract::State,
    routing::{get, patch, post},
    Json, Router,
};

use crate::auth::{api_identity, AuthedUser, API_WINDOW_SECS};
use crate::errors::AppError;
use crate::ratelimit::RateLimitResult;
use crate::state::AppState;
use crate::{admin, analytics, billing, qr, referrals};

/// GET /api/v1/rate-limit — current API quota for the caller. Read-only:
/// never counts against the quota itself (the auth extractor's admission
/// check aside).
async fn rate_limit_status(
    State(state): State<AppState>,
    auth: AuthedUser,
) -> Result<Json<RateLimitResult>, AppError> {
    let status = state
        .limiter
        .status(
            &api_identity(auth.user.id),
            auth.limits.api_requests_per_minute,
            API_WINDOW_SECS,
        )
        .await?;
    Ok(Json(status))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Public scan redirect
        .route("/r/:slug", get(qr::handlers::handle_scan))
        // QR code management
        .route(
            "/api/v1/qr",
            post(qr::handlers::handle_create).get(qr::handlers::handle_list),
        )
        .route(
            "/api/v1/qr/:id",
            get(qr::handlers::handle_get)
                .patch(qr::handlers::handle_update)
                .delete(qr::handlers::handle_delete),
        )
        .route("/api/v1/qr/:id/style", patch(qr::handlers::handle_update_style))
        // Scan analytics
        .route("/api/v1/qr/:id/stats", get(analytics::handlers::handle_stats))
        .route(
            "/api/v1/qr/:id/scans",
            get(analytics::handlers::handle_recent_scans),
        )
        // Account surface
        .route("/api/v1/rate-limit", get(rate_limit_status))
        .route("/api/v1/referral", get(referrals::handle_referral))
        // Billing webhook (shared-secret guarded, not API-key authed)
        .route("/api/v1/billing/webhook", post(billing::handle_webhook))
        // Admin panel (role-gated)
        .route("/api/v1/admin/users", get(admin::handle_list_users))
        .route("/api/v1/admin/stats", get(admin::handle_stats))
        .with_state(state)
}
