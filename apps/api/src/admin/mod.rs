//! Admin panel endpoints.
//!
//! Access is a `role` claim on the user row checked through the same
//! authorization path as tier checks, not a hardcoded email.

use axum::{extract::State, Json};
use serde::Serialize;
use sqlx::FromRow;

use crate::auth::{require_admin, AuthedUser};
use crate::errors::AppError;
use crate::models::user::User;
use crate::state::AppState;

#[derive(Debug, Serialize, FromRow)]
pub struct TierCount {
    pub tier: String,
    pub users: i64,
}

#[derive(Serialize)]
pub struct AdminStatsResponse {
    pub total_users: i64,
    pub users_by_tier: Vec<TierCount>,
    pub total_qr_codes: i64,
    pub total_scans: i64,
}

/// GET /api/v1/admin/users
pub async fn handle_list_users(
    State(state): State<AppState>,
    auth: AuthedUser,
) -> Result<Json<Vec<User>>, AppError> {
    require_admin(&auth.user)?;

    let users: Vec<User> =
        sqlx::query_as("SELECT * FROM users ORDER BY created_at DESC LIMIT 200")
            .fetch_all(&state.db)
            .await?;
    Ok(Json(users))
}

/// GET /api/v1/admin/stats
pub async fn handle_stats(
    State(state): State<AppState>,
    auth: AuthedUser,
) -> Result<Json<AdminStatsResponse>, AppError> {
    require_admin(&auth.user)?;

    let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&state.db)
        .await?;
    let users_by_tier: Vec<TierCount> =
        sqlx::query_as("SELECT tier, COUNT(*) AS users FROM users GROUP BY tier ORDER BY tier")
            .fetch_all(&state.db)
            .await?;
    let total_qr_codes: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM qr_codes")
        .fetch_one(&state.db)
        .await?;
    let total_scans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scan_events")
        .fetch_one(&state.db)
        .await?;

    Ok(Json(AdminStatsResponse {
        total_users,
        users_by_tier,
        total_qr_codes,
        total_scans,
    }))
}
