//! Referral codes and share links.

use axum::{extract::State, Json};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::AuthedUser;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Serialize)]
pub struct ReferralResponse {
    pub code: String,
    pub share_url: String,
    pub referred_signups: i64,
}

/// Generates a referral code. Prefixed so codes are recognizable in signup
/// URLs and support tickets.
pub fn generate_referral_code() -> String {
    format!("wolf-{}", &Uuid::new_v4().simple().to_string()[..8])
}

/// GET /api/v1/referral
///
/// Returns the caller's referral code, minting one on first access. The
/// COALESCE write keeps concurrent first accesses idempotent.
pub async fn handle_referral(
    State(state): State<AppState>,
    auth: AuthedUser,
) -> Result<Json<ReferralResponse>, AppError> {
    let code = match auth.user.referral_code {
        Some(code) => code,
        None => {
            let minted: String = sqlx::query_scalar(
                r#"
                UPDATE users
                SET referral_code = COALESCE(referral_code, $1)
                WHERE id = $2
                RETURNING referral_code
                "#,
            )
            .bind(generate_referral_code())
            .bind(auth.user.id)
            .fetch_one(&state.db)
            .await?;
            minted
        }
    };

    let referred_signups: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE referred_by = $1")
            .bind(auth.user.id)
            .fetch_one(&state.db)
            .await?;

    let share_url = format!("{}/signup?ref={}", state.config.public_url, code);
    Ok(Json(ReferralResponse {
        code,
        share_url,
        referred_signups,
    }))
}
