use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::analytics::{daily_scan_counts, recent_scans, total_scans, DailyScanCount};
use crate::auth::AuthedUser;
use crate::errors::AppError;
use crate::models::qr::{QrCodeRow, ScanEventRow};
use crate::state::AppState;
use crate::subscription::Tier;

const BREAKDOWN_DAYS: i32 = 30;
const RECENT_SCANS_LIMIT: i64 = 50;

#[derive(Serialize)]
pub struct ScanStatsResponse {
    pub qr_id: Uuid,
    pub total: i64,
    /// Per-day counts for the trailing 30 days. `None` on the free tier.
    pub daily: Option<Vec<DailyScanCount>>,
}

/// GET /api/v1/qr/:id/stats
///
/// Totals for everyone; the day-by-day breakdown only where the tier
/// allows it (the free tier sees `daily: null`, not an error).
pub async fn handle_stats(
    State(state): State<AppState>,
    auth: AuthedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ScanStatsResponse>, AppError> {
    ensure_owned(&state, id, auth.user.id).await?;

    let total = total_scans(&state.db, id).await?;
    let daily = if auth.limits.scan_breakdown {
        Some(daily_scan_counts(&state.db, id, BREAKDOWN_DAYS).await?)
    } else {
        None
    };

    Ok(Json(ScanStatsResponse {
        qr_id: id,
        total,
        daily,
    }))
}

/// GET /api/v1/qr/:id/scans — raw recent scan events, paid tiers only.
pub async fn handle_recent_scans(
    State(state): State<AppState>,
    auth: AuthedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ScanEventRow>>, AppError> {
    if !auth.limits.scan_breakdown {
        return Err(AppError::UpgradeRequired {
            required: Tier::Pro,
        });
    }
    ensure_owned(&state, id, auth.user.id).await?;

    let scans = recent_scans(&state.db, id, RECENT_SCANS_LIMIT).await?;
    Ok(Json(scans))
}

async fn ensure_owned(state: &AppState, id: Uuid, user_id: Uuid) -> Result<(), AppError> {
    let row: Option<QrCodeRow> =
        sqlx::query_as("SELECT * FROM qr_codes WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&state.db)
            .await?;
    row.map(|_| ())
        .ok_or_else(|| AppError::NotFound(format!("QR code {id} not found")))
}
