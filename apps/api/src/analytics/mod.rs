//! Scan analytics queries.
//!
//! Totals are available on every tier; per-day breakdowns and raw scan
//! listings are paid features gated in the handlers.

pub mod handlers;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::models::qr::ScanEventRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DailyScanCount {
    pub day: DateTime<Utc>,
    pub scans: i64,
}

pub async fn total_scans(pool: &PgPool, qr_id: Uuid) -> Result<i64> {
    Ok(
        sqlx::query_scalar("SELECT COUNT(*) FROM scan_events WHERE qr_id = $1")
            .bind(qr_id)
            .fetch_one(pool)
            .await?,
    )
}

/// Scan counts per day over the trailing `days` days, oldest first. Days
/// with no scans are absent rather than zero-filled.
pub async fn daily_scan_counts(
    pool: &PgPool,
    qr_id: Uuid,
    days: i32,
) -> Result<Vec<DailyScanCount>> {
    Ok(sqlx::query_as::<_, DailyScanCount>(
        r#"
        SELECT date_trunc('day', scanned_at) AS day, COUNT(*) AS scans
        FROM scan_events
        WHERE qr_id = $1 AND scanned_at > NOW() - make_interval(days => $2)
        GROUP BY day
        ORDER BY day ASC
        "#,
    )
    .bind(qr_id)
    .bind(days)
    .fetch_all(pool)
    .await?)
}

pub async fn recent_scans(pool: &PgPool, qr_id: Uuid, limit: i64) -> Result<Vec<ScanEventRow>> {
    Ok(sqlx::query_as::<_, ScanEventRow>(
        "SELECT * FROM scan_events WHERE qr_id = $1 ORDER BY scanned_at DESC LIMIT $2",
    )
    .bind(qr_id)
    .bind(limit)
    .fetch_all(pool)
    .await?)
}
