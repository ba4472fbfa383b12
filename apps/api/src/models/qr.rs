use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QrCodeRow {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Short public identifier used in scan URLs (`/r/:slug`).
    pub slug: String,
    pub target_url: String,
    pub label: Option<String>,
    /// Styling options (colors, logo, module shape) as free-form JSON.
    pub style: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScanEventRow {
    pub id: Uuid,
    pub qr_id: Uuid,
    pub scanned_at: DateTime<Utc>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
}
