use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    /// Never serialized into responses (admin listings included).
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Persisted base tier, written only by billing webhook processing.
    pub tier: String,
    pub subscription_status: Option<String>,
    pub trial_ends_at: Option<DateTime<Utc>>,
    /// Authorization role: "user" or "admin".
    pub role: String,
    pub referral_code: Option<String>,
    pub referred_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}
