//! Billing webhook processing.
//!
//! The payment provider pushes subscription lifecycle events here; this is
//! the only writer of the billing fields (`tier`, `subscription_status`,
//! `trial_ends_at`) that the tier resolver reads. Events carry absolute
//! state, so replays are harmless.

use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use crate::errors::AppError;
use crate::state::AppState;
use crate::subscription::Tier;

pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

const EVENT_SUBSCRIPTION_CREATED: &str = "customer.subscription.created";
const EVENT_SUBSCRIPTION_UPDATED: &str = "customer.subscription.updated";
const EVENT_SUBSCRIPTION_DELETED: &str = "customer.subscription.deleted";

#[derive(Debug, Deserialize)]
pub struct BillingEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub customer_email: String,
    pub tier: Option<String>,
    pub subscription_status: Option<String>,
    pub trial_ends_at: Option<DateTime<Utc>>,
}

/// POST /api/v1/billing/webhook
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(event): Json<BillingEvent>,
) -> Result<StatusCode, AppError> {
    let secret = headers
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthorized)?;
    if secret != state.config.billing_webhook_secret {
        return Err(AppError::Unauthorized);
    }

    match event.event_type.as_str() {
        EVENT_SUBSCRIPTION_CREATED | EVENT_SUBSCRIPTION_UPDATED => {
            let tier = event
                .tier
                .as_deref()
                .and_then(Tier::parse)
                .ok_or_else(|| {
                    AppError::Validation(format!(
                        "unrecognized tier in billing event: {:?}",
                        event.tier
                    ))
                })?;

            let result = sqlx::query(
                r#"
                UPDATE users
                SET tier = $1, subscription_status = $2, trial_ends_at = $3
                WHERE email = $4
                "#,
            )
            .bind(tier.as_str())
            .bind(&event.subscription_status)
            .bind(event.trial_ends_at)
            .bind(&event.customer_email)
            .execute(&state.db)
            .await?;

            if result.rows_affected() == 0 {
                return Err(AppError::NotFound(format!(
                    "No user for billing customer {}",
                    event.customer_email
                )));
            }
            info!(
                "Applied {} for {}: tier={}, status={:?}",
                event.event_type,
                event.customer_email,
                tier.as_str(),
                event.subscription_status
            );
        }
        EVENT_SUBSCRIPTION_DELETED => {
            let result = sqlx::query(
                r#"
                UPDATE users
                SET tier = 'free', subscription_status = 'canceled', trial_ends_at = NULL
                WHERE email = $1
                "#,
            )
            .bind(&event.customer_email)
            .execute(&state.db)
            .await?;

            if result.rows_affected() == 0 {
                return Err(AppError::NotFound(format!(
                    "No user for billing customer {}",
                    event.customer_email
                )));
            }
            info!(
                "Subscription deleted for {}, reverted to free",
                event.customer_email
            );
        }
        other => {
            // Providers send many event types we don't track; acknowledge so
            // they aren't redelivered.
            info!("Ignoring billing event type {other}");
        }
    }

    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_deserializes_from_provider_payload() {
        let event: BillingEvent = serde_json::from_str(
            r#"{
                "type": "customer.subscription.updated",
                "customer_email": "ada@example.com",
                "tier": "pro",
                "subscription_status": "trialing",
                "trial_ends_at": "2026-09-15T00:00:00Z"
            }"#,
        )
        .unwrap();
        assert_eq!(event.event_type, EVENT_SUBSCRIPTION_UPDATED);
        assert_eq!(event.tier.as_deref(), Some("pro"));
        assert!(event.trial_ends_at.is_some());
    }

    #[test]
    fn test_deleted_event_needs_no_tier() {
        let event: BillingEvent = serde_json::from_str(
            r#"{
                "type": "customer.subscription.deleted",
                "customer_email": "ada@example.com"
            }"#,
        )
        .unwrap();
        assert_eq!(event.event_type, EVENT_SUBSCRIPTION_DELETED);
        assert!(event.tier.is_none());
        assert!(event.subscription_status.is_none());
    }
}
