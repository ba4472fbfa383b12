//! Per-tier feature limits.
//!
//! Handlers consult these up front and deny with an upgrade hint before
//! touching the database, so the limits table is the single enforcement
//! point for paid features.

use serde::Serialize;

use crate::subscription::Tier;

/// Feature limits attached to an effective tier. `None` means unlimited.
#[derive(Debug, Clone, Serialize)]
pub struct TierLimits {
    /// Maximum number of QR codes a user may hold (None = unlimited).
    pub max_qr_codes: Option<i64>,
    /// Authenticated API requests allowed per minute.
    pub api_requests_per_minute: u64,
    /// Whether style customization (colors, logo, shapes) is available.
    pub custom_styling: bool,
    /// Whether per-day scan breakdowns and raw scan listings are available.
    /// Totals are always available.
    pub scan_breakdown: bool,
}

impl Tier {
    pub fn limits(&self) -> TierLimits {
        match self {
            Tier::Free => TierLimits {
                max_qr_codes: Some(3),
                api_requests_per_minute: 60,
                custom_styling: false,
                scan_breakdown: false,
            },
            Tier::Pro => TierLimits {
                max_qr_codes: Some(50),
                api_requests_per_minute: 600,
                custom_styling: true,
                scan_breakdown: true,
            },
            Tier::Business => TierLimits {
                max_qr_codes: None,
                api_requests_per_minute: 3000,
                custom_styling: true,
                scan_breakdown: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_tier_is_capped() {
        let limits = Tier::Free.limits();
        assert_eq!(limits.max_qr_codes, Some(3));
        assert!(!limits.custom_styling);
        assert!(!limits.scan_breakdown);
    }

    #[test]
    fn test_paid_tiers_unlock_styling() {
        assert!(Tier::Pro.limits().custom_styling);
        assert!(Tier::Business.limits().custom_styling);
    }

    #[test]
    fn test_business_is_uncapped() {
        assert!(Tier::Business.limits().max_qr_codes.is_none());
    }

    #[test]
    fn test_request_budget_grows_with_tier() {
        let free = Tier::Free.limits().api_requests_per_minute;
        let pro = Tier::Pro.limits().api_requests_per_minute;
        let business = Tier::Business.limits().api_requests_per_minute;
        assert!(free < pro && pro < business);
    }
}
