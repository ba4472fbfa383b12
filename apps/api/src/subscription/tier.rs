//! Effective-tier resolution.
//!
//! Billing webhooks persist `tier`, `subscription_status` and `trial_ends_at`
//! on the user row; this module derives the access level actually enforced
//! for a request. The result is computed fresh on every read and never
//! written back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subscription tier. Ordered so that `max()` expresses "higher privilege".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Free,
    Pro,
    Business,
}

impl Tier {
    /// Parses a persisted tier string. Unknown values yield `None`; callers
    /// that gate access must treat that as `Free` (least privilege), never
    /// as an error.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "free" => Some(Tier::Free),
            "pro" => Some(Tier::Pro),
            "business" => Some(Tier::Business),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "free",
            Tier::Pro => "pro",
            Tier::Business => "business",
        }
    }

    pub fn is_paid(&self) -> bool {
        !matches!(self, Tier::Free)
    }

    /// The cheapest tier that is a strict upgrade from this one. Used when
    /// building "upgrade required" responses.
    pub fn next_up(&self) -> Tier {
        match self {
            Tier::Free => Tier::Pro,
            Tier::Pro | Tier::Business => Tier::Business,
        }
    }
}

impl Default for Tier {
    fn default() -> Self {
        Tier::Free
    }
}

/// Parsed form of the persisted `subscription_status` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    Unknown,
}

impl SubscriptionStatus {
    pub fn parse(s: Option<&str>) -> Self {
        match s.map(|v| v.trim().to_lowercase()).as_deref() {
            Some("active") => SubscriptionStatus::Active,
            Some("trialing") => SubscriptionStatus::Trialing,
            Some("past_due") => SubscriptionStatus::PastDue,
            Some("canceled") => SubscriptionStatus::Canceled,
            _ => SubscriptionStatus::Unknown,
        }
    }
}

/// Computes the effective tier for a user from their persisted billing
/// fields.
///
/// Rules:
/// - an unrecognized `base_tier` fails closed to `Free`;
/// - a `trialing` status with `trial_ends_at` strictly in the future grants
///   at least `Pro`, keeping the base tier if it is already higher;
/// - in every other case the result is exactly the base tier. Trial expiry
///   removes the bonus; it never revokes a tier the user paid for.
pub fn resolve_effective_tier(
    base_tier: &str,
    trial_ends_at: Option<DateTime<Utc>>,
    subscription_status: Option<&str>,
) -> Tier {
    resolve_effective_tier_at(base_tier, trial_ends_at, subscription_status, Utc::now())
}

/// Clock-injected variant of [`resolve_effective_tier`] so trial-boundary
/// behavior is testable.
pub(crate) fn resolve_effective_tier_at(
    base_tier: &str,
    trial_ends_at: Option<DateTime<Utc>>,
    subscription_status: Option<&str>,
    now: DateTime<Utc>,
) -> Tier {
    let base = Tier::parse(base_tier).unwrap_or_default();
    let status = SubscriptionStatus::parse(subscription_status);

    let trial_active = status == SubscriptionStatus::Trialing
        && trial_ends_at.map(|t| t > now).unwrap_or(false);

    if trial_active {
        base.max(Tier::Pro)
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn test_no_trial_data_returns_base_tier() {
        for base in ["free", "pro", "business"] {
            let effective = resolve_effective_tier_at(base, None, None, now());
            assert_eq!(effective.as_str(), base);
        }
    }

    #[test]
    fn test_active_trial_elevates_free_to_pro() {
        let t = now();
        let effective = resolve_effective_tier_at(
            "free",
            Some(t + Duration::hours(1)),
            Some("trialing"),
            t,
        );
        assert_eq!(effective, Tier::Pro);
    }

    #[test]
    fn test_expired_trial_never_downgrades() {
        let t = now();
        let effective = resolve_effective_tier_at(
            "pro",
            Some(t - Duration::hours(1)),
            Some("trialing"),
            t,
        );
        assert_eq!(effective, Tier::Pro);
    }

    #[test]
    fn test_expired_trial_on_free_stays_free() {
        let t = now();
        let effective = resolve_effective_tier_at(
            "free",
            Some(t - Duration::seconds(1)),
            Some("trialing"),
            t,
        );
        assert_eq!(effective, Tier::Free);
    }

    #[test]
    fn test_trial_grant_keeps_higher_base_tier() {
        let t = now();
        let effective = resolve_effective_tier_at(
            "business",
            Some(t + Duration::days(7)),
            Some("trialing"),
            t,
        );
        assert_eq!(effective, Tier::Business);
    }

    #[test]
    fn test_future_trial_without_trialing_status_is_ignored() {
        let t = now();
        for status in [Some("active"), Some("canceled"), Some("past_due"), None] {
            let effective =
                resolve_effective_tier_at("free", Some(t + Duration::hours(1)), status, t);
            assert_eq!(effective, Tier::Free);
        }
    }

    #[test]
    fn test_trialing_without_expiry_is_not_elevated() {
        let effective = resolve_effective_tier_at("free", None, Some("trialing"), now());
        assert_eq!(effective, Tier::Free);
    }

    #[test]
    fn test_unknown_base_tier_fails_closed_to_free() {
        let t = now();
        assert_eq!(resolve_effective_tier_at("platinum", None, None, t), Tier::Free);
        assert_eq!(resolve_effective_tier_at("", None, None, t), Tier::Free);
        // Even an active trial on a garbage base tier only grants the trial tier.
        let effective = resolve_effective_tier_at(
            "platinum",
            Some(t + Duration::hours(1)),
            Some("trialing"),
            t,
        );
        assert_eq!(effective, Tier::Pro);
    }

    #[test]
    fn test_resolver_is_idempotent() {
        let t = now();
        let trial = Some(t + Duration::minutes(30));
        let a = resolve_effective_tier_at("free", trial, Some("trialing"), t);
        let b = resolve_effective_tier_at("free", trial, Some("trialing"), t);
        assert_eq!(a, b);
    }

    #[test]
    fn test_tier_parsing_is_case_insensitive() {
        assert_eq!(Tier::parse("Pro"), Some(Tier::Pro));
        assert_eq!(Tier::parse(" BUSINESS "), Some(Tier::Business));
        assert_eq!(Tier::parse("enterprise"), None);
    }

    #[test]
    fn test_tier_ordering() {
        assert!(Tier::Business > Tier::Pro);
        assert!(Tier::Pro > Tier::Free);
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(SubscriptionStatus::parse(Some("trialing")), SubscriptionStatus::Trialing);
        assert_eq!(SubscriptionStatus::parse(Some("past_due")), SubscriptionStatus::PastDue);
        assert_eq!(SubscriptionStatus::parse(Some("weird")), SubscriptionStatus::Unknown);
        assert_eq!(SubscriptionStatus::parse(None), SubscriptionStatus::Unknown);
    }
}
