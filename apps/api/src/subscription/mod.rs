pub mod limits;
pub mod tier;

pub use limits::TierLimits;
pub use tier::{resolve_effective_tier, SubscriptionStatus, Tier};
