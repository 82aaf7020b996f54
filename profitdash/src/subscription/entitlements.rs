//! Entitlement lookup: plan limits minus usage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    lifecycle::{LifecycleState, SubscriptionData},
    models::{PlanCode, Profile, ProfileStatus, UsageCounters, UsageKind},
    status::read_only_reason,
};

/// Limit, usage and remaining headroom of one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitUsage {
    /// Plan limit, `None` = unlimited.
    pub limit: Option<u32>,
    /// Current usage.
    pub used: u32,
    /// `limit - used`, saturating at zero. `None` when unlimited.
    pub remaining: Option<u32>,
}

impl LimitUsage {
    /// Computes remaining headroom.
    ///
    /// # Examples
    ///
    /// ```
    /// use profitdash::subscription::LimitUsage;
    ///
    /// assert_eq!(LimitUsage::new(2, Some(5)).remaining, Some(3));
    /// assert_eq!(LimitUsage::new(7, Some(5)).remaining, Some(0));
    /// assert_eq!(LimitUsage::new(7, None).remaining, None);
    /// ```
    #[must_use]
    pub fn new(used: u32, limit: Option<u32>) -> Self {
        Self { limit, used, remaining: limit.map(|limit| limit.saturating_sub(used)) }
    }

    /// Whether one more resource fits.
    #[must_use]
    pub fn has_room(&self) -> bool {
        self.remaining.is_none_or(|remaining| remaining > 0)
    }
}

/// Entitlements of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entitlements {
    /// Current plan.
    pub plan_code: Option<PlanCode>,
    /// Plan-model status.
    pub profile_status: ProfileStatus,
    /// Lifecycle state of the paid subscription, if any.
    pub subscription_state: Option<LifecycleState>,
    /// Whether mutations are blocked.
    pub read_only: bool,
    /// Connected stores.
    pub stores: LimitUsage,
    /// Tracked campaigns.
    pub campaigns: LimitUsage,
    /// Whether another store can be connected right now.
    pub can_add_store: bool,
    /// Whether another campaign can be tracked right now.
    pub can_add_campaign: bool,
}

impl Entitlements {
    /// Computes entitlements from stored rows. No side effects.
    #[must_use]
    pub fn compute(
        profile: &Profile,
        subscription: Option<&SubscriptionData>,
        counters: &UsageCounters,
        now: DateTime<Utc>,
    ) -> Self {
        let read_only = read_only_reason(profile, subscription, now).is_some();
        let usage = |kind| {
            let (used, limit) = counters.usage(kind);
            LimitUsage::new(used, limit)
        };
        let stores = usage(UsageKind::Stores);
        let campaigns = usage(UsageKind::Campaigns);
        Self {
            plan_code: profile.plan_code.clone(),
            profile_status: profile.status,
            subscription_state: subscription.map(SubscriptionData::state),
            read_only,
            stores,
            campaigns,
            can_add_store: !read_only && stores.has_room(),
            can_add_campaign: !read_only && campaigns.has_room(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;

    use super::*;
    use crate::subscription::{
        lifecycle::Subscription,
        models::{PlanLimits, UserId},
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap()
    }

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    fn free_profile() -> Profile {
        let mut profile = Profile::new(user(), now());
        profile.status = ProfileStatus::Free;
        profile.plan_code = Some(PlanCode::free());
        profile
    }

    #[test]
    fn test_free_plan_entitlements() {
        let mut counters = UsageCounters::new(user(), PlanLimits { stores: Some(1), campaigns: Some(2) });
        counters.stores_used = 1;
        counters.campaigns_used = 1;

        let entitlements = Entitlements::compute(&free_profile(), None, &counters, now());
        assert_eq!(entitlements.stores, LimitUsage { limit: Some(1), used: 1, remaining: Some(0) });
        assert_eq!(entitlements.campaigns.remaining, Some(1));
        assert!(!entitlements.can_add_store);
        assert!(entitlements.can_add_campaign);
        assert!(!entitlements.read_only);
    }

    #[test]
    fn test_unlimited_plan() {
        let mut counters = UsageCounters::new(user(), PlanLimits::default());
        counters.stores_used = 40;
        let entitlements = Entitlements::compute(&free_profile(), None, &counters, now());
        assert_eq!(entitlements.stores.remaining, None);
        assert!(entitlements.can_add_store);
    }

    #[test]
    fn test_read_only_blocks_additions() {
        let counters = UsageCounters::new(user(), PlanLimits::default());
        let mut profile = free_profile();
        profile.status = ProfileStatus::Subscribed;
        let expired = Subscription::start(
            user(),
            PlanCode::new("pro").unwrap(),
            now() - Duration::days(31),
            now() - Duration::days(1),
        )
        .unwrap()
        .expire(now(), now() - Duration::days(1), 7)
        .into_data();

        let entitlements = Entitlements::compute(&profile, Some(&expired), &counters, now());
        assert!(entitlements.read_only);
        assert_eq!(entitlements.subscription_state, Some(LifecycleState::Expired));
        assert!(!entitlements.can_add_store);
        assert!(!entitlements.can_add_campaign);
    }

    #[test]
    fn test_usage_above_lowered_limit() {
        let usage = LimitUsage::new(4, Some(1));
        assert_eq!(usage.remaining, Some(0));
        assert!(!usage.has_room());
    }

    proptest! {
        #[test]
        fn prop_remaining_plus_used_is_limit(limit in 0_u32..10_000, used_fraction in 0.0_f64..=1.0) {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "bounded by limit")]
            let used = (f64::from(limit) * used_fraction) as u32;
            let usage = LimitUsage::new(used, Some(limit));
            prop_assert_eq!(usage.remaining.map(|r| r + used), Some(limit));
        }

        #[test]
        fn prop_has_room_iff_used_below_limit(limit in 0_u32..1_000, used in 0_u32..2_000) {
            prop_assert_eq!(LimitUsage::new(used, Some(limit)).has_room(), used < limit);
        }
    }
}
