//! Trial and subscription status derivation.
//!
//! Pure date arithmetic over stored end dates. Nothing here touches storage.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{
    lifecycle::{LifecycleState, SubscriptionData},
    models::{PlanCode, Profile, ProfileStatus, UserId},
};

/// Whole days from `now` until `end`, rounded up. Zero once `end` has passed.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use profitdash::subscription::days_until;
///
/// let now = Utc::now();
/// assert_eq!(days_until(now + Duration::seconds(1), now), 1);
/// assert_eq!(days_until(now + Duration::days(2), now), 2);
/// assert_eq!(days_until(now + Duration::days(2) + Duration::seconds(1), now), 3);
/// assert_eq!(days_until(now, now), 0);
/// ```
#[must_use]
pub fn days_until(end: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let remaining = end - now;
    if remaining <= Duration::zero() {
        return 0;
    }
    let whole = remaining.num_days();
    let days = if remaining > Duration::days(whole) { whole + 1 } else { whole };
    u32::try_from(days).unwrap_or(u32::MAX)
}

/// Countdown towards an end date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Countdown {
    /// End date, if one is stored.
    pub end: Option<DateTime<Utc>>,
    /// `now < end`.
    pub is_active: bool,
    /// Negation of `is_active`.
    pub is_expired: bool,
    /// Ceiling of the remaining days, zero when expired.
    pub days_remaining: u32,
    /// Active and within the warning threshold.
    pub show_warning: bool,
}

impl Countdown {
    /// Derives the countdown. A missing end date counts as expired.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{Duration, Utc};
    /// use profitdash::subscription::Countdown;
    ///
    /// let now = Utc::now();
    /// let status = Countdown::derive(Some(now + Duration::days(2)), now, 3);
    /// assert!(status.is_active);
    /// assert_eq!(status.days_remaining, 2);
    /// assert!(status.show_warning);
    ///
    /// let status = Countdown::derive(Some(now), now, 3);
    /// assert!(status.is_expired);
    /// assert!(!status.show_warning);
    /// ```
    #[must_use]
    pub fn derive(end: Option<DateTime<Utc>>, now: DateTime<Utc>, warning_threshold_days: u32) -> Self {
        let Some(end_at) = end else {
            return Self {
                end: None,
                is_active: false,
                is_expired: true,
                days_remaining: 0,
                show_warning: false,
            };
        };
        let is_active = now < end_at;
        let days_remaining = if is_active { days_until(end_at, now) } else { 0 };
        Self {
            end,
            is_active,
            is_expired: !is_active,
            days_remaining,
            show_warning: is_active && days_remaining <= warning_threshold_days,
        }
    }
}

/// Status of a paid subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionStatus {
    /// Paid plan.
    pub plan_code: PlanCode,
    /// Lifecycle state.
    pub state: LifecycleState,
    /// Read-only flag.
    pub read_only: bool,
    /// Countdown to the end of the current period.
    pub period: Countdown,
    /// Grace period end, when expired or suspended.
    pub grace_period_end: Option<DateTime<Utc>>,
    /// Ceiling of the remaining grace days.
    pub grace_days_remaining: u32,
    /// Archive date, when suspended or archived.
    pub archive_scheduled_at: Option<DateTime<Utc>>,
}

impl SubscriptionStatus {
    /// Derives the status of a subscription row.
    #[must_use]
    pub fn derive(data: &SubscriptionData, now: DateTime<Utc>, warning_threshold_days: u32) -> Self {
        let state = data.state();
        let mut period = Countdown::derive(Some(data.current_period_end), now, warning_threshold_days);
        if state != LifecycleState::Active {
            // Only an active subscription can be running, whatever its period end says.
            period.is_active = false;
            period.is_expired = true;
            period.days_remaining = 0;
            period.show_warning = false;
        }
        let grace_period_end = data.grace_period_end();
        Self {
            plan_code: data.plan_code.clone(),
            state,
            read_only: data.read_only(),
            period,
            grace_period_end,
            grace_days_remaining: grace_period_end.map_or(0, |end| days_until(end, now)),
            archive_scheduled_at: data.archive_scheduled_at(),
        }
    }
}

/// Why an account is read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadOnlyReason {
    /// No plan chosen yet.
    NoPlan,
    /// Trial ran out.
    TrialExpired,
    /// Profile says subscribed but no subscription row exists.
    SubscriptionMissing,
    /// Paid subscription is not active.
    SubscriptionInactive(LifecycleState),
}

impl ReadOnlyReason {
    /// Message shown to the user.
    #[must_use]
    pub fn message(self) -> String {
        match self {
            Self::NoPlan => "choose a plan to make changes".to_owned(),
            Self::TrialExpired => "your trial has expired; choose a plan to make changes".to_owned(),
            Self::SubscriptionMissing => "no subscription found for this account".to_owned(),
            Self::SubscriptionInactive(state) => {
                format!("your subscription is {state}; renew it to make changes")
            }
        }
    }
}

/// Works out whether an account is read-only at `now`.
///
/// A trial whose end has passed locks the account even before the scheduled
/// check flips the profile to `trial_expired`.
#[must_use]
pub fn read_only_reason(
    profile: &Profile,
    subscription: Option<&SubscriptionData>,
    now: DateTime<Utc>,
) -> Option<ReadOnlyReason> {
    match profile.status {
        ProfileStatus::None => Some(ReadOnlyReason::NoPlan),
        ProfileStatus::TrialExpired => Some(ReadOnlyReason::TrialExpired),
        ProfileStatus::Trialing => match profile.trial_end {
            Some(end) if now < end => None,
            _ => Some(ReadOnlyReason::TrialExpired),
        },
        ProfileStatus::Free => None,
        ProfileStatus::Subscribed => match subscription {
            None => Some(ReadOnlyReason::SubscriptionMissing),
            Some(sub) if sub.read_only() => Some(ReadOnlyReason::SubscriptionInactive(sub.state())),
            Some(_) => None,
        },
    }
}

/// Combined account status returned by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStatus {
    /// Account owner.
    pub user_id: UserId,
    /// Current plan.
    pub plan_code: Option<PlanCode>,
    /// Plan-model status.
    pub profile_status: ProfileStatus,
    /// Whether mutations are blocked.
    pub read_only: bool,
    /// Message explaining the read-only mode.
    pub read_only_reason: Option<String>,
    /// Trial countdown.
    pub trial: Countdown,
    /// Whether the user may still start a trial.
    pub trial_available: bool,
    /// Paid subscription status.
    pub subscription: Option<SubscriptionStatus>,
}

impl AccountStatus {
    /// Derives the full status of an account.
    #[must_use]
    pub fn derive(
        profile: &Profile,
        subscription: Option<&SubscriptionData>,
        now: DateTime<Utc>,
        warning_threshold_days: u32,
    ) -> Self {
        let reason = read_only_reason(profile, subscription, now);
        Self {
            user_id: profile.user_id.clone(),
            plan_code: profile.plan_code.clone(),
            profile_status: profile.status,
            read_only: reason.is_some(),
            read_only_reason: reason.map(ReadOnlyReason::message),
            trial: Countdown::derive(profile.trial_end, now, warning_threshold_days),
            trial_available: !profile.trial_used,
            subscription: subscription
                .map(|sub| SubscriptionStatus::derive(sub, now, warning_threshold_days)),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use proptest::prelude::*;

    use super::*;
    use crate::subscription::lifecycle::Subscription;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 9, 30, 0).unwrap()
    }

    fn trialing(end: DateTime<Utc>) -> Profile {
        let mut profile = Profile::new(UserId::new("user-1").unwrap(), now() - Duration::days(10));
        profile.status = ProfileStatus::Trialing;
        profile.plan_code = Some(PlanCode::trial());
        profile.trial_used = true;
        profile.trial_end = Some(end);
        profile
    }

    fn subscription() -> Subscription<crate::subscription::lifecycle::Active> {
        Subscription::start(
            UserId::new("user-1").unwrap(),
            PlanCode::new("growth").unwrap(),
            now() - Duration::days(1),
            now() + Duration::days(29),
        )
        .unwrap()
    }

    #[test]
    fn test_trial_exactly_at_end_is_expired() {
        let status = Countdown::derive(Some(now()), now(), 3);
        assert!(!status.is_active);
        assert!(status.is_expired);
        assert_eq!(status.days_remaining, 0);
        assert!(!status.show_warning);
    }

    #[test]
    fn test_one_second_left_counts_as_one_day() {
        let status = Countdown::derive(Some(now() + Duration::seconds(1)), now(), 3);
        assert!(status.is_active);
        assert_eq!(status.days_remaining, 1);
        assert!(status.show_warning);
    }

    #[test]
    fn test_warning_threshold_boundary() {
        let three = Countdown::derive(Some(now() + Duration::days(3)), now(), 3);
        assert_eq!(three.days_remaining, 3);
        assert!(three.show_warning);

        let over = Countdown::derive(Some(now() + Duration::days(3) + Duration::minutes(1)), now(), 3);
        assert_eq!(over.days_remaining, 4);
        assert!(!over.show_warning);
    }

    #[test]
    fn test_missing_end_is_inactive() {
        let status = Countdown::derive(None, now(), 3);
        assert!(!status.is_active);
        assert!(status.is_expired);
        assert_eq!(status.days_remaining, 0);
    }

    #[test]
    fn test_past_end_reports_zero_days() {
        let status = Countdown::derive(Some(now() - Duration::days(5)), now(), 3);
        assert!(status.is_expired);
        assert_eq!(status.days_remaining, 0);
    }

    #[test]
    fn test_read_only_reasons() {
        let fresh = Profile::new(UserId::new("user-1").unwrap(), now());
        assert_eq!(read_only_reason(&fresh, None, now()), Some(ReadOnlyReason::NoPlan));

        let running = trialing(now() + Duration::days(1));
        assert_eq!(read_only_reason(&running, None, now()), None);

        let lapsed = trialing(now());
        assert_eq!(read_only_reason(&lapsed, None, now()), Some(ReadOnlyReason::TrialExpired));

        let mut free = fresh.clone();
        free.status = ProfileStatus::Free;
        assert_eq!(read_only_reason(&free, None, now()), None);
    }

    #[test]
    fn test_subscribed_read_only_follows_state() {
        let mut profile = Profile::new(UserId::new("user-1").unwrap(), now());
        profile.status = ProfileStatus::Subscribed;

        let active = subscription();
        assert_eq!(read_only_reason(&profile, Some(active.data()), now()), None);

        let expired = active.expire(now(), now(), 7).into_data();
        assert_eq!(
            read_only_reason(&profile, Some(&expired), now()),
            Some(ReadOnlyReason::SubscriptionInactive(LifecycleState::Expired))
        );
        assert_eq!(
            read_only_reason(&profile, None, now()),
            Some(ReadOnlyReason::SubscriptionMissing)
        );
    }

    #[test]
    fn test_subscription_status_grace_countdown() {
        let expired = subscription().expire(now(), now() - Duration::hours(12), 7).into_data();
        let status = SubscriptionStatus::derive(&expired, now(), 3);
        assert_eq!(status.state, LifecycleState::Expired);
        assert!(status.read_only);
        assert!(!status.period.is_active);
        assert_eq!(status.grace_days_remaining, 7);
        assert!(status.archive_scheduled_at.is_none());
    }

    #[test]
    fn test_account_status_derive() {
        let profile = trialing(now() + Duration::days(2) + Duration::hours(1));
        let status = AccountStatus::derive(&profile, None, now(), 3);
        assert!(!status.read_only);
        assert_eq!(status.trial.days_remaining, 3);
        assert!(status.trial.show_warning);
        assert!(!status.trial_available);
        assert!(status.subscription.is_none());
    }

    #[test]
    fn test_read_only_message_mentions_state() {
        let reason = ReadOnlyReason::SubscriptionInactive(LifecycleState::Suspended);
        assert!(reason.message().contains("suspended"));
    }

    proptest! {
        #[test]
        fn prop_days_remaining_is_ceiling(secs in 1_i64..100_000_000) {
            let end = now() + Duration::seconds(secs);
            let days = i64::from(days_until(end, now()));
            prop_assert!(days * 86_400 >= secs);
            prop_assert!((days - 1) * 86_400 < secs);
        }

        #[test]
        fn prop_expired_never_warns(secs in 0_i64..100_000_000, threshold in 0_u32..30) {
            let status = Countdown::derive(Some(now() - Duration::seconds(secs)), now(), threshold);
            prop_assert!(status.is_expired);
            prop_assert!(!status.show_warning);
            prop_assert_eq!(status.days_remaining, 0);
        }
    }
}
