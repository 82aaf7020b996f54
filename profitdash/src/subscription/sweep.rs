//! Due-transition evaluation for the scheduled lifecycle checks.
//!
//! Each function looks at one row and returns the row advanced by at most one
//! state, or `None` when nothing is due.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{
    lifecycle::{AnySubscription, SubscriptionData},
    models::{Profile, ProfileStatus},
};
use crate::config::LifecycleConfig;

/// A transition applied by a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepTransition {
    /// Trial reached its end.
    TrialExpired,
    /// Paid period ended.
    SubscriptionExpired,
    /// Grace period ended.
    SubscriptionSuspended,
    /// Archive date reached.
    SubscriptionArchived,
}

/// Counts of transitions applied by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Profiles moved to `trial_expired`.
    pub trials_expired: u32,
    /// Subscriptions moved to `expired`.
    pub subscriptions_expired: u32,
    /// Subscriptions moved to `suspended`.
    pub subscriptions_suspended: u32,
    /// Subscriptions moved to `archived`.
    pub subscriptions_archived: u32,
    /// Rows whose update failed; they are retried on the next sweep.
    pub failures: u32,
    /// Rows changed by another writer between listing and update.
    pub skipped: u32,
}

impl SweepReport {
    /// Counts one applied transition.
    pub fn record(&mut self, transition: SweepTransition) {
        let counter = match transition {
            SweepTransition::TrialExpired => &mut self.trials_expired,
            SweepTransition::SubscriptionExpired => &mut self.subscriptions_expired,
            SweepTransition::SubscriptionSuspended => &mut self.subscriptions_suspended,
            SweepTransition::SubscriptionArchived => &mut self.subscriptions_archived,
        };
        *counter += 1;
    }

    /// Total applied transitions.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.trials_expired
            + self.subscriptions_expired
            + self.subscriptions_suspended
            + self.subscriptions_archived
    }
}

/// Expires a running trial whose end has been reached.
#[must_use]
pub fn advance_trial(profile: &Profile, now: DateTime<Utc>) -> Option<Profile> {
    if profile.status != ProfileStatus::Trialing {
        return None;
    }
    // A trialing profile without an end date is treated as ended.
    if profile.trial_end.is_some_and(|end| end > now) {
        return None;
    }
    let mut next = profile.clone();
    next.status = ProfileStatus::TrialExpired;
    next.updated_at = now;
    Some(next)
}

/// Advances a subscription by one state if a timer is due.
#[must_use]
pub fn advance_subscription(
    data: &SubscriptionData,
    now: DateTime<Utc>,
    timers: &LifecycleConfig,
) -> Option<(SweepTransition, SubscriptionData)> {
    match AnySubscription::from(data.clone()) {
        AnySubscription::Active(sub) if sub.is_period_over(now) => {
            let period_end = sub.current_period_end();
            let expired = sub.expire(now, period_end, timers.grace_period_days);
            Some((SweepTransition::SubscriptionExpired, expired.into_data()))
        }
        AnySubscription::Expired(sub) if sub.is_grace_over(now) => {
            let suspended = sub.suspend(now, timers.archive_after_days);
            Some((SweepTransition::SubscriptionSuspended, suspended.into_data()))
        }
        AnySubscription::Suspended(sub) if sub.is_archive_due(now) => {
            Some((SweepTransition::SubscriptionArchived, sub.archive(now).into_data()))
        }
        _ => None,
    }
}
