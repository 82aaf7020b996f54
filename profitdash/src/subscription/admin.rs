//! Admin override of the subscription lifecycle state.
//!
//! Unlike the scheduled transitions, a forced state may be reached from any
//! state. Derived dates are recomputed for the target.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{
    lifecycle::{LifecycleState, StateData, Subscription, SubscriptionData},
    models::{PlanCode, UserId},
};
use crate::{
    config::LifecycleConfig,
    error::{ProfitdashError, Result},
};

/// Body of the force-subscription-status call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForceStateRequest {
    /// Account to change.
    pub user_id: UserId,
    /// Target state name; validated by [`ForceStateRequest::target`].
    pub target_state: String,
    /// Paid plan to switch to (activation only).
    #[serde(default)]
    pub plan_code: Option<PlanCode>,
    /// Explicit period end (activation only).
    #[serde(default)]
    pub period_end: Option<DateTime<Utc>>,
    /// Free-text reason recorded in the audit log.
    #[serde(default)]
    pub reason: Option<String>,
}

impl ForceStateRequest {
    /// Parses the target state.
    ///
    /// # Errors
    ///
    /// Returns [`ProfitdashError::Validation`] unless the target is one of
    /// `active`, `expired`, `suspended` or `archived`.
    pub fn target(&self) -> Result<LifecycleState> {
        self.target_state.trim().parse()
    }

    /// Checks field combinations that do not depend on stored data.
    ///
    /// # Errors
    ///
    /// Returns [`ProfitdashError::Validation`] on an invalid combination.
    pub fn validate(&self) -> Result<LifecycleState> {
        let target = self.target()?;
        if target != LifecycleState::Active && (self.plan_code.is_some() || self.period_end.is_some())
        {
            return Err(ProfitdashError::Validation(
                "plan_code and period_end only apply when activating".into(),
            ));
        }
        if let Some(reason) = &self.reason
            && reason.chars().count() > 500
        {
            return Err(ProfitdashError::Validation("reason must be 500 characters or less".into()));
        }
        Ok(target)
    }
}

/// Result of applying a forced state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForcedState {
    /// State before the override, `None` if no subscription existed.
    pub previous: Option<LifecycleState>,
    /// Updated subscription row.
    pub subscription: SubscriptionData,
}

/// Applies a forced state to a subscription row.
///
/// `plan_code` must already be checked against the plan catalog.
///
/// # Errors
///
/// - [`ProfitdashError::Validation`] if an activation has no plan for a user
///   without a subscription, or its period end is not in the future
/// - [`ProfitdashError::NotFound`] if a non-active target is forced on a user
///   without a subscription
pub fn force_state(
    existing: Option<SubscriptionData>,
    user_id: &UserId,
    target: LifecycleState,
    plan_code: Option<PlanCode>,
    period_end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    timers: &LifecycleConfig,
) -> Result<ForcedState> {
    let previous = existing.as_ref().map(SubscriptionData::state);

    let subscription = match (existing, target) {
        (existing, LifecycleState::Active) => {
            let period_end = period_end
                .unwrap_or_else(|| now + Duration::days(i64::from(timers.default_period_days)));
            if period_end <= now {
                return Err(ProfitdashError::Validation("period_end must be in the future".into()));
            }
            match existing {
                Some(mut data) => {
                    if let Some(plan) = plan_code {
                        data.plan_code = plan;
                    }
                    data.current_period_start = now;
                    data.current_period_end = period_end;
                    data.state_data = StateData::Active { activated_at: now };
                    data.updated_at = now;
                    data
                }
                None => {
                    let plan = plan_code.ok_or_else(|| {
                        ProfitdashError::Validation(
                            "plan_code is required to activate a user without a subscription"
                                .into(),
                        )
                    })?;
                    Subscription::start(user_id.clone(), plan, now, period_end)?.into_data()
                }
            }
        }
        (None, _) => {
            return Err(ProfitdashError::NotFound(format!("subscription for user {user_id}")));
        }
        (Some(mut data), LifecycleState::Expired) => {
            data.state_data = StateData::Expired {
                expired_at: now,
                grace_period_end: now + Duration::days(i64::from(timers.grace_period_days)),
            };
            data.updated_at = now;
            data
        }
        (Some(mut data), LifecycleState::Suspended) => {
            data.state_data = StateData::Suspended {
                suspended_at: now,
                grace_period_end: data.grace_period_end(),
                archive_scheduled_at: now + Duration::days(i64::from(timers.archive_after_days)),
            };
            data.updated_at = now;
            data
        }
        (Some(mut data), LifecycleState::Archived) => {
            data.state_data = StateData::Archived { archived_at: now };
            data.updated_at = now;
            data
        }
    };

    Ok(ForcedState { previous, subscription })
}
