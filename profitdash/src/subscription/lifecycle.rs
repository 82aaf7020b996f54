//! Paid subscription lifecycle using the typestate pattern.
//!
//! Makes invalid state transitions compile-time errors. The read-only flag is
//! derived from the state, so a subscription that is not active is always
//! read-only.

use std::{fmt, marker::PhantomData, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::models::{PlanCode, UserId};
use crate::error::{ProfitdashError, Result};

// ============================================================================
// State Marker Types (Zero-Sized)
// ============================================================================

/// Active state - paid period running, full access.
#[derive(Debug, Clone, Copy)]
pub struct Active;

/// Expired state - period ended, read-only during the grace period.
#[derive(Debug, Clone, Copy)]
pub struct Expired;

/// Suspended state - grace period over, waiting for archival.
#[derive(Debug, Clone, Copy)]
pub struct Suspended;

/// Archived state - terminal until an admin reactivates.
#[derive(Debug, Clone, Copy)]
pub struct Archived;

// ============================================================================
// Subscription with Typestate
// ============================================================================

/// Subscription with compile-time state tracking.
///
/// # State Machine
///
/// ```text
/// Active ──► Expired ──► Suspended ──► Archived
///   ▲           │            │
///   └───────────┴────────────┘  (reactivate)
/// ```
#[derive(Debug, Clone)]
pub struct Subscription<State> {
    data: SubscriptionData,
    _state: PhantomData<State>,
}

/// State-independent subscription row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionData {
    /// Subscriber.
    pub user_id: UserId,
    /// Paid plan.
    pub plan_code: PlanCode,
    /// Current period start.
    pub current_period_start: DateTime<Utc>,
    /// Current period end.
    pub current_period_end: DateTime<Utc>,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
    /// State-specific data.
    pub state_data: StateData,
}

/// State-specific data stored alongside the subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StateData {
    /// Active state data.
    Active {
        /// Activation (or reactivation) timestamp.
        activated_at: DateTime<Utc>,
    },
    /// Expired state data.
    Expired {
        /// When the subscription expired.
        expired_at: DateTime<Utc>,
        /// End of the grace period.
        grace_period_end: DateTime<Utc>,
    },
    /// Suspended state data.
    Suspended {
        /// When the subscription was suspended.
        suspended_at: DateTime<Utc>,
        /// End of the grace period that preceded suspension, if any.
        grace_period_end: Option<DateTime<Utc>>,
        /// When the account data gets archived.
        archive_scheduled_at: DateTime<Utc>,
    },
    /// Archived state data.
    Archived {
        /// Archival timestamp.
        archived_at: DateTime<Utc>,
    },
}

impl StateData {
    /// Returns the runtime state of this data.
    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        match self {
            Self::Active { .. } => LifecycleState::Active,
            Self::Expired { .. } => LifecycleState::Expired,
            Self::Suspended { .. } => LifecycleState::Suspended,
            Self::Archived { .. } => LifecycleState::Archived,
        }
    }
}

impl SubscriptionData {
    /// Runtime lifecycle state.
    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state_data.state()
    }

    /// Read-only flag. True whenever the state is not active.
    #[must_use]
    pub const fn read_only(&self) -> bool {
        !matches!(self.state_data, StateData::Active { .. })
    }

    /// End of the grace period, when one applies.
    #[must_use]
    pub const fn grace_period_end(&self) -> Option<DateTime<Utc>> {
        match self.state_data {
            StateData::Expired { grace_period_end, .. } => Some(grace_period_end),
            StateData::Suspended { grace_period_end, .. } => grace_period_end,
            StateData::Active { .. } | StateData::Archived { .. } => None,
        }
    }

    /// Archive date: scheduled when suspended, actual when archived.
    #[must_use]
    pub const fn archive_scheduled_at(&self) -> Option<DateTime<Utc>> {
        match self.state_data {
            StateData::Suspended { archive_scheduled_at, .. } => Some(archive_scheduled_at),
            StateData::Archived { archived_at } => Some(archived_at),
            StateData::Active { .. } | StateData::Expired { .. } => None,
        }
    }
}

/// Builds a new state of the subscription.
fn transition<S, T>(sub: Subscription<S>, now: DateTime<Utc>, state_data: StateData) -> Subscription<T> {
    let mut data = sub.data;
    data.state_data = state_data;
    data.updated_at = now;
    Subscription { data, _state: PhantomData }
}

fn reactivate<S>(
    sub: Subscription<S>,
    now: DateTime<Utc>,
    period_end: DateTime<Utc>,
) -> Result<Subscription<Active>> {
    if period_end <= now {
        return Err(ProfitdashError::InvalidTransition(
            "reactivation period must end in the future".into(),
        ));
    }
    let mut sub: Subscription<Active> = transition(sub, now, StateData::Active { activated_at: now });
    sub.data.current_period_start = now;
    sub.data.current_period_end = period_end;
    Ok(sub)
}

// --- Active State Methods ---

impl Subscription<Active> {
    /// Starts a new paid subscription.
    ///
    /// # Errors
    ///
    /// Returns error if `period_end` is not after `now`.
    pub fn start(
        user_id: UserId,
        plan_code: PlanCode,
        now: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<Self> {
        if period_end <= now {
            return Err(ProfitdashError::InvalidTransition(
                "subscription period must end in the future".into(),
            ));
        }
        Ok(Self {
            data: SubscriptionData {
                user_id,
                plan_code,
                current_period_start: now,
                current_period_end: period_end,
                created_at: now,
                updated_at: now,
                state_data: StateData::Active { activated_at: now },
            },
            _state: PhantomData,
        })
    }

    /// Expires the subscription at `expired_at`, opening a grace period of
    /// `grace_days` from that instant.
    #[must_use]
    pub fn expire(
        self,
        now: DateTime<Utc>,
        expired_at: DateTime<Utc>,
        grace_days: u32,
    ) -> Subscription<Expired> {
        let grace_period_end = expired_at + Duration::days(i64::from(grace_days));
        transition(self, now, StateData::Expired { expired_at, grace_period_end })
    }

    /// Switches to another paid plan, keeping the period.
    #[must_use]
    pub fn change_plan(mut self, plan_code: PlanCode, now: DateTime<Utc>) -> Self {
        self.data.plan_code = plan_code;
        self.data.updated_at = now;
        self
    }

    /// Returns whether the period has ended at `now`.
    #[must_use]
    pub fn is_period_over(&self, now: DateTime<Utc>) -> bool {
        self.data.current_period_end <= now
    }
}

// --- Expired State Methods ---

impl Subscription<Expired> {
    /// Suspends after the grace period, scheduling archival `archive_after_days` from now.
    #[must_use]
    pub fn suspend(self, now: DateTime<Utc>, archive_after_days: u32) -> Subscription<Suspended> {
        let grace_period_end = self.grace_period_end();
        let archive_scheduled_at = now + Duration::days(i64::from(archive_after_days));
        transition(
            self,
            now,
            StateData::Suspended { suspended_at: now, grace_period_end, archive_scheduled_at },
        )
    }

    /// Reactivates with a new period.
    ///
    /// # Errors
    ///
    /// Returns error if `period_end` is not after `now`.
    pub fn reactivate(
        self,
        now: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<Subscription<Active>> {
        reactivate(self, now, period_end)
    }

    /// Returns the grace period end.
    #[must_use]
    pub fn grace_period_end(&self) -> Option<DateTime<Utc>> {
        self.data.grace_period_end()
    }

    /// Returns whether the grace period is over at `now`.
    #[must_use]
    pub fn is_grace_over(&self, now: DateTime<Utc>) -> bool {
        self.grace_period_end().is_some_and(|end| end <= now)
    }
}

// --- Suspended State Methods ---

impl Subscription<Suspended> {
    /// Archives the subscription.
    #[must_use]
    pub fn archive(self, now: DateTime<Utc>) -> Subscription<Archived> {
        transition(self, now, StateData::Archived { archived_at: now })
    }

    /// Reactivates with a new period.
    ///
    /// # Errors
    ///
    /// Returns error if `period_end` is not after `now`.
    pub fn reactivate(
        self,
        now: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<Subscription<Active>> {
        reactivate(self, now, period_end)
    }

    /// Returns whether archival is due at `now`.
    #[must_use]
    pub fn is_archive_due(&self, now: DateTime<Utc>) -> bool {
        self.data.archive_scheduled_at().is_some_and(|at| at <= now)
    }
}

// --- Archived State Methods ---

impl Subscription<Archived> {
    /// Reactivates an archived subscription with a new period.
    ///
    /// # Errors
    ///
    /// Returns error if `period_end` is not after `now`.
    pub fn reactivate(
        self,
        now: DateTime<Utc>,
        period_end: DateTime<Utc>,
    ) -> Result<Subscription<Active>> {
        reactivate(self, now, period_end)
    }
}

// --- Common Methods (All States) ---

impl<S> Subscription<S> {
    /// Returns the subscriber.
    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.data.user_id
    }

    /// Returns the plan code.
    #[must_use]
    pub fn plan_code(&self) -> &PlanCode {
        &self.data.plan_code
    }

    /// Returns current period end date.
    #[must_use]
    pub fn current_period_end(&self) -> DateTime<Utc> {
        self.data.current_period_end
    }

    /// Returns the underlying data (for persistence).
    #[must_use]
    pub fn into_data(self) -> SubscriptionData {
        self.data
    }

    /// Returns reference to underlying data.
    #[must_use]
    pub fn data(&self) -> &SubscriptionData {
        &self.data
    }
}

// ============================================================================
// Runtime State
// ============================================================================

/// Runtime lifecycle state, used for API payloads and admin overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Active state.
    Active,
    /// Expired state.
    Expired,
    /// Suspended state.
    Suspended,
    /// Archived state.
    Archived,
}

impl LifecycleState {
    /// All states, in lifecycle order.
    pub const ALL: [Self; 4] = [Self::Active, Self::Expired, Self::Suspended, Self::Archived];

    /// Returns the snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
            Self::Suspended => "suspended",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleState {
    type Err = ProfitdashError;

    /// Parses a target state; anything outside the four states is rejected.
    ///
    /// # Examples
    ///
    /// ```
    /// use profitdash::subscription::LifecycleState;
    ///
    /// assert_eq!("suspended".parse::<LifecycleState>().unwrap(), LifecycleState::Suspended);
    /// assert!("cancelled".parse::<LifecycleState>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self> {
        Self::ALL.into_iter().find(|state| state.as_str() == s).ok_or_else(|| {
            ProfitdashError::Validation(format!(
                "invalid target state {s:?}; expected one of active, expired, suspended, archived"
            ))
        })
    }
}

/// A subscription whose state is only known at runtime.
///
/// Loaded rows are dispatched through this enum so the typed transitions can
/// be applied.
#[derive(Debug, Clone)]
pub enum AnySubscription {
    /// Active subscription.
    Active(Subscription<Active>),
    /// Expired subscription.
    Expired(Subscription<Expired>),
    /// Suspended subscription.
    Suspended(Subscription<Suspended>),
    /// Archived subscription.
    Archived(Subscription<Archived>),
}

impl From<SubscriptionData> for AnySubscription {
    fn from(data: SubscriptionData) -> Self {
        match data.state() {
            LifecycleState::Active => Self::Active(Subscription { data, _state: PhantomData }),
            LifecycleState::Expired => Self::Expired(Subscription { data, _state: PhantomData }),
            LifecycleState::Suspended => {
                Self::Suspended(Subscription { data, _state: PhantomData })
            }
            LifecycleState::Archived => Self::Archived(Subscription { data, _state: PhantomData }),
        }
    }
}

impl AnySubscription {
    /// Returns the underlying data.
    #[must_use]
    pub fn into_data(self) -> SubscriptionData {
        match self {
            Self::Active(sub) => sub.into_data(),
            Self::Expired(sub) => sub.into_data(),
            Self::Suspended(sub) => sub.into_data(),
            Self::Archived(sub) => sub.into_data(),
        }
    }
}

/// Flat subscription view for API responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionSnapshot {
    /// Plan code.
    pub plan_code: PlanCode,
    /// Lifecycle state.
    pub state: LifecycleState,
    /// Current period end.
    pub period_end: DateTime<Utc>,
    /// Grace period end.
    pub grace_period_end: Option<DateTime<Utc>>,
    /// Scheduled archive date.
    pub archive_scheduled_at: Option<DateTime<Utc>>,
    /// Read-only flag.
    pub read_only: bool,
}

impl From<&SubscriptionData> for SubscriptionSnapshot {
    fn from(data: &SubscriptionData) -> Self {
        Self {
            plan_code: data.plan_code.clone(),
            state: data.state(),
            period_end: data.current_period_end,
            grace_period_end: data.grace_period_end(),
            archive_scheduled_at: data.archive_scheduled_at(),
            read_only: data.read_only(),
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unreachable,
    reason = "Test code uses unreachable! for invalid state assertions"
)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn active() -> Subscription<Active> {
        Subscription::start(
            UserId::new("user-1").unwrap(),
            PlanCode::new("growth").unwrap(),
            now(),
            now() + Duration::days(30),
        )
        .unwrap()
    }

    #[test]
    fn test_start_requires_future_period_end() {
        let err = Subscription::start(
            UserId::new("user-1").unwrap(),
            PlanCode::new("growth").unwrap(),
            now(),
            now(),
        )
        .unwrap_err();
        assert!(matches!(err, ProfitdashError::InvalidTransition(_)));
    }

    #[test]
    fn test_active_is_writable() {
        let sub = active();
        assert_eq!(sub.data().state(), LifecycleState::Active);
        assert!(!sub.data().read_only());
        assert!(sub.data().grace_period_end().is_none());
    }

    #[test]
    fn test_active_to_expired_sets_grace_period() {
        let sub = active();
        let period_end = sub.current_period_end();
        let expired = sub.expire(period_end + Duration::hours(1), period_end, 7);

        match expired.data().state_data {
            StateData::Expired { expired_at, grace_period_end } => {
                assert_eq!(expired_at, period_end);
                assert_eq!(grace_period_end, period_end + Duration::days(7));
            }
            _ => unreachable!("Expected Expired state"),
        }
        assert!(expired.data().read_only());
    }

    #[test]
    fn test_expired_to_suspended_schedules_archive() {
        let later = now() + Duration::days(40);
        let suspended = active().expire(now(), now(), 7).suspend(later, 30);

        match suspended.data().state_data {
            StateData::Suspended { suspended_at, grace_period_end, archive_scheduled_at } => {
                assert_eq!(suspended_at, later);
                assert_eq!(grace_period_end, Some(now() + Duration::days(7)));
                assert_eq!(archive_scheduled_at, later + Duration::days(30));
            }
            _ => unreachable!("Expected Suspended state"),
        }
        assert!(suspended.data().read_only());
    }

    #[test]
    fn test_suspended_to_archived() {
        let later = now() + Duration::days(30);
        let archived = active().expire(now(), now(), 7).suspend(now(), 30).archive(later);
        assert_eq!(archived.data().state(), LifecycleState::Archived);
        assert!(archived.data().read_only());
        assert_eq!(archived.data().archive_scheduled_at(), Some(later));
    }

    #[test]
    fn test_expired_reactivation() {
        let reactivated = active()
            .expire(now(), now(), 7)
            .reactivate(now(), now() + Duration::days(30))
            .unwrap();
        assert_eq!(reactivated.data().state(), LifecycleState::Active);
        assert!(!reactivated.data().read_only());
        assert_eq!(reactivated.data().current_period_start, now());
    }

    #[test]
    fn test_reactivation_requires_future_period() {
        let err = active()
            .expire(now(), now(), 7)
            .suspend(now(), 30)
            .reactivate(now(), now() - Duration::days(1))
            .unwrap_err();
        assert!(matches!(err, ProfitdashError::InvalidTransition(_)));
    }

    #[test]
    fn test_grace_boundary() {
        let expired = active().expire(now(), now(), 7);
        let grace_end = now() + Duration::days(7);
        assert!(!expired.is_grace_over(grace_end - Duration::seconds(1)));
        assert!(expired.is_grace_over(grace_end));
    }

    #[test]
    fn test_period_boundary() {
        let sub = active();
        let end = sub.current_period_end();
        assert!(!sub.is_period_over(end - Duration::seconds(1)));
        assert!(sub.is_period_over(end));
    }

    #[test]
    fn test_archive_due_boundary() {
        let suspended = active().expire(now(), now(), 7).suspend(now(), 30);
        let at = now() + Duration::days(30);
        assert!(!suspended.is_archive_due(at - Duration::seconds(1)));
        assert!(suspended.is_archive_due(at));
    }

    #[test]
    fn test_change_plan_keeps_period() {
        let sub = active();
        let end = sub.current_period_end();
        let changed = sub.change_plan(PlanCode::new("pro").unwrap(), now());
        assert_eq!(changed.plan_code().as_str(), "pro");
        assert_eq!(changed.current_period_end(), end);
    }

    #[test]
    fn test_lifecycle_state_parse() {
        for state in LifecycleState::ALL {
            assert_eq!(state.as_str().parse::<LifecycleState>().unwrap(), state);
        }
        assert!(matches!(
            "trial".parse::<LifecycleState>(),
            Err(ProfitdashError::Validation(_))
        ));
        assert!("Active".parse::<LifecycleState>().is_err());
    }

    #[test]
    fn test_any_subscription_dispatch() {
        let data = active().expire(now(), now(), 7).into_data();
        assert!(matches!(AnySubscription::from(data.clone()), AnySubscription::Expired(_)));
        assert_eq!(AnySubscription::from(data.clone()).into_data(), data);
    }

    #[test]
    fn test_read_only_invariant_holds_for_every_state() {
        let active_data = active().into_data();
        let expired = active().expire(now(), now(), 7);
        let expired_data = expired.clone().into_data();
        let suspended = expired.suspend(now(), 30);
        let suspended_data = suspended.clone().into_data();
        let archived_data = suspended.archive(now()).into_data();

        for data in [active_data, expired_data, suspended_data, archived_data] {
            assert_eq!(data.read_only(), data.state() != LifecycleState::Active);
        }
    }

    #[test]
    fn test_state_data_serialization() {
        let data = active().expire(now(), now(), 7).into_data();
        let json = serde_json::to_string(&data).unwrap();
        assert!(json.contains("\"state\":\"expired\""));

        let parsed: SubscriptionData = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, data);
    }

    #[test]
    fn test_snapshot_from_data() {
        let data = active().expire(now(), now(), 7).suspend(now(), 30).into_data();
        let snapshot = SubscriptionSnapshot::from(&data);
        assert_eq!(snapshot.state, LifecycleState::Suspended);
        assert!(snapshot.read_only);
        assert_eq!(snapshot.archive_scheduled_at, Some(now() + Duration::days(30)));
    }
}
