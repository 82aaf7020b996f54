//! Plans, profiles and the subscription lifecycle.
//!
//! This module holds the account-side domain: plan catalog and usage
//! counters, the paid subscription typestate, status derivation, entitlement
//! lookup, the admin override and the due-transition rules used by the
//! scheduled sweep.

pub mod admin;
pub mod entitlements;
pub mod lifecycle;
pub mod models;
pub mod status;
pub mod sweep;

pub use admin::{ForceStateRequest, ForcedState, force_state};
pub use entitlements::{Entitlements, LimitUsage};
pub use lifecycle::{
    Active, AnySubscription, Archived, Expired, LifecycleState, StateData, Subscription,
    SubscriptionData, SubscriptionSnapshot, Suspended,
};
pub use models::{
    FREE_PLAN, PlanCatalog, PlanCode, PlanDefinition, PlanLimits, Profile, ProfileStatus,
    TRIAL_PLAN, UsageCounters, UsageKind, UserId,
};
pub use status::{
    AccountStatus, Countdown, ReadOnlyReason, SubscriptionStatus, days_until, read_only_reason,
};
pub use sweep::{SweepReport, SweepTransition, advance_subscription, advance_trial};
