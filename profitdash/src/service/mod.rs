//! Account service: the operations behind the HTTP endpoints.
//!
//! [`AccountService`] combines a store with the plan catalog and lifecycle
//! timers. Operations take the current time explicitly so the date
//! arithmetic can be tested at exact boundaries.
//!
//! - [`billing`]: status, entitlements, plan selection, admin override and
//!   the scheduled lifecycle checks
//! - [`workspace`]: stores, campaigns, notes, dashboard and account deletion

use chrono::{DateTime, Utc};

use crate::{
    config::{LifecycleConfig, ServiceConfig},
    error::{ProfitdashError, Result},
    reliability::{RetryPolicy, retry_with_backoff},
    store::AccountStore,
    subscription::{
        PlanCatalog, PlanCode, PlanLimits, Profile, SubscriptionData, UsageCounters, UserId,
        read_only_reason,
    },
};

pub mod billing;
pub mod workspace;

pub use billing::ForceStateOutcome;

/// Account operations over a storage backend.
#[derive(Debug, Clone)]
pub struct AccountService<S> {
    store: S,
    catalog: PlanCatalog,
    timers: LifecycleConfig,
    retry: RetryPolicy,
}

impl<S: AccountStore> AccountService<S> {
    /// Creates a service with the default retry policy.
    #[must_use]
    pub fn new(store: S, catalog: PlanCatalog, timers: LifecycleConfig) -> Self {
        Self { store, catalog, timers, retry: RetryPolicy::default() }
    }

    /// Creates a service from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProfitdashError::Config`] if the plan catalog cannot be built.
    pub fn from_config(store: S, config: &ServiceConfig) -> Result<Self> {
        Ok(Self::new(store, config.plan_catalog()?, config.lifecycle))
    }

    /// Replaces the retry policy used by the scheduled checks.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the storage backend.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Returns the plan catalog.
    #[must_use]
    pub const fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    /// Returns the lifecycle timers.
    #[must_use]
    pub const fn timers(&self) -> &LifecycleConfig {
        &self.timers
    }

    /// Loads a profile, creating it (with empty counters) on first access.
    async fn load_or_create_profile(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<Profile> {
        if let Some(profile) = self.store.get_profile(user_id).await? {
            return Ok(profile);
        }
        let counters = UsageCounters::new(user_id.clone(), self.limits_for(None)?);
        let profile =
            self.store.create_account(Profile::new(user_id.clone(), now), counters).await?;
        tracing::info!(user_id = %user_id, "created profile");
        Ok(profile)
    }

    /// Loads usage counters, creating them from the plan limits if missing.
    async fn load_usage(&self, profile: &Profile) -> Result<UsageCounters> {
        if let Some(counters) = self.store.get_usage(&profile.user_id).await? {
            return Ok(counters);
        }
        let limits = self.limits_for(profile.plan_code.as_ref())?;
        self.store.set_limits(&profile.user_id, limits).await
    }

    /// Limits of a plan. An account without a plan gets the free-tier limits.
    fn limits_for(&self, plan: Option<&PlanCode>) -> Result<PlanLimits> {
        match plan {
            Some(code) => Ok(self.catalog.get(code)?.limits),
            None => Ok(self.catalog.get(&PlanCode::free())?.limits),
        }
    }

    /// Writes the limits of the profile's plan to its usage counters.
    async fn apply_plan_limits(&self, profile: &Profile) -> Result<UsageCounters> {
        let limits = self.limits_for(profile.plan_code.as_ref())?;
        self.store.set_limits(&profile.user_id, limits).await
    }

    async fn load_account(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<(Profile, Option<SubscriptionData>)> {
        let profile = self.load_or_create_profile(user_id, now).await?;
        let subscription = self.store.get_subscription(user_id).await?;
        Ok((profile, subscription))
    }

    /// Fails with [`ProfitdashError::ReadOnly`] if the account cannot be modified.
    async fn require_writable(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<Profile> {
        let (profile, subscription) = self.load_account(user_id, now).await?;
        if let Some(reason) = read_only_reason(&profile, subscription.as_ref(), now) {
            tracing::info!(user_id = %user_id, reason = ?reason, "mutation blocked");
            return Err(ProfitdashError::ReadOnly(reason.message()));
        }
        Ok(profile)
    }

    async fn with_retry<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        retry_with_backoff(&self.retry, operation).await
    }
}
