//! Account data models: identifiers, plans, profiles and usage counters.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ProfitdashError, Result};

/// Plan code of the time-boxed trial.
pub const TRIAL_PLAN: &str = "trial";

/// Plan code of the free tier.
pub const FREE_PLAN: &str = "free";

/// Unique identifier of a user, as issued by the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Creates a user ID after validation.
    ///
    /// # Errors
    ///
    /// Returns error if ID is empty, exceeds 64 characters, or contains characters other than
    /// ASCII alphanumerics, hyphens, and underscores.
    pub fn new<S: Into<String>>(id: S) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(ProfitdashError::Validation("user_id cannot be empty".into()));
        }
        if id.len() > 64 {
            return Err(ProfitdashError::Validation(
                "user_id must be 64 characters or less".into(),
            ));
        }
        if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(ProfitdashError::Validation(
                "user_id can only contain alphanumeric characters, hyphens, and underscores".into(),
            ));
        }
        Ok(Self(id))
    }

    /// Returns the inner string reference.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = ProfitdashError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Plan code such as `trial`, `free` or `growth`.
///
/// Only the format is checked here; membership in the catalog is checked by
/// [`PlanCatalog::get`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PlanCode(String);

impl PlanCode {
    /// Creates a plan code after format validation.
    ///
    /// # Errors
    ///
    /// Returns [`ProfitdashError::InvalidPlanCode`] if the code is empty, longer than 32
    /// characters, or contains anything but lowercase ASCII letters, digits, `-` and `_`.
    ///
    /// # Examples
    ///
    /// ```
    /// use profitdash::subscription::PlanCode;
    ///
    /// assert!(PlanCode::new("growth").is_ok());
    /// assert!(PlanCode::new("Growth Plan").is_err());
    /// ```
    pub fn new<S: Into<String>>(code: S) -> Result<Self> {
        let code = code.into();
        if code.is_empty() || code.len() > 32 {
            return Err(ProfitdashError::InvalidPlanCode(format!(
                "plan code must be 1-32 characters: {code:?}"
            )));
        }
        if !code.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            return Err(ProfitdashError::InvalidPlanCode(format!(
                "plan code may only contain lowercase letters, digits, hyphens, and underscores: \
                 {code:?}"
            )));
        }
        Ok(Self(code))
    }

    /// Plan code of the trial.
    #[must_use]
    pub fn trial() -> Self {
        Self(TRIAL_PLAN.to_owned())
    }

    /// Plan code of the free tier.
    #[must_use]
    pub fn free() -> Self {
        Self(FREE_PLAN.to_owned())
    }

    /// Returns the inner string reference.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PlanCode {
    type Error = ProfitdashError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<PlanCode> for String {
    fn from(value: PlanCode) -> Self {
        value.0
    }
}

impl std::fmt::Display for PlanCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Usage limits of a plan. `None` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlanLimits {
    /// Maximum connected Shopify stores.
    pub stores: Option<u32>,
    /// Maximum tracked ad campaigns.
    pub campaigns: Option<u32>,
}

/// A plan offered by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDefinition {
    /// Plan code.
    pub code: PlanCode,
    /// Display name.
    pub name: String,
    /// Usage limits.
    pub limits: PlanLimits,
    /// Whether the plan is paid and therefore backed by a subscription row.
    pub paid: bool,
}

/// Catalog of plans keyed by plan code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanCatalog {
    plans: BTreeMap<PlanCode, PlanDefinition>,
}

impl PlanCatalog {
    /// Builds a catalog from plan definitions.
    ///
    /// # Errors
    ///
    /// Returns [`ProfitdashError::Config`] if a code appears twice, or if the `trial` or
    /// `free` plan is missing or marked as paid.
    pub fn new(plans: impl IntoIterator<Item = PlanDefinition>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for plan in plans {
            let code = plan.code.clone();
            if map.insert(code.clone(), plan).is_some() {
                return Err(ProfitdashError::Config(format!("duplicate plan code: {code}")));
            }
        }
        for required in [TRIAL_PLAN, FREE_PLAN] {
            match map.values().find(|p| p.code.as_str() == required) {
                None => {
                    return Err(ProfitdashError::Config(format!(
                        "plan catalog must define the '{required}' plan"
                    )));
                }
                Some(plan) if plan.paid => {
                    return Err(ProfitdashError::Config(format!(
                        "the '{required}' plan cannot be paid"
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(Self { plans: map })
    }

    /// Looks up a plan.
    ///
    /// # Errors
    ///
    /// Returns [`ProfitdashError::InvalidPlanCode`] if the plan is not in the catalog.
    pub fn get(&self, code: &PlanCode) -> Result<&PlanDefinition> {
        self.plans
            .get(code)
            .ok_or_else(|| ProfitdashError::InvalidPlanCode(format!("unknown plan: {code}")))
    }

    /// Looks up a plan that must be paid.
    ///
    /// # Errors
    ///
    /// Returns [`ProfitdashError::InvalidPlanCode`] if the plan is unknown or not paid.
    pub fn get_paid(&self, code: &PlanCode) -> Result<&PlanDefinition> {
        let plan = self.get(code)?;
        if !plan.paid {
            return Err(ProfitdashError::InvalidPlanCode(format!("{code} is not a paid plan")));
        }
        Ok(plan)
    }

    /// Iterates over all plans ordered by code.
    pub fn iter(&self) -> impl Iterator<Item = &PlanDefinition> {
        self.plans.values()
    }
}

impl Default for PlanCatalog {
    fn default() -> Self {
        let plan = |code: &str, name: &str, stores, campaigns, paid| PlanDefinition {
            code: PlanCode(code.to_owned()),
            name: name.to_owned(),
            limits: PlanLimits { stores, campaigns },
            paid,
        };
        let plans = [
            plan(TRIAL_PLAN, "Trial", Some(3), Some(10), false),
            plan(FREE_PLAN, "Free", Some(1), Some(2), false),
            plan("starter", "Starter", Some(2), Some(10), true),
            plan("growth", "Growth", Some(5), Some(50), true),
            plan("pro", "Pro", None, None, true),
        ];
        Self { plans: plans.into_iter().map(|p| (p.code.clone(), p)).collect() }
    }
}

/// Where a user stands in the plan model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileStatus {
    /// Account created, no plan chosen yet.
    None,
    /// Trial running.
    Trialing,
    /// Trial ended without a plan being chosen.
    TrialExpired,
    /// Free tier.
    Free,
    /// Paid plan; see the subscription row for its lifecycle state.
    Subscribed,
}

impl ProfileStatus {
    /// Returns the snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Trialing => "trialing",
            Self::TrialExpired => "trial_expired",
            Self::Free => "free",
            Self::Subscribed => "subscribed",
        }
    }
}

/// Per-user profile row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Owner.
    pub user_id: UserId,
    /// Current plan.
    pub plan_code: Option<PlanCode>,
    /// Plan-model status.
    pub status: ProfileStatus,
    /// When the trial started.
    pub trial_started_at: Option<DateTime<Utc>>,
    /// When the trial ends (or ended).
    pub trial_end: Option<DateTime<Utc>>,
    /// Whether the user ever started a trial.
    pub trial_used: bool,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Creates the profile of a brand-new account.
    #[must_use]
    pub fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            plan_code: None,
            status: ProfileStatus::None,
            trial_started_at: None,
            trial_end: None,
            trial_used: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Per-user usage counters with the limits of the current plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounters {
    /// Owner.
    pub user_id: UserId,
    /// Connected stores.
    pub stores_used: u32,
    /// Store limit, `None` = unlimited.
    pub stores_limit: Option<u32>,
    /// Tracked campaigns.
    pub campaigns_used: u32,
    /// Campaign limit, `None` = unlimited.
    pub campaigns_limit: Option<u32>,
}

/// Kind of resource counted against plan limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageKind {
    /// Connected Shopify stores.
    Stores,
    /// Tracked ad campaigns.
    Campaigns,
}

impl UsageKind {
    const fn label(self) -> &'static str {
        match self {
            Self::Stores => "store",
            Self::Campaigns => "campaign",
        }
    }
}

impl UsageCounters {
    /// Empty counters carrying the given limits.
    #[must_use]
    pub fn new(user_id: UserId, limits: PlanLimits) -> Self {
        Self {
            user_id,
            stores_used: 0,
            stores_limit: limits.stores,
            campaigns_used: 0,
            campaigns_limit: limits.campaigns,
        }
    }

    /// Replaces the limits, keeping usage. Usage above a lowered limit is kept
    /// but blocks further additions.
    pub fn apply_limits(&mut self, limits: PlanLimits) {
        self.stores_limit = limits.stores;
        self.campaigns_limit = limits.campaigns;
    }

    /// Returns `(used, limit)` for a resource kind.
    #[must_use]
    pub const fn usage(&self, kind: UsageKind) -> (u32, Option<u32>) {
        match kind {
            UsageKind::Stores => (self.stores_used, self.stores_limit),
            UsageKind::Campaigns => (self.campaigns_used, self.campaigns_limit),
        }
    }

    /// Counts one more resource.
    ///
    /// # Errors
    ///
    /// Returns [`ProfitdashError::LimitReached`] if the plan limit is already used up.
    pub fn increment(&mut self, kind: UsageKind) -> Result<()> {
        let (used, limit) = self.usage(kind);
        if let Some(limit) = limit
            && used >= limit
        {
            return Err(ProfitdashError::LimitReached(format!(
                "your plan allows {limit} {}{}",
                kind.label(),
                if limit == 1 { "" } else { "s" }
            )));
        }
        let counter = match kind {
            UsageKind::Stores => &mut self.stores_used,
            UsageKind::Campaigns => &mut self.campaigns_used,
        };
        *counter = counter.saturating_add(1);
        Ok(())
    }

    /// Counts one resource less. Never goes below zero.
    pub fn decrement(&mut self, kind: UsageKind) {
        let counter = match kind {
            UsageKind::Stores => &mut self.stores_used,
            UsageKind::Campaigns => &mut self.campaigns_used,
        };
        *counter = counter.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_id_validation() {
        assert!(UserId::new("7c1e6a9e-0b1d-4c8e-9a1f-2d3e4f5a6b7c").is_ok());
        assert!(UserId::new("").is_err());
        assert!(UserId::new("a".repeat(65)).is_err());
        assert!(UserId::new("user@example.com").is_err());
    }

    #[test]
    fn test_user_id_deserialize_validates() {
        let parsed: std::result::Result<UserId, _> = serde_json::from_str("\"bad id\"");
        assert!(parsed.is_err());

        let parsed: UserId = serde_json::from_str("\"user-1\"").unwrap();
        assert_eq!(parsed.as_str(), "user-1");
    }

    #[test]
    fn test_plan_code_validation() {
        assert!(PlanCode::new("pro").is_ok());
        assert!(PlanCode::new("pro_2024").is_ok());
        assert!(PlanCode::new("").is_err());
        assert!(PlanCode::new("PRO").is_err());
        assert!(PlanCode::new("x".repeat(33)).is_err());
    }

    #[test]
    fn test_default_catalog_limits() {
        let catalog = PlanCatalog::default();
        let free = catalog.get(&PlanCode::free()).unwrap();
        assert_eq!(free.limits, PlanLimits { stores: Some(1), campaigns: Some(2) });
        assert!(!free.paid);

        let pro = catalog.get(&PlanCode::new("pro").unwrap()).unwrap();
        assert_eq!(pro.limits, PlanLimits { stores: None, campaigns: None });
        assert!(pro.paid);
    }

    #[test]
    fn test_catalog_unknown_plan() {
        let catalog = PlanCatalog::default();
        let err = catalog.get(&PlanCode::new("platinum").unwrap()).unwrap_err();
        assert!(matches!(err, ProfitdashError::InvalidPlanCode(_)));
    }

    #[test]
    fn test_catalog_get_paid_rejects_free() {
        let catalog = PlanCatalog::default();
        assert!(catalog.get_paid(&PlanCode::free()).is_err());
        assert!(catalog.get_paid(&PlanCode::new("growth").unwrap()).is_ok());
    }

    #[test]
    fn test_catalog_requires_trial_and_free() {
        let only_pro = PlanDefinition {
            code: PlanCode::new("pro").unwrap(),
            name: "Pro".into(),
            limits: PlanLimits::default(),
            paid: true,
        };
        assert!(matches!(PlanCatalog::new([only_pro]), Err(ProfitdashError::Config(_))));
    }

    #[test]
    fn test_catalog_rejects_duplicates() {
        let free = PlanDefinition {
            code: PlanCode::free(),
            name: "Free".into(),
            limits: PlanLimits::default(),
            paid: false,
        };
        assert!(PlanCatalog::new([free.clone(), free]).is_err());
    }

    #[test]
    fn test_counters_increment_until_limit() {
        let user = UserId::new("user-1").unwrap();
        let mut counters =
            UsageCounters::new(user, PlanLimits { stores: Some(1), campaigns: Some(2) });

        counters.increment(UsageKind::Stores).unwrap();
        let err = counters.increment(UsageKind::Stores).unwrap_err();
        assert!(matches!(err, ProfitdashError::LimitReached(_)));
        assert!(err.to_string().contains("1 store"));
        assert_eq!(counters.stores_used, 1);

        counters.increment(UsageKind::Campaigns).unwrap();
        counters.increment(UsageKind::Campaigns).unwrap();
        assert!(counters.increment(UsageKind::Campaigns).is_err());
    }

    #[test]
    fn test_counters_unlimited() {
        let user = UserId::new("user-1").unwrap();
        let mut counters = UsageCounters::new(user, PlanLimits::default());
        for _ in 0..100 {
            counters.increment(UsageKind::Campaigns).unwrap();
        }
        assert_eq!(counters.campaigns_used, 100);
    }

    #[test]
    fn test_counters_decrement_saturates() {
        let user = UserId::new("user-1").unwrap();
        let mut counters = UsageCounters::new(user, PlanLimits::default());
        counters.decrement(UsageKind::Stores);
        assert_eq!(counters.stores_used, 0);
    }

    #[test]
    fn test_lowered_limit_keeps_usage_but_blocks() {
        let user = UserId::new("user-1").unwrap();
        let mut counters =
            UsageCounters::new(user, PlanLimits { stores: Some(3), campaigns: None });
        counters.increment(UsageKind::Stores).unwrap();
        counters.increment(UsageKind::Stores).unwrap();

        counters.apply_limits(PlanLimits { stores: Some(1), campaigns: Some(2) });
        assert_eq!(counters.stores_used, 2);
        assert!(counters.increment(UsageKind::Stores).is_err());
    }

    #[test]
    fn test_profile_status_serialization() {
        let json = serde_json::to_string(&ProfileStatus::TrialExpired).unwrap();
        assert_eq!(json, "\"trial_expired\"");
        assert_eq!(ProfileStatus::TrialExpired.as_str(), "trial_expired");
    }
}
