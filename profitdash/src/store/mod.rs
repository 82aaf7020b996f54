//! Storage abstraction layer.
//!
//! Account data lives behind the [`AccountStore`] trait. Each method is one
//! atomic operation; compound mutations that must not race (connecting a store
//! while counting it against the plan limit, deleting an account) are single
//! trait methods so a backend can run them in one transaction.
//!
//! Background writers never blindly replace rows they read earlier: the
//! lifecycle sweep uses [`AccountStore::transition_profile`] and
//! [`AccountStore::transition_subscription`], which only apply when the row is
//! unchanged, and plan changes touch limits through
//! [`AccountStore::set_limits`] without rewriting usage.
//!
//! [`MemoryStore`] keeps everything in process memory.
//!
//! # Examples
//!
//! ```rust
//! use chrono::Utc;
//! use profitdash::{
//!     store::{AccountStore, MemoryStore},
//!     subscription::{Profile, UserId},
//! };
//!
//! # async fn example() -> profitdash::error::Result<()> {
//! let store = MemoryStore::new();
//! let user = UserId::new("user-1")?;
//!
//! store.put_profile(Profile::new(user.clone(), Utc::now())).await?;
//! assert!(store.get_profile(&user).await?.is_some());
//! # Ok(())
//! # }
//! ```

#[allow(
    redundant_imports,
    reason = "Future needed for RPITIT despite being in Edition 2024 prelude"
)]
use std::future::Future;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    connections::{ConnectedStore, TrackedCampaign},
    dashboard::DailyMetric,
    error::Result,
    notes::Note,
    security::AuditEvent,
    subscription::{PlanLimits, Profile, SubscriptionData, UsageCounters, UserId},
};

mod memory;

pub use memory::MemoryStore;

/// Persistence for profiles, subscriptions, usage and workspace data.
///
/// # Errors
///
/// Every method may fail with [`ProfitdashError::StoreUnavailable`] when the
/// backend cannot be reached; callers may retry those. Other failures are
/// reported as [`ProfitdashError::Storage`].
///
/// [`ProfitdashError::StoreUnavailable`]: crate::error::ProfitdashError::StoreUnavailable
/// [`ProfitdashError::Storage`]: crate::error::ProfitdashError::Storage
pub trait AccountStore: Send + Sync {
    /// Checks that the backend answers.
    fn ping(&self) -> impl Future<Output = Result<()>> + Send;

    /// Loads a profile.
    fn get_profile(&self, user_id: &UserId) -> impl Future<Output = Result<Option<Profile>>> + Send;

    /// Inserts or replaces a profile.
    fn put_profile(&self, profile: Profile) -> impl Future<Output = Result<()>> + Send;

    /// Creates a profile and its usage counters unless the user already has a
    /// profile. Returns the stored profile.
    ///
    /// A profile recreated after account deletion keeps `trial_used` when the
    /// user claimed a trial before.
    fn create_account(
        &self,
        profile: Profile,
        counters: UsageCounters,
    ) -> impl Future<Output = Result<Profile>> + Send;

    /// Replaces a profile only if the stored row still equals `expected`.
    ///
    /// Returns `false` and leaves the store untouched when the row changed or
    /// was deleted after `expected` was read.
    fn transition_profile(
        &self,
        expected: &Profile,
        next: Profile,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Records that a user started their one trial. Returns `false` if a trial
    /// was claimed before. Claims outlive [`delete_account`](Self::delete_account).
    fn claim_trial(&self, user_id: &UserId) -> impl Future<Output = Result<bool>> + Send;

    /// Lists all profiles.
    fn list_profiles(&self) -> impl Future<Output = Result<Vec<Profile>>> + Send;

    /// Loads the paid subscription of a user.
    fn get_subscription(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = Result<Option<SubscriptionData>>> + Send;

    /// Inserts or replaces a subscription.
    fn put_subscription(&self, subscription: SubscriptionData) -> impl Future<Output = Result<()>> + Send;

    /// Replaces a subscription only if the stored row still equals `expected`.
    ///
    /// Same contract as [`transition_profile`](Self::transition_profile).
    fn transition_subscription(
        &self,
        expected: &SubscriptionData,
        next: SubscriptionData,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Lists all subscriptions.
    fn list_subscriptions(&self) -> impl Future<Output = Result<Vec<SubscriptionData>>> + Send;

    /// Loads usage counters.
    fn get_usage(&self, user_id: &UserId) -> impl Future<Output = Result<Option<UsageCounters>>> + Send;

    /// Inserts or replaces usage counters.
    fn put_usage(&self, counters: UsageCounters) -> impl Future<Output = Result<()>> + Send;

    /// Sets the plan limits of a user's counters, keeping the used counts.
    /// Creates empty counters if the user has none. Returns the counters.
    fn set_limits(
        &self,
        user_id: &UserId,
        limits: PlanLimits,
    ) -> impl Future<Output = Result<UsageCounters>> + Send;

    /// Lists a user's connected stores, oldest first.
    fn list_stores(&self, user_id: &UserId) -> impl Future<Output = Result<Vec<ConnectedStore>>> + Send;

    /// Atomically counts a store against the plan limit and records it.
    ///
    /// Fails with `Conflict` on a duplicate domain and `LimitReached` when no
    /// slot is left. Returns the updated counters.
    fn connect_store(
        &self,
        store: ConnectedStore,
    ) -> impl Future<Output = Result<UsageCounters>> + Send;

    /// Atomically removes a store and releases its slot.
    ///
    /// Fails with `NotFound` if the user owns no such store.
    fn disconnect_store(
        &self,
        user_id: &UserId,
        store_id: Uuid,
    ) -> impl Future<Output = Result<UsageCounters>> + Send;

    /// Lists a user's tracked campaigns, oldest first.
    fn list_campaigns(
        &self,
        user_id: &UserId,
    ) -> impl Future<Output = Result<Vec<TrackedCampaign>>> + Send;

    /// Atomically counts a campaign against the plan limit and records it.
    fn track_campaign(
        &self,
        campaign: TrackedCampaign,
    ) -> impl Future<Output = Result<UsageCounters>> + Send;

    /// Atomically removes a campaign and releases its slot.
    fn untrack_campaign(
        &self,
        user_id: &UserId,
        campaign_id: Uuid,
    ) -> impl Future<Output = Result<UsageCounters>> + Send;

    /// Lists a user's notes in storage order.
    fn list_notes(&self, user_id: &UserId) -> impl Future<Output = Result<Vec<Note>>> + Send;

    /// Loads one of a user's notes.
    fn get_note(
        &self,
        user_id: &UserId,
        note_id: Uuid,
    ) -> impl Future<Output = Result<Option<Note>>> + Send;

    /// Inserts or replaces a note.
    fn put_note(&self, note: Note) -> impl Future<Output = Result<()>> + Send;

    /// Deletes one of a user's notes. Returns whether it existed.
    fn delete_note(&self, user_id: &UserId, note_id: Uuid) -> impl Future<Output = Result<bool>> + Send;

    /// Inserts or replaces the metrics of one day.
    fn upsert_metric(&self, metric: DailyMetric) -> impl Future<Output = Result<()>> + Send;

    /// Lists a user's metrics within `from..=to`, oldest first.
    fn list_metrics(
        &self,
        user_id: &UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> impl Future<Output = Result<Vec<DailyMetric>>> + Send;

    /// Appends an audit entry.
    fn append_audit(&self, event: AuditEvent) -> impl Future<Output = Result<()>> + Send;

    /// Lists audit entries concerning a user, oldest first.
    fn list_audit(&self, target_user: &UserId) -> impl Future<Output = Result<Vec<AuditEvent>>> + Send;

    /// Deletes every row owned by a user. Audit entries and trial claims are kept.
    fn delete_account(&self, user_id: &UserId) -> impl Future<Output = Result<()>> + Send;
}
