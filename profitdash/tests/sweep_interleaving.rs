//! Lifecycle sweeps racing with other writers.
//!
//! [`InterleavingStore`] wraps a [`MemoryStore`] and, on the sweep's first
//! conditional write, lands a concurrent write and reports an outage, so the
//! sweep retries against a row that changed after it was listed.

use std::sync::Mutex;

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use profitdash::{
    AccountService, ProfitdashError,
    config::LifecycleConfig,
    connections::{ConnectedStore, TrackedCampaign},
    dashboard::DailyMetric,
    error::Result,
    notes::Note,
    security::AuditEvent,
    store::{AccountStore, MemoryStore},
    subscription::{
        LifecycleState, PlanCatalog, PlanCode, PlanLimits, Profile, ProfileStatus, Subscription,
        SubscriptionData, UsageCounters, UserId,
    },
};
use uuid::Uuid;

/// Write applied while the sweep is between listing and updating.
enum Interleave {
    Profile(Profile),
    Subscription(SubscriptionData),
    Delete(UserId),
}

struct InterleavingStore {
    inner: MemoryStore,
    pending: Mutex<Option<Interleave>>,
}

impl InterleavingStore {
    fn new() -> Self {
        Self { inner: MemoryStore::new(), pending: Mutex::new(None) }
    }

    fn interleave(&self, write: Interleave) {
        *self.pending.lock().unwrap() = Some(write);
    }

    /// Applies the pending write, if any, and fails the current call.
    async fn land_pending_write(&self) -> Result<()> {
        let pending = self.pending.lock().unwrap().take();
        match pending {
            None => return Ok(()),
            Some(Interleave::Profile(profile)) => self.inner.put_profile(profile).await?,
            Some(Interleave::Subscription(sub)) => self.inner.put_subscription(sub).await?,
            Some(Interleave::Delete(user_id)) => self.inner.delete_account(&user_id).await?,
        }
        Err(ProfitdashError::StoreUnavailable("connection reset".into()))
    }
}

impl AccountStore for InterleavingStore {
    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }

    async fn get_profile(&self, user_id: &UserId) -> Result<Option<Profile>> {
        self.inner.get_profile(user_id).await
    }

    async fn put_profile(&self, profile: Profile) -> Result<()> {
        self.inner.put_profile(profile).await
    }

    async fn create_account(&self, profile: Profile, counters: UsageCounters) -> Result<Profile> {
        self.inner.create_account(profile, counters).await
    }

    async fn transition_profile(&self, expected: &Profile, next: Profile) -> Result<bool> {
        self.land_pending_write().await?;
        self.inner.transition_profile(expected, next).await
    }

    async fn claim_trial(&self, user_id: &UserId) -> Result<bool> {
        self.inner.claim_trial(user_id).await
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        self.inner.list_profiles().await
    }

    async fn get_subscription(&self, user_id: &UserId) -> Result<Option<SubscriptionData>> {
        self.inner.get_subscription(user_id).await
    }

    async fn put_subscription(&self, subscription: SubscriptionData) -> Result<()> {
        self.inner.put_subscription(subscription).await
    }

    async fn transition_subscription(
        &self,
        expected: &SubscriptionData,
        next: SubscriptionData,
    ) -> Result<bool> {
        self.land_pending_write().await?;
        self.inner.transition_subscription(expected, next).await
    }

    async fn list_subscriptions(&self) -> Result<Vec<SubscriptionData>> {
        self.inner.list_subscriptions().await
    }

    async fn get_usage(&self, user_id: &UserId) -> Result<Option<UsageCounters>> {
        self.inner.get_usage(user_id).await
    }

    async fn put_usage(&self, counters: UsageCounters) -> Result<()> {
        self.inner.put_usage(counters).await
    }

    async fn set_limits(&self, user_id: &UserId, limits: PlanLimits) -> Result<UsageCounters> {
        self.inner.set_limits(user_id, limits).await
    }

    async fn list_stores(&self, user_id: &UserId) -> Result<Vec<ConnectedStore>> {
        self.inner.list_stores(user_id).await
    }

    async fn connect_store(&self, store: ConnectedStore) -> Result<UsageCounters> {
        self.inner.connect_store(store).await
    }

    async fn disconnect_store(&self, user_id: &UserId, store_id: Uuid) -> Result<UsageCounters> {
        self.inner.disconnect_store(user_id, store_id).await
    }

    async fn list_campaigns(&self, user_id: &UserId) -> Result<Vec<TrackedCampaign>> {
        self.inner.list_campaigns(user_id).await
    }

    async fn track_campaign(&self, campaign: TrackedCampaign) -> Result<UsageCounters> {
        self.inner.track_campaign(campaign).await
    }

    async fn untrack_campaign(&self, user_id: &UserId, campaign_id: Uuid) -> Result<UsageCounters> {
        self.inner.untrack_campaign(user_id, campaign_id).await
    }

    async fn list_notes(&self, user_id: &UserId) -> Result<Vec<Note>> {
        self.inner.list_notes(user_id).await
    }

    async fn get_note(&self, user_id: &UserId, note_id: Uuid) -> Result<Option<Note>> {
        self.inner.get_note(user_id, note_id).await
    }

    async fn put_note(&self, note: Note) -> Result<()> {
        self.inner.put_note(note).await
    }

    async fn delete_note(&self, user_id: &UserId, note_id: Uuid) -> Result<bool> {
        self.inner.delete_note(user_id, note_id).await
    }

    async fn upsert_metric(&self, metric: DailyMetric) -> Result<()> {
        self.inner.upsert_metric(metric).await
    }

    async fn list_metrics(
        &self,
        user_id: &UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyMetric>> {
        self.inner.list_metrics(user_id, from, to).await
    }

    async fn append_audit(&self, event: AuditEvent) -> Result<()> {
        self.inner.append_audit(event).await
    }

    async fn list_audit(&self, target_user: &UserId) -> Result<Vec<AuditEvent>> {
        self.inner.list_audit(target_user).await
    }

    async fn delete_account(&self, user_id: &UserId) -> Result<()> {
        self.inner.delete_account(user_id).await
    }
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 8, 0, 0).unwrap()
}

fn user() -> UserId {
    UserId::new("merchant-7").unwrap()
}

fn service() -> AccountService<InterleavingStore> {
    AccountService::new(InterleavingStore::new(), PlanCatalog::default(), LifecycleConfig::default())
}

#[tokio::test(start_paused = true)]
async fn test_sweep_keeps_free_plan_selected_after_listing() {
    let service = service();
    service.start_trial(&user(), start()).await.unwrap();
    let later = start() + Duration::days(20);

    let mut chosen_free = service.store().get_profile(&user()).await.unwrap().unwrap();
    chosen_free.plan_code = Some(PlanCode::free());
    chosen_free.status = ProfileStatus::Free;
    chosen_free.updated_at = later;
    service.store().interleave(Interleave::Profile(chosen_free));

    let report = service.run_trial_checks(later).await.unwrap();
    assert_eq!(report.trials_expired, 0);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.failures, 0);

    let status = service.account_status(&user(), later).await.unwrap();
    assert_eq!(status.profile_status, ProfileStatus::Free);
    assert!(!status.read_only);
}

#[tokio::test(start_paused = true)]
async fn test_sweep_keeps_subscription_renewed_after_listing() {
    let service = service();
    let pro = PlanCode::new("pro").unwrap();
    let lapsed = Subscription::start(user(), pro.clone(), start(), start() + Duration::days(30))
        .unwrap()
        .into_data();
    service.store().put_subscription(lapsed).await.unwrap();

    let later = start() + Duration::days(31);
    let renewed = Subscription::start(user(), pro, later, later + Duration::days(30))
        .unwrap()
        .into_data();
    service.store().interleave(Interleave::Subscription(renewed.clone()));

    let report = service.run_lifecycle_sweep(later).await.unwrap();
    assert_eq!(report.subscriptions_expired, 0);
    assert_eq!(report.skipped, 1);

    let stored = service.store().get_subscription(&user()).await.unwrap().unwrap();
    assert_eq!(stored.state(), LifecycleState::Active);
    assert_eq!(stored, renewed);
}

#[tokio::test(start_paused = true)]
async fn test_sweep_does_not_restore_deleted_account() {
    let service = service();
    service.start_trial(&user(), start()).await.unwrap();
    service.store().interleave(Interleave::Delete(user()));

    let report = service.run_trial_checks(start() + Duration::days(15)).await.unwrap();
    assert_eq!(report.trials_expired, 0);
    assert_eq!(report.skipped, 1);
    assert!(service.store().get_profile(&user()).await.unwrap().is_none());
}
