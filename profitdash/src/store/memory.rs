//! In-memory [`AccountStore`] backend.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
};

use chrono::NaiveDate;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::AccountStore;
use crate::{
    connections::{ConnectedStore, TrackedCampaign},
    dashboard::DailyMetric,
    error::{ProfitdashError, Result},
    notes::Note,
    security::AuditEvent,
    subscription::{PlanLimits, Profile, SubscriptionData, UsageCounters, UsageKind, UserId},
};

#[derive(Debug, Default)]
struct Tables {
    profiles: HashMap<UserId, Profile>,
    trial_claims: HashSet<UserId>,
    subscriptions: HashMap<UserId, SubscriptionData>,
    usage: HashMap<UserId, UsageCounters>,
    stores: BTreeMap<Uuid, ConnectedStore>,
    campaigns: BTreeMap<Uuid, TrackedCampaign>,
    notes: HashMap<Uuid, Note>,
    metrics: BTreeMap<(UserId, NaiveDate), DailyMetric>,
    audit: Vec<AuditEvent>,
}

impl Tables {
    fn usage_mut(&mut self, user_id: &UserId) -> Result<&mut UsageCounters> {
        self.usage
            .get_mut(user_id)
            .ok_or_else(|| ProfitdashError::Storage(format!("no usage counters for {user_id}")))
    }
}

/// In-memory store.
///
/// All tables sit behind one `tokio::sync::RwLock`, so every trait method is
/// atomic. Cloning shares the tables.
///
/// [`fail_next`](Self::fail_next) makes the next calls fail with
/// [`ProfitdashError::StoreUnavailable`], for exercising retry paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    pending_failures: Arc<AtomicU32>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` calls fail as unavailable.
    pub fn fail_next(&self, count: u32) {
        self.pending_failures.store(count, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        let failed = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(ProfitdashError::StoreUnavailable("injected outage".into()));
        }
        Ok(())
    }
}

impl AccountStore for MemoryStore {
    async fn ping(&self) -> Result<()> {
        self.check_available()
    }

    async fn get_profile(&self, user_id: &UserId) -> Result<Option<Profile>> {
        self.check_available()?;
        Ok(self.tables.read().await.profiles.get(user_id).cloned())
    }

    async fn put_profile(&self, profile: Profile) -> Result<()> {
        self.check_available()?;
        self.tables.write().await.profiles.insert(profile.user_id.clone(), profile);
        Ok(())
    }

    async fn create_account(&self, mut profile: Profile, counters: UsageCounters) -> Result<Profile> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables.profiles.get(&profile.user_id) {
            return Ok(existing.clone());
        }
        profile.trial_used |= tables.trial_claims.contains(&profile.user_id);
        tables.usage.entry(counters.user_id.clone()).or_insert(counters);
        tables.profiles.insert(profile.user_id.clone(), profile.clone());
        Ok(profile)
    }

    async fn transition_profile(&self, expected: &Profile, next: Profile) -> Result<bool> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        match tables.profiles.get_mut(&expected.user_id) {
            Some(current) if current == expected => {
                *current = next;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn claim_trial(&self, user_id: &UserId) -> Result<bool> {
        self.check_available()?;
        Ok(self.tables.write().await.trial_claims.insert(user_id.clone()))
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        self.check_available()?;
        Ok(self.tables.read().await.profiles.values().cloned().collect())
    }

    async fn get_subscription(&self, user_id: &UserId) -> Result<Option<SubscriptionData>> {
        self.check_available()?;
        Ok(self.tables.read().await.subscriptions.get(user_id).cloned())
    }

    async fn put_subscription(&self, subscription: SubscriptionData) -> Result<()> {
        self.check_available()?;
        self.tables
            .write()
            .await
            .subscriptions
            .insert(subscription.user_id.clone(), subscription);
        Ok(())
    }

    async fn transition_subscription(
        &self,
        expected: &SubscriptionData,
        next: SubscriptionData,
    ) -> Result<bool> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        match tables.subscriptions.get_mut(&expected.user_id) {
            Some(current) if current == expected => {
                *current = next;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_subscriptions(&self) -> Result<Vec<SubscriptionData>> {
        self.check_available()?;
        Ok(self.tables.read().await.subscriptions.values().cloned().collect())
    }

    async fn get_usage(&self, user_id: &UserId) -> Result<Option<UsageCounters>> {
        self.check_available()?;
        Ok(self.tables.read().await.usage.get(user_id).cloned())
    }

    async fn put_usage(&self, counters: UsageCounters) -> Result<()> {
        self.check_available()?;
        self.tables.write().await.usage.insert(counters.user_id.clone(), counters);
        Ok(())
    }

    async fn set_limits(&self, user_id: &UserId, limits: PlanLimits) -> Result<UsageCounters> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let counters = tables
            .usage
            .entry(user_id.clone())
            .or_insert_with(|| UsageCounters::new(user_id.clone(), limits));
        counters.apply_limits(limits);
        Ok(counters.clone())
    }

    async fn list_stores(&self, user_id: &UserId) -> Result<Vec<ConnectedStore>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        let mut stores: Vec<_> =
            tables.stores.values().filter(|s| &s.user_id == user_id).cloned().collect();
        stores.sort_by_key(|s| s.connected_at);
        Ok(stores)
    }

    async fn connect_store(&self, store: ConnectedStore) -> Result<UsageCounters> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let duplicate = tables
            .stores
            .values()
            .any(|s| s.user_id == store.user_id && s.shop_domain == store.shop_domain);
        if duplicate {
            return Err(ProfitdashError::Conflict(format!(
                "{} is already connected",
                store.shop_domain.as_str()
            )));
        }
        let counters = tables.usage_mut(&store.user_id)?;
        counters.increment(UsageKind::Stores)?;
        let counters = counters.clone();
        tables.stores.insert(store.id, store);
        Ok(counters)
    }

    async fn disconnect_store(&self, user_id: &UserId, store_id: Uuid) -> Result<UsageCounters> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        if !tables.stores.get(&store_id).is_some_and(|s| &s.user_id == user_id) {
            return Err(ProfitdashError::NotFound(format!("store {store_id}")));
        }
        let counters = tables.usage_mut(user_id)?;
        counters.decrement(UsageKind::Stores);
        let counters = counters.clone();
        tables.stores.remove(&store_id);
        Ok(counters)
    }

    async fn list_campaigns(&self, user_id: &UserId) -> Result<Vec<TrackedCampaign>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        let mut campaigns: Vec<_> =
            tables.campaigns.values().filter(|c| &c.user_id == user_id).cloned().collect();
        campaigns.sort_by_key(|c| c.tracked_at);
        Ok(campaigns)
    }

    async fn track_campaign(&self, campaign: TrackedCampaign) -> Result<UsageCounters> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        let duplicate = tables.campaigns.values().any(|c| {
            c.user_id == campaign.user_id
                && c.ad_account_id == campaign.ad_account_id
                && c.campaign_id == campaign.campaign_id
        });
        if duplicate {
            return Err(ProfitdashError::Conflict(format!(
                "campaign {} of {} is already tracked",
                campaign.campaign_id,
                campaign.ad_account_id.as_str()
            )));
        }
        let counters = tables.usage_mut(&campaign.user_id)?;
        counters.increment(UsageKind::Campaigns)?;
        let counters = counters.clone();
        tables.campaigns.insert(campaign.id, campaign);
        Ok(counters)
    }

    async fn untrack_campaign(&self, user_id: &UserId, campaign_id: Uuid) -> Result<UsageCounters> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        if !tables.campaigns.get(&campaign_id).is_some_and(|c| &c.user_id == user_id) {
            return Err(ProfitdashError::NotFound(format!("campaign {campaign_id}")));
        }
        let counters = tables.usage_mut(user_id)?;
        counters.decrement(UsageKind::Campaigns);
        let counters = counters.clone();
        tables.campaigns.remove(&campaign_id);
        Ok(counters)
    }

    async fn list_notes(&self, user_id: &UserId) -> Result<Vec<Note>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables.notes.values().filter(|n| &n.user_id == user_id).cloned().collect())
    }

    async fn get_note(&self, user_id: &UserId, note_id: Uuid) -> Result<Option<Note>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables.notes.get(&note_id).filter(|n| &n.user_id == user_id).cloned())
    }

    async fn put_note(&self, note: Note) -> Result<()> {
        self.check_available()?;
        self.tables.write().await.notes.insert(note.id, note);
        Ok(())
    }

    async fn delete_note(&self, user_id: &UserId, note_id: Uuid) -> Result<bool> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        if !tables.notes.get(&note_id).is_some_and(|n| &n.user_id == user_id) {
            return Ok(false);
        }
        tables.notes.remove(&note_id);
        Ok(true)
    }

    async fn upsert_metric(&self, metric: DailyMetric) -> Result<()> {
        self.check_available()?;
        self.tables
            .write()
            .await
            .metrics
            .insert((metric.user_id.clone(), metric.date), metric);
        Ok(())
    }

    async fn list_metrics(
        &self,
        user_id: &UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyMetric>> {
        self.check_available()?;
        if from > to {
            return Ok(Vec::new());
        }
        let tables = self.tables.read().await;
        let range = (user_id.clone(), from)..=(user_id.clone(), to);
        Ok(tables.metrics.range(range).map(|(_, m)| m.clone()).collect())
    }

    async fn append_audit(&self, event: AuditEvent) -> Result<()> {
        self.check_available()?;
        self.tables.write().await.audit.push(event);
        Ok(())
    }

    async fn list_audit(&self, target_user: &UserId) -> Result<Vec<AuditEvent>> {
        self.check_available()?;
        let tables = self.tables.read().await;
        Ok(tables
            .audit
            .iter()
            .filter(|e| e.details.target_user.as_deref() == Some(target_user.as_str()))
            .cloned()
            .collect())
    }

    async fn delete_account(&self, user_id: &UserId) -> Result<()> {
        self.check_available()?;
        let mut tables = self.tables.write().await;
        tables.profiles.remove(user_id);
        tables.subscriptions.remove(user_id);
        tables.usage.remove(user_id);
        tables.stores.retain(|_, s| &s.user_id != user_id);
        tables.campaigns.retain(|_, c| &c.user_id != user_id);
        tables.notes.retain(|_, n| &n.user_id != user_id);
        tables.metrics.retain(|(owner, _), _| owner != user_id);
        Ok(())
    }
}
