//! Workspace operations: connections, notes, dashboard and account deletion.
//!
//! Reads are always allowed. Every mutation except account deletion first
//! checks that the account is writable.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::instrument;
use uuid::Uuid;

use super::AccountService;
use crate::{
    connections::{ConnectStoreRequest, ConnectedStore, TrackCampaignRequest, TrackedCampaign},
    dashboard::{DailyMetric, ProfitSummary, RecordMetricRequest, summarize, validate_range},
    error::{ProfitdashError, Result},
    notes::{NewNote, Note, NoteUpdate, sort_board},
    security::{AuditEvent, AuditEventType, audit_log},
    store::AccountStore,
    subscription::UserId,
};

impl<S: AccountStore> AccountService<S> {
    /// Lists connected stores.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn list_stores(&self, user_id: &UserId) -> Result<Vec<ConnectedStore>> {
        self.store.list_stores(user_id).await
    }

    /// Connects a Shopify store, using one store slot.
    ///
    /// # Errors
    ///
    /// - [`ProfitdashError::ReadOnly`] if the account is read-only
    /// - [`ProfitdashError::Conflict`] if the domain is already connected
    /// - [`ProfitdashError::LimitReached`] if no store slot is left
    #[instrument(skip(self, request), fields(user_id = %user_id, shop = %request.shop_domain.as_str()))]
    pub async fn connect_store(
        &self,
        user_id: &UserId,
        request: ConnectStoreRequest,
        now: DateTime<Utc>,
    ) -> Result<ConnectedStore> {
        let profile = self.require_writable(user_id, now).await?;
        self.load_usage(&profile).await?;
        let store = request.into_store(user_id.clone(), now);
        let counters = self.store.connect_store(store.clone()).await?;
        tracing::info!(stores_used = counters.stores_used, "store connected");
        Ok(store)
    }

    /// Disconnects a store and frees its slot.
    ///
    /// # Errors
    ///
    /// Returns [`ProfitdashError::ReadOnly`] if the account is read-only and
    /// [`ProfitdashError::NotFound`] if the user owns no such store.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn disconnect_store(&self, user_id: &UserId, store_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        self.require_writable(user_id, now).await?;
        let counters = self.store.disconnect_store(user_id, store_id).await?;
        tracing::info!(stores_used = counters.stores_used, "store disconnected");
        Ok(())
    }

    /// Lists tracked campaigns.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn list_campaigns(&self, user_id: &UserId) -> Result<Vec<TrackedCampaign>> {
        self.store.list_campaigns(user_id).await
    }

    /// Starts tracking an ad campaign, using one campaign slot.
    ///
    /// # Errors
    ///
    /// - [`ProfitdashError::Validation`] on a malformed campaign
    /// - [`ProfitdashError::ReadOnly`] if the account is read-only
    /// - [`ProfitdashError::Conflict`] if the campaign is already tracked
    /// - [`ProfitdashError::LimitReached`] if no campaign slot is left
    #[instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn track_campaign(
        &self,
        user_id: &UserId,
        request: TrackCampaignRequest,
        now: DateTime<Utc>,
    ) -> Result<TrackedCampaign> {
        let campaign = request.into_campaign(user_id.clone(), now)?;
        let profile = self.require_writable(user_id, now).await?;
        self.load_usage(&profile).await?;
        let counters = self.store.track_campaign(campaign.clone()).await?;
        tracing::info!(campaigns_used = counters.campaigns_used, "campaign tracked");
        Ok(campaign)
    }

    /// Stops tracking a campaign and frees its slot.
    ///
    /// # Errors
    ///
    /// Returns [`ProfitdashError::ReadOnly`] if the account is read-only and
    /// [`ProfitdashError::NotFound`] if the user tracks no such campaign.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn untrack_campaign(
        &self,
        user_id: &UserId,
        campaign_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.require_writable(user_id, now).await?;
        let counters = self.store.untrack_campaign(user_id, campaign_id).await?;
        tracing::info!(campaigns_used = counters.campaigns_used, "campaign untracked");
        Ok(())
    }

    /// Lists the notes board: pinned first, then newest first.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub async fn list_notes(&self, user_id: &UserId) -> Result<Vec<Note>> {
        let mut notes = self.store.list_notes(user_id).await?;
        sort_board(&mut notes);
        Ok(notes)
    }

    /// Creates a note.
    ///
    /// # Errors
    ///
    /// Returns [`ProfitdashError::Validation`] on bad input and
    /// [`ProfitdashError::ReadOnly`] if the account is read-only.
    #[instrument(skip(self, input), fields(user_id = %user_id))]
    pub async fn create_note(&self, user_id: &UserId, input: NewNote, now: DateTime<Utc>) -> Result<Note> {
        let note = input.into_note(user_id.clone(), now)?;
        self.require_writable(user_id, now).await?;
        self.store.put_note(note.clone()).await?;
        Ok(note)
    }

    /// Updates a note.
    ///
    /// # Errors
    ///
    /// - [`ProfitdashError::ReadOnly`] if the account is read-only
    /// - [`ProfitdashError::NotFound`] if the user has no such note
    /// - [`ProfitdashError::Validation`] on an empty or invalid update
    #[instrument(skip(self, update), fields(user_id = %user_id, note_id = %note_id))]
    pub async fn update_note(
        &self,
        user_id: &UserId,
        note_id: Uuid,
        update: NoteUpdate,
        now: DateTime<Utc>,
    ) -> Result<Note> {
        self.require_writable(user_id, now).await?;
        let mut note = self
            .store
            .get_note(user_id, note_id)
            .await?
            .ok_or_else(|| ProfitdashError::NotFound(format!("note {note_id}")))?;
        update.apply(&mut note, now)?;
        self.store.put_note(note.clone()).await?;
        Ok(note)
    }

    /// Deletes a note.
    ///
    /// # Errors
    ///
    /// Returns [`ProfitdashError::ReadOnly`] if the account is read-only and
    /// [`ProfitdashError::NotFound`] if the user has no such note.
    #[instrument(skip(self), fields(user_id = %user_id, note_id = %note_id))]
    pub async fn delete_note(&self, user_id: &UserId, note_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        self.require_writable(user_id, now).await?;
        if self.store.delete_note(user_id, note_id).await? {
            Ok(())
        } else {
            Err(ProfitdashError::NotFound(format!("note {note_id}")))
        }
    }

    /// Records the metrics of one day, replacing an earlier entry for that day.
    ///
    /// # Errors
    ///
    /// Returns [`ProfitdashError::Validation`] for negative amounts and
    /// [`ProfitdashError::ReadOnly`] if the account is read-only.
    #[instrument(skip(self, request), fields(user_id = %user_id, date = %request.date))]
    pub async fn record_metric(
        &self,
        user_id: &UserId,
        request: RecordMetricRequest,
        now: DateTime<Utc>,
    ) -> Result<DailyMetric> {
        let metric = request.into_metric(user_id.clone(), now)?;
        self.require_writable(user_id, now).await?;
        self.store.upsert_metric(metric.clone()).await?;
        Ok(metric)
    }

    /// Summarizes profitability over `from..=to`.
    ///
    /// # Errors
    ///
    /// Returns [`ProfitdashError::Validation`] for an invalid range.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn profit_summary(
        &self,
        user_id: &UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<ProfitSummary> {
        validate_range(from, to)?;
        let metrics = self.store.list_metrics(user_id, from, to).await?;
        summarize(&metrics, from, to)
    }

    /// Deletes all data of an account. Allowed in read-only mode.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn delete_account(&self, user_id: &UserId, request_id: Uuid, now: DateTime<Utc>) -> Result<()> {
        self.store.delete_account(user_id).await?;

        let event = AuditEvent::new(AuditEventType::AccountDeleted, user_id.as_str(), request_id)
            .at(now)
            .with_target_user(user_id.as_str());
        audit_log(&event);
        self.store.append_audit(event).await?;
        tracing::info!("account deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use rust_decimal::Decimal;

    use super::*;
    use crate::{
        config::LifecycleConfig,
        connections::{AdAccountId, ShopDomain},
        notes::NoteColor,
        store::MemoryStore,
        subscription::PlanCatalog,
    };

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 1, 8, 0, 0).unwrap()
    }

    fn user() -> UserId {
        UserId::new("user-1").unwrap()
    }

    fn service() -> AccountService<MemoryStore> {
        AccountService::new(MemoryStore::new(), PlanCatalog::default(), LifecycleConfig::default())
    }

    async fn free_service() -> AccountService<MemoryStore> {
        let service = service();
        service.select_free_plan(&user(), now()).await.unwrap();
        service
    }

    fn shop(name: &str) -> ConnectStoreRequest {
        ConnectStoreRequest { shop_domain: ShopDomain::new(format!("{name}.myshopify.com")).unwrap() }
    }

    fn campaign(id: &str) -> TrackCampaignRequest {
        TrackCampaignRequest {
            ad_account_id: AdAccountId::new("act_123").unwrap(),
            campaign_id: id.to_owned(),
            name: format!("Campaign {id}"),
        }
    }

    fn note(title: &str) -> NewNote {
        NewNote { title: title.to_owned(), body: String::new(), color: NoteColor::default(), pinned: false }
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).unwrap()
    }

    #[tokio::test]
    async fn test_mutations_blocked_without_plan() {
        let service = service();
        let err = service.connect_store(&user(), shop("acme"), now()).await.unwrap_err();
        assert!(matches!(err, ProfitdashError::ReadOnly(_)));
        let err = service.create_note(&user(), note("Idea"), now()).await.unwrap_err();
        assert!(matches!(err, ProfitdashError::ReadOnly(_)));
        assert!(service.list_stores(&user()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_free_plan_store_limit() {
        let service = free_service().await;
        service.connect_store(&user(), shop("first"), now()).await.unwrap();
        let err = service.connect_store(&user(), shop("second"), now()).await.unwrap_err();
        assert!(matches!(err, ProfitdashError::LimitReached(_)));

        let entitlements = service.entitlements(&user(), now()).await.unwrap();
        assert_eq!(entitlements.stores.used, 1);
        assert!(!entitlements.can_add_store);
    }

    #[tokio::test]
    async fn test_disconnect_frees_slot() {
        let service = free_service().await;
        let store = service.connect_store(&user(), shop("first"), now()).await.unwrap();
        service.disconnect_store(&user(), store.id, now()).await.unwrap();
        service.connect_store(&user(), shop("second"), now()).await.unwrap();

        let err = service.disconnect_store(&user(), Uuid::new_v4(), now()).await.unwrap_err();
        assert!(matches!(err, ProfitdashError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_downgrade_keeps_usage_but_blocks_additions() {
        let service = service();
        service.start_trial(&user(), now()).await.unwrap();
        for name in ["one", "two", "three"] {
            service.connect_store(&user(), shop(name), now()).await.unwrap();
        }
        service.select_free_plan(&user(), now()).await.unwrap();

        let entitlements = service.entitlements(&user(), now()).await.unwrap();
        assert_eq!(entitlements.stores.used, 3);
        assert_eq!(entitlements.stores.remaining, Some(0));
        let err = service.connect_store(&user(), shop("four"), now()).await.unwrap_err();
        assert!(matches!(err, ProfitdashError::LimitReached(_)));
        assert_eq!(service.list_stores(&user()).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_campaign_tracking() {
        let service = free_service().await;
        let tracked = service.track_campaign(&user(), campaign("111"), now()).await.unwrap();
        let err = service.track_campaign(&user(), campaign("111"), now()).await.unwrap_err();
        assert!(matches!(err, ProfitdashError::Conflict(_)));
        service.track_campaign(&user(), campaign("222"), now()).await.unwrap();
        let err = service.track_campaign(&user(), campaign("333"), now()).await.unwrap_err();
        assert!(matches!(err, ProfitdashError::LimitReached(_)));

        service.untrack_campaign(&user(), tracked.id, now()).await.unwrap();
        assert_eq!(service.list_campaigns(&user()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_notes_board_order_and_isolation() {
        let service = free_service().await;
        let older = service.create_note(&user(), note("Older"), now()).await.unwrap();
        service.create_note(&user(), note("Newer"), now() + Duration::minutes(1)).await.unwrap();
        let mut pinned = note("Pinned");
        pinned.pinned = true;
        service.create_note(&user(), pinned, now() - Duration::days(1)).await.unwrap();

        let titles: Vec<String> =
            service.list_notes(&user()).await.unwrap().into_iter().map(|n| n.title).collect();
        assert_eq!(titles, ["Pinned", "Newer", "Older"]);

        let stranger = UserId::new("user-2").unwrap();
        service.select_free_plan(&stranger, now()).await.unwrap();
        let update = NoteUpdate { title: Some("Mine".into()), ..NoteUpdate::default() };
        let err = service.update_note(&stranger, older.id, update, now()).await.unwrap_err();
        assert!(matches!(err, ProfitdashError::NotFound(_)));
        let err = service.delete_note(&stranger, older.id, now()).await.unwrap_err();
        assert!(matches!(err, ProfitdashError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_and_delete_note() {
        let service = free_service().await;
        let created = service.create_note(&user(), note("Draft"), now()).await.unwrap();
        let update = NoteUpdate { color: Some(NoteColor::Blue), ..NoteUpdate::default() };
        let updated = service.update_note(&user(), created.id, update, now()).await.unwrap();
        assert_eq!(updated.color, NoteColor::Blue);
        assert_eq!(updated.title, "Draft");

        service.delete_note(&user(), created.id, now()).await.unwrap();
        assert!(service.list_notes(&user()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dashboard_readable_when_read_only() {
        let service = service();
        service.start_trial(&user(), now()).await.unwrap();
        let request = RecordMetricRequest {
            date: date(1),
            revenue: Decimal::new(100_00, 2),
            cost_of_goods: Decimal::new(40_00, 2),
            ad_spend: Decimal::new(10_00, 2),
            orders: 4,
        };
        service.record_metric(&user(), request.clone(), now()).await.unwrap();

        let after_trial = now() + Duration::days(30);
        let err = service.record_metric(&user(), request, after_trial).await.unwrap_err();
        assert!(matches!(err, ProfitdashError::ReadOnly(_)));

        let summary = service.profit_summary(&user(), date(1), date(31)).await.unwrap();
        assert_eq!(summary.net_profit, Decimal::new(50_00, 2));
        assert_eq!(summary.series.len(), 1);
    }

    #[tokio::test]
    async fn test_summary_rejects_reversed_range() {
        let service = service();
        let err = service.profit_summary(&user(), date(10), date(1)).await.unwrap_err();
        assert!(matches!(err, ProfitdashError::Validation(_)));
    }

    #[tokio::test]
    async fn test_delete_account_in_read_only_mode() {
        let service = service();
        service.start_trial(&user(), now()).await.unwrap();
        service.create_note(&user(), note("Keep?"), now()).await.unwrap();

        let later = now() + Duration::days(30);
        service.delete_account(&user(), Uuid::new_v4(), later).await.unwrap();

        assert!(service.store().get_profile(&user()).await.unwrap().is_none());
        assert!(service.list_notes(&user()).await.unwrap().is_empty());
        let audit = service.store().list_audit(&user()).await.unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].event_type, AuditEventType::AccountDeleted);
    }
}
