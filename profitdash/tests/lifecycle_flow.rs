//! Integration tests for the account lifecycle.
//!
//! Drives a configured service through trial, lockout, paid activation and
//! the scheduled lifecycle sweeps, checking entitlements along the way.

use chrono::{DateTime, Duration, TimeZone, Utc};
use ed25519_dalek::SigningKey;
use profitdash::{
    AccountService, ProfitdashError,
    config::ServiceConfig,
    connections::{ConnectStoreRequest, ShopDomain},
    notes::{NewNote, NoteColor},
    security::{AccessClaims, Role, TokenVerifier, issue_token},
    store::{AccountStore, MemoryStore},
    subscription::{ForceStateRequest, LifecycleState, PlanCode, ProfileStatus, UserId},
};
use uuid::Uuid;

const CONFIG: &str = r#"
    [lifecycle]
    trial_days = 10
    grace_period_days = 5
    archive_after_days = 20

    [plans.agency]
    name = "Agency"
    stores = 25
    campaigns = 200
    paid = true
"#;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, 1, 9, 0, 0).unwrap()
}

fn service() -> AccountService<MemoryStore> {
    let config = ServiceConfig::from_toml_str(CONFIG).unwrap();
    AccountService::from_config(MemoryStore::new(), &config).unwrap()
}

fn shop(name: &str) -> ConnectStoreRequest {
    ConnectStoreRequest { shop_domain: ShopDomain::new(format!("{name}.myshopify.com")).unwrap() }
}

fn admin_caller(now: DateTime<Utc>) -> profitdash::security::Caller {
    let key = SigningKey::from_bytes(&[9u8; 32]);
    let claims = AccessClaims::new(&UserId::new("ops-1").unwrap(), Role::Admin, now, Duration::minutes(5));
    let token = issue_token(&claims, &key).unwrap();
    TokenVerifier::new(key.verifying_key()).verify(&token, now).unwrap()
}

#[tokio::test]
async fn test_trial_to_archive_flow() {
    let service = service();
    let user = UserId::new("merchant-1").unwrap();
    let t0 = start();

    // Trial with configured length.
    let status = service.start_trial(&user, t0).await.unwrap();
    assert_eq!(status.trial.days_remaining, 10);
    service.connect_store(&user, shop("acme"), t0).await.unwrap();

    // Warning window, then lockout exactly at the end.
    let near_end = service.account_status(&user, t0 + Duration::days(8)).await.unwrap();
    assert!(near_end.trial.show_warning);
    let trial_end = t0 + Duration::days(10);
    let locked = service.account_status(&user, trial_end).await.unwrap();
    assert!(locked.read_only);
    let err = service.connect_store(&user, shop("beta"), trial_end).await.unwrap_err();
    assert!(matches!(err, ProfitdashError::ReadOnly(_)));

    let report = service.run_lifecycle_sweep(trial_end).await.unwrap();
    assert_eq!(report.trials_expired, 1);
    let profile = service.store().get_profile(&user).await.unwrap().unwrap();
    assert_eq!(profile.status, ProfileStatus::TrialExpired);

    // Operator activates the configured paid plan.
    let t1 = trial_end + Duration::days(1);
    let request = ForceStateRequest {
        user_id: user.clone(),
        target_state: "active".into(),
        plan_code: Some(PlanCode::new("agency").unwrap()),
        period_end: Some(t1 + Duration::days(30)),
        reason: Some("invoice paid".into()),
    };
    let outcome = service
        .force_subscription_state(&admin_caller(t1), request, Uuid::new_v4(), t1)
        .await
        .unwrap();
    assert_eq!(outcome.previous_state, None);
    assert!(!outcome.status.read_only);

    let entitlements = service.entitlements(&user, t1).await.unwrap();
    assert_eq!(entitlements.stores.limit, Some(25));
    assert_eq!(entitlements.stores.used, 1);
    assert_eq!(entitlements.stores.remaining, Some(24));
    service.connect_store(&user, shop("beta"), t1).await.unwrap();

    // Period ends: expired with grace from the period end.
    let period_end = t1 + Duration::days(30);
    let report = service.run_lifecycle_sweep(period_end).await.unwrap();
    assert_eq!(report.subscriptions_expired, 1);
    let status = service.account_status(&user, period_end).await.unwrap();
    let subscription = status.subscription.unwrap();
    assert_eq!(subscription.state, LifecycleState::Expired);
    assert_eq!(subscription.grace_period_end, Some(period_end + Duration::days(5)));
    assert!(status.read_only);

    // Data stays readable while read-only.
    assert_eq!(service.list_stores(&user).await.unwrap().len(), 2);

    // Grace ends: suspended, archival scheduled.
    let grace_end = period_end + Duration::days(5);
    let report = service.run_lifecycle_sweep(grace_end).await.unwrap();
    assert_eq!(report.subscriptions_suspended, 1);
    let suspended = service.store().get_subscription(&user).await.unwrap().unwrap();
    assert_eq!(suspended.archive_scheduled_at(), Some(grace_end + Duration::days(20)));

    // Archive date reached.
    let report = service.run_lifecycle_sweep(grace_end + Duration::days(20)).await.unwrap();
    assert_eq!(report.subscriptions_archived, 1);
    let archived = service.store().get_subscription(&user).await.unwrap().unwrap();
    assert_eq!(archived.state(), LifecycleState::Archived);
    assert!(archived.read_only());
}

#[tokio::test]
async fn test_free_plan_workspace_and_deletion() {
    let service = service();
    let user = UserId::new("merchant-2").unwrap();
    let now = start();

    service.select_free_plan(&user, now).await.unwrap();
    let note = NewNote {
        title: "Restock hoodies".into(),
        body: "Before the autumn sale".into(),
        color: NoteColor::Green,
        pinned: true,
    };
    service.create_note(&user, note, now).await.unwrap();
    assert_eq!(service.list_notes(&user).await.unwrap().len(), 1);

    service.delete_account(&user, Uuid::new_v4(), now).await.unwrap();
    assert!(service.list_notes(&user).await.unwrap().is_empty());

    // The next access starts from scratch with the trial still available.
    let status = service.account_status(&user, now).await.unwrap();
    assert_eq!(status.profile_status, ProfileStatus::None);
    assert!(status.trial_available);
}

#[tokio::test]
async fn test_non_admin_cannot_force_state() {
    let service = service();
    let now = start();
    let key = SigningKey::from_bytes(&[9u8; 32]);
    let claims = AccessClaims::new(&UserId::new("merchant-3").unwrap(), Role::User, now, Duration::minutes(5));
    let token = issue_token(&claims, &key).unwrap();
    let caller = TokenVerifier::new(key.verifying_key()).verify(&token, now).unwrap();

    let request = ForceStateRequest {
        user_id: caller.user_id.clone(),
        target_state: "active".into(),
        plan_code: Some(PlanCode::new("agency").unwrap()),
        period_end: None,
        reason: None,
    };
    let err = service
        .force_subscription_state(&caller, request, Uuid::new_v4(), now)
        .await
        .unwrap_err();
    assert!(matches!(err, ProfitdashError::Forbidden(_)));
    assert!(service.store().get_subscription(&caller.user_id).await.unwrap().is_none());
}
