//! Plan, trial and subscription operations.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use super::AccountService;
use crate::{
    error::{ProfitdashError, Result},
    security::{AuditEvent, AuditEventType, Caller, audit_log},
    store::AccountStore,
    subscription::{
        AccountStatus, Entitlements, ForceStateRequest, LifecycleState, PlanCode, ProfileStatus,
        SweepReport, SweepTransition, UserId, advance_subscription, advance_trial, force_state,
    },
};

/// Actor recorded for transitions applied by the scheduler.
const SYSTEM_ACTOR: &str = "system";

/// Result of an admin override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForceStateOutcome {
    /// State before the override, `None` if the user had no subscription.
    pub previous_state: Option<LifecycleState>,
    /// Status of the account after the override.
    pub status: AccountStatus,
    /// ID of the persisted audit entry.
    pub audit_id: Uuid,
}

impl<S: AccountStore> AccountService<S> {
    /// Returns trial and subscription status, creating the profile on first access.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the account cannot be loaded.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn account_status(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<AccountStatus> {
        let (profile, subscription) = self.load_account(user_id, now).await?;
        Ok(AccountStatus::derive(
            &profile,
            subscription.as_ref(),
            now,
            self.timers.warning_threshold_days,
        ))
    }

    /// Returns plan limits and usage.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the account cannot be loaded.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn entitlements(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<Entitlements> {
        let (profile, subscription) = self.load_account(user_id, now).await?;
        let counters = self.load_usage(&profile).await?;
        Ok(Entitlements::compute(&profile, subscription.as_ref(), &counters, now))
    }

    /// Starts the one-time free trial.
    ///
    /// # Errors
    ///
    /// Returns [`ProfitdashError::Conflict`] if the trial was already used or
    /// a paid subscription is active.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn start_trial(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<AccountStatus> {
        let (mut profile, subscription) = self.load_account(user_id, now).await?;
        if profile.trial_used {
            return Err(ProfitdashError::Conflict("trial has already been used".into()));
        }
        if profile.status == ProfileStatus::Subscribed
            && subscription.as_ref().is_some_and(|sub| sub.state() == LifecycleState::Active)
        {
            return Err(ProfitdashError::Conflict(
                "a paid subscription is already active".into(),
            ));
        }

        if !self.store.claim_trial(user_id).await? {
            return Err(ProfitdashError::Conflict("trial has already been used".into()));
        }

        let trial_end = now + Duration::days(i64::from(self.timers.trial_days));
        profile.plan_code = Some(PlanCode::trial());
        profile.status = ProfileStatus::Trialing;
        profile.trial_started_at = Some(now);
        profile.trial_end = Some(trial_end);
        profile.trial_used = true;
        profile.updated_at = now;
        self.store.put_profile(profile.clone()).await?;
        self.apply_plan_limits(&profile).await?;

        tracing::info!(trial_end = %trial_end, "trial started");
        Ok(AccountStatus::derive(
            &profile,
            subscription.as_ref(),
            now,
            self.timers.warning_threshold_days,
        ))
    }

    /// Switches the account to the free plan.
    ///
    /// # Errors
    ///
    /// Returns [`ProfitdashError::Conflict`] when a paid subscription is still
    /// active.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn select_free_plan(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<AccountStatus> {
        let (mut profile, subscription) = self.load_account(user_id, now).await?;
        if profile.status == ProfileStatus::Subscribed
            && subscription.as_ref().is_some_and(|sub| sub.state() == LifecycleState::Active)
        {
            return Err(ProfitdashError::Conflict(
                "cannot downgrade while a paid subscription is active".into(),
            ));
        }

        profile.plan_code = Some(PlanCode::free());
        profile.status = ProfileStatus::Free;
        profile.updated_at = now;
        self.store.put_profile(profile.clone()).await?;
        self.apply_plan_limits(&profile).await?;

        tracing::info!("free plan selected");
        Ok(AccountStatus::derive(
            &profile,
            subscription.as_ref(),
            now,
            self.timers.warning_threshold_days,
        ))
    }

    /// Forces a user's subscription into a lifecycle state. Admin only.
    ///
    /// The override is written to the audit log, both persisted and on the
    /// `audit` tracing target.
    ///
    /// # Errors
    ///
    /// - [`ProfitdashError::Forbidden`] if the caller is not an admin
    /// - [`ProfitdashError::Validation`] for an unknown target state or an
    ///   invalid field combination
    /// - [`ProfitdashError::InvalidPlanCode`] if the plan is unknown or free
    /// - [`ProfitdashError::NotFound`] if a non-active state is forced on a
    ///   user without a subscription
    #[instrument(
        skip(self, caller, request),
        fields(actor = %caller.user_id, target_user = %request.user_id, target_state = %request.target_state)
    )]
    pub async fn force_subscription_state(
        &self,
        caller: &Caller,
        request: ForceStateRequest,
        request_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<ForceStateOutcome> {
        if let Err(e) = caller.require_admin() {
            crate::audit!(
                AuditEventType::AccessDenied,
                caller.user_id.as_str(),
                request_id,
                at(now),
                with_target_user(request.user_id.as_str()),
                with_error(e.to_string()),
            );
            return Err(e);
        }

        let target = request.validate()?;
        if let Some(plan) = &request.plan_code {
            self.catalog.get_paid(plan)?;
        }

        let user_id = request.user_id;
        let existing = self.store.get_subscription(&user_id).await?;
        let forced = force_state(
            existing,
            &user_id,
            target,
            request.plan_code,
            request.period_end,
            now,
            &self.timers,
        )?;
        self.store.put_subscription(forced.subscription.clone()).await?;

        let mut profile = self.load_or_create_profile(&user_id, now).await?;
        if target == LifecycleState::Active {
            profile.plan_code = Some(forced.subscription.plan_code.clone());
            profile.status = ProfileStatus::Subscribed;
            profile.updated_at = now;
            self.store.put_profile(profile.clone()).await?;
            self.apply_plan_limits(&profile).await?;
        }

        let mut event =
            AuditEvent::new(AuditEventType::SubscriptionStateForced, caller.user_id.as_str(), request_id)
                .at(now)
                .with_target_user(user_id.as_str())
                .with_lifecycle(forced.previous, target);
        if let Some(reason) = request.reason {
            event = event.with_reason(reason);
        }
        audit_log(&event);
        let audit_id = event.id;
        self.store.append_audit(event).await?;

        Ok(ForceStateOutcome {
            previous_state: forced.previous,
            status: AccountStatus::derive(
                &profile,
                Some(&forced.subscription),
                now,
                self.timers.warning_threshold_days,
            ),
            audit_id,
        })
    }

    /// Expires trials whose end has been reached.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the profiles cannot be listed after retries.
    /// Failed row updates are counted in the report instead.
    #[instrument(skip(self))]
    pub async fn run_trial_checks(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        self.sweep_trials(now, &mut report).await?;
        tracing::info!(trials_expired = report.trials_expired, failures = report.failures, "trial check done");
        Ok(report)
    }

    /// Applies every due trial and subscription transition.
    ///
    /// Each row advances by at most one state per sweep, and only if it is
    /// unchanged since it was listed. Rows written concurrently are counted
    /// as skipped and looked at again by the next sweep.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the rows cannot be listed after retries.
    /// Failed row updates are counted in the report instead.
    #[instrument(skip(self))]
    pub async fn run_lifecycle_sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let mut report = SweepReport::default();
        self.sweep_trials(now, &mut report).await?;
        self.sweep_subscriptions(now, &mut report).await?;
        tracing::info!(
            trials_expired = report.trials_expired,
            subscriptions_expired = report.subscriptions_expired,
            subscriptions_suspended = report.subscriptions_suspended,
            subscriptions_archived = report.subscriptions_archived,
            failures = report.failures,
            "lifecycle sweep done"
        );
        Ok(report)
    }

    async fn sweep_trials(&self, now: DateTime<Utc>, report: &mut SweepReport) -> Result<()> {
        let profiles = self.with_retry(|| self.store.list_profiles()).await?;
        for profile in profiles {
            let Some(next) = advance_trial(&profile, now) else {
                continue;
            };
            match self.with_retry(|| self.store.transition_profile(&profile, next.clone())).await {
                Ok(true) => {
                    report.record(SweepTransition::TrialExpired);
                    log_transition(&next.user_id, ProfileStatus::Trialing.as_str(), next.status.as_str(), now);
                }
                Ok(false) => {
                    report.skipped += 1;
                    tracing::debug!(user_id = %next.user_id, "profile changed since listing, left as is");
                }
                Err(e) => {
                    report.failures += 1;
                    tracing::warn!(user_id = %next.user_id, error = %e, "failed to expire trial");
                }
            }
        }
        Ok(())
    }

    async fn sweep_subscriptions(&self, now: DateTime<Utc>, report: &mut SweepReport) -> Result<()> {
        let subscriptions = self.with_retry(|| self.store.list_subscriptions()).await?;
        for subscription in subscriptions {
            let Some((transition, next)) = advance_subscription(&subscription, now, &self.timers)
            else {
                continue;
            };
            match self
                .with_retry(|| self.store.transition_subscription(&subscription, next.clone()))
                .await
            {
                Ok(true) => {
                    report.record(transition);
                    log_transition(
                        &next.user_id,
                        subscription.state().as_str(),
                        next.state().as_str(),
                        now,
                    );
                }
                Ok(false) => {
                    report.skipped += 1;
                    tracing::debug!(
                        user_id = %next.user_id,
                        "subscription changed since listing, left as is"
                    );
                }
                Err(e) => {
                    report.failures += 1;
                    tracing::warn!(
                        user_id = %next.user_id,
                        error = %e,
                        "failed to advance subscription"
                    );
                }
            }
        }
        Ok(())
    }
}

fn log_transition(user_id: &UserId, from: &str, to: &str, now: DateTime<Utc>) {
    audit_log(
        &AuditEvent::new(AuditEventType::LifecycleTransition, SYSTEM_ACTOR, Uuid::new_v4())
            .at(now)
            .with_target_user(user_id.as_str())
            .with_transition(Some(from), to),
    );
}
