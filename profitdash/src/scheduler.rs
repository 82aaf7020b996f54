//! Periodic lifecycle checks.
//!
//! [`LifecycleScheduler`] runs the trial check and the full lifecycle sweep
//! on two independent intervals until the shutdown channel flips to `true`.
//! A failed run is logged and retried on the next tick.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::{
    sync::watch,
    time::{MissedTickBehavior, interval},
};

use crate::{config::SchedulerConfig, service::AccountService, store::AccountStore};

/// Drives [`AccountService::run_trial_checks`] and
/// [`AccountService::run_lifecycle_sweep`] from tokio interval timers.
#[derive(Debug)]
pub struct LifecycleScheduler<S> {
    service: Arc<AccountService<S>>,
    trial_check_every: Duration,
    sweep_every: Duration,
}

impl<S: AccountStore> LifecycleScheduler<S> {
    /// Creates a scheduler with the configured intervals.
    #[must_use]
    pub const fn new(service: Arc<AccountService<S>>, config: &SchedulerConfig) -> Self {
        Self {
            service,
            trial_check_every: Duration::from_secs(config.trial_check_secs),
            sweep_every: Duration::from_secs(config.sweep_secs),
        }
    }

    /// Runs until `shutdown` becomes `true` or its sender is dropped.
    ///
    /// Both timers fire immediately on start. The signal is only observed
    /// between runs: a check or sweep already in progress, retry backoff
    /// included, finishes before the loop exits. The retry policy bounds that
    /// wait.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut trial_ticker = interval(self.trial_check_every);
        trial_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut sweep_ticker = interval(self.sweep_every);
        sweep_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            trial_check_secs = self.trial_check_every.as_secs(),
            sweep_secs = self.sweep_every.as_secs(),
            "lifecycle scheduler started"
        );

        loop {
            tokio::select! {
                _ = trial_ticker.tick() => {
                    if let Err(e) = self.service.run_trial_checks(Utc::now()).await {
                        tracing::error!(error = %e, "trial check failed");
                    }
                }
                _ = sweep_ticker.tick() => {
                    if let Err(e) = self.service.run_lifecycle_sweep(Utc::now()).await {
                        tracing::error!(error = %e, "lifecycle sweep failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("lifecycle scheduler stopped");
    }
}
