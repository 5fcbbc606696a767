//! Background Update Scheduler
//!
//! Drives periodic unattended update cycles, one sequential task per asset.
//! Every step failure is logged and swallowed at the tick boundary; no
//! single cycle's failure terminates the scheduler.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::apply::UpdateApplier;
use crate::asset::Asset;
use crate::config::UpdateConfig;
use crate::error::Result;
use crate::resolver;

/// Caller-supplied hooks consulted on every tick. Synchronous, called from
/// the scheduler's own loop; implementations must not block indefinitely.
pub trait UpdatePolicy: Send + Sync {
    /// Skip this tick entirely (the loop continues).
    fn should_skip(&self) -> bool {
        false
    }

    /// Called when an update is about to be applied; returning `Ok(false)`
    /// or an error skips the apply but keeps the loop running.
    fn before_update(&self) -> Result<bool> {
        Ok(true)
    }

    /// Called after a successful apply.
    fn after_update(&self) -> Result<()> {
        Ok(())
    }
}

/// No-op policy: never skip, always proceed.
pub struct AlwaysUpdate;

impl UpdatePolicy for AlwaysUpdate {}

pub struct BackgroundScheduler {
    interval: Duration,
}

impl BackgroundScheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Spawn the periodic update task for one asset.
    ///
    /// The task owns the asset: between cycles it is the only mutation point
    /// for the asset's current version, and cycles never overlap because the
    /// loop is strictly sequential. The task runs until
    /// [`SchedulerHandle::shutdown`] is called.
    pub fn spawn(
        &self,
        config: Arc<UpdateConfig>,
        mut asset: Asset,
        policy: Arc<dyn UpdatePolicy>,
    ) -> SchedulerHandle {
        let interval = self.interval;
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let last_check = Arc::new(Mutex::new(None));
        let last_check_task = Arc::clone(&last_check);

        let task = tokio::spawn(async move {
            let applier = UpdateApplier::new(&config);
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first interval tick fires immediately; the first cycle
            // should run one interval in.
            ticker.tick().await;

            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            debug!(asset = %asset.name, "scheduler shut down");
                            return;
                        }
                    }
                    _ = ticker.tick() => {
                        run_cycle(&applier, &mut asset, policy.as_ref()).await;
                        record_check(&last_check_task);
                    }
                }
            }
        });

        SchedulerHandle {
            shutdown: shutdown_tx,
            last_check,
            task,
        }
    }
}

/// Handle to one asset's background task.
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    last_check: Arc<Mutex<Option<DateTime<Utc>>>>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// When the last cycle completed, if any has.
    pub fn last_check(&self) -> Option<DateTime<Utc>> {
        checked_at(&self.last_check)
    }

    /// Signal shutdown and wait for the task to finish its current cycle.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

// Nothing holds the timestamp lock across a panic point, but a poisoned
// lock must still never take the scheduler or its handle down.
fn record_check(cell: &Mutex<Option<DateTime<Utc>>>) {
    *cell.lock().unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
}

fn checked_at(cell: &Mutex<Option<DateTime<Utc>>>) -> Option<DateTime<Utc>> {
    *cell.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One full unattended cycle: refresh, resolve, consult policy, apply.
async fn run_cycle(applier: &UpdateApplier, asset: &mut Asset, policy: &dyn UpdatePolicy) {
    asset.refresh_version();

    let candidates = match resolver::check_for_updates(asset).await {
        Ok(candidates) => candidates,
        Err(e) => {
            warn!(asset = %asset.name, error = %e, "update check failed");
            return;
        }
    };
    if candidates.is_empty() || policy.should_skip() {
        debug!(asset = %asset.name, "nothing to do this tick");
        return;
    }

    match policy.before_update() {
        Ok(true) => {}
        Ok(false) => {
            info!(asset = %asset.name, "update deferred by policy");
            return;
        }
        Err(e) => {
            warn!(asset = %asset.name, error = %e, "before-update hook failed");
            return;
        }
    }

    let candidate = match resolver::select_allowed_update(&candidates, asset.do_major_update) {
        Ok(candidate) => candidate,
        Err(e) => {
            warn!(asset = %asset.name, error = %e, "no eligible candidate");
            return;
        }
    };

    match applier.apply_external_update(asset, candidate).await {
        Ok(applied) => {
            info!(asset = %asset.name, version = %applied.version, "updated");
            if let Err(e) = policy.after_update() {
                warn!(asset = %asset.name, error = %e, "after-update hook failed");
            }
        }
        Err(e) => warn!(asset = %asset.name, error = %e, "apply failed"),
    }
}
