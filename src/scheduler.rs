//! Background reconciliation scheduler
//!
//! Time-driven loop over every registered account. Cycles for different
//! accounts run concurrently; within one account the context's cycle gate
//! serializes them. Shutdown is graceful: the current tick runs to
//! completion, so an in-flight persist is never killed mid-write.

use crate::account::AccountRegistry;
use crate::reconcile::Reconciler;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

pub struct Scheduler {
    reconciler: Arc<Reconciler>,
    registry: Arc<AccountRegistry>,
    poll_interval: Duration,
}

impl Scheduler {
    pub fn new(
        reconciler: Arc<Reconciler>,
        registry: Arc<AccountRegistry>,
        poll_interval: Duration,
    ) -> Self {
        Scheduler {
            reconciler,
            registry,
            poll_interval,
        }
    }

    /// Run until the shutdown signal flips to `true`.
    ///
    /// The signal is only checked between ticks; a tick that already started
    /// finishes all its cycles before the loop exits.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(interval_secs = self.poll_interval.as_secs(), "scheduler started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        info!("scheduler stopping, no new cycles will be scheduled");
                        break;
                    }
                }
            }
        }
    }

    /// Reconcile every registered, non-paused account once, concurrently,
    /// and wait for all cycles to finish.
    pub async fn tick(&self) {
        let mut cycles = Vec::new();
        for id in self.registry.ids() {
            let Ok(context) = self.registry.get(id) else {
                continue;
            };
            if context.is_paused() {
                debug!(account = %id, "skipping paused account");
                continue;
            }
            let reconciler = Arc::clone(&self.reconciler);
            cycles.push(tokio::spawn(async move {
                if let Err(err) = reconciler.reconcile(&context).await {
                    error!(account = %context.id, %err, "scheduled cycle failed");
                }
            }));
        }
        for cycle in cycles {
            if let Err(err) = cycle.await {
                error!(%err, "cycle task panicked");
            }
        }
    }
}
