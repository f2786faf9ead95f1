//! Reconciliation Driver
//!
//! One cycle: fetch current membership per relation, diff against the last
//! persisted snapshots, append derived events to the journal, persist the
//! new snapshots. The journal is written and flushed strictly before the
//! snapshots, so a crash between the two leaves a journal batch whose
//! snapshot update is missing; the next cycle re-derives the identical batch
//! and the journal's idempotent append skips it.

use crate::account::AccountContext;
use crate::bus::EventBus;
use crate::error::EngineError;
use crate::journal::{events_from_diffs, EventJournal};
use crate::member::{diff, MemberSet, SetDiff};
use crate::source::{fetch_all, MemberSource};
use crate::store::{AccountStore, SnapshotStore};
use crate::types::Relation;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of a manual reconciliation trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// A cycle ran (successfully or not; failures are logged and retried on
    /// the next tick).
    Accepted,
    /// A cycle for this account was already in flight; the trigger was
    /// rejected immediately, never queued.
    Busy,
}

/// Drives reconciliation cycles against one store and one source.
///
/// Cycles for different accounts are independent; within one account the
/// context's cycle gate strictly serializes them.
pub struct Reconciler {
    store: Arc<dyn SnapshotStore>,
    source: Arc<dyn MemberSource>,
    bus: EventBus,
}

impl Reconciler {
    pub fn new(store: Arc<dyn SnapshotStore>, source: Arc<dyn MemberSource>, bus: EventBus) -> Self {
        Reconciler { store, source, bus }
    }

    /// Run one cycle, waiting for any in-flight cycle on this account to
    /// finish first. Used by the scheduler and by first-login bootstrap.
    pub async fn reconcile(&self, context: &AccountContext) -> Result<(), EngineError> {
        let _gate = context.cycle_gate().lock().await;
        self.run_cycle(context).await
    }

    /// Manual trigger: run one cycle unless one is already in flight.
    pub async fn try_reconcile(&self, context: &AccountContext) -> Result<TriggerOutcome, EngineError> {
        let Ok(_gate) = context.cycle_gate().try_lock() else {
            debug!(account = %context.id, "reconcile trigger rejected, cycle in flight");
            return Ok(TriggerOutcome::Busy);
        };
        self.run_cycle(context).await?;
        Ok(TriggerOutcome::Accepted)
    }

    /// The cycle body. Caller must hold the account's cycle gate.
    ///
    /// No persisted or cached state is modified until every fetch and diff
    /// has succeeded; a failure at any step leaves the previous successful
    /// cycle authoritative.
    async fn run_cycle(&self, context: &AccountContext) -> Result<(), EngineError> {
        if context.is_paused() {
            return Err(EngineError::AccountPaused(context.id));
        }

        let started = Utc::now();
        let session = context.session();

        // Fetching: full pagination per relation, merged into one set each.
        let mut fetched: HashMap<Relation, MemberSet> = HashMap::new();
        for relation in Relation::ALL {
            match fetch_all(self.source.as_ref(), &session, relation).await {
                Ok(set) => {
                    fetched.insert(relation, set);
                }
                Err(err) => {
                    if err.is_terminal() {
                        warn!(account = %context.id, %relation, %err,
                            "terminal source failure, pausing account until re-login");
                        context.pause();
                    } else {
                        error!(account = %context.id, %relation, %err,
                            "fetch failed, cycle aborted");
                    }
                    return Err(err.into());
                }
            }
        }

        // Diffing: missing snapshot means first cycle, old set is empty and
        // every fetched member is reported gained exactly once.
        let account_store = AccountStore::new(self.store.as_ref(), context.id);
        let mut diffs: Vec<(Relation, SetDiff)> = Vec::with_capacity(Relation::ALL.len());
        for relation in Relation::ALL {
            let old = account_store.load_members(relation)?.unwrap_or_default();
            let new = &fetched[&relation];
            diffs.push((relation, diff(&old, new)));
        }
        let diff_refs: Vec<(Relation, &SetDiff)> =
            diffs.iter().map(|(r, d)| (*r, d)).collect();
        let batch = events_from_diffs(started, &diff_refs);

        // Persisting: journal before snapshots, flushed in between so the
        // two writes are ordered on durable media.
        let mut journal = account_store.load_journal()?.unwrap_or_else(EventJournal::new);
        let appended = journal.append(batch.clone());
        if appended {
            account_store.save_journal(&journal)?;
            account_store.flush()?;
        }
        for (relation, set) in &fetched {
            account_store.save_members(*relation, set)?;
        }
        account_store.flush()?;

        context.apply_cycle(fetched, journal);
        if appended {
            self.bus.publish(context.id, batch.clone());
        }

        info!(
            account = %context.id,
            events = batch.len(),
            appended,
            "reconciliation cycle complete"
        );
        Ok(())
    }
}
