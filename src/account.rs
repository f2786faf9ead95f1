//! Account Context & Registry
//!
//! The unit of isolation: one tracked external account, its cached latest
//! snapshots, its journal, and its opaque source session. The registry is an
//! explicit map from account id to context, created on login or restored
//! from the store at startup, removed on logout. No process-wide implicit
//! state.

use crate::error::EngineError;
use crate::journal::EventJournal;
use crate::member::MemberSet;
use crate::source::SessionState;
use crate::types::{AccountId, Relation};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// State for one tracked account.
///
/// The cached snapshots and journal mirror the last successfully persisted
/// cycle; `apply_cycle` replaces them atomically under the write lock. The
/// cycle gate enforces at-most-one reconciliation in flight per account.
#[derive(Debug)]
pub struct AccountContext {
    pub id: AccountId,
    session: RwLock<SessionState>,
    snapshots: RwLock<HashMap<Relation, MemberSet>>,
    journal: RwLock<EventJournal>,
    cycle_gate: tokio::sync::Mutex<()>,
    /// Set on terminal source errors; scheduling skips paused accounts
    /// until an explicit re-login clears it.
    paused: AtomicBool,
}

impl AccountContext {
    pub fn new(id: AccountId, session: SessionState) -> Self {
        AccountContext {
            id,
            session: RwLock::new(session),
            snapshots: RwLock::new(HashMap::new()),
            journal: RwLock::new(EventJournal::new()),
            cycle_gate: tokio::sync::Mutex::new(()),
            paused: AtomicBool::new(false),
        }
    }

    /// Rebuild a context from persisted state.
    pub fn restored(
        id: AccountId,
        session: SessionState,
        snapshots: HashMap<Relation, MemberSet>,
        journal: EventJournal,
    ) -> Self {
        AccountContext {
            id,
            session: RwLock::new(session),
            snapshots: RwLock::new(snapshots),
            journal: RwLock::new(journal),
            cycle_gate: tokio::sync::Mutex::new(()),
            paused: AtomicBool::new(false),
        }
    }

    pub fn session(&self) -> SessionState {
        self.session.read().clone()
    }

    pub fn set_session(&self, session: SessionState) {
        *self.session.write() = session;
    }

    /// Latest snapshot for a relation; empty before the first cycle.
    pub fn members(&self, relation: Relation) -> MemberSet {
        self.snapshots
            .read()
            .get(&relation)
            .cloned()
            .unwrap_or_default()
    }

    pub fn journal(&self) -> EventJournal {
        self.journal.read().clone()
    }

    /// Replace cached state with one cycle's results.
    pub fn apply_cycle(&self, snapshots: HashMap<Relation, MemberSet>, journal: EventJournal) {
        *self.snapshots.write() = snapshots;
        *self.journal.write() = journal;
    }

    pub(crate) fn cycle_gate(&self) -> &tokio::sync::Mutex<()> {
        &self.cycle_gate
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }
}

/// Explicit mapping from account id to live context.
#[derive(Default)]
pub struct AccountRegistry {
    accounts: RwLock<HashMap<AccountId, Arc<AccountContext>>>,
}

impl AccountRegistry {
    pub fn new() -> Self {
        AccountRegistry::default()
    }

    /// Register a new context. Fails if the account is already tracked;
    /// callers must logout first.
    pub fn insert(&self, context: AccountContext) -> Result<Arc<AccountContext>, EngineError> {
        let mut accounts = self.accounts.write();
        if accounts.contains_key(&context.id) {
            return Err(EngineError::AlreadyRegistered(context.id));
        }
        let context = Arc::new(context);
        accounts.insert(context.id, Arc::clone(&context));
        Ok(context)
    }

    pub fn get(&self, id: AccountId) -> Result<Arc<AccountContext>, EngineError> {
        self.accounts
            .read()
            .get(&id)
            .cloned()
            .ok_or(EngineError::UnknownAccount(id))
    }

    pub fn remove(&self, id: AccountId) -> Result<Arc<AccountContext>, EngineError> {
        self.accounts
            .write()
            .remove(&id)
            .ok_or(EngineError::UnknownAccount(id))
    }

    /// Snapshot of registered ids, sorted for stable iteration.
    pub fn ids(&self) -> Vec<AccountId> {
        let mut ids: Vec<AccountId> = self.accounts.read().keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.accounts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.read().is_empty()
    }
}
