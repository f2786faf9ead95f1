//! Engine facade
//!
//! Composes the registry, snapshot store, source, and driver behind the
//! query, trigger, and account-lifecycle surfaces. Transport front-ends
//! (a bot, an RPC server) talk to this type only.

use crate::account::{AccountContext, AccountRegistry};
use crate::bus::EventBus;
use crate::error::EngineError;
use crate::journal::{Event, EventFilter};
use crate::member::MemberSet;
use crate::projection::{project, ProjectionKind};
use crate::reconcile::{Reconciler, TriggerOutcome};
use crate::source::{Credentials, MemberSource, SessionState};
use crate::store::{AccountStore, SnapshotStore};
use crate::types::{AccountId, Relation};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

pub struct FollowlogApi {
    store: Arc<dyn SnapshotStore>,
    source: Arc<dyn MemberSource>,
    registry: Arc<AccountRegistry>,
    reconciler: Arc<Reconciler>,
}

impl FollowlogApi {
    pub fn new(store: Arc<dyn SnapshotStore>, source: Arc<dyn MemberSource>, bus: EventBus) -> Self {
        let registry = Arc::new(AccountRegistry::new());
        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&store),
            Arc::clone(&source),
            bus,
        ));
        FollowlogApi {
            store,
            source,
            registry,
            reconciler,
        }
    }

    pub fn registry(&self) -> Arc<AccountRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn reconciler(&self) -> Arc<Reconciler> {
        Arc::clone(&self.reconciler)
    }

    /// Rebuild account contexts from persisted sessions at startup.
    ///
    /// Accounts whose restored session no longer validates are registered
    /// paused; they keep serving persisted state but are not scheduled
    /// until re-login. Returns the number of restored accounts.
    pub async fn restore_accounts(&self) -> Result<usize, EngineError> {
        let ids = self.store.accounts_with_sessions()?;
        let mut restored = 0usize;
        for id in ids {
            let account_store = AccountStore::new(self.store.as_ref(), id);
            let Some(session_bytes) = account_store.load_session()? else {
                continue;
            };
            let session = SessionState(session_bytes);

            let mut snapshots = HashMap::new();
            for relation in Relation::ALL {
                if let Some(set) = account_store.load_members(relation)? {
                    snapshots.insert(relation, set);
                }
            }
            let journal = account_store.load_journal()?.unwrap_or_default();

            let context =
                self.registry
                    .insert(AccountContext::restored(id, session.clone(), snapshots, journal))?;

            match self.source.is_session_valid(&session).await {
                Ok(true) => {}
                Ok(false) => {
                    warn!(account = %id, "restored session is no longer valid, pausing account");
                    context.pause();
                }
                Err(err) => {
                    // Transient validation failure: leave the account
                    // scheduled, the next cycle will sort it out.
                    warn!(account = %id, %err, "could not validate restored session");
                    if err.is_terminal() {
                        context.pause();
                    }
                }
            }
            restored += 1;
        }
        info!(accounts = restored, "restored account contexts from store");
        Ok(restored)
    }

    /// Authenticate and start tracking an account. Runs the bootstrap cycle
    /// immediately so every current member is journaled as gained once.
    pub async fn login(
        &self,
        id: AccountId,
        credentials: &Credentials,
    ) -> Result<Arc<AccountContext>, EngineError> {
        if self.registry.get(id).is_ok() {
            return Err(EngineError::AlreadyRegistered(id));
        }
        let session = self.source.authenticate(credentials).await?;

        // The session blob is persisted before the bootstrap cycle so a
        // restart between the two restores a schedulable account.
        let account_store = AccountStore::new(self.store.as_ref(), id);
        account_store.save_session(session.as_bytes())?;
        account_store.flush()?;

        let context = self.registry.insert(AccountContext::new(id, session))?;
        info!(account = %id, "account logged in");

        self.reconciler.reconcile(&context).await?;
        Ok(context)
    }

    /// Re-authenticate a paused account in place and resume scheduling.
    pub async fn relogin(
        &self,
        id: AccountId,
        credentials: &Credentials,
    ) -> Result<(), EngineError> {
        let context = self.registry.get(id)?;
        let session = self.source.authenticate(credentials).await?;

        let account_store = AccountStore::new(self.store.as_ref(), id);
        account_store.save_session(session.as_bytes())?;
        account_store.flush()?;

        context.set_session(session);
        context.resume();
        info!(account = %id, "account re-authenticated, scheduling resumed");
        Ok(())
    }

    /// Stop tracking an account and remove every persisted object for it.
    ///
    /// Waits for any in-flight cycle on the account before wiping: a cycle
    /// persists its journal and snapshots after its fetch, and those writes
    /// must land before the wipe so nothing survives the logout.
    pub async fn logout(&self, id: AccountId) -> Result<(), EngineError> {
        let context = self.registry.remove(id)?;
        let _gate = context.cycle_gate().lock().await;
        AccountStore::new(self.store.as_ref(), id).remove_all()?;
        info!(account = %id, "account logged out, persisted state removed");
        Ok(())
    }

    /// Ordered event history, optionally filtered by relation and/or kind.
    pub fn events(&self, id: AccountId, filter: EventFilter) -> Result<Vec<Event>, EngineError> {
        Ok(self.registry.get(id)?.journal().filtered(filter))
    }

    /// Latest snapshot for one relation.
    pub fn members(&self, id: AccountId, relation: Relation) -> Result<MemberSet, EngineError> {
        Ok(self.registry.get(id)?.members(relation))
    }

    /// Derived view over the two latest snapshots, recomputed per query.
    pub fn projection(&self, id: AccountId, kind: ProjectionKind) -> Result<MemberSet, EngineError> {
        let context = self.registry.get(id)?;
        let followers = context.members(Relation::Followers);
        let following = context.members(Relation::Following);
        Ok(project(kind, &followers, &following))
    }

    /// On-demand refresh. Rejected immediately with `Busy` when a cycle for
    /// the account is already in flight.
    pub async fn trigger_reconcile(&self, id: AccountId) -> Result<TriggerOutcome, EngineError> {
        let context = self.registry.get(id)?;
        self.reconciler.try_reconcile(&context).await
    }

    /// Flush the store; called on graceful shutdown after the scheduler has
    /// stopped.
    pub fn shutdown(&self) -> Result<(), EngineError> {
        self.store.flush()?;
        info!("store flushed, engine shut down");
        Ok(())
    }
}
