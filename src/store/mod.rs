//! Snapshot Store
//!
//! Durable key-value persistence for the three object kinds each account
//! owns: the latest member set per relation, the event journal, and the
//! opaque source-session blob. Keys are namespaced per account and object
//! kind; a missing key means "no prior history, start fresh".

pub mod persistence;

pub use persistence::SledSnapshotStore;

use crate::error::StorageError;
use crate::journal::EventJournal;
use crate::member::MemberSet;
use crate::types::{AccountId, Relation};

/// The object kinds persisted per account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Members(Relation),
    Journal,
    Session,
}

/// Namespaced storage key: one account, one object kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreKey {
    pub account: AccountId,
    pub kind: ObjectKind,
}

impl StoreKey {
    pub fn members(account: AccountId, relation: Relation) -> Self {
        StoreKey {
            account,
            kind: ObjectKind::Members(relation),
        }
    }

    pub fn journal(account: AccountId) -> Self {
        StoreKey {
            account,
            kind: ObjectKind::Journal,
        }
    }

    pub fn session(account: AccountId) -> Self {
        StoreKey {
            account,
            kind: ObjectKind::Session,
        }
    }

    /// Byte encoding used by backends: `acct:<id>:<kind>`.
    pub fn as_bytes(&self) -> Vec<u8> {
        let kind = match self.kind {
            ObjectKind::Members(relation) => format!("members:{}", relation.key_fragment()),
            ObjectKind::Journal => "journal".to_string(),
            ObjectKind::Session => "session".to_string(),
        };
        format!("acct:{}:{}", self.account, kind).into_bytes()
    }

    /// All keys belonging to one account, for logout cleanup.
    pub fn all_for_account(account: AccountId) -> Vec<StoreKey> {
        let mut keys = vec![StoreKey::journal(account), StoreKey::session(account)];
        for relation in Relation::ALL {
            keys.push(StoreKey::members(account, relation));
        }
        keys
    }
}

/// Byte-oriented durable store.
///
/// `put` is a full overwrite; saving the same value twice is a no-op in
/// effect. Backends must tolerate concurrent access to different keys;
/// accounts never share keys, so no cross-account locking is required.
pub trait SnapshotStore: Send + Sync {
    fn get(&self, key: &StoreKey) -> Result<Option<Vec<u8>>, StorageError>;
    fn put(&self, key: &StoreKey, value: &[u8]) -> Result<(), StorageError>;
    fn remove(&self, key: &StoreKey) -> Result<(), StorageError>;

    /// Force pending writes to durable media. The reconciliation driver
    /// flushes between the journal write and the snapshot writes to order
    /// them on disk.
    fn flush(&self) -> Result<(), StorageError>;

    /// Accounts that have a persisted session blob (restore-on-startup).
    fn accounts_with_sessions(&self) -> Result<Vec<AccountId>, StorageError>;
}

/// Typed persistence operations for one account, layered over the byte store.
pub struct AccountStore<'a> {
    store: &'a dyn SnapshotStore,
    account: AccountId,
}

impl<'a> AccountStore<'a> {
    pub fn new(store: &'a dyn SnapshotStore, account: AccountId) -> Self {
        AccountStore { store, account }
    }

    /// Latest persisted snapshot for a relation; `None` before the first
    /// successful cycle.
    pub fn load_members(&self, relation: Relation) -> Result<Option<MemberSet>, StorageError> {
        match self.store.get(&StoreKey::members(self.account, relation))? {
            Some(bytes) => Ok(Some(decode("member set", &bytes)?)),
            None => Ok(None),
        }
    }

    pub fn save_members(&self, relation: Relation, set: &MemberSet) -> Result<(), StorageError> {
        let bytes = encode("member set", set)?;
        self.store
            .put(&StoreKey::members(self.account, relation), &bytes)
    }

    /// Persisted journal; an account with no observed changes yet has none.
    pub fn load_journal(&self) -> Result<Option<EventJournal>, StorageError> {
        match self.store.get(&StoreKey::journal(self.account))? {
            Some(bytes) => Ok(Some(decode("event journal", &bytes)?)),
            None => Ok(None),
        }
    }

    pub fn save_journal(&self, journal: &EventJournal) -> Result<(), StorageError> {
        let bytes = encode("event journal", journal)?;
        self.store.put(&StoreKey::journal(self.account), &bytes)
    }

    pub fn load_session(&self) -> Result<Option<Vec<u8>>, StorageError> {
        self.store.get(&StoreKey::session(self.account))
    }

    pub fn save_session(&self, session: &[u8]) -> Result<(), StorageError> {
        self.store.put(&StoreKey::session(self.account), session)
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.store.flush()
    }

    /// Remove every persisted object for the account. Journal and session go
    /// first so an interrupted logout never leaves a journal without its
    /// owning session.
    pub fn remove_all(&self) -> Result<(), StorageError> {
        for key in StoreKey::all_for_account(self.account) {
            self.store.remove(&key)?;
        }
        self.store.flush()
    }
}

fn encode<T: serde::Serialize>(what: &'static str, value: &T) -> Result<Vec<u8>, StorageError> {
    bincode::serialize(value).map_err(|source| StorageError::Serialize { what, source })
}

fn decode<T: serde::de::DeserializeOwned>(
    what: &'static str,
    bytes: &[u8],
) -> Result<T, StorageError> {
    bincode::deserialize(bytes).map_err(|source| StorageError::Deserialize { what, source })
}
