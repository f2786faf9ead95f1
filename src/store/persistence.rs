//! Persistence layer for the Snapshot Store

use crate::error::StorageError;
use crate::store::{SnapshotStore, StoreKey};
use crate::types::AccountId;
use std::path::Path;

const SESSION_SUFFIX: &[u8] = b":session";

/// Sled-based implementation of [`SnapshotStore`].
///
/// sled serializes concurrent writers internally, which satisfies the
/// keys-disjoint concurrent-access requirement without extra locking.
pub struct SledSnapshotStore {
    db: sled::Db,
}

impl SledSnapshotStore {
    /// Open (or create) a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// The underlying sled database (for advanced operations).
    pub fn db(&self) -> &sled::Db {
        &self.db
    }
}

impl SnapshotStore for SledSnapshotStore {
    fn get(&self, key: &StoreKey) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.db.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    fn put(&self, key: &StoreKey, value: &[u8]) -> Result<(), StorageError> {
        self.db.insert(key.as_bytes(), value)?;
        Ok(())
    }

    fn remove(&self, key: &StoreKey) -> Result<(), StorageError> {
        self.db.remove(key.as_bytes())?;
        Ok(())
    }

    fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    fn accounts_with_sessions(&self) -> Result<Vec<AccountId>, StorageError> {
        let mut accounts = Vec::new();
        for item in self.db.scan_prefix(b"acct:") {
            let (key, _) = item?;
            if !key.ends_with(SESSION_SUFFIX) {
                continue;
            }
            // Key shape is `acct:<id>:session`.
            let middle = &key[b"acct:".len()..key.len() - SESSION_SUFFIX.len()];
            if let Ok(text) = std::str::from_utf8(middle) {
                if let Ok(id) = text.parse::<i64>() {
                    accounts.push(AccountId(id));
                }
            }
        }
        accounts.sort();
        Ok(accounts)
    }
}
