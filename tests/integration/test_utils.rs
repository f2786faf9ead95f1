//! Shared test utilities for integration tests
//!
//! Provides a scripted member source, a store wrapper that can simulate a
//! crash between the journal write and the snapshot writes, and a harness
//! wiring both into a full engine over a temporary sled store.

use async_trait::async_trait;
use followlog::api::FollowlogApi;
use followlog::bus::EventBus;
use followlog::error::{SourceError, StorageError};
use followlog::member::{Member, MemberSet};
use followlog::source::{Credentials, MemberPage, MemberSource, PageToken, SessionState};
use followlog::store::{SledSnapshotStore, SnapshotStore, StoreKey};
use followlog::types::{AccountId, MemberId, Relation};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Notify;

pub fn member(id: MemberId) -> Member {
    Member::new(id, format!("user{}", id), format!("User {}", id))
}

pub fn sorted_ids(set: &MemberSet) -> Vec<MemberId> {
    let mut ids: Vec<MemberId> = set.iter().map(|m| m.id).collect();
    ids.sort();
    ids
}

struct MockState {
    followers: Vec<Member>,
    following: Vec<Member>,
    page_size: usize,
    fail_next_list: Option<SourceError>,
    list_barrier: Option<(Arc<Notify>, Arc<Notify>)>,
    reject_auth: bool,
    session_valid: bool,
}

/// Scripted source: membership is set per relation, listing is paged, and
/// both listing failures and auth outcomes can be injected.
pub struct MockSource {
    state: RwLock<MockState>,
}

impl MockSource {
    pub fn new() -> Self {
        MockSource {
            state: RwLock::new(MockState {
                followers: Vec::new(),
                following: Vec::new(),
                page_size: 2,
                fail_next_list: None,
                list_barrier: None,
                reject_auth: false,
                session_valid: true,
            }),
        }
    }

    pub fn set_members(&self, relation: Relation, members: Vec<Member>) {
        let mut state = self.state.write();
        match relation {
            Relation::Followers => state.followers = members,
            Relation::Following => state.following = members,
        }
    }

    pub fn fail_next_list(&self, err: SourceError) {
        self.state.write().fail_next_list = Some(err);
    }

    /// Block the next listing call mid-fetch. The first notify fires when
    /// the call enters, the second releases it.
    pub fn block_next_list(&self) -> (Arc<Notify>, Arc<Notify>) {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        self.state.write().list_barrier = Some((Arc::clone(&entered), Arc::clone(&release)));
        (entered, release)
    }

    pub fn set_reject_auth(&self, reject: bool) {
        self.state.write().reject_auth = reject;
    }

    pub fn set_session_valid(&self, valid: bool) {
        self.state.write().session_valid = valid;
    }
}

#[async_trait]
impl MemberSource for MockSource {
    async fn authenticate(&self, credentials: &Credentials) -> Result<SessionState, SourceError> {
        if self.state.read().reject_auth {
            return Err(SourceError::Terminal("credentials rejected".into()));
        }
        Ok(SessionState(
            format!("token-{}", credentials.username).into_bytes(),
        ))
    }

    async fn is_session_valid(&self, _: &SessionState) -> Result<bool, SourceError> {
        Ok(self.state.read().session_valid)
    }

    async fn list_members(
        &self,
        _: &SessionState,
        relation: Relation,
        page: Option<PageToken>,
    ) -> Result<MemberPage, SourceError> {
        // The state lock must not be held across the barrier await.
        let barrier = self.state.write().list_barrier.take();
        if let Some((entered, release)) = barrier {
            entered.notify_one();
            release.notified().await;
        }
        let mut state = self.state.write();
        if let Some(err) = state.fail_next_list.take() {
            return Err(err);
        }
        let members = match relation {
            Relation::Followers => &state.followers,
            Relation::Following => &state.following,
        };
        let start = match page {
            None => 0,
            Some(PageToken(t)) => t.parse::<usize>().unwrap_or(0),
        };
        let end = (start + state.page_size).min(members.len());
        let next = if end < members.len() {
            Some(PageToken(end.to_string()))
        } else {
            None
        };
        Ok(MemberPage {
            members: members[start..end].to_vec(),
            next,
        })
    }
}

/// Store wrapper simulating a crash inside the persist step: while armed,
/// writes to member-set keys fail, so the journal lands durably but the
/// snapshots keep their pre-cycle values.
pub struct CrashStore {
    inner: SledSnapshotStore,
    drop_member_writes: AtomicBool,
}

impl CrashStore {
    pub fn open(path: &std::path::Path) -> Self {
        CrashStore {
            inner: SledSnapshotStore::open(path).unwrap(),
            drop_member_writes: AtomicBool::new(false),
        }
    }

    pub fn arm_crash(&self) {
        self.drop_member_writes.store(true, Ordering::SeqCst);
    }

    pub fn disarm(&self) {
        self.drop_member_writes.store(false, Ordering::SeqCst);
    }

    fn is_member_key(key: &StoreKey) -> bool {
        let bytes = key.as_bytes();
        bytes.windows(b":members:".len()).any(|w| w == b":members:")
    }
}

impl SnapshotStore for CrashStore {
    fn get(&self, key: &StoreKey) -> Result<Option<Vec<u8>>, StorageError> {
        self.inner.get(key)
    }

    fn put(&self, key: &StoreKey, value: &[u8]) -> Result<(), StorageError> {
        if self.drop_member_writes.load(Ordering::SeqCst) && Self::is_member_key(key) {
            return Err(StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                "simulated crash before snapshot write",
            )));
        }
        self.inner.put(key, value)
    }

    fn remove(&self, key: &StoreKey) -> Result<(), StorageError> {
        self.inner.remove(key)
    }

    fn flush(&self) -> Result<(), StorageError> {
        self.inner.flush()
    }

    fn accounts_with_sessions(&self) -> Result<Vec<AccountId>, StorageError> {
        self.inner.accounts_with_sessions()
    }
}

pub struct Harness {
    pub temp_dir: TempDir,
    pub api: FollowlogApi,
    pub source: Arc<MockSource>,
    pub store: Arc<CrashStore>,
}

pub fn harness() -> Harness {
    let temp_dir = TempDir::new().unwrap();
    let source = Arc::new(MockSource::new());
    let store = Arc::new(CrashStore::open(temp_dir.path()));
    let api = FollowlogApi::new(
        Arc::clone(&store) as Arc<dyn SnapshotStore>,
        Arc::clone(&source) as Arc<dyn MemberSource>,
        EventBus::disconnected(),
    );
    Harness {
        temp_dir,
        api,
        source,
        store,
    }
}

/// Reopen a fresh engine over the same store directory, as a process
/// restart would.
pub fn reopen(harness: Harness) -> Harness {
    let Harness {
        temp_dir,
        api,
        source,
        store,
    } = harness;
    drop(api);
    drop(store);
    let store = Arc::new(CrashStore::open(temp_dir.path()));
    let api = FollowlogApi::new(
        Arc::clone(&store) as Arc<dyn SnapshotStore>,
        Arc::clone(&source) as Arc<dyn MemberSource>,
        EventBus::disconnected(),
    );
    Harness {
        temp_dir,
        api,
        source,
        store,
    }
}

pub fn credentials() -> Credentials {
    Credentials {
        username: "owner".into(),
        password: "secret".into(),
    }
}

pub const ACCOUNT: AccountId = AccountId(1);
