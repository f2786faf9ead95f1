//! External social-graph source
//!
//! The narrow interface the reconciliation engine consumes: paged membership
//! listing, authentication, and session validation. Pagination is modeled as
//! a finite, lazily-produced stream of member batches so the protocol's
//! quirks never leak into the diff or journal logic. Page exhaustion is the
//! in-band `None` continuation token, cleanly separated from failures.

pub mod http;

pub use http::HttpMemberSource;

use crate::error::SourceError;
use crate::member::{Member, MemberSet};
use crate::types::Relation;
use async_trait::async_trait;
use futures::stream::{self, Stream, TryStreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Login credentials for the external source.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Opaque session/auth state owned by the source.
///
/// The engine only persists and hands it back; it never inspects the bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState(pub Vec<u8>);

impl SessionState {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// Continuation token for paged listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageToken(pub String);

/// One page of members. `next: None` signals exhaustion.
#[derive(Debug, Clone)]
pub struct MemberPage {
    pub members: Vec<Member>,
    pub next: Option<PageToken>,
}

/// The external source the engine polls.
#[async_trait]
pub trait MemberSource: Send + Sync {
    /// Exchange credentials for an opaque session. Invalid credentials are a
    /// terminal error.
    async fn authenticate(&self, credentials: &Credentials) -> Result<SessionState, SourceError>;

    /// Whether a restored session is still usable without re-login.
    async fn is_session_valid(&self, session: &SessionState) -> Result<bool, SourceError>;

    /// List one page of a relation's membership. `page: None` requests the
    /// first page.
    async fn list_members(
        &self,
        session: &SessionState,
        relation: Relation,
        page: Option<PageToken>,
    ) -> Result<MemberPage, SourceError>;
}

/// Lazily-produced stream of member batches for one relation.
///
/// Each item is one page's members; the stream ends when the source reports
/// no further pages. Errors terminate the stream and must abort the cycle.
pub fn page_stream<'a>(
    source: &'a dyn MemberSource,
    session: &'a SessionState,
    relation: Relation,
) -> impl Stream<Item = Result<Vec<Member>, SourceError>> + 'a {
    // State: Some(token) = next page to request (None token = first page),
    // None = exhausted.
    stream::try_unfold(Some(None::<PageToken>), move |state| async move {
        let Some(token) = state else {
            return Ok(None);
        };
        let page = source.list_members(session, relation, token).await?;
        let next_state = page.next.map(Some);
        Ok(Some((page.members, next_state)))
    })
}

/// Fetch the full current membership of one relation, merging all pages.
///
/// Any page failure aborts the whole fetch; the caller must not diff a
/// partial set against the persisted snapshot.
pub async fn fetch_all(
    source: &dyn MemberSource,
    session: &SessionState,
    relation: Relation,
) -> Result<MemberSet, SourceError> {
    let mut set = MemberSet::new();
    let mut pages = Box::pin(page_stream(source, session, relation));
    let mut page_count = 0usize;
    while let Some(members) = pages.try_next().await? {
        page_count += 1;
        for member in members {
            set.insert(member);
        }
    }
    debug!(%relation, pages = page_count, members = set.len(), "fetched relation membership");
    Ok(set)
}
