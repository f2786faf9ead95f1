//! Core identifier types shared across the crate.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable numeric identifier assigned to a member by the external source.
///
/// This is the only field that participates in set identity; display fields
/// on [`crate::member::Member`] are informational and may change between
/// reconciliation cycles.
pub type MemberId = i64;

/// Identifier for one tracked account context (a chat/session id in
/// multi-tenant deployments, a single fixed value otherwise).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub i64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One tracked kind of social-graph membership.
///
/// Each relation has its own independently persisted snapshot and
/// contributes its own stream of journal events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Relation {
    /// Accounts that follow the tracked account.
    Followers,
    /// Accounts the tracked account follows.
    Following,
}

impl Relation {
    /// All tracked relations, in the fixed order cycles process them.
    pub const ALL: [Relation; 2] = [Relation::Followers, Relation::Following];

    /// Stable storage-key fragment for this relation.
    pub fn key_fragment(&self) -> &'static str {
        match self {
            Relation::Followers => "followers",
            Relation::Following => "following",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key_fragment())
    }
}
