//! Member Set & Set Diff
//!
//! An immutable-once-built keyed collection representing one relation's
//! membership at one point in time, and the pure three-way diff between two
//! such collections.

use crate::types::MemberId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One entity participating in a relation.
///
/// Identity is the numeric id; `username` and `full_name` are display fields
/// the source may change at any time and never participate in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub username: String,
    pub full_name: String,
}

impl Member {
    pub fn new(id: MemberId, username: impl Into<String>, full_name: impl Into<String>) -> Self {
        Member {
            id,
            username: username.into(),
            full_name: full_name.into(),
        }
    }
}

impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Member {}

impl std::hash::Hash for Member {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Point-in-time snapshot of one relation's membership.
///
/// Built once per reconciliation cycle and never mutated afterwards; a new
/// cycle produces a brand-new set rather than editing one in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberSet {
    members: HashMap<MemberId, Member>,
}

impl MemberSet {
    pub fn new() -> Self {
        MemberSet {
            members: HashMap::new(),
        }
    }

    /// Build a set from an iterator of members. Later duplicates of an id
    /// replace earlier ones, matching the merge behavior of paged fetches.
    pub fn from_members(members: impl IntoIterator<Item = Member>) -> Self {
        MemberSet {
            members: members.into_iter().map(|m| (m.id, m)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: MemberId) -> bool {
        self.members.contains_key(&id)
    }

    pub fn get(&self, id: MemberId) -> Option<&Member> {
        self.members.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    /// Insert during construction (used by the paged fetch merge).
    pub(crate) fn insert(&mut self, member: Member) {
        self.members.insert(member.id, member);
    }

    /// Members sorted by username, for presentation surfaces.
    pub fn sorted_members(&self) -> Vec<Member> {
        let mut members: Vec<Member> = self.members.values().cloned().collect();
        members.sort_by(|a, b| a.username.cmp(&b.username));
        members
    }

    /// Members sorted by id, for deterministic event ordering.
    pub fn members_by_id(&self) -> Vec<Member> {
        let mut members: Vec<Member> = self.members.values().cloned().collect();
        members.sort_by_key(|m| m.id);
        members
    }

    /// Members of `self` whose id is also in `other`, values taken from `self`.
    pub fn intersect(&self, other: &MemberSet) -> MemberSet {
        MemberSet {
            members: self
                .members
                .iter()
                .filter(|(id, _)| other.contains(**id))
                .map(|(id, m)| (*id, m.clone()))
                .collect(),
        }
    }

    /// Members of `self` whose id is not in `other`.
    pub fn subtract(&self, other: &MemberSet) -> MemberSet {
        MemberSet {
            members: self
                .members
                .iter()
                .filter(|(id, _)| !other.contains(**id))
                .map(|(id, m)| (*id, m.clone()))
                .collect(),
        }
    }
}

impl FromIterator<Member> for MemberSet {
    fn from_iter<T: IntoIterator<Item = Member>>(iter: T) -> Self {
        MemberSet::from_members(iter)
    }
}

/// Three-way partition of two membership snapshots.
///
/// `added`, `common`, and `removed` are pairwise disjoint by id and together
/// cover the union of both input key sets.
#[derive(Debug, Clone)]
pub struct SetDiff {
    /// Ids present in `new` but not `old`.
    pub added: MemberSet,
    /// Ids present in both; values taken from `new` so display-field
    /// changes are reflected.
    pub common: MemberSet,
    /// Ids present in `old` but not `new`.
    pub removed: MemberSet,
}

impl SetDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Compute the membership delta between two snapshots.
///
/// Pure, total, and linear in `|old| + |new|`; empty inputs are valid and
/// yield empty outputs.
pub fn diff(old: &MemberSet, new: &MemberSet) -> SetDiff {
    let mut added = MemberSet::new();
    let mut common = MemberSet::new();
    let mut removed = MemberSet::new();

    for member in new.iter() {
        if old.contains(member.id) {
            common.insert(member.clone());
        } else {
            added.insert(member.clone());
        }
    }
    for member in old.iter() {
        if !new.contains(member.id) {
            removed.insert(member.clone());
        }
    }

    SetDiff {
        added,
        common,
        removed,
    }
}
