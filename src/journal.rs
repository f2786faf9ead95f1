//! Event Journal
//!
//! Append-only, chronologically ordered log of typed membership-change
//! events. Once appended, an event is never mutated, reordered, or removed.

use crate::member::{Member, SetDiff};
use crate::types::{MemberId, Relation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a membership change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventKind {
    Gained,
    Lost,
}

/// One recorded membership change.
///
/// The affected member is captured by value so the event stays meaningful
/// even if the member is later renamed or leaves every relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Creation time of the reconciliation cycle that produced the event.
    pub at: DateTime<Utc>,
    pub relation: Relation,
    pub kind: EventKind,
    pub member: Member,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match (self.relation, self.kind) {
            (Relation::Followers, EventKind::Gained) => "+follower",
            (Relation::Followers, EventKind::Lost) => "-follower",
            (Relation::Following, EventKind::Gained) => "+following",
            (Relation::Following, EventKind::Lost) => "-following",
        };
        write!(
            f,
            "{} {} @{} {}",
            self.at.format("%Y-%m-%d %H:%M %z"),
            tag,
            self.member.username,
            self.member.full_name
        )
    }
}

/// Identity of one appended batch: the sorted set of changes it carries.
///
/// Used to make per-cycle appends idempotent. A batch identical to the most
/// recently appended one can only be the re-derivation of a cycle whose
/// snapshot write was lost: had the snapshot been written, diffing unchanged
/// membership against it would have produced no events at all.
pub type BatchKey = Vec<(Relation, EventKind, MemberId)>;

/// Compute the idempotence key for a batch of events.
pub fn batch_key(events: &[Event]) -> BatchKey {
    let mut key: BatchKey = events
        .iter()
        .map(|e| (e.relation, e.kind, e.member.id))
        .collect();
    key.sort();
    key
}

/// Build the event batch for one cycle from per-relation diffs.
///
/// Fixed order, consistent across runs: followers-lost, followers-gained,
/// following-lost, following-gained; ascending member id within each group.
/// Diffs must be supplied in [`Relation::ALL`] order.
pub fn events_from_diffs(at: DateTime<Utc>, diffs: &[(Relation, &SetDiff)]) -> Vec<Event> {
    let mut events = Vec::new();
    for (relation, diff) in diffs {
        for member in diff.removed.members_by_id() {
            events.push(Event {
                at,
                relation: *relation,
                kind: EventKind::Lost,
                member,
            });
        }
        for member in diff.added.members_by_id() {
            events.push(Event {
                at,
                relation: *relation,
                kind: EventKind::Gained,
                member,
            });
        }
    }
    events
}

/// Filter for journal queries. `None` fields match everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventFilter {
    pub relation: Option<Relation>,
    pub kind: Option<EventKind>,
}

impl EventFilter {
    pub fn matches(&self, event: &Event) -> bool {
        self.relation.map_or(true, |r| event.relation == r)
            && self.kind.map_or(true, |k| event.kind == k)
    }
}

/// Append-only ordered event history for one account.
///
/// Insertion order is chronological order. The `last_batch` marker carries
/// the idempotence key of the most recent non-empty append and travels with
/// the journal through persistence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventJournal {
    events: Vec<Event>,
    last_batch: Option<BatchKey>,
}

impl EventJournal {
    pub fn new() -> Self {
        EventJournal::default()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Append one cycle's batch, preserving the caller-supplied order.
    ///
    /// Returns `false` without modifying the journal when the batch is a
    /// duplicate of the most recently appended one (the crash-recovery
    /// re-derivation case). Empty batches are ignored.
    pub fn append(&mut self, batch: Vec<Event>) -> bool {
        if batch.is_empty() {
            return false;
        }
        let key = batch_key(&batch);
        if self.last_batch.as_ref() == Some(&key) {
            return false;
        }
        self.events.extend(batch);
        self.last_batch = Some(key);
        true
    }

    /// Full journal in original order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Journal filtered by relation and/or kind, original order preserved.
    pub fn filtered(&self, filter: EventFilter) -> Vec<Event> {
        self.events
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect()
    }
}
