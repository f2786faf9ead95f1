//! Projection Layer
//!
//! Read-only derived views over the two latest membership snapshots of one
//! account. Recomputed on every query and never persisted, so they cannot
//! drift from the underlying snapshots.

use crate::member::MemberSet;
use serde::{Deserialize, Serialize};

/// The derived views the query surface exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectionKind {
    /// Present in both relations: they follow the owner and the owner
    /// follows them.
    Mutual,
    /// Follows the owner, but the owner does not follow back.
    NotFollowingBack,
    /// The owner follows them, but they do not follow back.
    NotFollowedBack,
}

/// Compute one projection from the latest snapshots.
pub fn project(kind: ProjectionKind, followers: &MemberSet, following: &MemberSet) -> MemberSet {
    match kind {
        ProjectionKind::Mutual => followers.intersect(following),
        ProjectionKind::NotFollowingBack => followers.subtract(following),
        ProjectionKind::NotFollowedBack => following.subtract(followers),
    }
}
