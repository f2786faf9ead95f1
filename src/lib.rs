//! Followlog: Durable Follower-Graph Change Journal
//!
//! Periodically polls an external social-graph source for relationship
//! memberships, diffs each snapshot against the previously persisted one,
//! and records the changes as an append-only event history.

pub mod account;
pub mod api;
pub mod bus;
pub mod config;
pub mod error;
pub mod journal;
pub mod logging;
pub mod member;
pub mod projection;
pub mod reconcile;
pub mod scheduler;
pub mod source;
pub mod store;
pub mod types;
