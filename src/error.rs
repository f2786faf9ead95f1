//! Error types for the followlog reconciliation engine.

use crate::types::{AccountId, Relation};
use thiserror::Error;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: bincode::Error,
    },

    #[error("Failed to deserialize {what}: {source}")]
    Deserialize {
        what: &'static str,
        #[source]
        source: bincode::Error,
    },

    #[error("Storage backend error: {0}")]
    Backend(#[from] sled::Error),

    #[error("Storage I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors from the external social-graph source.
///
/// The taxonomy drives driver behavior: transient failures abort the current
/// cycle and retry on the next tick, terminal failures pause scheduling for
/// the account until an explicit re-authentication.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network timeout, rate limit, single-page failure. Retry next tick.
    #[error("Transient source failure: {0}")]
    Transient(String),

    /// Credentials revoked or account suspended. Pause the account.
    #[error("Terminal source failure: {0}")]
    Terminal(String),

    /// The source returned a page that could not be decoded at all.
    /// Individual malformed records inside an otherwise valid page are
    /// skipped by the fetch layer, not surfaced through this variant.
    #[error("Malformed page from source for {relation}: {detail}")]
    MalformedPage { relation: Relation, detail: String },
}

impl SourceError {
    /// True when the account should stop being scheduled until re-login.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SourceError::Terminal(_))
    }
}

/// Engine-level errors covering one reconciliation cycle and the query,
/// trigger, and account-lifecycle surfaces.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Unknown account: {0}")]
    UnknownAccount(AccountId),

    #[error("Account {0} is already registered; logout first")]
    AlreadyRegistered(AccountId),

    #[error("Account {0} is paused pending re-authentication")]
    AccountPaused(AccountId),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Configuration error: {0}")]
    Config(String),
}
