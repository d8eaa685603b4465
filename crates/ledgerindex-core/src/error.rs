//! Error types for the ledger indexing pipeline.

use thiserror::Error;

/// Errors that can occur while syncing the ledger.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// The node could not be reached or answered with something that is not JSON.
    #[error("Node unavailable: {0}")]
    Unavailable(String),

    /// A node call exceeded its deadline.
    #[error("Node call timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Storage error: {0}")]
    Storage(String),

    /// The node answered with JSON that lacks fields the ledger depends on.
    #[error("Malformed payload in {context}: {reason}")]
    MalformedPayload { context: String, reason: String },

    #[error("Balance overflow for address {address}")]
    Overflow { address: String },

    #[error("Snapshot cache error: {0}")]
    Cache(String),

    #[error("{0}")]
    Other(String),
}

impl IndexerError {
    /// Shorthand for a [`IndexerError::MalformedPayload`].
    pub fn malformed(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedPayload {
            context: context.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if retrying the whole pass may succeed.
    ///
    /// Data-integrity and storage errors need operator attention instead.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout { .. })
    }
}
