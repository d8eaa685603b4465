//! Sync configuration and runtime state types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryConfig;

/// Configuration for a sync engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Chain slug, used in log fields (e.g. `"tfchain"`).
    pub chain: String,
    /// First height to ingest when the store is empty.
    pub start_height: u64,
    /// Deadline applied to every individual node call (milliseconds).
    pub call_timeout_ms: u64,
    /// Upper bound on catch-up rounds within one `sync_to_head`.
    pub max_catchup_rounds: u32,
    /// How many blocks go into the `lastBlocks` snapshot.
    pub recent_blocks: usize,
    pub recent_blocks_ttl_secs: u64,
    pub stats_ttl_secs: u64,
    /// TTL of the per-block `block_<height>` cache entries.
    pub block_ttl_secs: u64,
    /// Head polling interval for the long-running service (milliseconds).
    pub poll_interval_ms: u64,
    /// Backoff between whole-pass retries after a transient failure.
    pub pass_retry: RetryConfig,
    /// Backoff between catch-up rounds while the head keeps growing.
    pub catchup_backoff: RetryConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            chain: "tfchain".into(),
            start_height: 0,
            call_timeout_ms: 30_000,
            max_catchup_rounds: 16,
            recent_blocks: 10,
            recent_blocks_ttl_secs: 300,
            stats_ttl_secs: 300,
            block_ttl_secs: 30,
            poll_interval_ms: 10_000,
            pass_retry: RetryConfig {
                max_retries: 5,
                initial_backoff: Duration::from_millis(500),
                max_backoff: Duration::from_secs(30),
                multiplier: 2.0,
                padding_fraction: 0.1,
            },
            catchup_backoff: RetryConfig {
                max_retries: 16,
                initial_backoff: Duration::from_millis(50),
                max_backoff: Duration::from_secs(2),
                multiplier: 2.0,
                padding_fraction: 0.0,
            },
        }
    }
}

impl SyncConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Runtime state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexerState {
    /// No pass has run yet.
    Idle,
    /// Walking heights towards the head.
    CatchingUp,
    /// Last pass reached the head and observed no growth.
    Synced,
    /// Pushing snapshots to the cache.
    Publishing,
    /// The last pass failed.
    Error,
}

impl std::fmt::Display for IndexerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::CatchingUp => write!(f, "catching-up"),
            Self::Synced => write!(f, "synced"),
            Self::Publishing => write!(f, "publishing"),
            Self::Error => write!(f, "error"),
        }
    }
}
