//! Snapshot cache interface and publication of "recent blocks" + supply stats.
//!
//! Keys written:
//! - `block_<height>`: each committed block (short TTL)
//! - `lastBlocks`: the N highest blocks, highest first
//! - `stats`: [`SupplyStats`], advanced incrementally when present

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::IndexerError;
use crate::indexer::SyncConfig;
use crate::store::LedgerStore;
use crate::types::{amount, Block};

pub const LAST_BLOCKS_KEY: &str = "lastBlocks";
pub const STATS_KEY: &str = "stats";

/// Cache key for a single block.
pub fn block_key(height: u64) -> String {
    format!("block_{height}")
}

// ─── SnapshotCache ────────────────────────────────────────────────────────────

/// Short-TTL key/value store the read side serves snapshots from.
#[async_trait]
pub trait SnapshotCache: Send + Sync {
    async fn set_field(&self, key: &str, value: Value, ttl_secs: u64) -> Result<(), IndexerError>;

    /// Returns `None` for missing or expired keys.
    async fn get_field(&self, key: &str) -> Result<Option<Value>, IndexerError>;
}

/// In-process cache with per-key expiry.
#[derive(Default)]
pub struct MemorySnapshotCache {
    entries: Mutex<HashMap<String, (Value, Instant)>>,
}

impl MemorySnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .unwrap()
            .values()
            .filter(|(_, expires)| *expires > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SnapshotCache for MemorySnapshotCache {
    async fn set_field(&self, key: &str, value: Value, ttl_secs: u64) -> Result<(), IndexerError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        // `block_<height>` keys are never read back, so expiry happens here.
        entries.retain(|_, (_, expires)| *expires > now);
        entries.insert(key.to_string(), (value, now + Duration::from_secs(ttl_secs)));
        Ok(())
    }

    async fn get_field(&self, key: &str) -> Result<Option<Value>, IndexerError> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some((value, expires)) if *expires > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

// ─── SupplyStats ──────────────────────────────────────────────────────────────

/// Aggregate supply figure kept under the `stats` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupplyStats {
    #[serde(with = "amount")]
    pub max_supply: u128,
    /// Highest block whose reward is already included in `max_supply`.
    pub height: u64,
    #[serde(with = "amount")]
    pub last_miner_reward: u128,
}

impl SupplyStats {
    /// Fold the rewards of `blocks` (ascending, all above `self.height`) in.
    pub fn advance(&self, blocks: &[Block]) -> Result<Self, IndexerError> {
        let mut next = self.clone();
        for block in blocks.iter().filter(|b| b.height > self.height) {
            next.max_supply = next
                .max_supply
                .checked_add(block.miner_reward)
                .ok_or_else(|| IndexerError::Overflow {
                    address: STATS_KEY.to_string(),
                })?;
            next.height = block.height;
            next.last_miner_reward = block.miner_reward;
        }
        Ok(next)
    }
}

// ─── SnapshotPublisher ────────────────────────────────────────────────────────

/// Outcome of a [`SnapshotPublisher::publish`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub recent_blocks: usize,
    /// `Some` when a prior `stats` value existed and was advanced.
    pub stats: Option<SupplyStats>,
}

/// Writes snapshots derived from the ledger store into a [`SnapshotCache`].
#[derive(Debug, Clone)]
pub struct SnapshotPublisher {
    recent_blocks: usize,
    recent_blocks_ttl_secs: u64,
    stats_ttl_secs: u64,
    block_ttl_secs: u64,
}

impl SnapshotPublisher {
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            recent_blocks: config.recent_blocks,
            recent_blocks_ttl_secs: config.recent_blocks_ttl_secs,
            stats_ttl_secs: config.stats_ttl_secs,
            block_ttl_secs: config.block_ttl_secs,
        }
    }

    /// Publish a freshly committed block under `block_<height>`.
    pub async fn publish_block(
        &self,
        cache: &dyn SnapshotCache,
        block: &Block,
    ) -> Result<(), IndexerError> {
        let value = serde_json::to_value(block).map_err(|e| IndexerError::Cache(e.to_string()))?;
        cache
            .set_field(&block_key(block.height), value, self.block_ttl_secs)
            .await
    }

    /// Publish `lastBlocks` and, if a prior value exists, the advanced `stats`.
    pub async fn publish(
        &self,
        store: &dyn LedgerStore,
        cache: &dyn SnapshotCache,
    ) -> Result<PublishReport, IndexerError> {
        let recent = store.recent_blocks(self.recent_blocks).await?;
        let Some(latest) = recent.first() else {
            return Ok(PublishReport {
                recent_blocks: 0,
                stats: None,
            });
        };

        let stats = match cache.get_field(STATS_KEY).await? {
            Some(prior) => self.advance_stats(store, cache, prior, latest.height).await?,
            None => None,
        };

        let value =
            serde_json::to_value(&recent).map_err(|e| IndexerError::Cache(e.to_string()))?;
        cache
            .set_field(LAST_BLOCKS_KEY, value, self.recent_blocks_ttl_secs)
            .await?;

        tracing::debug!(
            recent = recent.len(),
            latest = latest.height,
            stats = stats.is_some(),
            "snapshot published"
        );
        Ok(PublishReport {
            recent_blocks: recent.len(),
            stats,
        })
    }

    async fn advance_stats(
        &self,
        store: &dyn LedgerStore,
        cache: &dyn SnapshotCache,
        prior: Value,
        latest: u64,
    ) -> Result<Option<SupplyStats>, IndexerError> {
        let prior: SupplyStats = match serde_json::from_value(prior) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring unreadable stats snapshot");
                return Ok(None);
            }
        };
        if latest <= prior.height {
            return Ok(Some(prior));
        }

        let blocks = store.blocks_in_range(prior.height + 1, latest).await?;
        let next = prior.advance(&blocks)?;
        let value = serde_json::to_value(&next).map_err(|e| IndexerError::Cache(e.to_string()))?;
        cache.set_field(STATS_KEY, value, self.stats_ttl_secs).await?;
        Ok(Some(next))
    }
}
