//! Fluent builder API for creating sync engines.
//!
//! # Example
//!
//! ```rust,no_run
//! use ledgerindex_rivine::{HttpChainClient, SyncEngineBuilder};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpChainClient::default_for("http://localhost:23110/")?;
//! let engine = SyncEngineBuilder::new()
//!     .chain("tfchain-testnet")
//!     .call_timeout_ms(10_000)
//!     .recent_blocks(20)
//!     .build(client);
//! engine.sync_to_head().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ledgerindex_core::indexer::SyncConfig;
use ledgerindex_core::rates::{FixedRateProvider, RateProvider};
use ledgerindex_core::retry::RetryConfig;
use ledgerindex_core::snapshot::{MemorySnapshotCache, SnapshotCache};
use ledgerindex_core::store::LedgerStore;
use ledgerindex_storage::InMemoryLedgerStore;

use crate::client::ChainClient;
use crate::engine::SyncEngine;

/// Fluent builder for [`SyncEngine`] and its [`SyncConfig`].
///
/// Components left unset default to an in-memory store, an in-memory
/// snapshot cache and a rate provider that always answers "unknown".
#[derive(Default)]
pub struct SyncEngineBuilder {
    config: SyncConfig,
    store: Option<Arc<dyn LedgerStore>>,
    rates: Option<Arc<dyn RateProvider>>,
    cache: Option<Arc<dyn SnapshotCache>>,
}

impl SyncEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing config (e.g. one loaded from a file).
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the chain label used in logs.
    pub fn chain(mut self, chain: impl Into<String>) -> Self {
        self.config.chain = chain.into();
        self
    }

    /// First height to index when the store is empty.
    pub fn start_height(mut self, height: u64) -> Self {
        self.config.start_height = height;
        self
    }

    /// Deadline for each node call.
    pub fn call_timeout_ms(mut self, ms: u64) -> Self {
        self.config.call_timeout_ms = ms;
        self
    }

    /// Bound on head re-reads within one pass.
    pub fn max_catchup_rounds(mut self, rounds: u32) -> Self {
        self.config.max_catchup_rounds = rounds;
        self
    }

    /// Number of blocks in the `lastBlocks` snapshot.
    pub fn recent_blocks(mut self, n: usize) -> Self {
        self.config.recent_blocks = n;
        self
    }

    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval_ms = ms;
        self
    }

    /// Backoff for whole-pass retries after transient node failures.
    pub fn pass_retry(mut self, retry: RetryConfig) -> Self {
        self.config.pass_retry = retry;
        self
    }

    /// Delay between catch-up rounds when the head keeps growing.
    pub fn catchup_backoff(mut self, retry: RetryConfig) -> Self {
        self.config.catchup_backoff = retry;
        self
    }

    pub fn store(mut self, store: Arc<dyn LedgerStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn rates(mut self, rates: Arc<dyn RateProvider>) -> Self {
        self.rates = Some(rates);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn SnapshotCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Build the `SyncConfig` only.
    pub fn build_config(self) -> SyncConfig {
        self.config
    }

    /// Build the engine around `client`.
    pub fn build(self, client: impl ChainClient + 'static) -> SyncEngine {
        self.build_shared(Arc::new(client))
    }

    /// Build the engine around an already shared client.
    pub fn build_shared(self, client: Arc<dyn ChainClient>) -> SyncEngine {
        SyncEngine::new(
            self.config,
            client,
            self.store
                .unwrap_or_else(|| Arc::new(InMemoryLedgerStore::new())),
            self.rates
                .unwrap_or_else(|| Arc::new(FixedRateProvider::default())),
            self.cache
                .unwrap_or_else(|| Arc::new(MemorySnapshotCache::new())),
        )
    }
}
