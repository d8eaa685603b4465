//! The sync engine. Walks heights from the cursor to the chain head.
//!
//! # Pass
//! 1. Read the head height from the node.
//! 2. Derive the cursor from the highest committed block.
//! 3. For each height above the cursor, strictly in order: fetch the block,
//!    take a rate snapshot, credit miner payouts, fold in every transaction
//!    not stored yet, and commit the whole height atomically.
//! 4. Re-read the head; if it grew, run another round (bounded, with backoff).
//!
//! Transient node failures abort the pass and retry it from the cursor with
//! exponential backoff. Storage and payload errors abort without retry.
//!
//! Only one pass runs at a time. [`SyncEngine::sync_to_head`] waits for an
//! in-flight pass; [`SyncEngine::ensure_synced_to`] skips instead.

use std::future::Future;
use std::sync::{Arc, Mutex};

use tracing::{debug, error, info, warn};

use ledgerindex_core::cursor::SyncCursor;
use ledgerindex_core::error::IndexerError;
use ledgerindex_core::indexer::{IndexerState, SyncConfig};
use ledgerindex_core::rates::RateProvider;
use ledgerindex_core::retry::RetryPolicy;
use ledgerindex_core::snapshot::{SnapshotCache, SnapshotPublisher};
use ledgerindex_core::store::LedgerStore;
use ledgerindex_core::types::RateSnapshot;

use crate::client::ChainClient;
use crate::payload::items;
use crate::transform;

/// Snapshot of the engine's runtime state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncStatus {
    pub state: IndexerState,
    /// `true` once a pass reached the head and observed no further growth.
    pub synced: bool,
    /// Head height that pass converged on.
    pub synced_height: Option<u64>,
}

/// Result of a [`SyncEngine::sync_to_head`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Last head height read from the node.
    pub head: u64,
    /// Highest height committed to the store when the pass ended. Below
    /// `head` only when the pass did not converge.
    pub committed: Option<u64>,
    pub blocks_indexed: u64,
    pub transactions_indexed: u64,
    /// Catch-up rounds run (1 when the head did not move).
    pub rounds: u32,
    /// `false` if the head kept growing past `max_catchup_rounds`.
    pub converged: bool,
}

/// Answer of [`SyncEngine::ensure_synced_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSignal {
    pub triggered_refresh: bool,
}

impl RefreshSignal {
    const SKIPPED: Self = Self {
        triggered_refresh: false,
    };
}

/// Sequential ledger indexer.
pub struct SyncEngine {
    config: SyncConfig,
    client: Arc<dyn ChainClient>,
    store: Arc<dyn LedgerStore>,
    rates: Arc<dyn RateProvider>,
    cache: Arc<dyn SnapshotCache>,
    publisher: SnapshotPublisher,
    pass_retry: RetryPolicy,
    catchup_backoff: RetryPolicy,
    pass_lock: tokio::sync::Mutex<()>,
    status: Mutex<SyncStatus>,
}

impl SyncEngine {
    pub fn new(
        config: SyncConfig,
        client: Arc<dyn ChainClient>,
        store: Arc<dyn LedgerStore>,
        rates: Arc<dyn RateProvider>,
        cache: Arc<dyn SnapshotCache>,
    ) -> Self {
        Self {
            publisher: SnapshotPublisher::new(&config),
            pass_retry: RetryPolicy::new(config.pass_retry.clone()),
            catchup_backoff: RetryPolicy::new(config.catchup_backoff.clone()),
            pass_lock: tokio::sync::Mutex::new(()),
            status: Mutex::new(SyncStatus {
                state: IndexerState::Idle,
                synced: false,
                synced_height: None,
            }),
            config,
            client,
            store,
            rates,
            cache,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn status(&self) -> SyncStatus {
        *self.status.lock().unwrap()
    }

    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    pub fn client(&self) -> &Arc<dyn ChainClient> {
        &self.client
    }

    pub fn cache(&self) -> &Arc<dyn SnapshotCache> {
        &self.cache
    }

    /// Bring the store up to the chain head.
    ///
    /// Waits for any pass already in flight, then runs a full pass.
    pub async fn sync_to_head(&self) -> Result<SyncOutcome, IndexerError> {
        let _pass = self.pass_lock.lock().await;
        self.run_with_retry().await
    }

    /// Freshness trigger for the read side.
    ///
    /// Skips (returns `triggered_refresh: false`) when no pass has converged
    /// yet, when `height` is the height the last pass converged on, or when a
    /// pass is already running. Otherwise syncs to the head and republishes
    /// the `lastBlocks` / `stats` snapshots.
    pub async fn ensure_synced_to(&self, height: u64) -> Result<RefreshSignal, IndexerError> {
        let status = self.status();
        if !status.synced || status.synced_height == Some(height) {
            return Ok(RefreshSignal::SKIPPED);
        }
        let Ok(_pass) = self.pass_lock.try_lock() else {
            debug!(height, "sync pass already in flight");
            return Ok(RefreshSignal::SKIPPED);
        };

        let outcome = self.run_with_retry().await?;

        self.set_state(IndexerState::Publishing);
        if let Err(e) = self.publisher.publish(&*self.store, &*self.cache).await {
            warn!(error = %e, "snapshot publication failed");
        }
        self.set_state(if outcome.converged {
            IndexerState::Synced
        } else {
            IndexerState::CatchingUp
        });

        Ok(RefreshSignal {
            triggered_refresh: true,
        })
    }

    // ─── Pass driver ────────────────────────────────────────────────────────────

    async fn run_with_retry(&self) -> Result<SyncOutcome, IndexerError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.catch_up().await {
                Ok(outcome) => return Ok(outcome),
                Err(e) if e.is_transient() => match self.pass_retry.next_delay(attempt) {
                    Some(delay) => {
                        warn!(
                            chain = %self.config.chain,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "sync pass failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        error!(chain = %self.config.chain, attempt, error = %e, "sync pass retries exhausted");
                        self.set_state(IndexerState::Error);
                        return Err(e);
                    }
                },
                Err(e) => {
                    error!(chain = %self.config.chain, error = %e, "sync pass aborted");
                    self.set_state(IndexerState::Error);
                    return Err(e);
                }
            }
        }
    }

    async fn catch_up(&self) -> Result<SyncOutcome, IndexerError> {
        self.set_state(IndexerState::CatchingUp);
        let mut outcome = SyncOutcome::default();
        let mut head = self.head_height().await?;

        for round in 1..=self.config.max_catchup_rounds.max(1) {
            outcome.rounds = round;
            let (blocks, transactions) = self.walk_to(head).await?;
            outcome.blocks_indexed += blocks;
            outcome.transactions_indexed += transactions;

            let latest = self.head_height().await?;
            if latest <= head {
                outcome.head = head;
                outcome.committed = self.store.last_height().await?;
                outcome.converged = true;
                self.mark_synced(head);
                info!(
                    chain = %self.config.chain,
                    head,
                    blocks = outcome.blocks_indexed,
                    transactions = outcome.transactions_indexed,
                    rounds = round,
                    "ledger synced to head"
                );
                return Ok(outcome);
            }

            debug!(head, latest, round, "head grew during pass");
            head = latest;
            if let Some(delay) = self.catchup_backoff.next_delay(round) {
                tokio::time::sleep(delay).await;
            }
        }

        outcome.head = head;
        outcome.committed = self.store.last_height().await?;
        warn!(
            chain = %self.config.chain,
            head,
            committed = ?outcome.committed,
            rounds = outcome.rounds,
            "head still growing after max catch-up rounds"
        );
        Ok(outcome)
    }

    /// Ingest every height from the cursor up to `head`.
    async fn walk_to(&self, head: u64) -> Result<(u64, u64), IndexerError> {
        let mut cursor = SyncCursor::new(self.store.last_height().await?);
        if cursor.has_reached(head) {
            return Ok((0, 0));
        }
        let from = cursor.next_height().max(self.config.start_height);
        if from > head {
            return Ok((0, 0));
        }
        info!(chain = %self.config.chain, from, head, lag = cursor.lag(head), "catching up");

        let mut blocks = 0;
        let mut transactions = 0;
        for height in from..=head {
            transactions += self.index_height(height).await? as u64;
            cursor.advance(height);
            blocks += 1;
        }
        Ok((blocks, transactions))
    }

    /// Build and commit everything `height` contributes. Returns the number of
    /// new transactions.
    async fn index_height(&self, height: u64) -> Result<usize, IndexerError> {
        let raw = self.call(self.client.block_at(height)).await?.block;
        if raw.height != height {
            return Err(IndexerError::malformed(
                format!("block {height}"),
                format!("node returned height {}", raw.height),
            ));
        }

        let rates = self.rate_snapshot().await;
        let mut commit = transform::block_commit(&raw, rates.clone())?;

        for tx_ref in items(&raw.transactions) {
            if commit.contains_transaction(&tx_ref.id)
                || self.store.has_transaction(&tx_ref.id).await?
            {
                debug!(height, tx_id = %tx_ref.id, "transaction already indexed");
                continue;
            }
            let detail = self.call(self.client.transaction(&tx_ref.id)).await?;
            if detail.transaction.id != tx_ref.id {
                return Err(IndexerError::malformed(
                    format!("transaction {}", tx_ref.id),
                    format!("node returned transaction {}", detail.transaction.id),
                ));
            }
            transform::apply_transaction(&mut commit, &detail.transaction, rates.clone())?;
        }

        let new_transactions = commit.transactions.len();
        let block = commit.block.clone();
        self.store.commit_block(commit).await?;

        if let Err(e) = self.publisher.publish_block(&*self.cache, &block).await {
            warn!(height, error = %e, "failed to cache block");
        }
        debug!(height, id = %block.id, transactions = new_transactions, "block indexed");
        Ok(new_transactions)
    }

    // ─── Helpers ────────────────────────────────────────────────────────────────

    /// Bound a node call by the configured deadline.
    async fn call<T>(
        &self,
        fut: impl Future<Output = Result<T, IndexerError>>,
    ) -> Result<T, IndexerError> {
        match tokio::time::timeout(self.config.call_timeout(), fut).await {
            Ok(result) => result,
            Err(_) => Err(IndexerError::Timeout {
                ms: self.config.call_timeout_ms,
            }),
        }
    }

    async fn head_height(&self) -> Result<u64, IndexerError> {
        Ok(self.call(self.client.head()).await?.height)
    }

    async fn rate_snapshot(&self) -> RateSnapshot {
        match self.rates.snapshot().await {
            Ok(rates) => rates,
            Err(e) => {
                warn!(error = %e, "rate snapshot unavailable, recording empty rates");
                RateSnapshot::default()
            }
        }
    }

    fn set_state(&self, state: IndexerState) {
        self.status.lock().unwrap().state = state;
    }

    fn mark_synced(&self, head: u64) {
        let mut status = self.status.lock().unwrap();
        status.state = IndexerState::Synced;
        status.synced = true;
        status.synced_height = Some(head);
    }
}
