//! In-memory ledger store.
//!
//! Keeps blocks, transactions, wallets and applied effect keys in RAM behind a
//! single lock, so every [`BlockCommit`] lands atomically.
//! All data is lost when the process exits.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use ledgerindex_core::error::IndexerError;
use ledgerindex_core::store::{BlockCommit, LedgerStore};
use ledgerindex_core::types::{Block, Transaction, Wallet};

#[derive(Default)]
struct Ledger {
    blocks: BTreeMap<u64, Block>,
    block_ids: HashMap<String, u64>,
    transactions: HashMap<String, Transaction>,
    wallets: HashMap<String, Wallet>,
    applied_effects: HashSet<String>,
}

/// In-memory [`LedgerStore`].
#[derive(Default)]
pub struct InMemoryLedgerStore {
    ledger: Mutex<Ledger>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All wallets, sorted by address.
    pub fn wallets(&self) -> Vec<Wallet> {
        let ledger = self.ledger.lock().unwrap();
        let mut wallets: Vec<_> = ledger.wallets.values().cloned().collect();
        wallets.sort_by(|a, b| a.address.cmp(&b.address));
        wallets
    }

    /// Number of balance effects applied so far.
    pub fn applied_effect_count(&self) -> usize {
        self.ledger.lock().unwrap().applied_effects.len()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn last_height(&self) -> Result<Option<u64>, IndexerError> {
        Ok(self.ledger.lock().unwrap().blocks.keys().next_back().copied())
    }

    async fn block_by_height(&self, height: u64) -> Result<Option<Block>, IndexerError> {
        Ok(self.ledger.lock().unwrap().blocks.get(&height).cloned())
    }

    async fn block_by_id(&self, id: &str) -> Result<Option<Block>, IndexerError> {
        let ledger = self.ledger.lock().unwrap();
        Ok(ledger
            .block_ids
            .get(id)
            .and_then(|h| ledger.blocks.get(h))
            .cloned())
    }

    async fn recent_blocks(&self, limit: usize) -> Result<Vec<Block>, IndexerError> {
        let ledger = self.ledger.lock().unwrap();
        Ok(ledger.blocks.values().rev().take(limit).cloned().collect())
    }

    async fn blocks_in_range(&self, from: u64, to: u64) -> Result<Vec<Block>, IndexerError> {
        if to < from {
            return Ok(vec![]);
        }
        let ledger = self.ledger.lock().unwrap();
        Ok(ledger.blocks.range(from..=to).map(|(_, b)| b.clone()).collect())
    }

    async fn transaction(&self, id: &str) -> Result<Option<Transaction>, IndexerError> {
        Ok(self.ledger.lock().unwrap().transactions.get(id).cloned())
    }

    async fn has_transaction(&self, id: &str) -> Result<bool, IndexerError> {
        Ok(self.ledger.lock().unwrap().transactions.contains_key(id))
    }

    async fn wallet(&self, address: &str) -> Result<Option<Wallet>, IndexerError> {
        Ok(self.ledger.lock().unwrap().wallets.get(address).cloned())
    }

    async fn ensure_wallet(&self, address: &str) -> Result<(), IndexerError> {
        if address.is_empty() {
            return Ok(());
        }
        self.ledger
            .lock()
            .unwrap()
            .wallets
            .entry(address.to_string())
            .or_insert_with(|| Wallet::empty(address));
        Ok(())
    }

    async fn commit_block(&self, commit: BlockCommit) -> Result<(), IndexerError> {
        let mut ledger = self.ledger.lock().unwrap();
        let height = commit.height();

        if let Some(existing) = ledger.blocks.get(&height) {
            if existing.id == commit.block.id {
                return Ok(());
            }
            return Err(IndexerError::Storage(format!(
                "height {height} already holds block {}, refusing {}",
                existing.id, commit.block.id
            )));
        }
        if let Some(other) = ledger.block_ids.get(&commit.block.id) {
            return Err(IndexerError::Storage(format!(
                "block {} already stored at height {other}",
                commit.block.id
            )));
        }

        // Stage every wallet change first so an overflow leaves nothing applied.
        let mut staged: HashMap<String, Wallet> = HashMap::new();
        for address in &commit.touched {
            let wallet = ledger
                .wallets
                .get(address)
                .cloned()
                .unwrap_or_else(|| Wallet::empty(address.as_str()));
            staged.insert(address.clone(), wallet);
        }
        let mut new_keys = HashSet::new();
        for effect in &commit.effects {
            if ledger.applied_effects.contains(&effect.key) || !new_keys.insert(effect.key.clone()) {
                tracing::debug!(key = %effect.key, "balance effect already applied");
                continue;
            }
            let wallet = staged
                .entry(effect.address.clone())
                .or_insert_with(|| Wallet::empty(effect.address.as_str()));
            effect.apply_to(wallet)?;
        }

        ledger.wallets.extend(staged);
        ledger.applied_effects.extend(new_keys);
        for tx in commit.transactions {
            if !ledger.transactions.contains_key(&tx.id) {
                ledger.transactions.insert(tx.id.clone(), tx);
            }
        }
        ledger.block_ids.insert(commit.block.id.clone(), height);
        ledger.blocks.insert(height, commit.block);
        Ok(())
    }

    async fn block_count(&self) -> Result<u64, IndexerError> {
        Ok(self.ledger.lock().unwrap().blocks.len() as u64)
    }

    async fn transaction_count(&self) -> Result<u64, IndexerError> {
        Ok(self.ledger.lock().unwrap().transactions.len() as u64)
    }
}
