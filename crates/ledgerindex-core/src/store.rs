//! Ledger store trait and the unit of work committed per block.
//!
//! The sync engine never writes records one at a time. Each height is
//! assembled into a [`BlockCommit`] and handed to [`LedgerStore::commit_block`],
//! which applies it atomically: wallets, balance effects, transactions and the
//! block record either all land or none do. Balance effects carry an
//! idempotency key so that replaying a commit can never double-count.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::IndexerError;
use crate::types::{Block, Transaction, Wallet};

// ─── Balance effects ──────────────────────────────────────────────────────────

/// Direction of a balance effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectKind {
    Credit,
    Debit,
}

/// A single credit or debit against one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceEffect {
    /// Globally unique key: `payout:<id>`, `coin-input:<parent>`, `coin-output:<id>`.
    pub key: String,
    pub address: String,
    pub kind: EffectKind,
    pub amount: u128,
}

impl BalanceEffect {
    pub fn payout(payout_id: &str, address: &str, amount: u128) -> Self {
        Self {
            key: format!("payout:{payout_id}"),
            address: address.to_string(),
            kind: EffectKind::Credit,
            amount,
        }
    }

    pub fn coin_output(output_id: &str, address: &str, amount: u128) -> Self {
        Self {
            key: format!("coin-output:{output_id}"),
            address: address.to_string(),
            kind: EffectKind::Credit,
            amount,
        }
    }

    pub fn coin_input(parent_id: &str, address: &str, amount: u128) -> Self {
        Self {
            key: format!("coin-input:{parent_id}"),
            address: address.to_string(),
            kind: EffectKind::Debit,
            amount,
        }
    }

    /// Apply this effect to `wallet` with checked arithmetic.
    ///
    /// On overflow the wallet is left untouched.
    pub fn apply_to(&self, wallet: &mut Wallet) -> Result<(), IndexerError> {
        let overflow = || IndexerError::Overflow {
            address: self.address.clone(),
        };
        let delta = i128::try_from(self.amount).map_err(|_| overflow())?;
        match self.kind {
            EffectKind::Credit => {
                let balance = wallet.balance.checked_add(delta).ok_or_else(overflow)?;
                let received = wallet
                    .total_received
                    .checked_add(self.amount)
                    .ok_or_else(overflow)?;
                wallet.balance = balance;
                wallet.total_received = received;
            }
            EffectKind::Debit => {
                wallet.balance = wallet.balance.checked_sub(delta).ok_or_else(overflow)?;
            }
        }
        Ok(())
    }
}

// ─── BlockCommit ──────────────────────────────────────────────────────────────

/// Everything one height contributes to the ledger.
#[derive(Debug, Clone)]
pub struct BlockCommit {
    pub block: Block,
    /// Newly observed transactions, in block order.
    pub transactions: Vec<Transaction>,
    /// Every address seen in this block, in first-seen order.
    pub touched: Vec<String>,
    /// Credits and debits, in application order.
    pub effects: Vec<BalanceEffect>,
}

impl BlockCommit {
    pub fn new(block: Block) -> Self {
        Self {
            block,
            transactions: vec![],
            touched: vec![],
            effects: vec![],
        }
    }

    /// Ensure `address` gets a wallet when this commit lands.
    ///
    /// Empty addresses are ignored; they come from payloads that do not
    /// resolve to an address and must not produce a wallet.
    pub fn touch(&mut self, address: &str) {
        if address.is_empty() || self.touched.iter().any(|a| a == address) {
            return;
        }
        self.touched.push(address.to_string());
    }

    /// Record a balance effect (touching its address first).
    pub fn apply(&mut self, effect: BalanceEffect) {
        self.touch(&effect.address);
        self.effects.push(effect);
    }

    /// Returns `true` if a transaction with `id` is already part of this commit.
    pub fn contains_transaction(&self, id: &str) -> bool {
        self.transactions.iter().any(|t| t.id == id)
    }

    pub fn height(&self) -> u64 {
        self.block.height
    }
}

// ─── LedgerStore ──────────────────────────────────────────────────────────────

/// Persisted Block, Transaction and Wallet records.
///
/// Implementations: `InMemoryLedgerStore` and `SqliteLedgerStore`
/// (in `ledgerindex-storage`).
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Height of the highest committed block, if any.
    async fn last_height(&self) -> Result<Option<u64>, IndexerError>;

    async fn block_by_height(&self, height: u64) -> Result<Option<Block>, IndexerError>;

    async fn block_by_id(&self, id: &str) -> Result<Option<Block>, IndexerError>;

    /// The `limit` highest blocks, highest first.
    async fn recent_blocks(&self, limit: usize) -> Result<Vec<Block>, IndexerError>;

    /// Blocks with `from <= height <= to`, lowest first.
    async fn blocks_in_range(&self, from: u64, to: u64) -> Result<Vec<Block>, IndexerError>;

    async fn transaction(&self, id: &str) -> Result<Option<Transaction>, IndexerError>;

    async fn has_transaction(&self, id: &str) -> Result<bool, IndexerError>;

    async fn wallet(&self, address: &str) -> Result<Option<Wallet>, IndexerError>;

    /// Create a zero-balance wallet for `address` if none exists.
    ///
    /// No-op for an empty address. Idempotent.
    async fn ensure_wallet(&self, address: &str) -> Result<(), IndexerError>;

    /// Atomically apply one height's worth of records and balance effects.
    ///
    /// - wallets are ensured for every touched address before any effect
    /// - effects whose key was applied before are skipped
    /// - transactions whose id is already stored are skipped
    /// - re-committing a stored height with the same block id is a no-op;
    ///   a different id at that height is a `Storage` conflict
    async fn commit_block(&self, commit: BlockCommit) -> Result<(), IndexerError>;

    async fn block_count(&self) -> Result<u64, IndexerError>;

    async fn transaction_count(&self) -> Result<u64, IndexerError>;
}
