//! Ledger records produced by the indexer.
//!
//! Amounts are carried as `u128` (balances as `i128`) and serialized as
//! decimal strings so that high-denomination values survive JSON clients.

use serde::{Deserialize, Serialize};

// ─── Amount serialization ─────────────────────────────────────────────────────

/// Serde adapter: `u128` ⇄ decimal string.
pub mod amount {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &u128, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&v.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u128, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(D::Error::custom)
    }
}

/// Serde adapter: `i128` ⇄ decimal string.
pub mod signed_amount {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(v: &i128, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&v.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<i128, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(D::Error::custom)
    }
}

// ─── RateSnapshot ─────────────────────────────────────────────────────────────

/// Exchange rates captured when a block or transaction was ingested.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateSnapshot {
    pub btc_usd: Option<f64>,
    pub usd_eur: Option<f64>,
    pub tft_btc: Option<f64>,
    pub tft_usd: Option<f64>,
}

// ─── Block ────────────────────────────────────────────────────────────────────

/// A block-level reward paid to one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinerPayout {
    pub id: String,
    pub address: String,
    #[serde(with = "amount")]
    pub value: u128,
}

/// A persisted block. Created once per height, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Chain-native block id.
    pub id: String,
    pub height: u64,
    pub parent_id: String,
    /// Unix timestamp (seconds).
    pub timestamp: u64,
    #[serde(with = "amount")]
    pub difficulty: u128,
    /// Estimated active block stake.
    #[serde(with = "amount")]
    pub active_block_stake: u128,
    pub transaction_count: u32,
    /// Sum of all miner payouts in this block.
    #[serde(with = "amount")]
    pub miner_reward: u128,
    pub miner_payouts: Vec<MinerPayout>,
    pub rates: RateSnapshot,
}

impl Block {
    /// Returns the block reference embedded into its transactions.
    pub fn reference(&self) -> BlockRef {
        BlockRef {
            height: self.height,
            id: self.id.clone(),
            timestamp: self.timestamp,
        }
    }
}

// ─── Transaction ──────────────────────────────────────────────────────────────

/// Where a transaction was included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockRef {
    pub height: u64,
    pub id: String,
    pub timestamp: u64,
}

/// A spent output, resolved to the address and value it carried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Input {
    /// Id of the output being spent.
    pub parent_id: String,
    pub address: String,
    #[serde(with = "amount")]
    pub value: u128,
    /// Condition type of the spent output.
    pub unlock_type: Option<u8>,
    /// Present only when the raw input carries a fulfillment.
    pub public_key: Option<String>,
    pub signature: Option<String>,
}

/// A newly created output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Output {
    pub id: String,
    pub address: String,
    #[serde(with = "amount")]
    pub value: u128,
    pub lock_time: Option<u64>,
}

/// A persisted transaction. Created once when first observed in a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub parent_id: Option<String>,
    pub block: BlockRef,
    pub coin_inputs: Vec<Input>,
    pub coin_outputs: Vec<Output>,
    pub block_stake_inputs: Vec<Input>,
    pub block_stake_outputs: Vec<Output>,
    #[serde(with = "amount")]
    pub miner_fees: u128,
    pub rates: RateSnapshot,
}

// ─── Wallet ───────────────────────────────────────────────────────────────────

/// Running coin balance for one address.
///
/// `balance` = Σ coin-output and miner-payout credits − Σ coin-input debits.
/// Block-stake movements never touch it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub address: String,
    #[serde(with = "signed_amount")]
    pub balance: i128,
    /// Σ of all credits ever applied.
    #[serde(with = "amount")]
    pub total_received: u128,
}

impl Wallet {
    /// A freshly observed address with nothing applied yet.
    pub fn empty(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            balance: 0,
            total_received: 0,
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
