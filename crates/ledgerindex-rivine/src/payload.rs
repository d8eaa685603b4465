//! Raw payloads returned by the Rivine explorer API.
//!
//! Only the fields the ledger consumes are modelled. Lists the node may send
//! as `null` are `Option<Vec<_>>`; use [`items`] to iterate them.

use serde::{Deserialize, Serialize};

/// Treat an absent or `null` list as empty.
pub fn items<T>(list: &Option<Vec<T>>) -> &[T] {
    list.as_deref().unwrap_or(&[])
}

// ─── GET /explorer ────────────────────────────────────────────────────────────

/// Head summary from `GET /explorer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorerInfo {
    pub height: u64,
    #[serde(default)]
    pub blockid: Option<String>,
}

/// Current head height plus the full head block.
#[derive(Debug, Clone)]
pub struct HeadInfo {
    pub height: u64,
    pub block: ExplorerBlock,
}

// ─── GET /explorer/blocks/{height} ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockResponse {
    pub block: ExplorerBlock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorerBlock {
    pub blockid: String,
    pub height: u64,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub estimatedactivebs: Option<String>,
    #[serde(default)]
    pub minerpayoutids: Option<Vec<String>>,
    #[serde(default)]
    pub transactions: Option<Vec<TransactionRef>>,
    pub rawblock: RawBlock,
}

/// A transaction as listed inside a block; only the id is needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRef {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBlock {
    pub parentid: String,
    pub timestamp: u64,
    #[serde(default)]
    pub minerpayouts: Option<Vec<RawMinerPayout>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMinerPayout {
    pub value: String,
    #[serde(default)]
    pub unlockhash: Option<String>,
}

// ─── GET /explorer/hashes/{id} ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashResponse {
    #[serde(default)]
    pub hashtype: Option<String>,
    pub transaction: ExplorerTransaction,
}

/// A transaction with the outputs its inputs spend already resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorerTransaction {
    pub id: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub height: Option<u64>,
    pub rawtransaction: RawTransaction,
    /// Outputs spent by `coininputs`, index-aligned.
    #[serde(default)]
    pub coininputoutputs: Option<Vec<LockedValue>>,
    /// Outputs spent by `blockstakeinputs`, index-aligned.
    #[serde(default)]
    pub blockstakeinputoutputs: Option<Vec<LockedValue>>,
    #[serde(default)]
    pub coinoutputids: Option<Vec<String>>,
    #[serde(default)]
    pub blockstakeoutputids: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTransaction {
    #[serde(default)]
    pub version: Option<u8>,
    pub data: RawTransactionData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTransactionData {
    #[serde(default)]
    pub coininputs: Option<Vec<RawInput>>,
    #[serde(default)]
    pub coinoutputs: Option<Vec<LockedValue>>,
    #[serde(default)]
    pub blockstakeinputs: Option<Vec<RawInput>>,
    #[serde(default)]
    pub blockstakeoutputs: Option<Vec<LockedValue>>,
    #[serde(default)]
    pub minerfees: Option<Vec<String>>,
}

/// An input referencing the output it spends, with its spending proof.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawInput {
    pub parentid: String,
    /// v1 transactions.
    #[serde(default)]
    pub fulfillment: Option<Fulfillment>,
    /// Legacy v0 transactions.
    #[serde(default)]
    pub unlocker: Option<Unlocker>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fulfillment {
    #[serde(rename = "type", default)]
    pub kind: Option<u8>,
    #[serde(default)]
    pub data: Option<FulfillmentData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FulfillmentData {
    #[serde(default)]
    pub publickey: Option<String>,
    #[serde(default)]
    pub signature: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unlocker {
    #[serde(default)]
    pub condition: Option<UnlockerCondition>,
    #[serde(default)]
    pub fulfillment: Option<UnlockerFulfillment>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnlockerCondition {
    #[serde(default)]
    pub publickey: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnlockerFulfillment {
    #[serde(default)]
    pub signature: Option<String>,
}

/// A value locked to an address, either flat (`unlockhash`) or via a condition.
///
/// Used for coin/block-stake outputs and for the resolved outputs spent by inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockedValue {
    pub value: String,
    #[serde(default)]
    pub unlockhash: Option<String>,
    #[serde(default)]
    pub condition: Option<Condition>,
}

/// Rivine unlock condition. Conditions nest (e.g. a time lock wrapping an
/// unlock-hash condition).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type", default)]
    pub kind: Option<u8>,
    #[serde(default)]
    pub data: Option<ConditionData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConditionData {
    #[serde(default)]
    pub unlockhash: Option<String>,
    #[serde(default)]
    pub locktime: Option<u64>,
    #[serde(default)]
    pub condition: Option<Box<Condition>>,
}

impl Condition {
    /// The nested condition one level down, if any.
    pub fn inner(&self) -> Option<&Condition> {
        self.data.as_ref()?.condition.as_deref()
    }

    pub fn unlock_hash(&self) -> Option<&str> {
        self.data.as_ref()?.unlockhash.as_deref()
    }

    pub fn lock_time(&self) -> Option<u64> {
        self.data.as_ref()?.locktime
    }
}

// ─── GET /gateway ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayInfo {
    #[serde(default)]
    pub netaddress: Option<String>,
    #[serde(default)]
    pub peers: Option<Vec<Peer>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub netaddress: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub inbound: Option<bool>,
    #[serde(default)]
    pub local: Option<bool>,
}
