//! End-to-end sync tests against a scripted node.
//!
//! The scripted node serves blocks and transactions from JSON shaped like the
//! Rivine explorer API, and can grow its head, fail transiently, or hang.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use ledgerindex_core::error::IndexerError;
use ledgerindex_core::indexer::IndexerState;
use ledgerindex_core::rates::{FixedRateProvider, RateProvider};
use ledgerindex_core::retry::RetryConfig;
use ledgerindex_core::snapshot::{
    block_key, MemorySnapshotCache, SnapshotCache, SupplyStats, LAST_BLOCKS_KEY, STATS_KEY,
};
use ledgerindex_core::store::LedgerStore;
use ledgerindex_core::types::{Block, RateSnapshot};
use ledgerindex_rivine::payload::{BlockResponse, HashResponse, HeadInfo, Peer};
use ledgerindex_rivine::{ChainClient, SyncEngine, SyncEngineBuilder};
use ledgerindex_storage::InMemoryLedgerStore;

// ─── Scripted node ────────────────────────────────────────────────────────────

#[derive(Default)]
struct ScriptedChain {
    blocks: Mutex<Vec<Value>>,
    txs: Mutex<HashMap<String, Value>>,
    /// Blocks appended one per `head()` call, after the head is read.
    pending: Mutex<VecDeque<Value>>,
    /// Remaining transient failures per height.
    flaky: Mutex<HashMap<u64, u32>>,
    hang_at: Mutex<Option<u64>>,
    /// Blocks returned under a different height than requested.
    mislabeled: Mutex<HashSet<u64>>,
    block_calls: AtomicUsize,
    tx_calls: AtomicUsize,
}

impl ScriptedChain {
    fn new(blocks: Vec<Value>, txs: Vec<Value>) -> Self {
        let chain = Self::default();
        *chain.blocks.lock().unwrap() = blocks;
        for tx in txs {
            chain.add_tx(tx);
        }
        chain
    }

    fn add_tx(&self, tx: Value) {
        let id = tx["transaction"]["id"].as_str().unwrap().to_string();
        self.txs.lock().unwrap().insert(id, tx);
    }

    fn push_block(&self, block: Value) {
        self.blocks.lock().unwrap().push(block);
    }

    fn grow_on_head_reads(&self, blocks: Vec<Value>) {
        self.pending.lock().unwrap().extend(blocks);
    }

    fn fail_block(&self, height: u64, times: u32) {
        self.flaky.lock().unwrap().insert(height, times);
    }

    fn block_json(&self, height: u64) -> Result<Value, IndexerError> {
        self.blocks
            .lock()
            .unwrap()
            .get(height as usize)
            .cloned()
            .ok_or_else(|| IndexerError::Unavailable(format!("no block at {height}")))
    }
}

#[async_trait]
impl ChainClient for ScriptedChain {
    async fn head(&self) -> Result<HeadInfo, IndexerError> {
        let height = (self.blocks.lock().unwrap().len() as u64).saturating_sub(1);
        let block: BlockResponse = serde_json::from_value(self.block_json(height)?).unwrap();
        if let Some(next) = self.pending.lock().unwrap().pop_front() {
            self.push_block(next);
        }
        Ok(HeadInfo {
            height,
            block: block.block,
        })
    }

    async fn block_at(&self, height: u64) -> Result<BlockResponse, IndexerError> {
        self.block_calls.fetch_add(1, Ordering::SeqCst);
        let hang = *self.hang_at.lock().unwrap() == Some(height);
        if hang {
            std::future::pending::<()>().await;
        }
        {
            let mut flaky = self.flaky.lock().unwrap();
            if let Some(left) = flaky.get_mut(&height) {
                if *left > 0 {
                    *left -= 1;
                    return Err(IndexerError::Unavailable("connection refused".into()));
                }
            }
        }
        let mut value = self.block_json(height)?;
        if self.mislabeled.lock().unwrap().contains(&height) {
            value["block"]["height"] = json!(height + 100);
        }
        Ok(serde_json::from_value(value).unwrap())
    }

    async fn transaction(&self, id: &str) -> Result<HashResponse, IndexerError> {
        self.tx_calls.fetch_add(1, Ordering::SeqCst);
        let value = self
            .txs
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| IndexerError::Unavailable(format!("unknown hash {id}")))?;
        serde_json::from_value(value).map_err(|e| IndexerError::malformed(id, e.to_string()))
    }

    async fn peers(&self) -> Result<Vec<Peer>, IndexerError> {
        Ok(Vec::new())
    }
}

// ─── Payload builders ─────────────────────────────────────────────────────────

fn block(height: u64, payouts: &[(&str, &str)], txs: &[&str]) -> Value {
    let ids: Vec<String> = (0..payouts.len())
        .map(|i| format!("payout-{height}-{i}"))
        .collect();
    let raw_payouts: Vec<Value> = payouts
        .iter()
        .map(|(address, value)| json!({ "value": value, "unlockhash": address }))
        .collect();
    let parent = if height == 0 {
        "0".repeat(64)
    } else {
        format!("block-{}", height - 1)
    };
    json!({
        "block": {
            "blockid": format!("block-{height}"),
            "height": height,
            "difficulty": "1000",
            "estimatedactivebs": "3000",
            "minerpayoutids": ids,
            "transactions": txs.iter().map(|id| json!({ "id": id })).collect::<Vec<_>>(),
            "rawblock": {
                "parentid": parent,
                "timestamp": 1_522_000_000 + height * 120,
                "minerpayouts": raw_payouts
            }
        }
    })
}

fn unlock(address: &str, value: &str) -> Value {
    json!({ "value": value, "condition": { "type": 1, "data": { "unlockhash": address } } })
}

/// Coin transfer. `inputs` are `(spent output id, owner, value)`.
fn transfer(id: &str, inputs: &[(&str, &str, &str)], outputs: &[(&str, &str)]) -> Value {
    json!({
        "hashtype": "transactionid",
        "transaction": {
            "id": id,
            "rawtransaction": {
                "version": 1,
                "data": {
                    "coininputs": inputs.iter().map(|(parent, _, _)| json!({
                        "parentid": parent,
                        "fulfillment": {
                            "type": 1,
                            "data": { "publickey": "ed25519:aa", "signature": "bb" }
                        }
                    })).collect::<Vec<_>>(),
                    "coinoutputs": outputs.iter().map(|(a, v)| unlock(a, v)).collect::<Vec<_>>(),
                    "minerfees": ["1"]
                }
            },
            "coininputoutputs": inputs.iter().map(|(_, a, v)| unlock(a, v)).collect::<Vec<_>>(),
            "coinoutputids": (0..outputs.len()).map(|i| format!("{id}-out-{i}")).collect::<Vec<_>>()
        }
    })
}

/// Head at 2: payout of 100 to A at 0, A sends 50 to B at 1, empty block 2.
fn three_block_chain() -> ScriptedChain {
    ScriptedChain::new(
        vec![
            block(0, &[("A", "100")], &[]),
            block(1, &[], &["tx-1"]),
            block(2, &[], &[]),
        ],
        vec![transfer("tx-1", &[("payout-0-0", "A", "50")], &[("B", "50")])],
    )
}

fn fast() -> SyncEngineBuilder {
    SyncEngineBuilder::new()
        .call_timeout_ms(1_000)
        .pass_retry(RetryConfig::immediate(3))
        .catchup_backoff(RetryConfig::immediate(16))
}

struct Harness {
    chain: Arc<ScriptedChain>,
    store: Arc<InMemoryLedgerStore>,
    cache: Arc<MemorySnapshotCache>,
    engine: SyncEngine,
}

fn harness(chain: ScriptedChain, builder: SyncEngineBuilder) -> Harness {
    let chain = Arc::new(chain);
    let store = Arc::new(InMemoryLedgerStore::new());
    let cache = Arc::new(MemorySnapshotCache::new());
    let engine = builder
        .store(store.clone())
        .cache(cache.clone())
        .build_shared(chain.clone());
    Harness {
        chain,
        store,
        cache,
        engine,
    }
}

async fn balance(store: &InMemoryLedgerStore, address: &str) -> i128 {
    store.wallet(address).await.unwrap().unwrap().balance
}

async fn all_blocks(store: &InMemoryLedgerStore) -> Vec<Block> {
    let last = store.last_height().await.unwrap().unwrap();
    store.blocks_in_range(0, last).await.unwrap()
}

// ─── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn payout_then_transfer() {
    let h = harness(three_block_chain(), fast());
    let outcome = h.engine.sync_to_head().await.unwrap();

    assert_eq!(outcome.head, 2);
    assert_eq!(outcome.committed, Some(2));
    assert_eq!(outcome.blocks_indexed, 3);
    assert_eq!(outcome.transactions_indexed, 1);
    assert!(outcome.converged);

    assert_eq!(balance(&h.store, "A").await, 50);
    assert_eq!(balance(&h.store, "B").await, 50);
    assert_eq!(h.store.block_count().await.unwrap(), 3);
    assert_eq!(h.store.transaction_count().await.unwrap(), 1);

    let tx = h.store.transaction("tx-1").await.unwrap().unwrap();
    assert_eq!(tx.block.height, 1);
    assert_eq!(tx.block.id, "block-1");
    assert_eq!(tx.coin_inputs[0].address, "A");
    assert_eq!(tx.coin_inputs[0].public_key.as_deref(), Some("ed25519:aa"));
    assert_eq!(tx.coin_outputs[0].id, "tx-1-out-0");
    assert_eq!(tx.miner_fees, 1);

    let status = h.engine.status();
    assert!(status.synced);
    assert_eq!(status.synced_height, Some(2));
    assert_eq!(status.state, IndexerState::Synced);
}

#[tokio::test]
async fn repeated_transaction_ids_are_applied_once() {
    let chain = ScriptedChain::new(
        vec![
            block(0, &[("A", "100")], &[]),
            block(1, &[], &["tx-1", "tx-1"]),
            block(2, &[], &["tx-1"]),
        ],
        vec![transfer("tx-1", &[("payout-0-0", "A", "50")], &[("B", "50")])],
    );
    let h = harness(chain, fast());
    let outcome = h.engine.sync_to_head().await.unwrap();

    assert_eq!(outcome.transactions_indexed, 1);
    assert_eq!(h.chain.tx_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.store.transaction_count().await.unwrap(), 1);
    let tx = h.store.transaction("tx-1").await.unwrap().unwrap();
    assert_eq!(tx.block.height, 1);
    assert_eq!(balance(&h.store, "A").await, 50);
    assert_eq!(balance(&h.store, "B").await, 50);
    assert_eq!(h.store.wallet("B").await.unwrap().unwrap().total_received, 50);
}

#[tokio::test]
async fn output_spent_in_the_same_block() {
    let chain = ScriptedChain::new(
        vec![block(0, &[("A", "100")], &[]), block(1, &[], &["X", "Y"])],
        vec![
            transfer("X", &[("payout-0-0", "A", "100")], &[("B", "100")]),
            transfer("Y", &[("X-out-0", "B", "100")], &[("C", "100")]),
        ],
    );
    let h = harness(chain, fast());
    let outcome = h.engine.sync_to_head().await.unwrap();

    assert_eq!(outcome.transactions_indexed, 2);
    let b = h.store.wallet("B").await.unwrap().unwrap();
    assert_eq!(b.balance, 0);
    assert_eq!(b.total_received, 100);
    assert_eq!(balance(&h.store, "C").await, 100);
    for address in ["A", "B", "C"] {
        assert!(balance(&h.store, address).await >= 0, "{address} went negative");
    }
    let y = h.store.transaction("Y").await.unwrap().unwrap();
    assert_eq!(y.coin_inputs[0].parent_id, "X-out-0");
    assert_eq!(y.block.height, 1);
}

#[tokio::test]
async fn resync_without_new_blocks_changes_nothing() {
    let h = harness(three_block_chain(), fast());
    h.engine.sync_to_head().await.unwrap();

    let blocks = all_blocks(&h.store).await;
    let tx = h.store.transaction("tx-1").await.unwrap();
    let wallets = h.store.wallets();
    let effects = h.store.applied_effect_count();
    let tx_calls = h.chain.tx_calls.load(Ordering::SeqCst);

    let again = h.engine.sync_to_head().await.unwrap();
    assert_eq!(again.blocks_indexed, 0);
    assert_eq!(again.transactions_indexed, 0);

    assert_eq!(all_blocks(&h.store).await, blocks);
    assert_eq!(h.store.transaction("tx-1").await.unwrap(), tx);
    assert_eq!(h.store.wallets(), wallets);
    assert_eq!(h.store.applied_effect_count(), effects);
    assert_eq!(h.chain.tx_calls.load(Ordering::SeqCst), tx_calls);
}

#[tokio::test]
async fn balances_equal_credits_minus_debits() {
    let chain = ScriptedChain::new(
        vec![
            block(0, &[("A", "1000")], &[]),
            block(1, &[("B", "10")], &["t1"]),
            block(2, &[("A", "10")], &["t2", "t3"]),
            block(3, &[], &[]),
        ],
        vec![
            transfer("t1", &[("payout-0-0", "A", "1000")], &[("B", "300"), ("A", "700")]),
            transfer("t2", &[("t1-out-0", "B", "300")], &[("C", "120"), ("B", "180")]),
            transfer("t3", &[("t1-out-1", "A", "700")], &[("C", "700")]),
        ],
    );
    let h = harness(chain, fast());
    h.engine.sync_to_head().await.unwrap();

    // A: +1000 -1000 +700 +10 -700
    assert_eq!(balance(&h.store, "A").await, 10);
    // B: +300 +10 -300 +180
    assert_eq!(balance(&h.store, "B").await, 190);
    // C: +120 +700
    assert_eq!(balance(&h.store, "C").await, 820);

    let a = h.store.wallet("A").await.unwrap().unwrap();
    assert_eq!(a.total_received, 1000 + 700 + 10);

    let total: i128 = h.store.wallets().iter().map(|w| w.balance).sum();
    assert_eq!(total, 1020, "supply equals the sum of miner payouts");
}

#[tokio::test]
async fn heights_are_gap_free_from_genesis() {
    let blocks = (0..12).map(|h| block(h, &[("M", "1")], &[])).collect();
    let h = harness(ScriptedChain::new(blocks, vec![]), fast());
    h.engine.sync_to_head().await.unwrap();

    let heights: Vec<u64> = all_blocks(&h.store).await.iter().map(|b| b.height).collect();
    assert_eq!(heights, (0..12).collect::<Vec<_>>());
    assert_eq!(balance(&h.store, "M").await, 12);

    let stored = h.store.block_by_height(5).await.unwrap().unwrap();
    assert_eq!(stored.parent_id, "block-4");
    assert_eq!(stored.miner_reward, 1);
    assert_eq!(stored.difficulty, 1000);
}

#[tokio::test]
async fn catches_up_while_head_grows() {
    let chain = three_block_chain();
    chain.grow_on_head_reads(vec![
        block(3, &[("A", "5")], &[]),
        block(4, &[("A", "5")], &[]),
    ]);
    let h = harness(chain, fast());
    let outcome = h.engine.sync_to_head().await.unwrap();

    assert_eq!(outcome.head, 4);
    assert_eq!(outcome.blocks_indexed, 5);
    assert!(outcome.rounds >= 2);
    assert!(outcome.converged);
    assert_eq!(h.store.last_height().await.unwrap(), Some(4));
    assert_eq!(balance(&h.store, "A").await, 60);
    assert_eq!(h.engine.status().synced_height, Some(4));
}

#[tokio::test]
async fn catch_up_is_bounded() {
    let chain = three_block_chain();
    chain.grow_on_head_reads((3..20).map(|h| block(h, &[], &[])).collect());
    let h = harness(chain, fast().max_catchup_rounds(2));
    let outcome = h.engine.sync_to_head().await.unwrap();

    assert!(!outcome.converged);
    assert_eq!(outcome.rounds, 2);
    assert!(!h.engine.status().synced);
    // Everything up to the last head read was still committed.
    assert_eq!(h.store.last_height().await.unwrap(), Some(outcome.head - 1));
    assert_eq!(outcome.committed, Some(outcome.head - 1));
}

#[tokio::test]
async fn resumes_from_stored_height() {
    let chain = three_block_chain();
    let h = harness(chain, fast());
    h.engine.sync_to_head().await.unwrap();
    let calls = h.chain.block_calls.load(Ordering::SeqCst);

    h.chain.push_block(block(3, &[("B", "7")], &[]));
    let outcome = h.engine.sync_to_head().await.unwrap();

    assert_eq!(outcome.blocks_indexed, 1);
    assert_eq!(h.chain.block_calls.load(Ordering::SeqCst), calls + 1);
    assert_eq!(balance(&h.store, "B").await, 57);
}

#[tokio::test]
async fn start_height_skips_earlier_blocks() {
    let blocks = (0..5).map(|h| block(h, &[("M", "1")], &[])).collect();
    let h = harness(ScriptedChain::new(blocks, vec![]), fast().start_height(3));
    let outcome = h.engine.sync_to_head().await.unwrap();

    assert_eq!(outcome.blocks_indexed, 2);
    assert!(h.store.block_by_height(2).await.unwrap().is_none());
    assert_eq!(balance(&h.store, "M").await, 2);
}

// ─── Failures ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn transient_failure_retries_the_pass() {
    let chain = three_block_chain();
    chain.fail_block(1, 2);
    let h = harness(chain, fast());
    let outcome = h.engine.sync_to_head().await.unwrap();

    assert_eq!(outcome.head, 2);
    assert_eq!(balance(&h.store, "A").await, 50);
    assert_eq!(balance(&h.store, "B").await, 50);
    assert_eq!(h.store.block_count().await.unwrap(), 3);
}

#[tokio::test]
async fn exhausted_retries_surface_the_error() {
    let chain = three_block_chain();
    chain.fail_block(1, 10);
    let h = harness(chain, fast().pass_retry(RetryConfig::immediate(2)));
    let err = h.engine.sync_to_head().await.unwrap_err();

    assert!(matches!(err, IndexerError::Unavailable(_)), "{err}");
    assert_eq!(h.store.last_height().await.unwrap(), Some(0));
    assert_eq!(balance(&h.store, "A").await, 100);
    assert_eq!(h.engine.status().state, IndexerState::Error);
    assert!(!h.engine.status().synced);
}

#[tokio::test]
async fn malformed_transaction_stops_without_advancing() {
    let chain = three_block_chain();
    let mut bad = transfer("tx-1", &[("payout-0-0", "A", "50")], &[("B", "50")]);
    bad["transaction"]["rawtransaction"]["data"]["coinoutputs"][0]["value"] = json!("fifty");
    chain.add_tx(bad);
    let h = harness(chain, fast());

    let err = h.engine.sync_to_head().await.unwrap_err();
    assert!(matches!(err, IndexerError::MalformedPayload { .. }), "{err}");
    // Height 1 is not committed: no transaction, no debit on A, no wallet for B.
    assert_eq!(h.store.last_height().await.unwrap(), Some(0));
    assert!(!h.store.has_transaction("tx-1").await.unwrap());
    assert_eq!(balance(&h.store, "A").await, 100);
    assert!(h.store.wallet("B").await.unwrap().is_none());
    // Not retried.
    assert_eq!(h.chain.tx_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn block_at_wrong_height_is_malformed() {
    let chain = three_block_chain();
    chain.mislabeled.lock().unwrap().insert(2);
    let h = harness(chain, fast());

    let err = h.engine.sync_to_head().await.unwrap_err();
    assert!(matches!(err, IndexerError::MalformedPayload { .. }), "{err}");
    assert_eq!(h.store.last_height().await.unwrap(), Some(1));
}

#[tokio::test]
async fn hung_call_times_out() {
    let chain = three_block_chain();
    *chain.hang_at.lock().unwrap() = Some(1);
    let h = harness(
        chain,
        fast().call_timeout_ms(20).pass_retry(RetryConfig::immediate(1)),
    );

    let err = h.engine.sync_to_head().await.unwrap_err();
    assert!(matches!(err, IndexerError::Timeout { ms: 20 }), "{err}");
    assert_eq!(h.store.last_height().await.unwrap(), Some(0));
}

struct BrokenRates;

#[async_trait]
impl RateProvider for BrokenRates {
    async fn snapshot(&self) -> Result<RateSnapshot, IndexerError> {
        Err(IndexerError::Unavailable("rates feed down".into()))
    }
}

#[tokio::test]
async fn rate_failure_records_empty_rates() {
    let h = harness(three_block_chain(), fast().rates(Arc::new(BrokenRates)));
    h.engine.sync_to_head().await.unwrap();

    let block = h.store.block_by_height(1).await.unwrap().unwrap();
    assert_eq!(block.rates, RateSnapshot::default());
}

#[tokio::test]
async fn rates_are_stamped_on_blocks_and_transactions() {
    let rates = RateSnapshot {
        tft_usd: Some(0.05),
        ..Default::default()
    };
    let h = harness(
        three_block_chain(),
        fast().rates(Arc::new(FixedRateProvider::new(rates.clone()))),
    );
    h.engine.sync_to_head().await.unwrap();

    assert_eq!(h.store.block_by_height(0).await.unwrap().unwrap().rates, rates);
    assert_eq!(h.store.transaction("tx-1").await.unwrap().unwrap().rates, rates);
}

// ─── Freshness trigger & snapshots ────────────────────────────────────────────

#[tokio::test]
async fn trigger_is_noop_before_first_pass() {
    let h = harness(three_block_chain(), fast());
    let signal = h.engine.ensure_synced_to(2).await.unwrap();

    assert!(!signal.triggered_refresh);
    assert_eq!(h.chain.block_calls.load(Ordering::SeqCst), 0);
    assert!(h.store.last_height().await.unwrap().is_none());
}

#[tokio::test]
async fn trigger_is_noop_at_synced_height() {
    let h = harness(three_block_chain(), fast());
    h.engine.sync_to_head().await.unwrap();

    let signal = h.engine.ensure_synced_to(2).await.unwrap();
    assert!(!signal.triggered_refresh);
    assert!(h.cache.get_field(LAST_BLOCKS_KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn trigger_syncs_and_publishes_recent_blocks() {
    let h = harness(three_block_chain(), fast().recent_blocks(2));
    h.engine.sync_to_head().await.unwrap();
    h.chain.push_block(block(3, &[("A", "5")], &[]));

    let signal = h.engine.ensure_synced_to(3).await.unwrap();
    assert!(signal.triggered_refresh);
    assert_eq!(h.store.last_height().await.unwrap(), Some(3));
    assert_eq!(h.engine.status().synced_height, Some(3));

    let recent: Vec<Block> =
        serde_json::from_value(h.cache.get_field(LAST_BLOCKS_KEY).await.unwrap().unwrap())
            .unwrap();
    let heights: Vec<u64> = recent.iter().map(|b| b.height).collect();
    assert_eq!(heights, vec![3, 2]);

    // No prior aggregate, so none is created.
    assert!(h.cache.get_field(STATS_KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn trigger_advances_seeded_stats() {
    let h = harness(three_block_chain(), fast());
    h.engine.sync_to_head().await.unwrap();

    let seed = SupplyStats {
        max_supply: 100,
        height: 2,
        last_miner_reward: 0,
    };
    h.cache
        .set_field(STATS_KEY, serde_json::to_value(&seed).unwrap(), 300)
        .await
        .unwrap();
    h.chain.push_block(block(3, &[("A", "7"), ("B", "3")], &[]));
    h.chain.push_block(block(4, &[("A", "10")], &[]));

    assert!(h.engine.ensure_synced_to(4).await.unwrap().triggered_refresh);

    let stats: SupplyStats =
        serde_json::from_value(h.cache.get_field(STATS_KEY).await.unwrap().unwrap()).unwrap();
    assert_eq!(stats.max_supply, 120);
    assert_eq!(stats.height, 4);
    assert_eq!(stats.last_miner_reward, 10);
}

#[tokio::test]
async fn committed_blocks_are_cached() {
    let h = harness(three_block_chain(), fast());
    h.engine.sync_to_head().await.unwrap();

    for height in 0..=2 {
        assert!(h.cache.get_field(&block_key(height)).await.unwrap().is_some());
    }
}

#[tokio::test]
async fn trigger_skips_while_pass_in_flight() {
    let h = harness(
        three_block_chain(),
        fast().call_timeout_ms(300).pass_retry(RetryConfig::immediate(0)),
    );
    h.engine.sync_to_head().await.unwrap();

    // Park the next pass on a hung call, then ask for a refresh concurrently.
    h.chain.push_block(block(3, &[], &[]));
    *h.chain.hang_at.lock().unwrap() = Some(3);
    let engine = &h.engine;
    let (first, second) = tokio::join!(engine.sync_to_head(), async {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        engine.ensure_synced_to(3).await
    });

    assert!(!second.unwrap().triggered_refresh);
    assert!(matches!(first, Err(IndexerError::Timeout { ms: 300 })));
    assert_eq!(h.store.last_height().await.unwrap(), Some(2));
}
