//! Payload transform: explorer JSON to ledger records and balance effects.
//!
//! A block becomes a [`BlockCommit`] carrying its miner-payout credits; each
//! new transaction is folded into that commit with its coin debits/credits.
//! Block-stake inputs and outputs are recorded and their addresses get
//! wallets, but they never move a coin balance.

use ledgerindex_core::error::IndexerError;
use ledgerindex_core::store::{BalanceEffect, BlockCommit};
use ledgerindex_core::types::{Block, Input, MinerPayout, Output, RateSnapshot, Transaction};

use crate::address::resolve_address;
use crate::payload::{items, ExplorerBlock, ExplorerTransaction, LockedValue, RawInput};

/// Parse a decimal amount string.
pub fn parse_amount(context: &str, field: &str, raw: &str) -> Result<u128, IndexerError> {
    raw.trim()
        .parse::<u128>()
        .map_err(|e| IndexerError::malformed(context, format!("{field} {raw:?}: {e}")))
}

fn required<'a>(
    context: &str,
    field: &str,
    value: &'a Option<String>,
) -> Result<&'a str, IndexerError> {
    value
        .as_deref()
        .ok_or_else(|| IndexerError::malformed(context, format!("missing {field}")))
}

// ─── Blocks ───────────────────────────────────────────────────────────────────

/// Build the commit for `raw`: the Block record plus its miner-payout credits.
///
/// Transactions are added afterwards with [`apply_transaction`].
pub fn block_commit(raw: &ExplorerBlock, rates: RateSnapshot) -> Result<BlockCommit, IndexerError> {
    let context = format!("block {}", raw.height);

    let payout_ids = items(&raw.minerpayoutids);
    let payouts = items(&raw.rawblock.minerpayouts);
    if payouts.len() < payout_ids.len() {
        return Err(IndexerError::malformed(
            &context,
            format!(
                "{} miner payout ids but {} payouts",
                payout_ids.len(),
                payouts.len()
            ),
        ));
    }

    let mut miner_payouts = Vec::with_capacity(payout_ids.len());
    let mut miner_reward: u128 = 0;
    for (id, payout) in payout_ids.iter().zip(payouts) {
        let address = payout
            .unlockhash
            .as_deref()
            .filter(|a| !a.is_empty())
            .ok_or_else(|| IndexerError::malformed(&context, format!("payout {id} has no unlockhash")))?;
        let value = parse_amount(&context, "payout value", &payout.value)?;
        miner_reward = miner_reward.checked_add(value).ok_or_else(|| {
            IndexerError::malformed(&context, "miner reward overflows")
        })?;
        miner_payouts.push(MinerPayout {
            id: id.clone(),
            address: address.to_string(),
            value,
        });
    }

    let block = Block {
        id: raw.blockid.clone(),
        height: raw.height,
        parent_id: raw.rawblock.parentid.clone(),
        timestamp: raw.rawblock.timestamp,
        difficulty: parse_amount(
            &context,
            "difficulty",
            required(&context, "difficulty", &raw.difficulty)?,
        )?,
        active_block_stake: parse_amount(
            &context,
            "estimatedactivebs",
            required(&context, "estimatedactivebs", &raw.estimatedactivebs)?,
        )?,
        transaction_count: items(&raw.transactions).len() as u32,
        miner_reward,
        miner_payouts,
        rates,
    };

    let effects: Vec<_> = block
        .miner_payouts
        .iter()
        .map(|p| BalanceEffect::payout(&p.id, &p.address, p.value))
        .collect();
    let mut commit = BlockCommit::new(block);
    for effect in effects {
        commit.apply(effect);
    }
    Ok(commit)
}

// ─── Transactions ─────────────────────────────────────────────────────────────

/// Public key and signature from a direct fulfillment, else from an unlocker.
fn spend_proof(raw: &RawInput) -> (Option<String>, Option<String>) {
    if let Some(f) = &raw.fulfillment {
        let data = f.data.clone().unwrap_or_default();
        return (data.publickey, data.signature);
    }
    if let Some(unlocker) = &raw.unlocker {
        if let Some(fulfillment) = &unlocker.fulfillment {
            let public_key = unlocker.condition.as_ref().and_then(|c| c.publickey.clone());
            return (public_key, fulfillment.signature.clone());
        }
    }
    (None, None)
}

fn parse_input(
    context: &str,
    kind: &str,
    raw: &RawInput,
    spent: Option<&LockedValue>,
) -> Result<Input, IndexerError> {
    let spent = spent.ok_or_else(|| {
        IndexerError::malformed(context, format!("{kind} input {} has no resolved output", raw.parentid))
    })?;
    let (public_key, signature) = spend_proof(raw);
    Ok(Input {
        parent_id: raw.parentid.clone(),
        address: resolve_address(spent).unwrap_or_default().to_string(),
        value: parse_amount(context, &format!("{kind} input value"), &spent.value)?,
        unlock_type: spent.condition.as_ref().and_then(|c| c.kind),
        public_key,
        signature,
    })
}

fn parse_output(
    context: &str,
    kind: &str,
    raw: &LockedValue,
    id: Option<&String>,
) -> Result<Output, IndexerError> {
    let id = id.ok_or_else(|| IndexerError::malformed(context, format!("missing {kind} output id")))?;
    Ok(Output {
        id: id.clone(),
        address: resolve_address(raw).unwrap_or_default().to_string(),
        value: parse_amount(context, &format!("{kind} output value"), &raw.value)?,
        lock_time: raw.condition.as_ref().and_then(|c| c.lock_time()),
    })
}

fn require_address(context: &str, kind: &str, address: &str) -> Result<(), IndexerError> {
    if address.is_empty() {
        return Err(IndexerError::malformed(
            context,
            format!("{kind} does not resolve to an address"),
        ));
    }
    Ok(())
}

/// Parse `raw` and fold it into `commit`.
///
/// Order within a transaction: block-stake inputs, coin inputs (debits),
/// block-stake outputs, coin outputs (credits).
pub fn apply_transaction(
    commit: &mut BlockCommit,
    raw: &ExplorerTransaction,
    rates: RateSnapshot,
) -> Result<(), IndexerError> {
    let context = format!("transaction {}", raw.id);
    let data = &raw.rawtransaction.data;

    let mut block_stake_inputs = Vec::new();
    for (i, input) in items(&data.blockstakeinputs).iter().enumerate() {
        let parsed = parse_input(
            &context,
            "block-stake",
            input,
            items(&raw.blockstakeinputoutputs).get(i),
        )?;
        commit.touch(&parsed.address);
        block_stake_inputs.push(parsed);
    }

    let mut coin_inputs = Vec::new();
    for (i, input) in items(&data.coininputs).iter().enumerate() {
        let parsed = parse_input(&context, "coin", input, items(&raw.coininputoutputs).get(i))?;
        require_address(&context, "coin input", &parsed.address)?;
        commit.apply(BalanceEffect::coin_input(
            &parsed.parent_id,
            &parsed.address,
            parsed.value,
        ));
        coin_inputs.push(parsed);
    }

    let mut block_stake_outputs = Vec::new();
    for (i, output) in items(&data.blockstakeoutputs).iter().enumerate() {
        let parsed = parse_output(
            &context,
            "block-stake",
            output,
            items(&raw.blockstakeoutputids).get(i),
        )?;
        commit.touch(&parsed.address);
        block_stake_outputs.push(parsed);
    }

    let mut coin_outputs = Vec::new();
    for (i, output) in items(&data.coinoutputs).iter().enumerate() {
        let parsed = parse_output(&context, "coin", output, items(&raw.coinoutputids).get(i))?;
        require_address(&context, "coin output", &parsed.address)?;
        commit.apply(BalanceEffect::coin_output(
            &parsed.id,
            &parsed.address,
            parsed.value,
        ));
        coin_outputs.push(parsed);
    }

    let mut miner_fees: u128 = 0;
    for fee in items(&data.minerfees) {
        miner_fees = miner_fees
            .checked_add(parse_amount(&context, "miner fee", fee)?)
            .ok_or_else(|| IndexerError::malformed(&context, "miner fees overflow"))?;
    }

    let transaction = Transaction {
        id: raw.id.clone(),
        parent_id: raw.parent.clone().filter(|p| !p.is_empty()),
        block: commit.block.reference(),
        coin_inputs,
        coin_outputs,
        block_stake_inputs,
        block_stake_outputs,
        miner_fees,
        rates,
    };
    commit.transactions.push(transaction);
    Ok(())
}
