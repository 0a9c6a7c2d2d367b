//! Transaction validation: structural checks and input/fee verification

use crate::amount::{checked_money_add, checked_money_sum, money_range};
use crate::coins::{CoinsView, CoinsViewOverlay};
use crate::constants::*;
use crate::demurrage::get_time_adjusted_value;
use crate::error::{ConsensusError, Result, TxValidationError, TxValidationResult};
use crate::params::{ConsensusParams, LockTimeFlags, RuleSet};
use crate::serialize::serialize_transaction;
use crate::types::*;
use std::collections::BTreeSet;

pub type TxResult<T> = std::result::Result<T, TxValidationError>;

/// CheckTransaction: 𝒯𝒳 × RuleSet → {valid, invalid}
///
/// Context-free checks. A transaction tx = (v, ins, outs, lt, lh) is valid iff:
/// 1. |ins| > 0, and |outs| > 0 unless PROTOCOL_CLEANUP is active
/// 2. |tx without witness| × 4 ≤ W_max
/// 3. ∀o ∈ outs: 0 ≤ o.value ≤ M_max, and Σ o.value ≤ M_max
/// 4. No two inputs share a prevout
/// 5. Coinbase: 2 ≤ |scriptSig| ≤ 100 unless PROTOCOL_CLEANUP is active;
///    otherwise no prevout is null
pub fn check_transaction(tx: &Transaction, rules: RuleSet) -> TxResult<()> {
    let cleanup = rules.contains(RuleSet::PROTOCOL_CLEANUP);
    if tx.inputs.is_empty() {
        return Err(TxValidationError::consensus("bad-txns-vin-empty", "no inputs"));
    }
    if tx.outputs.is_empty() && !cleanup {
        return Err(TxValidationError::consensus("bad-txns-vout-empty", "no outputs"));
    }

    let stripped_size = serialize_transaction(tx, false).len();
    if stripped_size * WITNESS_SCALE_FACTOR as usize > MAX_BLOCK_WEIGHT {
        return Err(TxValidationError::consensus(
            "bad-txns-oversize",
            format!("stripped size {stripped_size}"),
        ));
    }

    let mut value_out: Amount = 0;
    for (i, output) in tx.outputs.iter().enumerate() {
        if output.value < 0 {
            return Err(TxValidationError::consensus(
                "bad-txns-vout-negative",
                format!("output {i} value {}", output.value),
            ));
        }
        if output.value > MAX_MONEY {
            return Err(TxValidationError::consensus(
                "bad-txns-vout-toolarge",
                format!("output {i} value {}", output.value),
            ));
        }
        value_out = checked_money_add(value_out, output.value).ok_or_else(|| {
            TxValidationError::consensus("bad-txns-txouttotal-toolarge", format!("at output {i}"))
        })?;
    }

    let mut seen = BTreeSet::new();
    for input in &tx.inputs {
        if !seen.insert(input.prevout) {
            return Err(TxValidationError::consensus(
                "bad-txns-inputs-duplicate",
                format!("{}:{}", hex::encode(input.prevout.hash), input.prevout.index),
            ));
        }
    }

    if tx.is_coinbase() {
        let len = tx.inputs[0].script_sig.len();
        if !cleanup && !(MIN_COINBASE_SCRIPT_SIZE..=MAX_COINBASE_SCRIPT_SIZE).contains(&len) {
            return Err(TxValidationError::consensus("bad-cb-length", format!("length {len}")));
        }
    } else if let Some(i) = tx.inputs.iter().position(|input| input.prevout.is_null()) {
        return Err(TxValidationError::consensus("bad-txns-prevout-null", format!("input {i}")));
    }

    Ok(())
}

/// CheckTxInputs: 𝒯𝒳 × 𝒰𝒮 × ℤ × ℕ × RuleSet → ℤ
///
/// For a non-coinbase tx spending from `view` at `spend_height`:
/// 1. Each input spends its coin in a private overlay of `view`; a missing or
///    already-spent coin fails with `bad-txns-inputs-missingorspent`
/// 2. Coinbase coins must be at least `coinbase_maturity(rules)` deep
/// 3. depth = spend_height - coin.height + per_input_adjustment; a negative
///    depth fails unless PROTOCOL_CLEANUP is active and the coin is empty
/// 4. total_in = Σ GetTimeAdjustedValue(coin.value, depth), each term and
///    every partial sum within [0, M_max]
/// 5. total_out = Σ o.value, within [0, M_max]
/// 6. Fail if total_in < total_out, then if the fee leaves [0, M_max]
/// 7. Return total_in - total_out
///
/// `view` is never mutated. Coinbases are not checked here and yield a zero
/// fee.
pub fn check_tx_inputs<V: CoinsView + ?Sized>(
    tx: &Transaction,
    view: &V,
    params: &ConsensusParams,
    per_input_adjustment: i64,
    spend_height: u32,
    rules: RuleSet,
) -> TxResult<Amount> {
    if tx.is_coinbase() {
        return Ok(0);
    }

    let maturity = params.coinbase_maturity(rules) as i64;
    let mut overlay = CoinsViewOverlay::new(view);
    let mut value_in: Amount = 0;

    for (i, input) in tx.inputs.iter().enumerate() {
        let coin = overlay.spend_coin(&input.prevout).ok_or_else(|| {
            TxValidationError::new(
                TxValidationResult::MissingInputs,
                "bad-txns-inputs-missingorspent",
                format!(
                    "input {i} spends {}:{}",
                    hex::encode(input.prevout.hash),
                    input.prevout.index
                ),
            )
        })?;

        let age = spend_height as i64 - coin.height as i64;
        if coin.is_coinbase && age < maturity {
            return Err(TxValidationError::new(
                TxValidationResult::PrematureSpend,
                "bad-txns-premature-spend-of-coinbase",
                format!("tried to spend coinbase at depth {age}"),
            ));
        }

        let depth = age.saturating_add(per_input_adjustment);
        if depth < 0 && !(rules.contains(RuleSet::PROTOCOL_CLEANUP) && coin.value() == 0) {
            return Err(TxValidationError::consensus(
                "bad-txns-non-monotonic-lock-height",
                format!("input {i} has relative depth {depth}"),
            ));
        }

        if !money_range(coin.value()) {
            return Err(TxValidationError::consensus(
                "bad-txns-inputvalues-outofrange",
                format!("input {i} value {}", coin.value()),
            ));
        }
        let adjusted = get_time_adjusted_value(params, coin.value(), depth);
        value_in = checked_money_add(value_in, adjusted).ok_or_else(|| {
            TxValidationError::consensus("bad-txns-inputvalues-outofrange", format!("at input {i}"))
        })?;
    }

    let value_out = checked_money_sum(tx.outputs.iter().map(|o| o.value)).ok_or_else(|| {
        TxValidationError::consensus("bad-txns-txouttotal-toolarge", "output total out of range")
    })?;

    if value_in < value_out {
        return Err(TxValidationError::consensus(
            "bad-txns-in-belowout",
            format!("value in ({value_in}) < value out ({value_out})"),
        ));
    }

    let fee = value_in - value_out;
    if !money_range(fee) {
        return Err(TxValidationError::consensus("bad-txns-fee-outofrange", format!("fee {fee}")));
    }
    Ok(fee)
}

/// Check if transaction is coinbase
pub fn is_coinbase(tx: &Transaction) -> bool {
    tx.is_coinbase()
}

/// IsFinalTx: 𝒯𝒳 × ℕ × ℤ → {true, false}
///
/// 1. lock_time = 0 → final
/// 2. lock_time < LOCKTIME_THRESHOLD is a height, compared with
///    `block_height`; otherwise a time, compared with `block_time`.
///    lock_time below the cutoff → final
/// 3. Otherwise final iff every input has sequence SEQUENCE_FINAL
pub fn is_final_tx(tx: &Transaction, block_height: u32, block_time: i64) -> bool {
    if tx.lock_time == 0 {
        return true;
    }
    let cutoff = if tx.lock_time < LOCKTIME_THRESHOLD as u64 {
        block_height as i64
    } else {
        block_time
    };
    if i64::try_from(tx.lock_time).map_or(false, |lock_time| lock_time < cutoff) {
        return true;
    }
    tx.inputs.iter().all(|input| input.sequence as u32 == SEQUENCE_FINAL)
}

/// Reject a transaction that is not final at the given height and time
pub fn check_final_tx(tx: &Transaction, block_height: u32, block_time: i64) -> TxResult<()> {
    if is_final_tx(tx, block_height, block_time) {
        Ok(())
    } else {
        Err(TxValidationError::consensus(
            "bad-txns-nonfinal",
            format!("lock time {} at height {block_height}", tx.lock_time),
        ))
    }
}

/// The block a transaction is evaluated against, as seen by lock-time rules
pub trait ChainContext {
    /// Height of the block the transaction would be included in
    fn height(&self) -> u32;

    /// Median time past of this block's ancestor at `height`
    fn median_time_past(&self, height: u32) -> i64;
}

/// Last height and last median time past at which a transaction is still
/// locked. -1 means no lock of that kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceLock {
    pub min_height: i64,
    pub min_time: i64,
}

impl SequenceLock {
    pub const NONE: SequenceLock = SequenceLock { min_height: -1, min_time: -1 };
}

/// CalculateSequenceLocks: 𝒯𝒳 × flags × ℕ* × Chain → SequenceLock
///
/// `prev_heights[i]` is the confirmation height of the coin spent by input
/// `i`. Relative locks apply only to version ≥ 2 transactions with
/// VERIFY_SEQUENCE set. For each input:
/// 1. DISABLE flag set → no lock; `prev_heights[i]` is zeroed
/// 2. TYPE flag set → min_time = max(min_time,
///    MTP(ancestor at prev_height - 1) + (seq & MASK) × 2^9 - 1)
/// 3. Otherwise → min_height = max(min_height, prev_height + (seq & MASK) - 1)
pub fn calculate_sequence_locks<C: ChainContext + ?Sized>(
    tx: &Transaction,
    flags: LockTimeFlags,
    prev_heights: &mut [u32],
    chain: &C,
) -> Result<SequenceLock> {
    if prev_heights.len() != tx.inputs.len() {
        return Err(ConsensusError::UtxoCorruption(format!(
            "{} previous heights for {} inputs",
            prev_heights.len(),
            tx.inputs.len()
        )));
    }

    let mut lock = SequenceLock::NONE;
    if tx.version < 2 || !flags.contains(LockTimeFlags::VERIFY_SEQUENCE) {
        return Ok(lock);
    }

    for (input, prev_height) in tx.inputs.iter().zip(prev_heights.iter_mut()) {
        let sequence = input.sequence as u32;
        if sequence & SEQUENCE_LOCKTIME_DISABLE_FLAG != 0 {
            *prev_height = 0;
            continue;
        }
        let relative = (sequence & SEQUENCE_LOCKTIME_MASK) as i64;
        if sequence & SEQUENCE_LOCKTIME_TYPE_FLAG != 0 {
            let coin_time = chain.median_time_past(prev_height.saturating_sub(1));
            let unlock = coin_time + (relative << SEQUENCE_LOCKTIME_GRANULARITY) - 1;
            lock.min_time = lock.min_time.max(unlock);
        } else {
            lock.min_height = lock.min_height.max(*prev_height as i64 + relative - 1);
        }
    }
    Ok(lock)
}

/// EvaluateSequenceLocks: true iff both locks have expired by the block in
/// `chain`, whose parent's median time past is the time reference
pub fn evaluate_sequence_locks<C: ChainContext + ?Sized>(chain: &C, lock: SequenceLock) -> bool {
    let height = chain.height();
    let block_time = chain.median_time_past(height.saturating_sub(1));
    lock.min_height < height as i64 && lock.min_time < block_time
}

/// SequenceLocks: calculate and evaluate in one step
pub fn sequence_locks<C: ChainContext + ?Sized>(
    tx: &Transaction,
    flags: LockTimeFlags,
    prev_heights: &mut [u32],
    chain: &C,
) -> Result<bool> {
    let lock = calculate_sequence_locks(tx, flags, prev_heights, chain)?;
    Ok(evaluate_sequence_locks(chain, lock))
}
