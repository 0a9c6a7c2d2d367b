//! Signature operation accounting
//!
//! Counts are weighted into a single cost: legacy and P2SH sigops weigh
//! `WITNESS_SCALE_FACTOR`, witness sigops weigh 1. None of these functions
//! fail; callers compare the result against their limit.

use crate::coins::CoinsView;
use crate::constants::WITNESS_SCALE_FACTOR;
use crate::params::ScriptFlags;
use crate::script::{
    get_p2sh_script_sigop_count, get_sigop_count, is_pay_to_script_hash, last_push, witness_program,
};
use crate::types::{ByteString, Transaction};

/// GetLegacySigOpCount: 𝒯𝒳 → ℕ
///
/// Inaccurate counting over every scriptSig and scriptPubKey.
pub fn get_legacy_sigop_count(tx: &Transaction) -> u32 {
    let inputs = tx.inputs.iter().map(|input| get_sigop_count(&input.script_sig, false));
    let outputs = tx.outputs.iter().map(|output| get_sigop_count(&output.script_pubkey, false));
    inputs.chain(outputs).fold(0u32, u32::saturating_add)
}

/// GetP2SHSigOpCount: 𝒯𝒳 × 𝒰𝒮 → ℕ
///
/// Accurate count of the redeem scripts of inputs spending P2SH outputs.
/// Inputs whose coin is not in `view` contribute nothing. Coinbases have no
/// P2SH sigops.
pub fn get_p2sh_sigop_count<V: CoinsView + ?Sized>(tx: &Transaction, view: &V) -> u32 {
    if tx.is_coinbase() {
        return 0;
    }
    tx.inputs
        .iter()
        .filter_map(|input| {
            let coin = view.get_coin(&input.prevout)?;
            is_pay_to_script_hash(coin.script_pubkey())
                .then(|| get_p2sh_script_sigop_count(coin.script_pubkey(), &input.script_sig))
        })
        .fold(0u32, u32::saturating_add)
}

/// Inner version byte of a witness script that is executed
const WITNESS_SCRIPT_V0: u8 = 0x00;

/// Sigops of a version-0 witness program spend.
///
/// The witness stack ends with the script field followed by its Merkle
/// proof, so the script field is the second-to-last element. Its first byte
/// is an inner version: only inner version 0 is executed, over the rest of
/// the field. Any other inner version succeeds unexecuted and costs nothing.
fn witness_sigops(version: u8, program: &[u8], witness: &[ByteString]) -> u32 {
    if version != 0 || !(program.len() == 20 || program.len() == 32) {
        return 0;
    }
    let Some(script_field) = witness.len().checked_sub(2).map(|i| &witness[i]) else {
        return 0;
    };
    match script_field.split_first() {
        Some((&WITNESS_SCRIPT_V0, script)) => get_sigop_count(script, true),
        _ => 0,
    }
}

/// CountWitnessSigOps for one input.
///
/// Recognises native witness programs and witness programs wrapped in P2SH,
/// where the program is the last push of a push-only scriptSig.
pub fn count_witness_sigops(
    script_sig: &[u8],
    script_pubkey: &[u8],
    witness: &[ByteString],
) -> u32 {
    if let Some(wp) = witness_program(script_pubkey) {
        return witness_sigops(wp.version, wp.program, witness);
    }
    if is_pay_to_script_hash(script_pubkey) {
        if let Some(wp) = last_push(script_sig).and_then(witness_program) {
            return witness_sigops(wp.version, wp.program, witness);
        }
    }
    0
}

/// GetTransactionSigOpCost: 𝒯𝒳 × 𝒰𝒮 × flags → ℤ
///
/// 1. legacy = GetLegacySigOpCount(tx) × WITNESS_SCALE_FACTOR
/// 2. If tx is a coinbase, return legacy
/// 3. If P2SH is active, add GetP2SHSigOpCount(tx, view) × WITNESS_SCALE_FACTOR
/// 4. If WITNESS is active, add CountWitnessSigOps for every input with a coin
pub fn get_transaction_sigop_cost<V: CoinsView + ?Sized>(
    tx: &Transaction,
    view: &V,
    flags: ScriptFlags,
) -> i64 {
    let mut cost = get_legacy_sigop_count(tx) as i64 * WITNESS_SCALE_FACTOR;
    if tx.is_coinbase() {
        return cost;
    }

    if flags.contains(ScriptFlags::P2SH) {
        cost += get_p2sh_sigop_count(tx, view) as i64 * WITNESS_SCALE_FACTOR;
    }

    if flags.contains(ScriptFlags::WITNESS) {
        for input in &tx.inputs {
            if let Some(coin) = view.get_coin(&input.prevout) {
                let count = count_witness_sigops(
                    &input.script_sig,
                    coin.script_pubkey(),
                    &input.script_witness,
                );
                cost += count as i64;
            }
        }
    }
    cost
}
