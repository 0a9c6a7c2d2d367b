//! Integration tests for signature operation accounting

use freicoin_consensus::*;
use freicoin_consensus::coins::MemoryCoinsView;
use freicoin_consensus::script::*;
use freicoin_consensus::sigop::*;

fn multisig_script(required: u8, keys: u8) -> Vec<u8> {
    let mut script = vec![OP_1 + required - 1];
    for i in 0..keys {
        push_slice(&mut script, &[0x02 + (i & 1); 33]);
    }
    script.push(OP_1 + keys - 1);
    script.push(OP_CHECKMULTISIG);
    script
}

fn tx(prevout: OutPoint, script_sig: Vec<u8>, script_pubkey: Vec<u8>) -> Transaction {
    Transaction {
        version: 2,
        inputs: vec![TransactionInput {
            prevout,
            script_sig,
            sequence: 0xffffffff,
            script_witness: vec![],
        }],
        outputs: vec![TransactionOutput { value: 1000, script_pubkey }],
        lock_time: 0,
        lock_height: 0,
    }
}

#[test]
fn test_bare_multisig_output_legacy_weight() {
    let tx = tx(OutPoint::new([1; 32], 0), vec![], multisig_script(3, 5));
    assert_eq!(get_legacy_sigop_count(&tx), MAX_PUBKEYS_PER_MULTISIG);
    assert_eq!(get_legacy_sigop_count(&tx), 20);

    let view = MemoryCoinsView::new();
    assert_eq!(get_transaction_sigop_cost(&tx, &view, ScriptFlags::all()), 80);
}

#[test]
fn test_p2sh_redeem_script_counted_accurately() {
    let redeem = multisig_script(2, 3);
    let prevout = OutPoint::new([2; 32], 1);
    let mut view = MemoryCoinsView::new();
    let output = TransactionOutput { value: COIN, script_pubkey: pay_to_script_hash(&redeem) };
    view.add_coin(prevout, Coin::new(output, 1, false));

    let mut script_sig = vec![OP_0];
    push_slice(&mut script_sig, &[0x30; 71]);
    push_slice(&mut script_sig, &redeem);
    let tx = tx(prevout, script_sig, vec![OP_DUP, OP_HASH160, OP_EQUALVERIFY, OP_CHECKSIG]);

    assert_eq!(get_p2sh_sigop_count(&tx, &view), 3);
    // legacy: the redeem script is pushed data, only the output CHECKSIG counts
    assert_eq!(get_legacy_sigop_count(&tx), 1);
    assert_eq!(get_transaction_sigop_cost(&tx, &view, ScriptFlags::empty()), 4);
    assert_eq!(get_transaction_sigop_cost(&tx, &view, ScriptFlags::P2SH), 16);
}

#[test]
fn test_p2sh_wrapped_witness_program() {
    let mut program = vec![OP_0];
    push_slice(&mut program, &[4u8; 32]);
    let prevout = OutPoint::new([3; 32], 0);
    let mut view = MemoryCoinsView::new();
    let output = TransactionOutput { value: COIN, script_pubkey: pay_to_script_hash(&program) };
    view.add_coin(prevout, Coin::new(output, 1, false));

    let mut script_sig = Vec::new();
    push_slice(&mut script_sig, &program);
    let mut script_field = vec![0x00];
    script_field.extend(multisig_script(1, 2));
    let mut spend = tx(prevout, script_sig, vec![]);
    spend.inputs[0].script_witness = vec![script_field, vec![0x00]];

    let both = ScriptFlags::P2SH | ScriptFlags::WITNESS;
    assert_eq!(get_transaction_sigop_cost(&spend, &view, ScriptFlags::WITNESS), 2);
    assert_eq!(get_transaction_sigop_cost(&spend, &view, both), 2);

    // A non-zero inner version is never executed
    spend.inputs[0].script_witness = vec![multisig_script(1, 2), vec![0x00]];
    assert_eq!(get_transaction_sigop_cost(&spend, &view, both), 0);
}

#[test]
fn test_malformed_script_counts_prefix() {
    let tx = tx(OutPoint::new([1; 32], 0), vec![OP_CHECKSIG, OP_PUSHDATA1], vec![]);
    assert_eq!(get_legacy_sigop_count(&tx), 1);
}
