//! Integration tests for input verification and fee calculation

use freicoin_consensus::*;
use freicoin_consensus::coins::{CoinsView, CoinsViewOverlay, MemoryCoinsView};
use freicoin_consensus::transaction::{check_transaction, check_tx_inputs};
use proptest::prelude::*;

fn spending(prevouts: &[OutPoint], outputs: &[Amount]) -> Transaction {
    Transaction {
        version: 2,
        inputs: prevouts
            .iter()
            .map(|prevout| TransactionInput {
                prevout: *prevout,
                script_sig: vec![],
                sequence: 0xffffffff,
                script_witness: vec![],
            })
            .collect(),
        outputs: outputs
            .iter()
            .map(|value| TransactionOutput { value: *value, script_pubkey: vec![0x51] })
            .collect(),
        lock_time: 0,
        lock_height: 0,
    }
}

fn view_with(values: &[(Amount, u32)]) -> (MemoryCoinsView, Vec<OutPoint>) {
    let mut view = MemoryCoinsView::new();
    let mut outpoints = Vec::new();
    for (i, (value, height)) in values.iter().enumerate() {
        let outpoint = OutPoint::new([i as u8 + 1; 32], i as u32);
        let output = TransactionOutput { value: *value, script_pubkey: vec![0x51] };
        view.add_coin(outpoint, Coin::new(output, *height, false));
        outpoints.push(outpoint);
    }
    (view, outpoints)
}

#[test]
fn test_fifty_frc_spend_pays_fee() {
    let (view, outpoints) = view_with(&[(5_000_000_000, 0)]);
    let tx = spending(&outpoints, &[4_999_990_000]);

    assert!(check_transaction(&tx, RuleSet::empty()).is_ok());
    let fee = check_tx_inputs(&tx, &view, &ConsensusParams::main(), 0, 0, RuleSet::empty());
    assert_eq!(fee, Ok(10_000));
}

#[test]
fn test_double_spend_within_transaction() {
    let (view, outpoints) = view_with(&[(COIN, 0)]);
    let tx = spending(&[outpoints[0], outpoints[0]], &[COIN / 2]);

    let params = ConsensusParams::main();
    let err = check_tx_inputs(&tx, &view, &params, 0, 0, RuleSet::empty()).unwrap_err();
    assert_eq!(err.reason, "bad-txns-inputs-missingorspent");
    assert_eq!(err.result, TxValidationResult::MissingInputs);
    assert!(view.have_coin(&outpoints[0]));
}

#[test]
fn test_spent_in_caller_overlay_is_missing() {
    let (view, outpoints) = view_with(&[(COIN, 0), (COIN, 0)]);
    let mut overlay = CoinsViewOverlay::new(&view);
    assert!(overlay.spend_coin(&outpoints[0]).is_some());

    let tx = spending(&outpoints, &[COIN]);
    let params = ConsensusParams::main();
    let err = check_tx_inputs(&tx, &overlay, &params, 0, 0, RuleSet::empty()).unwrap_err();
    assert_eq!(err.reason, "bad-txns-inputs-missingorspent");

    let fee = check_tx_inputs(&tx, &view, &params, 0, 0, RuleSet::empty());
    assert_eq!(fee, Ok(COIN));
}

#[test]
fn test_demurrage_reduces_available_input() {
    let (view, outpoints) = view_with(&[(COIN, 100)]);
    let params = ConsensusParams::main();
    // One block later the coin is worth 99_999_904 kria
    let tx = spending(&outpoints, &[99_999_905]);
    let err = check_tx_inputs(&tx, &view, &params, 0, 101, RuleSet::empty()).unwrap_err();
    assert_eq!(err.reason, "bad-txns-in-belowout");

    let tx = spending(&outpoints, &[99_999_904]);
    assert_eq!(check_tx_inputs(&tx, &view, &params, 0, 101, RuleSet::empty()), Ok(0));
}

#[test]
fn test_per_input_adjustment_shifts_depth() {
    let (view, outpoints) = view_with(&[(COIN, 100)]);
    let params = ConsensusParams::main();
    let tx = spending(&outpoints, &[99_999_904]);
    // spend_height equals the coin height but the adjustment adds one block
    assert_eq!(check_tx_inputs(&tx, &view, &params, 1, 100, RuleSet::empty()), Ok(0));
}

#[test]
fn test_output_total_out_of_range() {
    let (view, outpoints) = view_with(&[(MAX_MONEY, 0)]);
    let tx = spending(&outpoints, &[MAX_MONEY, 1]);
    let params = ConsensusParams::main();
    let err = check_tx_inputs(&tx, &view, &params, 0, 0, RuleSet::empty()).unwrap_err();
    assert_eq!(err.reason, "bad-txns-txouttotal-toolarge");
}

#[test]
fn test_rejection_converts_to_consensus_error() {
    let view = MemoryCoinsView::new();
    let tx = spending(&[OutPoint::new([1; 32], 0)], &[1]);
    let params = ConsensusParams::main();
    let err: ConsensusError = check_tx_inputs(&tx, &view, &params, 0, 0, RuleSet::empty())
        .unwrap_err()
        .into();
    assert!(matches!(err, ConsensusError::TxValidation(_)));
    assert!(err.to_string().contains("bad-txns-inputs-missingorspent"));
}

proptest! {
    /// Invariant: a returned fee always lies in [0, M_max]
    #[test]
    fn prop_fee_in_money_range(
        inputs in prop::collection::vec((0..=MAX_MONEY, 0u32..1000), 1..6),
        outputs in prop::collection::vec(0..=MAX_MONEY, 1..6),
        spend_height in 1000u32..3000,
    ) {
        let (view, outpoints) = view_with(&inputs);
        let tx = spending(&outpoints, &outputs);
        let params = ConsensusParams::main();
        if let Ok(fee) = check_tx_inputs(&tx, &view, &params, 0, spend_height, RuleSet::empty()) {
            prop_assert!((0..=MAX_MONEY).contains(&fee));
        }
    }

    /// Invariant: without demurrage the fee is exactly inputs minus outputs
    #[test]
    fn prop_fee_exact_without_demurrage(
        inputs in prop::collection::vec(0..=COIN, 1..6),
        spend in 0..=COIN,
    ) {
        let values: Vec<(Amount, u32)> = inputs.iter().map(|v| (*v, 0)).collect();
        let (view, outpoints) = view_with(&values);
        let total: Amount = inputs.iter().sum();
        let out = spend.min(total);
        let tx = spending(&outpoints, &[out]);
        let params = ConsensusParams::regtest();
        let fee = check_tx_inputs(&tx, &view, &params, 0, 500, RuleSet::empty());
        prop_assert_eq!(fee, Ok(total - out));
    }
}
