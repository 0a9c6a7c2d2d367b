//! Integration tests for snapshot files

use freicoin_consensus::*;
use freicoin_consensus::coins::{CoinsView, CoinsViewOverlay, MemoryCoinsView};
use freicoin_consensus::coinstats::{compute_utxo_stats, CoinStatsHashType};
use freicoin_consensus::serialize::tx_out_ser;
use freicoin_consensus::snapshot::*;
use std::collections::HashMap;

const BASE: Hash = [0x5a; 32];

fn source_view() -> MemoryCoinsView {
    let mut view = MemoryCoinsView::new();
    view.set_best_block(BASE);
    for i in 0..20u32 {
        let mut hash = [0u8; 32];
        hash[0] = (i % 7) as u8;
        hash[1] = i as u8;
        let output = TransactionOutput {
            value: i as i64 * COIN,
            script_pubkey: vec![0x00, 0x14, i as u8],
        };
        view.add_coin(OutPoint::new(hash, i), Coin::new(output, 1000 + i, i % 5 == 0));
    }
    view
}

fn assume_utxo_for(view: &MemoryCoinsView, height: u32) -> AssumeUtxoData {
    let blockman = HashMap::from([(view.best_block(), height)]);
    let stats =
        compute_utxo_stats(CoinStatsHashType::HashSerialized, view, &blockman, || false).unwrap();
    AssumeUtxoData {
        height,
        hash_serialized: stats.hash_serialized,
        coins_count: stats.coins_count,
    }
}

#[test]
fn test_snapshot_reproduces_content_hash() {
    let source = source_view();
    let expected = assume_utxo_for(&source, 1200);

    let mut file = Vec::new();
    let metadata = write_snapshot(&source, FinalTxEntry::default(), &mut file).unwrap();
    assert_eq!(metadata.base_blockhash, BASE);
    assert_eq!(metadata.coins_count, 20);

    let loaded = verify_snapshot(&mut file.as_slice(), &expected).unwrap();
    assert_eq!(loaded, source);
    assert_eq!(assume_utxo_for(&loaded, 1200), expected);
}

#[test]
fn test_snapshot_carries_final_tx() {
    let source = source_view();
    let final_tx = FinalTxEntry { hash: [0x77; 32], size: 2 };

    let mut file = Vec::new();
    write_snapshot(&source, final_tx, &mut file).unwrap();
    let (metadata, loaded) = read_snapshot(&mut file.as_slice()).unwrap();
    assert_eq!(metadata.final_tx, final_tx);
    assert_eq!(metadata.base_blockhash, BASE);
    assert_eq!(loaded.best_block(), BASE);

    // Extended metadata must not change the verified content hash
    let expected = assume_utxo_for(&source, 5);
    assert!(verify_snapshot(&mut file.as_slice(), &expected).is_ok());
}

#[test]
fn test_snapshot_of_overlay() {
    let base = source_view();
    let mut overlay = CoinsViewOverlay::new(&base);
    let spent = base.cursor().next().unwrap().unwrap().0;
    overlay.spend_coin(&spent);
    overlay.add_coin(
        OutPoint::new([0xee; 32], 0),
        Coin::new(TransactionOutput { value: 3, script_pubkey: vec![0x51] }, 2000, false),
    );

    let mut file = Vec::new();
    let metadata = write_snapshot(&overlay, FinalTxEntry::default(), &mut file).unwrap();
    assert_eq!(metadata.coins_count, 20);

    let (_, loaded) = read_snapshot(&mut file.as_slice()).unwrap();
    assert!(!loaded.have_coin(&spent));
    assert!(loaded.have_coin(&OutPoint::new([0xee; 32], 0)));
}

#[test]
fn test_tampered_coin_rejected() {
    let source = source_view();
    let expected = assume_utxo_for(&source, 1200);

    let mut file = Vec::new();
    write_snapshot(&source, FinalTxEntry::default(), &mut file).unwrap();
    // Flip a byte in the last record's script
    let last = file.len() - 1;
    file[last] ^= 0x01;

    assert!(matches!(
        verify_snapshot(&mut file.as_slice(), &expected),
        Err(ConsensusError::SnapshotMismatch(_))
    ));
}

#[test]
fn test_unordered_records_rejected() {
    let coin = |value| Coin::new(TransactionOutput { value, script_pubkey: vec![] }, 1, false);
    let a = (OutPoint::new([1; 32], 0), coin(1));
    let b = (OutPoint::new([2; 32], 0), coin(2));

    let mut file = SnapshotMetadata::new(BASE, 2).serialize().unwrap();
    file.extend(tx_out_ser(&b.0, &b.1));
    file.extend(tx_out_ser(&a.0, &a.1));
    assert!(matches!(
        read_snapshot(&mut file.as_slice()),
        Err(ConsensusError::UtxoCorruption(_))
    ));

    let mut duplicate = SnapshotMetadata::new(BASE, 2).serialize().unwrap();
    duplicate.extend(tx_out_ser(&a.0, &a.1));
    duplicate.extend(tx_out_ser(&a.0, &a.1));
    assert!(read_snapshot(&mut duplicate.as_slice()).is_err());
}

#[test]
fn test_empty_snapshot() {
    let mut view = MemoryCoinsView::new();
    view.set_best_block(BASE);
    let mut file = Vec::new();
    let metadata = write_snapshot(&view, FinalTxEntry::default(), &mut file).unwrap();
    assert_eq!(metadata.coins_count, 0);
    assert_eq!(file.len(), 40);

    let (_, loaded) = read_snapshot(&mut file.as_slice()).unwrap();
    assert!(loaded.is_empty());
}
