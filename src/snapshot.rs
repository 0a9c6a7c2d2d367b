//! UTXO snapshot files
//!
//! Layout: `SnapshotMetadata` followed by `coins_count` canonical
//! `(outpoint, coin)` records in ascending outpoint order. Because the record
//! layout is the one hashed in `HashSerialized` mode, re-reading a snapshot
//! and hashing it reproduces the digest of the set it was written from.

use crate::coins::{CoinsView, MemoryCoinsView};
use crate::coinstats::{compute_utxo_stats, CoinStatsHashType};
use crate::error::{ConsensusError, Result};
use crate::serialize::{hash_to_hex, read_array, read_outpoint_coin, tx_out_ser};
use crate::types::{Hash, OutPoint, UtxoSet};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Read, Write};

/// High bit of the last hash byte, set on disk when extended fields follow
const EXTENDED_SERIALIZATION_BIT: u8 = 0x80;

/// Extended field flag: a final-transaction entry is present
const FLAG_FINAL_TX: u8 = 0x01;

/// Hash and spendable output count of a block's final transaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalTxEntry {
    pub hash: Hash,
    pub size: u32,
}

impl FinalTxEntry {
    pub fn is_null(&self) -> bool {
        self.size == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    /// Tip of the chain the snapshot's coin set reflects
    pub base_blockhash: Hash,
    pub final_tx: FinalTxEntry,
    pub coins_count: u64,
}

impl SnapshotMetadata {
    pub fn new(base_blockhash: Hash, coins_count: u64) -> Self {
        Self { base_blockhash, final_tx: FinalTxEntry::default(), coins_count }
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(32 + 1 + 36 + 8);
        let mut hash = self.base_blockhash;
        let flags = if self.final_tx.is_null() { 0 } else { FLAG_FINAL_TX };
        if flags != 0 {
            if hash[31] & EXTENDED_SERIALIZATION_BIT != 0 {
                return Err(ConsensusError::Serialization(
                    "high bit of base block hash already set".to_string(),
                ));
            }
            hash[31] ^= EXTENDED_SERIALIZATION_BIT;
        }
        buf.extend_from_slice(&hash);
        if flags != 0 {
            buf.push(flags);
            buf.extend_from_slice(&self.final_tx.hash);
            buf.extend_from_slice(&self.final_tx.size.to_le_bytes());
        }
        buf.extend_from_slice(&self.coins_count.to_le_bytes());
        Ok(buf)
    }

    pub fn deserialize<R: Read>(reader: &mut R) -> Result<Self> {
        let mut base_blockhash: Hash = read_array(reader)?;
        let mut final_tx = FinalTxEntry::default();
        if base_blockhash[31] & EXTENDED_SERIALIZATION_BIT != 0 {
            base_blockhash[31] ^= EXTENDED_SERIALIZATION_BIT;
            let mut flags = read_array::<R, 1>(reader)?[0];
            if flags & FLAG_FINAL_TX != 0 {
                final_tx.hash = read_array(reader)?;
                final_tx.size = u32::from_le_bytes(read_array(reader)?);
                flags ^= FLAG_FINAL_TX;
            }
            if flags != 0 {
                return Err(ConsensusError::Serialization(format!(
                    "unknown snapshot extended serialization fields {flags:#04x}"
                )));
            }
        }
        let coins_count = u64::from_le_bytes(read_array(reader)?);
        Ok(Self { base_blockhash, final_tx, coins_count })
    }
}

/// Expected content of a snapshot, pinned in chain parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssumeUtxoData {
    pub height: u32,
    pub hash_serialized: Hash,
    pub coins_count: u64,
}

/// Write every coin of `view` as a snapshot based on the view's best block.
///
/// The cursor is walked twice: once to count coins, once to write them.
pub fn write_snapshot<V, W>(
    view: &V,
    final_tx: FinalTxEntry,
    writer: &mut W,
) -> Result<SnapshotMetadata>
where
    V: CoinsView + ?Sized,
    W: Write,
{
    let mut coins_count = 0u64;
    for entry in view.cursor() {
        entry?;
        coins_count += 1;
    }

    let metadata = SnapshotMetadata { base_blockhash: view.best_block(), final_tx, coins_count };
    writer.write_all(&metadata.serialize()?)?;

    let mut written = 0u64;
    for entry in view.cursor() {
        let (outpoint, coin) = entry?;
        writer.write_all(&tx_out_ser(&outpoint, &coin))?;
        written += 1;
    }
    if written != coins_count {
        return Err(ConsensusError::UtxoCorruption(format!(
            "coin set changed while writing snapshot ({coins_count} counted, {written} written)"
        )));
    }
    writer.flush()?;

    debug!(
        "snapshot: wrote {coins_count} coins at block {}",
        hash_to_hex(&metadata.base_blockhash)
    );
    Ok(metadata)
}

/// Load a snapshot into memory.
///
/// Records must be in strictly ascending outpoint order and the stream must
/// end right after the last one.
pub fn read_snapshot<R: Read>(reader: &mut R) -> Result<(SnapshotMetadata, MemoryCoinsView)> {
    let metadata = SnapshotMetadata::deserialize(reader)?;
    trace!(
        "snapshot: loading {} coins at block {}",
        metadata.coins_count,
        hash_to_hex(&metadata.base_blockhash)
    );

    let mut coins = UtxoSet::new();
    let mut last: Option<OutPoint> = None;
    for _ in 0..metadata.coins_count {
        let (outpoint, coin) = read_outpoint_coin(reader)?;
        if matches!(last, Some(prev) if prev >= outpoint) {
            return Err(ConsensusError::UtxoCorruption(format!(
                "snapshot coin {}:{} out of order",
                hash_to_hex(&outpoint.hash),
                outpoint.index
            )));
        }
        last = Some(outpoint);
        coins.insert(outpoint, coin);
    }

    let mut trailing = [0u8; 1];
    if reader.read(&mut trailing)? != 0 {
        return Err(ConsensusError::Serialization(
            "trailing data after last snapshot coin".to_string(),
        ));
    }

    Ok((metadata.clone(), MemoryCoinsView::from_coins(coins, metadata.base_blockhash)))
}

/// Load a snapshot and check it against the expected coin count and
/// `HashSerialized` digest.
pub fn verify_snapshot<R: Read>(
    reader: &mut R,
    expected: &AssumeUtxoData,
) -> Result<MemoryCoinsView> {
    let (metadata, view) = read_snapshot(reader)?;
    if metadata.coins_count != expected.coins_count {
        return Err(ConsensusError::SnapshotMismatch(format!(
            "bad snapshot: {} coins, expected {}",
            metadata.coins_count, expected.coins_count
        )));
    }

    let blockman = HashMap::from([(metadata.base_blockhash, expected.height)]);
    let stats = compute_utxo_stats(CoinStatsHashType::HashSerialized, &view, &blockman, || false)
        .ok_or_else(|| {
            ConsensusError::SnapshotMismatch("failed to compute snapshot stats".to_string())
        })?;

    if stats.hash_serialized != expected.hash_serialized {
        return Err(ConsensusError::SnapshotMismatch(format!(
            "bad snapshot content hash: expected {}, got {}",
            hash_to_hex(&expected.hash_serialized),
            hash_to_hex(&stats.hash_serialized)
        )));
    }
    debug!("snapshot: verified {} coins at height {}", stats.coins_count, stats.height);
    Ok(view)
}
