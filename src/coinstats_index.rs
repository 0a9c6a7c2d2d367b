//! Incremental coin statistics, maintained block by block
//!
//! The index keeps a running MuHash of the UTXO set plus cumulative
//! breakdown totals that a single pass over the coin set cannot recover:
//! subsidy, spent prevouts, new outputs, coinbase outputs, unspendable
//! amounts and demurrage. One entry is stored per connected block so any
//! height can be looked up and the tip can be reverted.

use crate::coinstats::{get_bogo_size, CoinsStats};
use crate::demurrage::get_time_adjusted_value;
use crate::error::{ConsensusError, Result};
use crate::muhash::MuHash3072;
use crate::params::ConsensusParams;
use crate::script::is_unspendable;
use crate::serialize::{block_hash, compute_txid, hash_to_hex, tx_out_ser};
use crate::types::{Amount, Block, Coin, Hash, OutPoint};
use log::{debug, trace};

/// Coins spent by a block: one list per non-coinbase transaction, in block
/// order, holding the coin consumed by each input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockUndo {
    pub spent_coins: Vec<Vec<Coin>>,
}

#[derive(Debug, Clone)]
struct IndexEntry {
    hash: Hash,
    stats: CoinsStats,
    muhash: MuHash3072,
}

/// Values accumulated while connecting a single block
#[derive(Debug, Default)]
struct BlockTotals {
    unspendable: Amount,
    unspendable_scripts: Amount,
    prevout_spent: Amount,
    new_outputs_ex_coinbase: Amount,
    coinbase: Amount,
    demurrage: Amount,
}

fn add(total: &mut Amount, value: Amount) -> Result<()> {
    *total = total
        .checked_add(value)
        .ok_or_else(|| ConsensusError::UtxoCorruption("coin stats amount overflow".to_string()))?;
    Ok(())
}

pub struct CoinStatsIndex {
    params: ConsensusParams,
    muhash: MuHash3072,
    stats: CoinsStats,
    entries: Vec<IndexEntry>,
}

impl CoinStatsIndex {
    pub fn new(params: ConsensusParams) -> Self {
        Self {
            params,
            muhash: MuHash3072::new(),
            stats: CoinsStats::new(0, [0u8; 32]),
            entries: Vec::new(),
        }
    }

    /// Height of the last connected block
    pub fn best_height(&self) -> Option<u32> {
        self.entries.len().checked_sub(1).map(|h| h as u32)
    }

    pub fn best_block_hash(&self) -> Option<Hash> {
        self.entries.last().map(|entry| entry.hash)
    }

    fn check_undo(block: &Block, undo: &BlockUndo) -> Result<()> {
        let spending: Vec<_> = block.transactions.iter().filter(|tx| !tx.is_coinbase()).collect();
        if spending.len() != undo.spent_coins.len() {
            return Err(ConsensusError::UtxoCorruption(format!(
                "undo data covers {} transactions, block has {}",
                undo.spent_coins.len(),
                spending.len()
            )));
        }
        for (tx, coins) in spending.iter().zip(&undo.spent_coins) {
            if tx.inputs.len() != coins.len() {
                return Err(ConsensusError::UtxoCorruption(format!(
                    "undo data has {} coins for {} inputs",
                    coins.len(),
                    tx.inputs.len()
                )));
            }
        }
        Ok(())
    }

    /// Connect `block` at `height` on top of the current tip.
    ///
    /// `undo` holds the coins spent by the block and `subsidy` the block
    /// reward. The genesis block's outputs never enter the UTXO set; its
    /// subsidy is counted as unspendable.
    pub fn apply_block(
        &mut self,
        block: &Block,
        height: u32,
        undo: &BlockUndo,
        subsidy: Amount,
    ) -> Result<()> {
        let expected = self.entries.len() as u32;
        if height != expected {
            return Err(ConsensusError::UtxoCorruption(format!(
                "block at height {height} does not extend index at height {expected}"
            )));
        }
        if let Some(tip) = self.entries.last() {
            if block.header.prev_block_hash != tip.hash {
                return Err(ConsensusError::UtxoCorruption(format!(
                    "block {} does not build on index tip {}",
                    hash_to_hex(&block_hash(block)),
                    hash_to_hex(&tip.hash)
                )));
            }
        }

        let mut muhash = self.muhash.clone();
        let mut stats = self.stats.clone();
        let mut totals = BlockTotals::default();

        if height == 0 {
            add(&mut totals.unspendable, subsidy)?;
            add(&mut stats.total_unspendables_genesis_block, subsidy)?;
        } else {
            Self::check_undo(block, undo)?;
            let mut spent = undo.spent_coins.iter();
            for tx in &block.transactions {
                let txid = compute_txid(tx);
                let is_coinbase = tx.is_coinbase();

                for (index, output) in tx.outputs.iter().enumerate() {
                    if is_unspendable(&output.script_pubkey) {
                        add(&mut totals.unspendable, output.value)?;
                        add(&mut totals.unspendable_scripts, output.value)?;
                        continue;
                    }
                    let outpoint = OutPoint::new(txid, index as u32);
                    let coin = Coin::new(output.clone(), height, is_coinbase);
                    muhash.insert(&tx_out_ser(&outpoint, &coin));

                    if is_coinbase {
                        add(&mut totals.coinbase, coin.value())?;
                    } else {
                        add(&mut totals.new_outputs_ex_coinbase, coin.value())?;
                    }
                    stats.coins_count += 1;
                    stats.transaction_outputs += 1;
                    stats.bogo_size += get_bogo_size(coin.script_pubkey());
                    stats.total_amount =
                        stats.total_amount.and_then(|t| t.checked_add(coin.value()));
                }

                if is_coinbase {
                    continue;
                }
                let coins = spent.next().ok_or_else(|| {
                    ConsensusError::UtxoCorruption("undo data exhausted".to_string())
                })?;
                for (input, coin) in tx.inputs.iter().zip(coins) {
                    muhash.remove(&tx_out_ser(&input.prevout, coin));

                    let depth = height as i64 - coin.height as i64;
                    let present = get_time_adjusted_value(&self.params, coin.value(), depth);
                    add(&mut totals.prevout_spent, present)?;
                    add(&mut totals.demurrage, coin.value() - present)?;

                    stats.coins_count = stats.coins_count.saturating_sub(1);
                    stats.transaction_outputs = stats.transaction_outputs.saturating_sub(1);
                    stats.bogo_size =
                        stats.bogo_size.saturating_sub(get_bogo_size(coin.script_pubkey()));
                    stats.total_amount =
                        stats.total_amount.and_then(|t| t.checked_sub(coin.value()));
                }
            }
        }

        // Whatever the miner could have claimed but did not is gone for good
        let mut claimable = totals.prevout_spent;
        add(&mut claimable, subsidy)?;
        let mut claimed = totals.new_outputs_ex_coinbase;
        add(&mut claimed, totals.coinbase)?;
        add(&mut claimed, totals.unspendable)?;
        let unclaimed = claimable.checked_sub(claimed).ok_or_else(|| {
            ConsensusError::UtxoCorruption("coin stats amount overflow".to_string())
        })?;
        add(&mut totals.unspendable, unclaimed)?;

        add(&mut stats.total_subsidy, subsidy)?;
        add(&mut stats.total_unspendable_amount, totals.unspendable)?;
        add(&mut stats.total_prevout_spent_amount, totals.prevout_spent)?;
        add(&mut stats.total_new_outputs_ex_coinbase_amount, totals.new_outputs_ex_coinbase)?;
        add(&mut stats.total_coinbase_amount, totals.coinbase)?;
        add(&mut stats.total_unspendables_scripts, totals.unspendable_scripts)?;
        add(&mut stats.total_unspendables_unclaimed_rewards, unclaimed)?;
        add(&mut stats.total_demurrage, totals.demurrage)?;

        let hash = block_hash(block);
        stats.height = height;
        stats.hash_block = hash;

        trace!("coinstatsindex: connected block {} at height {height}", hash_to_hex(&hash));
        self.entries.push(IndexEntry { hash, stats: stats.clone(), muhash: muhash.clone() });
        self.muhash = muhash;
        self.stats = stats;
        Ok(())
    }

    /// Disconnect the tip block. The running MuHash is unwound with the
    /// block's outputs and undo data and must land on the stored hash of the
    /// previous block.
    pub fn revert_block(&mut self, block: &Block, undo: &BlockUndo) -> Result<()> {
        let hash = block_hash(block);
        let height = match self.entries.last() {
            Some(tip) if tip.hash == hash => self.entries.len() - 1,
            _ => {
                return Err(ConsensusError::UtxoCorruption(format!(
                    "block {} is not the index tip",
                    hash_to_hex(&hash)
                )))
            }
        };

        if height == 0 {
            self.entries.clear();
            self.muhash = MuHash3072::new();
            self.stats = CoinsStats::new(0, [0u8; 32]);
            return Ok(());
        }

        Self::check_undo(block, undo)?;
        let mut muhash = self.muhash.clone();
        let mut spent = undo.spent_coins.iter();
        for tx in &block.transactions {
            let txid = compute_txid(tx);
            for (index, output) in tx.outputs.iter().enumerate() {
                if is_unspendable(&output.script_pubkey) {
                    continue;
                }
                let coin = Coin::new(output.clone(), height as u32, tx.is_coinbase());
                muhash.remove(&tx_out_ser(&OutPoint::new(txid, index as u32), &coin));
            }
            if tx.is_coinbase() {
                continue;
            }
            if let Some(coins) = spent.next() {
                for (input, coin) in tx.inputs.iter().zip(coins) {
                    muhash.insert(&tx_out_ser(&input.prevout, coin));
                }
            }
        }

        let previous = &self.entries[height - 1];
        if muhash.finalize() != previous.muhash.finalize() {
            return Err(ConsensusError::UtxoCorruption(format!(
                "coin stats hash mismatch reverting block {}",
                hash_to_hex(&hash)
            )));
        }

        debug!("coinstatsindex: reverted block {} at height {height}", hash_to_hex(&hash));
        self.muhash = previous.muhash.clone();
        self.stats = previous.stats.clone();
        self.entries.pop();
        Ok(())
    }

    /// Statistics as of the block at `height`
    pub fn look_up_stats(&self, height: u32) -> Option<CoinsStats> {
        let entry = self.entries.get(height as usize)?;
        let mut stats = entry.stats.clone();
        stats.hash_serialized = entry.muhash.finalize();
        stats.index_used = true;
        Some(stats)
    }

    /// Statistics as of the block with the given hash
    pub fn look_up_stats_by_hash(&self, hash: &Hash) -> Option<CoinsStats> {
        let height = self.entries.iter().position(|entry| entry.hash == *hash)?;
        self.look_up_stats(height as u32)
    }
}
