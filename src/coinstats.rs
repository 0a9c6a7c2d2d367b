//! UTXO set statistics and content hash
//!
//! A single pass over a coin view cursor: Init → Iterate → Finalize. The
//! result is either a complete `CoinsStats` or `None`; partial statistics are
//! never returned.

use crate::amount::format_money;
use crate::coins::CoinsView;
use crate::muhash::MuHash3072;
use crate::serialize::{hash_to_hex, tx_out_ser, HashWriter};
use crate::types::{Amount, Coin, Hash, OutPoint};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};

/// Entries processed between polls of the interruption callback
pub const INTERRUPTION_CHECK_INTERVAL: u64 = 1000;

/// How the content hash is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoinStatsHashType {
    /// Double SHA-256 over the canonical records in cursor order
    #[default]
    HashSerialized,
    /// MuHash3072 over the canonical records, independent of order
    Muhash,
    None,
}

impl CoinStatsHashType {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "hash_serialized_3" => Some(Self::HashSerialized),
            "muhash" => Some(Self::Muhash),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

/// Aggregate statistics over a UTXO set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinsStats {
    pub height: u32,
    pub hash_block: Hash,
    pub transactions: u64,
    pub transaction_outputs: u64,
    pub bogo_size: u64,
    pub hash_serialized: Hash,
    pub disk_size: u64,
    /// Sum of all coin values, `None` once an overflow occurred
    pub total_amount: Option<Amount>,
    pub coins_count: u64,
    /// Set when the statistics came from the coin stats index
    pub index_used: bool,

    // Only available from the coin stats index
    pub total_subsidy: Amount,
    pub total_unspendable_amount: Amount,
    pub total_prevout_spent_amount: Amount,
    pub total_new_outputs_ex_coinbase_amount: Amount,
    pub total_coinbase_amount: Amount,
    pub total_unspendables_genesis_block: Amount,
    pub total_unspendables_bip30: Amount,
    pub total_unspendables_scripts: Amount,
    pub total_unspendables_unclaimed_rewards: Amount,
    /// Nominal value lost to demurrage by spent prevouts
    pub total_demurrage: Amount,
}

impl CoinsStats {
    pub fn new(height: u32, hash_block: Hash) -> Self {
        Self {
            height,
            hash_block,
            total_amount: Some(0),
            ..Default::default()
        }
    }

    /// Render as a `gettxoutsetinfo` result object. Amounts are in kria.
    pub fn to_json(&self, hash_type: CoinStatsHashType) -> Value {
        let mut obj = json!({
            "height": self.height,
            "bestblock": hash_to_hex(&self.hash_block),
            "txouts": self.transaction_outputs,
            "bogosize": self.bogo_size,
            "total_amount": self.total_amount,
        });
        match hash_type {
            CoinStatsHashType::HashSerialized => {
                obj["hash_serialized_3"] = json!(hash_to_hex(&self.hash_serialized));
            }
            CoinStatsHashType::Muhash => {
                obj["muhash"] = json!(hash_to_hex(&self.hash_serialized));
            }
            CoinStatsHashType::None => {}
        }
        if self.index_used {
            obj["total_unspendable_amount"] = json!(self.total_unspendable_amount);
            obj["index_totals"] = json!({
                "subsidy": self.total_subsidy,
                "prevout_spent": self.total_prevout_spent_amount,
                "new_outputs_ex_coinbase": self.total_new_outputs_ex_coinbase_amount,
                "coinbase": self.total_coinbase_amount,
                "demurrage": self.total_demurrage,
                "unspendables": {
                    "genesis_block": self.total_unspendables_genesis_block,
                    "bip30": self.total_unspendables_bip30,
                    "scripts": self.total_unspendables_scripts,
                    "unclaimed_rewards": self.total_unspendables_unclaimed_rewards,
                },
            });
        } else {
            obj["transactions"] = json!(self.transactions);
            obj["disk_size"] = json!(self.disk_size);
        }
        obj
    }
}

/// Block-index lookups the statistics pass needs from the block manager
pub trait BlockIndexLookup {
    /// Height of the block with the given hash, if known
    fn lookup_height(&self, hash: &Hash) -> Option<u32>;
}

impl BlockIndexLookup for HashMap<Hash, u32> {
    fn lookup_height(&self, hash: &Hash) -> Option<u32> {
        self.get(hash).copied()
    }
}

impl BlockIndexLookup for BTreeMap<Hash, u32> {
    fn lookup_height(&self, hash: &Hash) -> Option<u32> {
        self.get(hash).copied()
    }
}

/// Heuristic per-coin storage footprint: outpoint hash, index, height and
/// coinbase flag, amount, script length prefix, plus the script itself
pub fn get_bogo_size(script_pubkey: &[u8]) -> u64 {
    32 + 4 + 4 + 8 + 2 + script_pubkey.len() as u64
}

/// Content hash accumulator for one statistics pass
enum StatsHasher {
    Serialized(HashWriter),
    Muhash(MuHash3072),
    None,
}

impl StatsHasher {
    fn new(hash_type: CoinStatsHashType) -> Self {
        match hash_type {
            CoinStatsHashType::HashSerialized => Self::Serialized(HashWriter::new()),
            CoinStatsHashType::Muhash => Self::Muhash(MuHash3072::new()),
            CoinStatsHashType::None => Self::None,
        }
    }

    fn apply(&mut self, outpoint: &OutPoint, coin: &Coin) {
        match self {
            Self::Serialized(writer) => writer.write(&tx_out_ser(outpoint, coin)),
            Self::Muhash(muhash) => muhash.insert(&tx_out_ser(outpoint, coin)),
            Self::None => {}
        }
    }

    fn finalize(self) -> Hash {
        match self {
            Self::Serialized(writer) => writer.finalize(),
            Self::Muhash(muhash) => muhash.finalize(),
            Self::None => [0u8; 32],
        }
    }
}

/// Fold one transaction's unspent outputs into `stats`
fn apply_stats(stats: &mut CoinsStats, outputs: &BTreeMap<u32, Coin>) {
    stats.transactions += 1;
    for coin in outputs.values() {
        stats.transaction_outputs += 1;
        stats.total_amount = stats.total_amount.and_then(|total| total.checked_add(coin.value()));
        stats.bogo_size += get_bogo_size(coin.script_pubkey());
    }
}

/// ComputeUTXOStats: hash type × 𝒰𝒮 × BlockManager × interrupt → CoinsStats?
///
/// 1. Resolve the view's best block to a height; unknown tip → None
/// 2. Walk the cursor, grouping consecutive entries by txid. Transaction
///    counts assume a key-ordered cursor; all other fields do not.
/// 3. Per coin: feed `tx_out_ser` into the hasher, count it, add its value
///    to `total_amount` (which becomes None for good on overflow)
/// 4. Poll `interruption_point` every INTERRUPTION_CHECK_INTERVAL entries;
///    true aborts with None. A corrupt cursor entry aborts with None.
/// 5. Finalize the hash and record the view's size estimate
pub fn compute_utxo_stats<V, B, F>(
    hash_type: CoinStatsHashType,
    view: &V,
    blockman: &B,
    mut interruption_point: F,
) -> Option<CoinsStats>
where
    V: CoinsView + ?Sized,
    B: BlockIndexLookup + ?Sized,
    F: FnMut() -> bool,
{
    let best_block = view.best_block();
    let Some(height) = blockman.lookup_height(&best_block) else {
        debug!("coinstats: best block {} not in block index", hash_to_hex(&best_block));
        return None;
    };
    trace!("coinstats: start pass at height {height} ({hash_type:?})");

    let mut stats = CoinsStats::new(height, best_block);
    let mut hasher = StatsHasher::new(hash_type);
    let mut prev_txid: Option<Hash> = None;
    let mut outputs: BTreeMap<u32, Coin> = BTreeMap::new();

    for entry in view.cursor() {
        if stats.coins_count % INTERRUPTION_CHECK_INTERVAL == 0 && interruption_point() {
            debug!("coinstats: interrupted after {} coins", stats.coins_count);
            return None;
        }
        let (outpoint, coin) = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("coinstats: unable to read UTXO set: {e}");
                return None;
            }
        };

        if matches!(prev_txid, Some(txid) if txid != outpoint.hash) {
            apply_stats(&mut stats, &outputs);
            outputs.clear();
        }
        prev_txid = Some(outpoint.hash);
        hasher.apply(&outpoint, &coin);
        outputs.insert(outpoint.index, coin);
        stats.coins_count += 1;
    }
    if !outputs.is_empty() {
        apply_stats(&mut stats, &outputs);
    }

    stats.hash_serialized = hasher.finalize();
    stats.disk_size = view.estimate_size();

    debug!(
        "coinstats: {} coins in {} transactions, total {}",
        stats.coins_count,
        stats.transactions,
        stats.total_amount.map(format_money).unwrap_or_else(|| "overflow".to_string())
    );
    Some(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coins::MemoryCoinsView;
    use crate::types::TransactionOutput;

    const TIP: Hash = [7u8; 32];

    fn blockman(height: u32) -> HashMap<Hash, u32> {
        HashMap::from([(TIP, height)])
    }

    fn coin(value: Amount) -> Coin {
        Coin::new(TransactionOutput { value, script_pubkey: vec![0x51, 0x52] }, 1, false)
    }

    #[test]
    fn test_bogo_size() {
        assert_eq!(get_bogo_size(&[]), 50);
        assert_eq!(get_bogo_size(&[0u8; 25]), 75);
    }

    #[test]
    fn test_empty_set() {
        let mut view = MemoryCoinsView::new();
        view.set_best_block(TIP);
        let stats =
            compute_utxo_stats(CoinStatsHashType::Muhash, &view, &blockman(3), || false).unwrap();
        assert_eq!(stats.coins_count, 0);
        assert_eq!(stats.total_amount, Some(0));
        assert_eq!(stats.height, 3);
        assert_eq!(stats.hash_serialized, MuHash3072::new().finalize());
    }

    #[test]
    fn test_unknown_tip() {
        let view = MemoryCoinsView::new();
        let stats = compute_utxo_stats(CoinStatsHashType::None, &view, &blockman(3), || false);
        assert!(stats.is_none());
    }

    #[test]
    fn test_groups_outputs_by_txid() {
        let mut view = MemoryCoinsView::new();
        view.set_best_block(TIP);
        view.add_coin(OutPoint::new([1; 32], 0), coin(10));
        view.add_coin(OutPoint::new([1; 32], 1), coin(20));
        view.add_coin(OutPoint::new([2; 32], 0), coin(30));

        let stats =
            compute_utxo_stats(CoinStatsHashType::None, &view, &blockman(1), || false).unwrap();
        assert_eq!(stats.transactions, 2);
        assert_eq!(stats.transaction_outputs, 3);
        assert_eq!(stats.coins_count, 3);
        assert_eq!(stats.total_amount, Some(60));
        assert_eq!(stats.bogo_size, 3 * 52);
        assert_eq!(stats.hash_serialized, [0u8; 32]);
    }

    #[test]
    fn test_total_amount_overflow_is_permanent() {
        let mut view = MemoryCoinsView::new();
        view.set_best_block(TIP);
        view.add_coin(OutPoint::new([1; 32], 0), coin(i64::MAX));
        view.add_coin(OutPoint::new([2; 32], 0), coin(1));
        view.add_coin(OutPoint::new([3; 32], 0), coin(-5));

        let stats =
            compute_utxo_stats(CoinStatsHashType::None, &view, &blockman(1), || false).unwrap();
        assert_eq!(stats.total_amount, None);
        assert_eq!(stats.coins_count, 3);
    }

    #[test]
    fn test_hash_serialized_matches_record_stream() {
        let mut view = MemoryCoinsView::new();
        view.set_best_block(TIP);
        let a = (OutPoint::new([1; 32], 0), coin(10));
        let b = (OutPoint::new([2; 32], 5), coin(20));
        view.add_coin(b.0, b.1.clone());
        view.add_coin(a.0, a.1.clone());

        let mut writer = HashWriter::new();
        writer.write(&tx_out_ser(&a.0, &a.1));
        writer.write(&tx_out_ser(&b.0, &b.1));

        let stats =
            compute_utxo_stats(CoinStatsHashType::HashSerialized, &view, &blockman(1), || false)
                .unwrap();
        assert_eq!(stats.hash_serialized, writer.finalize());
    }

    #[test]
    fn test_interruption() {
        let mut view = MemoryCoinsView::new();
        view.set_best_block(TIP);
        view.add_coin(OutPoint::new([1; 32], 0), coin(10));
        let stats = compute_utxo_stats(CoinStatsHashType::Muhash, &view, &blockman(1), || true);
        assert!(stats.is_none());
    }

    #[test]
    fn test_to_json() {
        let mut stats = CoinsStats::new(5, TIP);
        stats.total_amount = None;
        let obj = stats.to_json(CoinStatsHashType::Muhash);
        assert_eq!(obj["height"], 5);
        assert!(obj["total_amount"].is_null());
        assert!(obj.get("muhash").is_some());
        assert!(obj.get("hash_serialized_3").is_none());
        assert_eq!(obj["transactions"], 0);

        stats.index_used = true;
        stats.total_subsidy = 42;
        let obj = stats.to_json(CoinStatsHashType::None);
        assert_eq!(obj["index_totals"]["subsidy"], 42);
        assert!(obj.get("disk_size").is_none());
    }

    #[test]
    fn test_hash_type_parse() {
        assert_eq!(CoinStatsHashType::parse("muhash"), Some(CoinStatsHashType::Muhash));
        assert_eq!(
            CoinStatsHashType::parse("hash_serialized_3"),
            Some(CoinStatsHashType::HashSerialized)
        );
        assert_eq!(CoinStatsHashType::parse("sha1"), None);
        assert_eq!(CoinStatsHashType::default(), CoinStatsHashType::HashSerialized);
    }
}
