//! # Freicoin Consensus
//!
//! Consensus-critical state transition core of a Freicoin node: demurrage
//! arithmetic, transaction input and fee verification, signature operation
//! accounting, and UTXO set statistics.
//!
//! ## Architecture
//!
//! - Amounts and demurrage: `amount`, `demurrage`
//! - Chain state access: `coins` (the `CoinsView` seam), `serialize`
//! - Validation: `transaction`, `script`, `sigop`
//! - UTXO commitments: `muhash`, `coinstats`, `coinstats_index`, `snapshot`
//!
//! ## Design Principles
//!
//! 1. **Integer Arithmetic Only**: every demurrage result is bit-identical
//!    on every platform
//! 2. **Explicit Parameters**: rule sets and the time-adjust switch are
//!    passed in, never read from globals
//! 3. **Read-Only Views**: validation never mutates the caller's coin view
//! 4. **Exact Version Pinning**: consensus-critical dependencies are pinned
//!
//! ## Usage
//!
//! ```rust
//! use freicoin_consensus::FreicoinConsensus;
//! use freicoin_consensus::coins::MemoryCoinsView;
//! use freicoin_consensus::params::RuleSet;
//! use freicoin_consensus::types::*;
//!
//! let consensus = FreicoinConsensus::default();
//! let mut view = MemoryCoinsView::new();
//! let outpoint = OutPoint::new([1; 32], 0);
//! let funding = TransactionOutput { value: 5_000_000_000, script_pubkey: vec![0x51] };
//! view.add_coin(outpoint, Coin::new(funding, 0, false));
//!
//! let tx = Transaction {
//!     version: 2,
//!     inputs: vec![TransactionInput {
//!         prevout: outpoint,
//!         script_sig: vec![],
//!         sequence: 0xffffffff,
//!         script_witness: vec![],
//!     }],
//!     outputs: vec![TransactionOutput { value: 4_999_990_000, script_pubkey: vec![0x51] }],
//!     lock_time: 0,
//!     lock_height: 0,
//! };
//! let fee = consensus.validate_tx_inputs(&tx, &view, 0, 0, RuleSet::empty()).unwrap();
//! assert_eq!(fee, 10_000);
//! ```

pub mod types;
pub mod constants;
pub mod amount;
pub mod demurrage;
pub mod params;
pub mod coins;
pub mod serialize;
pub mod transaction;
pub mod script;
pub mod sigop;
pub mod muhash;
pub mod coinstats;
pub mod coinstats_index;
pub mod snapshot;
pub mod error;

// Re-export commonly used types
pub use types::*;
pub use constants::*;
pub use error::{ConsensusError, Result, TxValidationError, TxValidationResult};
pub use params::{ConsensusParams, LockTimeFlags, RuleSet, ScriptFlags};

use coins::CoinsView;
use coinstats::{BlockIndexLookup, CoinStatsHashType, CoinsStats};
use coinstats_index::CoinStatsIndex;
use transaction::ChainContext;

/// Consensus entry points bound to one set of chain parameters
///
/// # Examples
///
/// ```
/// use freicoin_consensus::{FreicoinConsensus, ConsensusParams};
///
/// let consensus = FreicoinConsensus::new(ConsensusParams::main());
/// assert_eq!(consensus.time_adjusted_value(100_000_000, 0), 100_000_000);
/// assert_eq!(consensus.time_adjusted_value(100_000_000, 1), 99_999_904);
///
/// let regtest = FreicoinConsensus::new(ConsensusParams::regtest());
/// assert_eq!(regtest.time_adjusted_value(100_000_000, 1), 100_000_000);
/// ```
#[derive(Debug, Clone, Default)]
pub struct FreicoinConsensus {
    params: ConsensusParams,
}

impl FreicoinConsensus {
    pub fn new(params: ConsensusParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ConsensusParams {
        &self.params
    }

    /// Rule sets active for a block whose parent has the given median time past
    pub fn active_rules(&self, median_time_past: i64) -> RuleSet {
        params::get_active_rules(&self.params, median_time_past)
    }

    /// Context-free transaction checks
    ///
    /// # Examples
    ///
    /// ```
    /// use freicoin_consensus::{FreicoinConsensus, RuleSet};
    /// use freicoin_consensus::types::*;
    ///
    /// let consensus = FreicoinConsensus::default();
    /// let tx = Transaction {
    ///     version: 2,
    ///     inputs: vec![],
    ///     outputs: vec![TransactionOutput { value: 1000, script_pubkey: vec![0x51] }],
    ///     lock_time: 0,
    ///     lock_height: 0,
    /// };
    ///
    /// let err = consensus.validate_transaction(&tx, RuleSet::empty()).unwrap_err();
    /// assert_eq!(err.reason, "bad-txns-vin-empty");
    /// ```
    pub fn validate_transaction(
        &self,
        tx: &Transaction,
        rules: RuleSet,
    ) -> std::result::Result<(), TxValidationError> {
        transaction::check_transaction(tx, rules)
    }

    /// Absolute lock-time finality at the given block height and time
    pub fn is_final_tx(&self, tx: &Transaction, block_height: u32, block_time: i64) -> bool {
        transaction::is_final_tx(tx, block_height, block_time)
    }

    /// Relative lock-time check of `tx` against the block in `chain`.
    ///
    /// `prev_heights` holds the confirmation height of each spent coin.
    pub fn check_sequence_locks<C: ChainContext + ?Sized>(
        &self,
        tx: &Transaction,
        flags: LockTimeFlags,
        prev_heights: &mut [u32],
        chain: &C,
    ) -> Result<bool> {
        transaction::sequence_locks(tx, flags, prev_heights, chain)
    }

    /// Verify inputs against `view` and return the fee
    pub fn validate_tx_inputs<V: CoinsView + ?Sized>(
        &self,
        tx: &Transaction,
        view: &V,
        per_input_adjustment: i64,
        spend_height: u32,
        rules: RuleSet,
    ) -> std::result::Result<Amount, TxValidationError> {
        let adjustment = per_input_adjustment;
        transaction::check_tx_inputs(tx, view, &self.params, adjustment, spend_height, rules)
    }

    pub fn time_adjusted_value(&self, value: Amount, relative_depth: i64) -> Amount {
        demurrage::get_time_adjusted_value(&self.params, value, relative_depth)
    }

    pub fn freicoin_to_scrip(&self, freicoin: Amount, height: u32) -> Amount {
        demurrage::freicoin_to_scrip(&self.params, freicoin, height)
    }

    pub fn scrip_to_freicoin(&self, scrip: Amount, height: u32) -> Amount {
        demurrage::scrip_to_freicoin(&self.params, scrip, height)
    }

    /// Weighted sigop cost of a transaction
    pub fn sigop_cost<V>(&self, tx: &Transaction, view: &V, flags: ScriptFlags) -> i64
    where
        V: CoinsView + ?Sized,
    {
        sigop::get_transaction_sigop_cost(tx, view, flags)
    }

    /// Statistics for the view's tip.
    ///
    /// When an index is supplied and the hash type is not `HashSerialized`,
    /// the answer comes from the index instead of a full pass.
    pub fn utxo_stats<V, B, F>(
        &self,
        hash_type: CoinStatsHashType,
        view: &V,
        blockman: &B,
        index: Option<&CoinStatsIndex>,
        interruption_point: F,
    ) -> Option<CoinsStats>
    where
        V: CoinsView + ?Sized,
        B: BlockIndexLookup + ?Sized,
        F: FnMut() -> bool,
    {
        match index {
            Some(index) if hash_type != CoinStatsHashType::HashSerialized => {
                let mut stats = index.look_up_stats_by_hash(&view.best_block())?;
                if hash_type == CoinStatsHashType::None {
                    stats.hash_serialized = [0u8; 32];
                }
                Some(stats)
            }
            _ => coinstats::compute_utxo_stats(hash_type, view, blockman, interruption_point),
        }
    }
}
