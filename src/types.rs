//! Core Freicoin types for consensus validation

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Hash type: 256-bit hash, internal byte order
pub type Hash = [u8; 32];

/// Byte string type
pub type ByteString = Vec<u8>;

/// Natural number type
pub type Natural = u64;

/// Integer type
pub type Integer = i64;

/// Amount in kria (can be negative in intermediate fee math)
pub type Amount = i64;

/// OutPoint: 𝒪 = ℍ × ℕ₃₂
///
/// Ordering is by transaction id bytes, then by output index. This is the
/// canonical key order of the coin store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutPoint {
    pub hash: Hash,
    pub index: u32,
}

impl OutPoint {
    /// The null outpoint referenced by coinbase inputs
    pub const NULL: OutPoint = OutPoint { hash: [0u8; 32], index: u32::MAX };

    pub fn new(hash: Hash, index: u32) -> Self {
        Self { hash, index }
    }

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }
}

/// Transaction Input: ℐ = 𝒪 × 𝕊 × ℕ × 𝕊*
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInput {
    pub prevout: OutPoint,
    pub script_sig: ByteString,
    pub sequence: Natural,
    #[serde(default)]
    pub script_witness: Vec<ByteString>,
}

/// Transaction Output: 𝒯 = ℤ × 𝕊
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionOutput {
    pub value: Amount,
    pub script_pubkey: ByteString,
}

/// Transaction: 𝒯𝒳 = ℕ × ℐ* × 𝒯* × ℕ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub version: Natural,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub lock_time: Natural,
    /// Reference height for the demurrage of this transaction's outputs
    #[serde(default)]
    pub lock_height: u32,
}

impl Transaction {
    /// A coinbase has exactly one input spending the null outpoint
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].prevout.is_null()
    }

    pub fn has_witness(&self) -> bool {
        self.inputs.iter().any(|input| !input.script_witness.is_empty())
    }
}

/// Block Header: ℋ = ℤ × ℍ × ℍ × ℕ × ℕ × ℕ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub version: Integer,
    pub prev_block_hash: Hash,
    pub merkle_root: Hash,
    pub timestamp: Natural,
    pub bits: Natural,
    pub nonce: Natural,
}

/// Block: ℬ = ℋ × 𝒯𝒳*
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

/// Coin: one unspent transaction output plus its creation metadata.
///
/// `height` is the confirmation height and the reference point for
/// demurrage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub output: TransactionOutput,
    pub height: u32,
    pub is_coinbase: bool,
}

impl Coin {
    pub fn new(output: TransactionOutput, height: u32, is_coinbase: bool) -> Self {
        Self { output, height, is_coinbase }
    }

    pub fn value(&self) -> Amount {
        self.output.value
    }

    pub fn script_pubkey(&self) -> &ByteString {
        &self.output.script_pubkey
    }
}

/// UTXO Set: 𝒰𝒮 = 𝒪 → Coin, kept in canonical key order
pub type UtxoSet = BTreeMap<OutPoint, Coin>;
