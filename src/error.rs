//! Error types for consensus validation

use thiserror::Error;

/// Severity class of a transaction rejection.
///
/// The numeric values are stable and may be sent across process boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TxValidationResult {
    /// Invalid under rules that have always been enforced
    Consensus = 1,
    /// Invalid under rules activated recently enough that a peer relaying
    /// it may simply be running older software
    RecentConsensusChange = 2,
    /// An input is missing or already spent
    MissingInputs = 3,
    /// A coinbase output is spent before it matured
    PrematureSpend = 4,
}

impl TxValidationResult {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// True if the transaction is invalid no matter which rules are active
    pub fn is_consensus_violation(self) -> bool {
        !matches!(self, TxValidationResult::RecentConsensusChange)
    }
}

/// Tagged rejection of a transaction
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason} ({debug})")]
pub struct TxValidationError {
    pub result: TxValidationResult,
    pub reason: &'static str,
    pub debug: String,
}

impl TxValidationError {
    pub fn new(result: TxValidationResult, reason: &'static str, debug: impl Into<String>) -> Self {
        Self { result, reason, debug: debug.into() }
    }

    pub fn consensus(reason: &'static str, debug: impl Into<String>) -> Self {
        Self::new(TxValidationResult::Consensus, reason, debug)
    }
}

#[derive(Error, Debug)]
pub enum ConsensusError {
    #[error("Transaction validation failed: {0}")]
    TxValidation(#[from] TxValidationError),

    #[error("UTXO set corrupted: {0}")]
    UtxoCorruption(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Snapshot mismatch: {0}")]
    SnapshotMismatch(String),

    #[error("Invalid consensus parameters: {0}")]
    InvalidParams(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConsensusError>;
