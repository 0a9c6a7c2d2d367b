//! Consensus parameters and rule-set selection

use crate::constants::*;
use crate::error::{ConsensusError, Result};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Consensus rule sets active for a block, computed once per block
    pub struct RuleSet: u32 {
        /// Scheduled relaxation of aggregate limits
        const PROTOCOL_CLEANUP = 1 << 0;
        /// Block size expansion
        const SIZE_EXPANSION = 1 << 1;
    }
}

bitflags! {
    /// Script verification flags that affect sigop accounting
    pub struct ScriptFlags: u32 {
        const P2SH = 1 << 0;
        const WITNESS = 1 << 11;
    }
}

bitflags! {
    /// Lock-time rules applied to a transaction
    pub struct LockTimeFlags: u32 {
        /// Enforce relative lock times encoded in input sequence numbers
        const VERIFY_SEQUENCE = 1 << 0;
    }
}

/// Parameters that influence chain consensus.
///
/// `disable_time_adjust` is only ever set for regression-test chains, where
/// it makes every time adjustment return its input unmodified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusParams {
    pub coinbase_maturity: u32,
    pub protocol_cleanup_coinbase_maturity: u32,
    pub disable_time_adjust: bool,
    pub scrip_epoch: i64,
    pub protocol_cleanup_activation_time: i64,
    pub size_expansion_activation_time: i64,
}

impl ConsensusParams {
    pub fn main() -> Self {
        Self {
            coinbase_maturity: COINBASE_MATURITY,
            protocol_cleanup_coinbase_maturity: PROTOCOL_CLEANUP_COINBASE_MATURITY,
            disable_time_adjust: false,
            scrip_epoch: SCRIP_EPOCH,
            protocol_cleanup_activation_time: 2_000_000_000,
            size_expansion_activation_time: 2_000_000_000,
        }
    }

    /// Regression-test parameters with demurrage switched off
    pub fn regtest() -> Self {
        Self {
            disable_time_adjust: true,
            ..Self::main()
        }
    }

    /// Load parameters from JSON; missing fields take main-network values
    pub fn from_json(json: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(json)
            .map_err(|e| ConsensusError::InvalidParams(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.coinbase_maturity == 0 || self.protocol_cleanup_coinbase_maturity == 0 {
            return Err(ConsensusError::InvalidParams(
                "coinbase maturity must be at least 1".to_string(),
            ));
        }
        if self.scrip_epoch < 0 || self.scrip_epoch > i32::MAX as i64 {
            return Err(ConsensusError::InvalidParams(format!(
                "scrip epoch {} out of range",
                self.scrip_epoch
            )));
        }
        Ok(())
    }

    /// Maturity applicable under the given rule set
    pub fn coinbase_maturity(&self, rules: RuleSet) -> u32 {
        if rules.contains(RuleSet::PROTOCOL_CLEANUP) {
            self.protocol_cleanup_coinbase_maturity
        } else {
            self.coinbase_maturity
        }
    }
}

impl Default for ConsensusParams {
    fn default() -> Self {
        Self::main()
    }
}

/// GetActiveRules: select the rule sets active for a block whose parent has
/// the given median time past.
pub fn get_active_rules(params: &ConsensusParams, median_time_past: i64) -> RuleSet {
    let mut rules = RuleSet::empty();
    if median_time_past >= params.protocol_cleanup_activation_time {
        rules |= RuleSet::PROTOCOL_CLEANUP;
    }
    if median_time_past >= params.size_expansion_activation_time {
        rules |= RuleSet::SIZE_EXPANSION;
    }
    rules
}
