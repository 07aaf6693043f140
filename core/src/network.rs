/// Chain identification for the pool.
///
/// Each supported chain carries the block height at which ECIP-1099
/// doubles the Etchash epoch length. The records are built once at
/// startup and handed to the hasher registry by value.

use serde::{Deserialize, Serialize};
use std::fmt;

/// ECIP-1099 activation on Ethereum Classic mainnet.
pub const CLASSIC_ECIP1099_BLOCK: u64 = 11_700_000;

/// ECIP-1099 activation on the Mordor testnet.
pub const MORDOR_ECIP1099_BLOCK: u64 = 2_520_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Classic,
    Mordor,
}

impl Chain {
    /// Identifier used in configuration, logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Chain::Classic => "classic",
            Chain::Mordor => "mordor",
        }
    }

    pub fn ecip1099_block(&self) -> u64 {
        match self {
            Chain::Classic => CLASSIC_ECIP1099_BLOCK,
            Chain::Mordor => MORDOR_ECIP1099_BLOCK,
        }
    }

    pub fn schedule(&self) -> ForkSchedule {
        ForkSchedule::new(self.name(), self.ecip1099_block())
    }

    pub fn all() -> [Chain; 2] {
        [Chain::Classic, Chain::Mordor]
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Fork-epoch record for one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkSchedule {
    pub chain: String,
    /// First block mined under the 60 000-block epoch rule.
    pub ecip1099_block: u64,
}

impl ForkSchedule {
    pub fn new(chain: impl Into<String>, ecip1099_block: u64) -> Self {
        Self {
            chain: chain.into(),
            ecip1099_block,
        }
    }

    /// Records for every chain the pool knows how to verify.
    pub fn defaults() -> Vec<ForkSchedule> {
        Chain::all().iter().map(Chain::schedule).collect()
    }
}
