use serde::{Deserialize, Serialize};

use crate::Address;

/// Append-only pool log records, consumed by off-chain indexers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PoolEvent {
    /// Emitted once by `init_pool`
    PoolInitialized {
        anchor: Address,
        share_asset: Address,
        reward_asset: Address,
        manager: Address,
        treasury: Address,
        validator: Address,
    },
    /// Emitted when `set_active` flips the flag
    PoolStatusChanged { active: bool },
    /// Emitted on every accepted distribution
    DividendDistributed {
        #[serde(with = "crate::u128_str")]
        amount: u128,
        #[serde(with = "crate::u128_str")]
        new_total_dividend: u128,
        timestamp: u64,
    },
    /// Emitted on every claim that pays out
    RewardClaimed {
        holder: Address,
        #[serde(with = "crate::u128_str")]
        amount: u128,
        #[serde(with = "crate::u128_str")]
        new_cumulative_paid: u128,
    },
}
