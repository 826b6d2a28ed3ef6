use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};

use crate::accumulator::RewardAccumulator;
use crate::auth::AuthorizationGate;
use crate::ledger::{ShareBook, ShareLedger};
use crate::pool::PoolAssets;
use crate::{Address, PoolEvent};

/// Serializable image of a [`DividendPool`](crate::DividendPool) without its
/// reward custody, which is owned by the host.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PoolSnapshot {
    pub anchor: Address,
    pub owner: Address,
    pub assets: Option<PoolAssets>,
    pub gate: Option<AuthorizationGate>,
    pub active: bool,
    pub accumulator: RewardAccumulator,
    pub shares: ShareBook,
    #[serde(default)]
    pub events: Vec<PoolEvent>,
}

impl PoolSnapshot {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Deterministic SHA3-256 over the settlement state (hex).
    ///
    /// Covers counters, every holder entry and every share balance in sorted
    /// address order. The event log is excluded: two pools with the same
    /// balances and entitlements share a root regardless of history.
    pub fn state_root(&self) -> String {
        let mut hasher = Sha3_256::new();
        hasher.update(self.anchor.as_bytes());
        hasher.update([self.active as u8]);
        hasher.update(self.accumulator.total_dividend().to_be_bytes());
        hasher.update(self.accumulator.total_weight().to_be_bytes::<32>());
        hasher.update(self.accumulator.total_paid().to_be_bytes());
        hasher.update(
            self.gate
                .as_ref()
                .map_or(0, |g| g.next_nonce())
                .to_be_bytes(),
        );

        for (holder, entry) in self.accumulator.holders() {
            hasher.update(holder.as_bytes());
            hasher.update(entry.pending_weight.to_be_bytes::<32>());
            hasher.update(entry.high_water_mark.to_be_bytes());
            hasher.update(entry.cumulative_paid.to_be_bytes());
        }

        hasher.update(self.shares.total_supply().to_be_bytes());
        hasher.update(self.shares.retired().to_be_bytes());
        for (holder, balance) in self.shares.holders() {
            hasher.update(holder.as_bytes());
            hasher.update(balance.to_be_bytes());
        }
        hex::encode(hasher.finalize())
    }
}
