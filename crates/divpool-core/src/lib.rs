// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DIVPOOL - CORE MODULE
//
// Balance-weighted, lazily-settled dividend accumulator.
// A holder's entitlement is the sum over distribution intervals of
// (balance held during the interval × dividend delta), divided by the
// share supply only at preview/claim time. Every share balance mutation
// crystallizes the affected holders with their PRE-mutation balances.
// All financial arithmetic is integer: u128 amounts, U256 weights.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub mod accumulator;
pub mod auth;
pub mod config;
pub mod custody;
pub mod error;
pub mod events;
pub mod ledger;
pub mod pool;
pub mod shared;
pub mod snapshot;

pub use accumulator::{HolderEntry, RewardAccumulator, Settlement};
pub use auth::AuthorizationGate;
pub use config::PoolConfig;
pub use custody::{RewardBank, RewardCustody};
pub use error::PoolError;
pub use events::PoolEvent;
pub use ledger::{BalanceHook, ShareBook, ShareLedger};
pub use pool::{ConservationReport, DividendPool, HolderInfo, PoolAssets, PoolInfo, PoolSetup};
pub use ruint::aliases::U256;
pub use shared::SharedPool;
pub use snapshot::PoolSnapshot;

pub use divpool_crypto::ADDRESS_LEN;

// ─────────────────────────────────────────────────────────────────
// IDENTIFIERS
// ─────────────────────────────────────────────────────────────────

/// 20-byte identifier for holders, assets, roles and pool anchors.
/// Text form: `0x` + 40 lowercase hex digits.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    /// Mint/burn origin. Never a valid holder.
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Address(bytes)
    }

    /// Identifier of a validator key (BLAKE2b-160 of the public key).
    pub fn from_public_key(public_key: &[u8]) -> Self {
        Address(divpool_crypto::public_key_to_address(public_key))
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LEN]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(digits).map_err(|e| format!("Invalid address '{}': {}", s, e))?;
        let array: [u8; ADDRESS_LEN] = bytes.try_into().map_err(|_| {
            format!(
                "Invalid address '{}': expected {} bytes",
                s, ADDRESS_LEN
            )
        })?;
        Ok(Address(array))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ─────────────────────────────────────────────────────────────────
// u128 / U256 ↔ String serialization
// (JSON and TOML don't carry 128/256-bit integers)
// ─────────────────────────────────────────────────────────────────

pub(crate) mod u128_str {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(val: &u128, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&val.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u128, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse::<u128>().map_err(serde::de::Error::custom)
    }
}

pub(crate) mod u256_str {
    use ruint::aliases::U256;
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::str::FromStr;

    pub fn serialize<S>(val: &U256, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&val.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<U256, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        U256::from_str(&s).map_err(serde::de::Error::custom)
    }
}
