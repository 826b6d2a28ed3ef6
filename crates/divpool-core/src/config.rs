use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use divpool_crypto::PUBLIC_KEY_LEN;

use crate::custody::RewardCustody;
use crate::pool::{DividendPool, PoolSetup};
use crate::Address;

/// Deployment description of one dividend pool.
/// Loaded from TOML or from `DIVPOOL_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub anchor: Address,
    pub owner: Address,
    pub share_asset: Address,
    pub reward_asset: Address,
    pub manager: Address,
    pub treasury: Address,
    /// Hex-encoded Ed25519 public key of the co-signing validator
    pub validator_public_key: String,
    /// Activate right after initialization
    #[serde(default)]
    pub start_active: bool,
}

impl PoolConfig {
    /// Load pool config from TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        let config: PoolConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load pool config from environment variables
    /// Useful for containerized deployments
    pub fn load_from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Self::load_from_vars(|key| std::env::var(key).ok())
    }

    /// Same as [`load_from_env`](Self::load_from_env) with an explicit lookup.
    pub fn load_from_vars<F>(lookup: F) -> Result<Self, Box<dyn std::error::Error>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<Address, Box<dyn std::error::Error>> {
            let raw = lookup(key).ok_or_else(|| format!("{} not set", key))?;
            Ok(raw.parse::<Address>()?)
        };

        let anchor = required("DIVPOOL_ANCHOR")?;
        let owner = required("DIVPOOL_OWNER")?;
        let share_asset = required("DIVPOOL_SHARE_ASSET")?;
        let reward_asset = required("DIVPOOL_REWARD_ASSET")?;
        let manager = required("DIVPOOL_MANAGER")?;
        // Treasury defaults to the manager account
        let treasury = match lookup("DIVPOOL_TREASURY") {
            Some(raw) => raw.parse::<Address>()?,
            None => manager,
        };
        let validator_public_key =
            lookup("DIVPOOL_VALIDATOR_PUBKEY").ok_or("DIVPOOL_VALIDATOR_PUBKEY not set")?;
        let start_active: bool = lookup("DIVPOOL_START_ACTIVE")
            .unwrap_or_else(|| "false".to_string())
            .parse()?;

        Ok(Self {
            anchor,
            owner,
            share_asset,
            reward_asset,
            manager,
            treasury,
            validator_public_key,
            start_active,
        })
    }

    /// Save pool config to TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        let identities = [
            ("anchor", &self.anchor),
            ("owner", &self.owner),
            ("share_asset", &self.share_asset),
            ("reward_asset", &self.reward_asset),
            ("manager", &self.manager),
            ("treasury", &self.treasury),
        ];
        for (name, addr) in identities {
            if addr.is_zero() {
                return Err(format!("{} cannot be the zero address", name));
            }
        }

        let key = self.validator_key_bytes()?;
        if Address::from_public_key(&key) == self.manager {
            return Err("Validator key must not belong to the manager".to_string());
        }

        Ok(())
    }

    /// Decoded validator public key
    pub fn validator_key_bytes(&self) -> Result<Vec<u8>, String> {
        let digits = self
            .validator_public_key
            .strip_prefix("0x")
            .unwrap_or(&self.validator_public_key);
        let key = hex::decode(digits).map_err(|e| format!("Invalid validator key hex: {}", e))?;
        if key.len() != PUBLIC_KEY_LEN {
            return Err(format!(
                "Validator key must be {} bytes, got {}",
                PUBLIC_KEY_LEN,
                key.len()
            ));
        }
        Ok(key)
    }

    pub fn to_setup(&self) -> Result<PoolSetup, String> {
        Ok(PoolSetup {
            share_asset: self.share_asset,
            reward_asset: self.reward_asset,
            manager: self.manager,
            treasury: self.treasury,
            validator_public_key: self.validator_key_bytes()?,
        })
    }

    /// Construct, initialize and (optionally) activate a pool in one step.
    pub fn build_pool<C: RewardCustody>(
        &self,
        custody: C,
    ) -> Result<DividendPool<C>, Box<dyn std::error::Error>> {
        self.validate()?;
        let mut pool = DividendPool::new(self.anchor, self.owner, custody);
        pool.init_pool(&self.owner, self.to_setup()?)?;
        if self.start_active {
            pool.set_active(&self.owner, true)?;
        }
        Ok(pool)
    }
}
