//! Shared fixtures for the workspace-level integration tests.

use divpool_core::{Address, DividendPool, PoolError, PoolEvent, PoolSetup, RewardBank, ADDRESS_LEN};
use divpool_crypto::{generate_keypair, sign_distribution, KeyPair};

pub const ANCHOR: Address = Address([0xA0; ADDRESS_LEN]);
pub const OWNER: Address = Address([0x0E; ADDRESS_LEN]);
pub const MANAGER: Address = Address([0x4D; ADDRESS_LEN]);
pub const TREASURY: Address = Address([0x7E; ADDRESS_LEN]);
pub const SHARE_ASSET: Address = Address([0x5A; ADDRESS_LEN]);
pub const REWARD_ASSET: Address = Address([0x2B; ADDRESS_LEN]);

/// Treasury float credited to every fixture bank.
pub const TREASURY_FLOAT: u128 = 1_000_000_000_000;

/// Distinct non-zero holder address for index `i`.
pub fn holder(i: u8) -> Address {
    let mut bytes = [0xC0; ADDRESS_LEN];
    bytes[ADDRESS_LEN - 1] = i;
    Address(bytes)
}

/// An initialized, active pool together with its validator key.
pub struct Fixture {
    pub pool: DividendPool,
    pub validator: KeyPair,
}

impl Fixture {
    pub fn new() -> Result<Self, PoolError> {
        let validator = generate_keypair();
        let mut bank = RewardBank::new();
        bank.credit(&TREASURY, TREASURY_FLOAT)?;

        let mut pool = DividendPool::new(ANCHOR, OWNER, bank);
        pool.init_pool(&OWNER, setup(&validator))?;
        pool.set_active(&OWNER, true)?;
        Ok(Self { pool, validator })
    }

    /// Validator signature for the pool's next distribution of `amount`.
    pub fn sign(&self, amount: u128) -> Vec<u8> {
        sign_distribution(
            ANCHOR.as_bytes(),
            amount,
            self.pool.next_nonce(),
            &self.validator.secret_key,
        )
        .unwrap_or_default()
    }

    /// Manager-driven, validator-co-signed distribution.
    pub fn distribute(&mut self, amount: u128, now_secs: u64) -> Result<PoolEvent, PoolError> {
        let signature = self.sign(amount);
        self.pool
            .distribute_dividend(&MANAGER, amount, &signature, now_secs)
    }
}

pub fn setup(validator: &KeyPair) -> PoolSetup {
    PoolSetup {
        share_asset: SHARE_ASSET,
        reward_asset: REWARD_ASSET,
        manager: MANAGER,
        treasury: TREASURY,
        validator_public_key: validator.public_key.clone(),
    }
}
