use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{Address, PoolError};

/// Reward-asset custody seam. The pool holds its funds under its anchor
/// address: distributions pull from the treasury into it, claims pay out of it.
pub trait RewardCustody {
    fn balance_of(&self, owner: &Address) -> u128;

    /// Move `amount` from `from` to `to`. All-or-nothing; fails with
    /// `InsufficientFunds` when `from` cannot cover it.
    fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> Result<(), PoolError>;
}

/// In-memory reward asset book.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct RewardBank {
    balances: BTreeMap<Address, u128>,
}

impl RewardBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fund an account from outside the system (treasury top-ups).
    pub fn credit(&mut self, owner: &Address, amount: u128) -> Result<(), PoolError> {
        let balance = self.balances.entry(*owner).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or(PoolError::ArithmeticOverflow)?;
        Ok(())
    }
}

impl RewardCustody for RewardBank {
    fn balance_of(&self, owner: &Address) -> u128 {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> Result<(), PoolError> {
        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(PoolError::InsufficientFunds);
        }
        if from == to || amount == 0 {
            return Ok(());
        }
        let to_balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(PoolError::ArithmeticOverflow)?;

        self.balances.insert(*from, from_balance - amount);
        self.balances.insert(*to, to_balance);
        Ok(())
    }
}
