// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DIVPOOL - REWARD ACCUMULATOR
//
// Pool:    total_dividend   monotonic sum of every distributed amount
//          total_weight     Σ of every crystallized (balance × delta)
// Holder:  pending_weight   Σ (balance × delta) since genesis, undivided
//          high_water_mark  total_dividend at the last crystallization
//          cumulative_paid  reward asset already sent to the holder
//
// entitlement = pending_weight / settlement_supply   (floor, at claim time)
//               settlement_supply = circulating + retired (burned) shares
// payable     = entitlement − cumulative_paid
//
// Distributions never touch holders. Division by supply is deferred to
// preview/claim so rounding happens once per claim, not once per round.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use log::debug;
use ruint::aliases::U256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ledger::BalanceHook;
use crate::{Address, PoolError};

/// Per-holder settlement state. Created on first balance change and never removed.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct HolderEntry {
    #[serde(with = "crate::u256_str")]
    pub pending_weight: U256,
    #[serde(with = "crate::u128_str")]
    pub high_water_mark: u128,
    #[serde(with = "crate::u128_str")]
    pub cumulative_paid: u128,
}

impl HolderEntry {
    /// Weight a crystallization at `total_dividend` with `balance` would add.
    pub fn accrued_weight(&self, total_dividend: u128, balance: u128) -> Result<U256, PoolError> {
        // high_water_mark <= total_dividend always holds
        let delta = total_dividend
            .checked_sub(self.high_water_mark)
            .ok_or(PoolError::ArithmeticOverflow)?;
        if delta == 0 || balance == 0 {
            return Ok(U256::ZERO);
        }
        U256::from(delta)
            .checked_mul(U256::from(balance))
            .ok_or(PoolError::ArithmeticOverflow)
    }
}

/// Result of settling one holder against the current share supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settlement {
    pub entitlement: u128,
    pub payable: u128,
}

/// `weight / total_supply`, floored. Zero supply entitles nobody.
pub fn entitlement_of(weight: U256, total_supply: u128) -> Result<u128, PoolError> {
    if total_supply == 0 {
        return Ok(0);
    }
    let quotient = weight / U256::from(total_supply);
    u128::try_from(quotient).map_err(|_| PoolError::ArithmeticOverflow)
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct RewardAccumulator {
    #[serde(with = "crate::u128_str")]
    total_dividend: u128,
    #[serde(with = "crate::u256_str")]
    total_weight: U256,
    last_dividend_time: u64,
    #[serde(with = "crate::u128_str")]
    total_paid: u128,
    /// BTreeMap for deterministic iteration and snapshot encoding
    holders: BTreeMap<Address, HolderEntry>,
}

impl RewardAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_dividend(&self) -> u128 {
        self.total_dividend
    }

    pub fn total_weight(&self) -> U256 {
        self.total_weight
    }

    pub fn last_dividend_time(&self) -> u64 {
        self.last_dividend_time
    }

    pub fn total_paid(&self) -> u128 {
        self.total_paid
    }

    pub fn holder(&self, holder: &Address) -> Option<&HolderEntry> {
        self.holders.get(holder)
    }

    pub fn holders(&self) -> impl Iterator<Item = (&Address, &HolderEntry)> {
        self.holders.iter()
    }

    pub fn holder_count(&self) -> usize {
        self.holders.len()
    }

    /// Fold the weight earned since the holder's high-water mark into
    /// `pending_weight`, then move the mark to the current `total_dividend`.
    ///
    /// `balance` MUST be the balance held over the elapsed interval, i.e. the
    /// balance immediately before any mutation that triggered this call.
    /// Calling twice with no dividend in between is a no-op the second time.
    pub fn crystallize(&mut self, holder: &Address, balance: u128) -> Result<(), PoolError> {
        let total_dividend = self.total_dividend;
        let entry = self.holders.entry(*holder).or_default();

        let accrued = entry.accrued_weight(total_dividend, balance)?;
        if !accrued.is_zero() {
            let pending = entry
                .pending_weight
                .checked_add(accrued)
                .ok_or(PoolError::ArithmeticOverflow)?;
            let total_weight = self
                .total_weight
                .checked_add(accrued)
                .ok_or(PoolError::ArithmeticOverflow)?;

            entry.pending_weight = pending;
            self.total_weight = total_weight;
            debug!(
                "crystallized {}: +{} weight (balance {}, hwm {} -> {})",
                holder, accrued, balance, entry.high_water_mark, total_dividend
            );
        }

        entry.high_water_mark = total_dividend;
        Ok(())
    }

    /// Weight the holder would have after crystallizing with `balance`. Read-only.
    pub fn calculate_weight(&self, holder: &Address, balance: u128) -> Result<U256, PoolError> {
        match self.holders.get(holder) {
            Some(entry) => {
                let accrued = entry.accrued_weight(self.total_dividend, balance)?;
                entry
                    .pending_weight
                    .checked_add(accrued)
                    .ok_or(PoolError::ArithmeticOverflow)
            }
            None => HolderEntry::default().accrued_weight(self.total_dividend, balance),
        }
    }

    /// What a claim would pay right now. Never mutates state.
    pub fn preview(
        &self,
        holder: &Address,
        balance: u128,
        settlement_supply: u128,
    ) -> Result<u128, PoolError> {
        let weight = self.calculate_weight(holder, balance)?;
        let entitlement = entitlement_of(weight, settlement_supply)?;
        let paid = self.holders.get(holder).map_or(0, |e| e.cumulative_paid);
        Ok(entitlement.saturating_sub(paid))
    }

    /// Credit a new distribution to the global counter. Holders are untouched.
    pub fn record_distribution(&mut self, amount: u128, now_secs: u64) -> Result<u128, PoolError> {
        let new_total = self
            .total_dividend
            .checked_add(amount)
            .ok_or(PoolError::ArithmeticOverflow)?;
        self.total_dividend = new_total;
        self.last_dividend_time = now_secs;
        Ok(new_total)
    }

    /// Compute what a claim with the holder's current balance owes. Read-only;
    /// every sum [`commit_payment`](Self::commit_payment) will perform is
    /// checked here.
    pub fn settle(
        &self,
        holder: &Address,
        balance: u128,
        settlement_supply: u128,
    ) -> Result<Settlement, PoolError> {
        let entry = self.holders.get(holder).cloned().unwrap_or_default();
        let accrued = entry.accrued_weight(self.total_dividend, balance)?;
        let weight = entry
            .pending_weight
            .checked_add(accrued)
            .ok_or(PoolError::ArithmeticOverflow)?;
        self.total_weight
            .checked_add(accrued)
            .ok_or(PoolError::ArithmeticOverflow)?;

        let entitlement = entitlement_of(weight, settlement_supply)?;
        let payable = entitlement.saturating_sub(entry.cumulative_paid);
        self.total_paid
            .checked_add(payable)
            .ok_or(PoolError::ArithmeticOverflow)?;
        Ok(Settlement {
            entitlement,
            payable,
        })
    }

    /// Apply a settlement after its payout was transferred: crystallize with
    /// the same `balance` and mark the entitlement paid. Returns the new
    /// `cumulative_paid`.
    pub fn commit_payment(
        &mut self,
        holder: &Address,
        balance: u128,
        settlement: Settlement,
    ) -> Result<u128, PoolError> {
        let total_paid = self
            .total_paid
            .checked_add(settlement.payable)
            .ok_or(PoolError::ArithmeticOverflow)?;
        self.crystallize(holder, balance)?;
        let entry = self.holders.entry(*holder).or_default();
        entry.cumulative_paid = entry.cumulative_paid.max(settlement.entitlement);
        self.total_paid = total_paid;
        Ok(entry.cumulative_paid)
    }

    /// Structural check for externally supplied state (snapshots).
    pub fn check_consistency(&self) -> Result<(), String> {
        let mut weight = U256::ZERO;
        let mut paid: u128 = 0;
        for (holder, entry) in &self.holders {
            if entry.high_water_mark > self.total_dividend {
                return Err(format!(
                    "{} high-water mark {} exceeds total dividend {}",
                    holder, entry.high_water_mark, self.total_dividend
                ));
            }
            weight = weight
                .checked_add(entry.pending_weight)
                .ok_or_else(|| "Pending weights overflow U256".to_string())?;
            paid = paid
                .checked_add(entry.cumulative_paid)
                .ok_or_else(|| "Cumulative payouts overflow u128".to_string())?;
        }
        if weight != self.total_weight {
            return Err(format!(
                "Pending weights sum to {} but total weight is {}",
                weight, self.total_weight
            ));
        }
        if paid != self.total_paid {
            return Err(format!(
                "Cumulative payouts sum to {} but total paid is {}",
                paid, self.total_paid
            ));
        }
        Ok(())
    }
}

impl BalanceHook for RewardAccumulator {
    fn on_balance_change(
        &mut self,
        holder: &Address,
        old_balance: u128,
        _new_balance: u128,
    ) -> Result<(), PoolError> {
        // The new balance only matters for the NEXT window
        self.crystallize(holder, old_balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ADDRESS_LEN;

    fn addr(b: u8) -> Address {
        Address([b; ADDRESS_LEN])
    }

    #[test]
    fn test_crystallize_accrues_delta_times_balance() {
        let mut acc = RewardAccumulator::new();
        acc.crystallize(&addr(1), 0).unwrap();
        acc.record_distribution(1_500, 100).unwrap();

        acc.crystallize(&addr(1), 1_000).unwrap();
        let entry = acc.holder(&addr(1)).unwrap();
        assert_eq!(entry.pending_weight, U256::from(1_500_000u128));
        assert_eq!(entry.high_water_mark, 1_500);
        assert_eq!(acc.total_weight(), U256::from(1_500_000u128));
    }

    #[test]
    fn test_crystallize_idempotent() {
        let mut acc = RewardAccumulator::new();
        acc.crystallize(&addr(1), 0).unwrap();
        acc.record_distribution(700, 1).unwrap();

        acc.crystallize(&addr(1), 10).unwrap();
        let first = acc.holder(&addr(1)).unwrap().clone();
        acc.crystallize(&addr(1), 10).unwrap();
        assert_eq!(acc.holder(&addr(1)).unwrap(), &first);
        assert_eq!(acc.total_weight(), U256::from(7_000u128));
    }

    #[test]
    fn test_first_touch_sets_high_water_mark() {
        let mut acc = RewardAccumulator::new();
        acc.record_distribution(5_000, 1).unwrap();

        // First seen after a distribution with a zero balance: earns nothing
        acc.on_balance_change(&addr(9), 0, 100).unwrap();
        let entry = acc.holder(&addr(9)).unwrap();
        assert_eq!(entry.high_water_mark, 5_000);
        assert!(entry.pending_weight.is_zero());
    }

    #[test]
    fn test_hook_uses_old_balance() {
        let mut acc = RewardAccumulator::new();
        acc.on_balance_change(&addr(1), 0, 100).unwrap();
        acc.record_distribution(10, 1).unwrap();

        // 100 held during the interval, 40 after: weight must use 100
        acc.on_balance_change(&addr(1), 100, 40).unwrap();
        assert_eq!(
            acc.holder(&addr(1)).unwrap().pending_weight,
            U256::from(1_000u128)
        );
    }

    #[test]
    fn test_preview_is_read_only() {
        let mut acc = RewardAccumulator::new();
        acc.on_balance_change(&addr(1), 0, 300).unwrap();
        acc.record_distribution(900, 1).unwrap();

        let before = acc.holder(&addr(1)).unwrap().clone();
        assert_eq!(acc.preview(&addr(1), 300, 1_000).unwrap(), 270);
        assert_eq!(acc.holder(&addr(1)).unwrap(), &before);
        assert!(acc.total_weight().is_zero());
    }

    #[test]
    fn test_settle_and_commit() {
        let mut acc = RewardAccumulator::new();
        acc.on_balance_change(&addr(1), 0, 250).unwrap();
        acc.record_distribution(1_000, 1).unwrap();

        let s = acc.settle(&addr(1), 250, 1_000).unwrap();
        assert_eq!(s, Settlement { entitlement: 250, payable: 250 });
        // Settling alone changes nothing
        assert_eq!(acc.holder(&addr(1)).unwrap().high_water_mark, 0);
        assert!(acc.total_weight().is_zero());

        assert_eq!(acc.commit_payment(&addr(1), 250, s).unwrap(), 250);
        assert_eq!(acc.total_paid(), 250);
        assert_eq!(acc.holder(&addr(1)).unwrap().high_water_mark, 1_000);
        assert_eq!(acc.total_weight(), U256::from(250_000u128));
        assert!(acc.check_consistency().is_ok());

        // Nothing new: second settlement owes zero
        let again = acc.settle(&addr(1), 250, 1_000).unwrap();
        assert_eq!(again.payable, 0);
    }

    #[test]
    fn test_zero_supply_entitles_nobody() {
        assert_eq!(entitlement_of(U256::from(10u128), 0).unwrap(), 0);
    }

    #[test]
    fn test_payable_saturates_when_supply_grows() {
        let mut acc = RewardAccumulator::new();
        acc.on_balance_change(&addr(1), 0, 100).unwrap();
        acc.record_distribution(100, 1).unwrap();
        let s = acc.settle(&addr(1), 100, 100).unwrap();
        acc.commit_payment(&addr(1), 100, s).unwrap();

        // Supply doubled afterwards: entitlement halves, nothing is clawed back
        assert_eq!(acc.preview(&addr(1), 100, 200).unwrap(), 0);
        let later = acc.settle(&addr(1), 100, 200).unwrap();
        assert_eq!(later.payable, 0);
    }

    #[test]
    fn test_consistency_rejects_future_high_water_mark() {
        let mut acc = RewardAccumulator::new();
        acc.record_distribution(10, 1).unwrap();
        acc.holders.insert(
            addr(1),
            HolderEntry {
                pending_weight: U256::ZERO,
                high_water_mark: 11,
                cumulative_paid: 0,
            },
        );
        assert!(acc.check_consistency().is_err());
    }

    #[test]
    fn test_max_values_do_not_wrap() {
        let entry = HolderEntry::default();
        let w = entry.accrued_weight(u128::MAX, u128::MAX).unwrap();
        assert_eq!(w, U256::from(u128::MAX) * U256::from(u128::MAX));
    }

    #[test]
    fn test_pending_overflow_is_fatal() {
        let mut acc = RewardAccumulator::new();
        acc.holders.insert(
            addr(1),
            HolderEntry {
                pending_weight: U256::MAX,
                high_water_mark: 0,
                cumulative_paid: 0,
            },
        );
        acc.record_distribution(1, 1).unwrap();
        assert_eq!(
            acc.crystallize(&addr(1), 1),
            Err(PoolError::ArithmeticOverflow)
        );
        // Rejected crystallization left the entry as it was
        assert_eq!(acc.holder(&addr(1)).unwrap().high_water_mark, 0);
    }

    #[test]
    fn test_distribution_overflow_rejected() {
        let mut acc = RewardAccumulator::new();
        acc.record_distribution(u128::MAX, 1).unwrap();
        assert_eq!(
            acc.record_distribution(1, 2),
            Err(PoolError::ArithmeticOverflow)
        );
        assert_eq!(acc.total_dividend(), u128::MAX);
        assert_eq!(acc.last_dividend_time(), 1);
    }
}
