// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DIVPOOL - SHARED POOL HANDLE
//
// One mutex around the whole pool: a ledger mutation and its crystallize
// hook, or a settle and its payment, never interleave with another caller.
// Poisoned locks are recovered, never propagated as panics.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::sync::{Arc, Mutex, MutexGuard};

use ruint::aliases::U256;

use crate::custody::{RewardBank, RewardCustody};
use crate::pool::{ConservationReport, DividendPool, HolderInfo, PoolInfo, PoolSetup};
use crate::snapshot::PoolSnapshot;
use crate::{Address, PoolError, PoolEvent};

/// Recover from poisoned mutex instead of panicking
fn safe_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Cloneable, thread-safe handle to a [`DividendPool`].
pub struct SharedPool<C: RewardCustody = RewardBank> {
    inner: Arc<Mutex<DividendPool<C>>>,
}

impl<C: RewardCustody> Clone for SharedPool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: RewardCustody> SharedPool<C> {
    pub fn new(pool: DividendPool<C>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(pool)),
        }
    }

    /// Run `f` with exclusive access. Keep `f` short: every other caller waits.
    pub fn with<R>(&self, f: impl FnOnce(&mut DividendPool<C>) -> R) -> R {
        let mut pool = safe_lock(&self.inner);
        f(&mut pool)
    }

    pub fn init_pool(&self, caller: &Address, setup: PoolSetup) -> Result<PoolEvent, PoolError> {
        safe_lock(&self.inner).init_pool(caller, setup)
    }

    pub fn set_active(&self, caller: &Address, active: bool) -> Result<Option<PoolEvent>, PoolError> {
        safe_lock(&self.inner).set_active(caller, active)
    }

    /// Distribute stamped with the wall clock.
    pub fn distribute_dividend(
        &self,
        caller: &Address,
        amount: u128,
        signature: &[u8],
    ) -> Result<PoolEvent, PoolError> {
        self.distribute_dividend_at(caller, amount, signature, now_secs())
    }

    pub fn distribute_dividend_at(
        &self,
        caller: &Address,
        amount: u128,
        signature: &[u8],
        now_secs: u64,
    ) -> Result<PoolEvent, PoolError> {
        safe_lock(&self.inner).distribute_dividend(caller, amount, signature, now_secs)
    }

    pub fn claim_reward(&self, holder: &Address) -> Result<u128, PoolError> {
        safe_lock(&self.inner).claim_reward(holder)
    }

    pub fn preview_reward(&self, holder: &Address) -> Result<u128, PoolError> {
        safe_lock(&self.inner).preview_reward(holder)
    }

    pub fn calculate_weight(&self, holder: &Address) -> Result<U256, PoolError> {
        safe_lock(&self.inner).calculate_weight(holder)
    }

    pub fn mint(&self, to: &Address, amount: u128) -> Result<(), PoolError> {
        safe_lock(&self.inner).mint(to, amount)
    }

    pub fn burn(&self, from: &Address, amount: u128) -> Result<(), PoolError> {
        safe_lock(&self.inner).burn(from, amount)
    }

    pub fn transfer(&self, from: &Address, to: &Address, amount: u128) -> Result<(), PoolError> {
        safe_lock(&self.inner).transfer(from, to, amount)
    }

    pub fn next_nonce(&self) -> u64 {
        safe_lock(&self.inner).next_nonce()
    }

    pub fn pool_info(&self) -> PoolInfo {
        safe_lock(&self.inner).pool_info()
    }

    pub fn holder_info(&self, holder: &Address) -> HolderInfo {
        safe_lock(&self.inner).holder_info(holder)
    }

    pub fn events_since(&self, cursor: usize) -> Vec<PoolEvent> {
        safe_lock(&self.inner).events_since(cursor).to_vec()
    }

    pub fn audit_conservation(&self) -> Result<ConservationReport, String> {
        safe_lock(&self.inner).audit_conservation()
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        safe_lock(&self.inner).snapshot()
    }
}
