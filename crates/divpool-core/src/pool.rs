// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DIVPOOL - DIVIDEND POOL
//
// Lifecycle:  new(anchor, owner)  →  init_pool (owner, once)  →  set_active
// Flows:      ledger mutation → hook → accumulator       (crystallize first)
//             manager + validator sig → gate → accumulator (distribute)
//             holder → ledger balance/supply → accumulator (claim)
//
// Every operation validates fully before it mutates anything.
// Burned shares sit with the sink (`Address::ZERO`) and keep diluting
// entitlements; the sink never claims, its share stays in custody as dust.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use log::{info, warn};
use ruint::aliases::U256;
use serde::{Deserialize, Serialize};

use crate::accumulator::RewardAccumulator;
use crate::auth::AuthorizationGate;
use crate::custody::{RewardBank, RewardCustody};
use crate::ledger::{ShareBook, ShareLedger};
use crate::snapshot::PoolSnapshot;
use crate::{Address, PoolError, PoolEvent};

/// Arguments of the one-time `init_pool` call.
#[derive(Debug, Clone)]
pub struct PoolSetup {
    pub share_asset: Address,
    pub reward_asset: Address,
    pub manager: Address,
    pub treasury: Address,
    /// Ed25519 public key of the co-signing validator
    pub validator_public_key: Vec<u8>,
}

/// Identities fixed at initialization.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolAssets {
    pub share_asset: Address,
    pub reward_asset: Address,
    pub manager: Address,
    pub treasury: Address,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolInfo {
    #[serde(with = "crate::u128_str")]
    pub total_dividend: u128,
    #[serde(with = "crate::u256_str")]
    pub total_weight: U256,
    pub last_dividend_time: u64,
    pub active: bool,
    pub share_asset: Address,
    pub reward_asset: Address,
    pub manager: Address,
    pub treasury: Address,
    /// Nonce the validator must sign for the next distribution
    pub distribution_nonce: u64,
    #[serde(with = "crate::u128_str")]
    pub total_paid: u128,
    pub holder_count: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct HolderInfo {
    #[serde(with = "crate::u256_str")]
    pub pending_weight: U256,
    #[serde(with = "crate::u128_str")]
    pub high_water_mark: u128,
    #[serde(with = "crate::u128_str")]
    pub cumulative_paid: u128,
}

/// Output of [`DividendPool::audit_conservation`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ConservationReport {
    #[serde(with = "crate::u128_str")]
    pub total_dividend: u128,
    #[serde(with = "crate::u128_str")]
    pub total_claimable: u128,
    #[serde(with = "crate::u128_str")]
    pub total_paid: u128,
    /// Rounding remainder: distributed but not attributable to anyone
    #[serde(with = "crate::u128_str")]
    pub dust: u128,
}

pub struct DividendPool<C: RewardCustody = RewardBank> {
    anchor: Address,
    owner: Address,
    assets: Option<PoolAssets>,
    gate: Option<AuthorizationGate>,
    active: bool,
    accumulator: RewardAccumulator,
    shares: ShareBook,
    custody: C,
    events: Vec<PoolEvent>,
}

impl<C: RewardCustody> DividendPool<C> {
    /// Phase one of construction. The pool is uninitialized and inactive
    /// until `owner` calls [`init_pool`](Self::init_pool).
    pub fn new(anchor: Address, owner: Address, custody: C) -> Self {
        Self {
            anchor,
            owner,
            assets: None,
            gate: None,
            active: false,
            accumulator: RewardAccumulator::new(),
            shares: ShareBook::new(),
            custody,
            events: Vec::new(),
        }
    }

    pub fn anchor(&self) -> Address {
        self.anchor
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn is_initialized(&self) -> bool {
        self.assets.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn next_nonce(&self) -> u64 {
        self.gate.as_ref().map_or(0, |g| g.next_nonce())
    }

    pub fn accumulator(&self) -> &RewardAccumulator {
        &self.accumulator
    }

    pub fn shares(&self) -> &ShareBook {
        &self.shares
    }

    pub fn custody(&self) -> &C {
        &self.custody
    }

    pub fn custody_mut(&mut self) -> &mut C {
        &mut self.custody
    }

    fn require_owner(&self, caller: &Address) -> Result<(), PoolError> {
        if *caller != self.owner {
            return Err(PoolError::Unauthorized);
        }
        Ok(())
    }

    fn require_active(&self) -> Result<PoolAssets, PoolError> {
        match self.assets {
            Some(assets) if self.active => Ok(assets),
            _ => Err(PoolError::PoolInactive),
        }
    }

    fn emit(&mut self, event: PoolEvent) -> PoolEvent {
        self.events.push(event.clone());
        event
    }

    // ─────────────────────────────────────────────────────────────
    // ADMINISTRATION
    // ─────────────────────────────────────────────────────────────

    /// Phase two of construction. Owner only, exactly once.
    pub fn init_pool(&mut self, caller: &Address, setup: PoolSetup) -> Result<PoolEvent, PoolError> {
        self.require_owner(caller)?;
        if self.assets.is_some() {
            return Err(PoolError::AlreadyInitialized);
        }
        let identities = [
            setup.share_asset,
            setup.reward_asset,
            setup.manager,
            setup.treasury,
        ];
        if identities.iter().any(Address::is_zero) {
            return Err(PoolError::InvalidAddress);
        }

        let gate = AuthorizationGate::new(self.anchor, setup.manager, &setup.validator_public_key)?;
        let validator = gate.validator();

        self.assets = Some(PoolAssets {
            share_asset: setup.share_asset,
            reward_asset: setup.reward_asset,
            manager: setup.manager,
            treasury: setup.treasury,
        });
        self.gate = Some(gate);

        info!(
            "pool {} initialized: shares {} rewards {} manager {} validator {}",
            self.anchor, setup.share_asset, setup.reward_asset, setup.manager, validator
        );
        Ok(self.emit(PoolEvent::PoolInitialized {
            anchor: self.anchor,
            share_asset: setup.share_asset,
            reward_asset: setup.reward_asset,
            manager: setup.manager,
            treasury: setup.treasury,
            validator,
        }))
    }

    /// Owner only. Returns `None` when the flag already had that value.
    pub fn set_active(&mut self, caller: &Address, active: bool) -> Result<Option<PoolEvent>, PoolError> {
        self.require_owner(caller)?;
        if self.assets.is_none() {
            return Err(PoolError::PoolInactive);
        }
        if self.active == active {
            return Ok(None);
        }
        self.active = active;
        info!("pool {} active={}", self.anchor, active);
        Ok(Some(self.emit(PoolEvent::PoolStatusChanged { active })))
    }

    // ─────────────────────────────────────────────────────────────
    // DISTRIBUTION
    // ─────────────────────────────────────────────────────────────

    /// Pull `amount` of the reward asset from the treasury and credit it to
    /// the global dividend counter. No holder is crystallized here.
    ///
    /// `signature` must be the validator's signature over
    /// `distribution_payload(anchor, amount, next_nonce())`.
    pub fn distribute_dividend(
        &mut self,
        caller: &Address,
        amount: u128,
        signature: &[u8],
        now_secs: u64,
    ) -> Result<PoolEvent, PoolError> {
        let assets = self.require_active()?;
        if amount == 0 {
            return Err(PoolError::InvalidAmount);
        }
        let gate = self.gate.as_ref().ok_or(PoolError::PoolInactive)?;
        let nonce = match gate.authorize(caller, amount, signature) {
            Ok(nonce) => nonce,
            Err(e) => {
                warn!("pool {}: distribution of {} rejected", self.anchor, amount);
                return Err(e);
            }
        };
        self.accumulator
            .total_dividend()
            .checked_add(amount)
            .ok_or(PoolError::ArithmeticOverflow)?;

        if let Err(e) = self.custody.transfer(&assets.treasury, &self.anchor, amount) {
            warn!(
                "pool {}: treasury {} cannot fund {}: {}",
                self.anchor, assets.treasury, amount, e
            );
            return Err(e);
        }
        let new_total_dividend = self.accumulator.record_distribution(amount, now_secs)?;
        if let Some(gate) = self.gate.as_mut() {
            gate.consume(nonce);
        }

        info!(
            "pool {}: distributed {} (total {}, nonce {})",
            self.anchor, amount, new_total_dividend, nonce
        );
        Ok(self.emit(PoolEvent::DividendDistributed {
            amount,
            new_total_dividend,
            timestamp: now_secs,
        }))
    }

    // ─────────────────────────────────────────────────────────────
    // CLAIM / PREVIEW
    // ─────────────────────────────────────────────────────────────

    /// Settle `holder` with its current balance and pay what is owed.
    /// Returns the amount paid; `0` (no event) when nothing is owed.
    pub fn claim_reward(&mut self, holder: &Address) -> Result<u128, PoolError> {
        self.require_active()?;
        if holder.is_zero() {
            return Err(PoolError::InvalidAddress);
        }

        let balance = self.shares.balance_of(holder);
        let supply = self.shares.settlement_supply();
        let settlement = self.accumulator.settle(holder, balance, supply)?;
        if settlement.payable == 0 {
            return Ok(0);
        }

        self.custody
            .transfer(&self.anchor, holder, settlement.payable)?;
        let new_cumulative_paid = self
            .accumulator
            .commit_payment(holder, balance, settlement)?;

        info!(
            "pool {}: {} claimed {} (cumulative {})",
            self.anchor, holder, settlement.payable, new_cumulative_paid
        );
        self.emit(PoolEvent::RewardClaimed {
            holder: *holder,
            amount: settlement.payable,
            new_cumulative_paid,
        });
        Ok(settlement.payable)
    }

    /// What `claim_reward(holder)` would pay now. Read-only.
    pub fn preview_reward(&self, holder: &Address) -> Result<u128, PoolError> {
        self.accumulator.preview(
            holder,
            self.shares.balance_of(holder),
            self.shares.settlement_supply(),
        )
    }

    /// Undivided weight the holder would have after crystallizing now.
    pub fn calculate_weight(&self, holder: &Address) -> Result<U256, PoolError> {
        self.accumulator
            .calculate_weight(holder, self.shares.balance_of(holder))
    }

    // ─────────────────────────────────────────────────────────────
    // SHARE LEDGER (every mutation runs the crystallize hook first)
    // ─────────────────────────────────────────────────────────────

    pub fn mint(&mut self, to: &Address, amount: u128) -> Result<(), PoolError> {
        self.shares.mint(to, amount, &mut self.accumulator)
    }

    pub fn burn(&mut self, from: &Address, amount: u128) -> Result<(), PoolError> {
        self.shares.burn(from, amount, &mut self.accumulator)
    }

    pub fn transfer(&mut self, from: &Address, to: &Address, amount: u128) -> Result<(), PoolError> {
        self.shares.transfer(from, to, amount, &mut self.accumulator)
    }

    pub fn share_balance(&self, holder: &Address) -> u128 {
        self.shares.balance_of(holder)
    }

    pub fn total_supply(&self) -> u128 {
        self.shares.total_supply()
    }

    /// Circulating plus burned shares; the entitlement divisor.
    pub fn settlement_supply(&self) -> u128 {
        self.shares.settlement_supply()
    }

    // ─────────────────────────────────────────────────────────────
    // INTROSPECTION
    // ─────────────────────────────────────────────────────────────

    pub fn pool_info(&self) -> PoolInfo {
        let assets = self.assets;
        PoolInfo {
            total_dividend: self.accumulator.total_dividend(),
            total_weight: self.accumulator.total_weight(),
            last_dividend_time: self.accumulator.last_dividend_time(),
            active: self.active,
            share_asset: assets.map_or(Address::ZERO, |a| a.share_asset),
            reward_asset: assets.map_or(Address::ZERO, |a| a.reward_asset),
            manager: assets.map_or(Address::ZERO, |a| a.manager),
            treasury: assets.map_or(Address::ZERO, |a| a.treasury),
            distribution_nonce: self.next_nonce(),
            total_paid: self.accumulator.total_paid(),
            holder_count: self
                .accumulator
                .holders()
                .filter(|(holder, _)| !holder.is_zero())
                .count() as u64,
        }
    }

    /// Untracked holders report the zero entry.
    pub fn holder_info(&self, holder: &Address) -> HolderInfo {
        match self.accumulator.holder(holder) {
            Some(entry) => HolderInfo {
                pending_weight: entry.pending_weight,
                high_water_mark: entry.high_water_mark,
                cumulative_paid: entry.cumulative_paid,
            },
            None => HolderInfo::default(),
        }
    }

    pub fn events(&self) -> &[PoolEvent] {
        &self.events
    }

    /// Log records from position `cursor` onward (indexer polling).
    pub fn events_since(&self, cursor: usize) -> &[PoolEvent] {
        self.events.get(cursor..).unwrap_or(&[])
    }

    /// Conservation audit.
    ///
    /// Verifies: Σ preview(holder) + total_paid <= total_dividend, and that the
    /// pool's custody account can cover every outstanding preview.
    ///
    /// The gap (`dust`) is integer-division rounding, the burned shares'
    /// portion and any dividend that arrived while no shares existed.
    pub fn audit_conservation(&self) -> Result<ConservationReport, String> {
        let supply = self.shares.settlement_supply();
        let mut total_claimable: u128 = 0;
        for (holder, _) in self.accumulator.holders().filter(|(h, _)| !h.is_zero()) {
            let preview = self
                .accumulator
                .preview(holder, self.shares.balance_of(holder), supply)
                .map_err(|e| format!("preview for {} failed: {}", holder, e))?;
            total_claimable = total_claimable
                .checked_add(preview)
                .ok_or_else(|| "claimable sum overflows u128".to_string())?;
        }

        let total_paid = self.accumulator.total_paid();
        let total_dividend = self.accumulator.total_dividend();
        let accounted = total_claimable
            .checked_add(total_paid)
            .ok_or_else(|| "claimable + paid overflows u128".to_string())?;

        if accounted > total_dividend {
            return Err(format!(
                "Conservation audit FAILED: claimable {} + paid {} > distributed {} (excess {})",
                total_claimable,
                total_paid,
                total_dividend,
                accounted - total_dividend
            ));
        }
        let held = self.custody.balance_of(&self.anchor);
        if held < total_claimable {
            return Err(format!(
                "Conservation audit FAILED: custody holds {} < claimable {}",
                held, total_claimable
            ));
        }

        Ok(ConservationReport {
            total_dividend,
            total_claimable,
            total_paid,
            dust: total_dividend - accounted,
        })
    }

    // ─────────────────────────────────────────────────────────────
    // PERSISTENCE
    // ─────────────────────────────────────────────────────────────

    /// Capture everything except custody, which lives outside the pool.
    pub fn snapshot(&self) -> PoolSnapshot {
        PoolSnapshot {
            anchor: self.anchor,
            owner: self.owner,
            assets: self.assets,
            gate: self.gate.clone(),
            active: self.active,
            accumulator: self.accumulator.clone(),
            shares: self.shares.clone(),
            events: self.events.clone(),
        }
    }

    /// Rebuild a pool from a snapshot. Rejects snapshots whose ledger or
    /// accumulator totals disagree with their entries.
    pub fn restore(snapshot: PoolSnapshot, custody: C) -> Result<Self, String> {
        snapshot.shares.check_consistency()?;
        snapshot.accumulator.check_consistency()?;
        if snapshot.assets.is_some() != snapshot.gate.is_some() {
            return Err("Snapshot initialization state is incomplete".to_string());
        }
        if snapshot.active && snapshot.assets.is_none() {
            return Err("Snapshot is active but not initialized".to_string());
        }

        Ok(Self {
            anchor: snapshot.anchor,
            owner: snapshot.owner,
            assets: snapshot.assets,
            gate: snapshot.gate,
            active: snapshot.active,
            accumulator: snapshot.accumulator,
            shares: snapshot.shares,
            custody,
            events: snapshot.events,
        })
    }
}
