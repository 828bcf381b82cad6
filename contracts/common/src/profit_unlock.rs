//! Profit Unlock
//!
//! Reported profit is minted as shares held by the vault itself and
//! released linearly over `profit_max_unlock_time`. A released share is
//! burned: `effective_total_supply` already leaves it out, and `settle`
//! reports how many the vault must burn from its own balance. Share pricing
//! reads `effective_total_supply`, never the raw supply, so the price per
//! share climbs from its pre-profit level to its post-profit level over
//! the window.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::constants::precision::WAD;
use crate::constants::profit::PROFIT_MAX_UNLOCK_TIME;
use crate::errors::{VaultError, VaultResult};
use crate::math::mul_div;

/// Locked-profit schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ProfitUnlockState {
    /// Vault-held shares still on the unlock schedule
    pub locked_shares: u128,
    /// Shares released per second, scaled by 1e18
    pub unlocking_rate: u128,
    /// Timestamp of the last report
    pub last_report: u64,
    /// Timestamp at which all locked shares are released
    pub full_unlock: u64,
    /// Length of one unlock schedule in seconds
    pub profit_max_unlock_time: u64,
}

impl Default for ProfitUnlockState {
    fn default() -> Self {
        Self::new(PROFIT_MAX_UNLOCK_TIME, 0)
    }
}

impl ProfitUnlockState {
    pub fn new(profit_max_unlock_time: u64, now: u64) -> Self {
        Self {
            locked_shares: 0,
            unlocking_rate: 0,
            last_report: now,
            full_unlock: now,
            profit_max_unlock_time,
        }
    }

    /// Shares released since the last report
    pub fn unlocked_shares(&self, now: u64) -> u128 {
        if self.locked_shares == 0 {
            return 0;
        }
        if now >= self.full_unlock {
            return self.locked_shares;
        }
        // rate * elapsed, computed from the unscaled lock to avoid rate truncation
        let elapsed = now.saturating_sub(self.last_report) as u128;
        let window = self.full_unlock.saturating_sub(self.last_report) as u128;
        let released = mul_div(self.locked_shares, elapsed, window).unwrap_or(self.locked_shares);
        released.min(self.locked_shares)
    }

    /// Shares still locked at `now`
    pub fn still_locked(&self, now: u64) -> u128 {
        self.locked_shares - self.unlocked_shares(now)
    }

    /// Raw supply minus the released shares that are due to be burned
    ///
    /// Still-locked shares count: they were minted at the pre-profit price
    /// and hold the unrealized part of the profit.
    pub fn effective_total_supply(&self, raw_total_supply: u128, now: u64) -> u128 {
        raw_total_supply.saturating_sub(self.unlocked_shares(now))
    }

    /// Take released shares off the schedule and return them
    ///
    /// The caller burns the returned amount from the vault's balance; until
    /// then `effective_total_supply` already excludes it.
    pub fn settle(&mut self, now: u64) -> u128 {
        let released = self.unlocked_shares(now);
        self.locked_shares -= released;
        self.last_report = now;
        if self.locked_shares == 0 {
            self.unlocking_rate = 0;
            self.full_unlock = now;
        }
        released
    }

    fn reset_rate(&mut self, now: u64, horizon: u64) -> VaultResult<()> {
        if self.locked_shares == 0 || horizon == 0 {
            // Nothing left to stream; a zero horizon releases the whole lock at `now`
            self.unlocking_rate = 0;
            self.full_unlock = now;
            return Ok(());
        }
        self.unlocking_rate = mul_div(self.locked_shares, WAD, horizon as u128)?;
        self.full_unlock = now.checked_add(horizon).ok_or(VaultError::Overflow)?;
        Ok(())
    }

    /// Lock freshly minted profit shares
    ///
    /// Call `settle(now)` first and burn what it returns. The remaining lock
    /// plus `profit_shares` restarts a full schedule from `now`.
    pub fn lock_profit(&mut self, profit_shares: u128, now: u64) -> VaultResult<()> {
        if self.last_report != now && self.unlocked_shares(now) > 0 {
            return Err(VaultError::InvariantViolated { invariant: "released shares settled before relock" });
        }
        self.last_report = now;
        self.locked_shares = self
            .locked_shares
            .checked_add(profit_shares)
            .ok_or(VaultError::Overflow)?;
        self.reset_rate(now, self.profit_max_unlock_time)
    }

    /// Absorb a loss into locked shares, returning how many vault-held
    /// shares must be burned: `min(loss_shares, locked)`
    ///
    /// Like `lock_profit`, expects the schedule settled at `now`.
    pub fn absorb_loss(&mut self, loss_shares: u128, now: u64) -> VaultResult<u128> {
        if self.last_report != now && self.unlocked_shares(now) > 0 {
            return Err(VaultError::InvariantViolated { invariant: "released shares settled before relock" });
        }
        self.last_report = now;
        let burned = loss_shares.min(self.locked_shares);
        self.locked_shares -= burned;
        let remaining = self.full_unlock.saturating_sub(now);
        self.reset_rate(now, remaining)?;
        Ok(burned)
    }

    /// Change the schedule length for future reports
    pub fn set_profit_max_unlock_time(&mut self, seconds: u64) {
        self.profit_max_unlock_time = seconds;
    }
}
