//! Gauge Controller
//!
//! Holds one creator coin's jackpot reserve (in vault shares) and the
//! prizes owed to winners. Only the lottery it is bound to may debit the
//! reserve.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use creator_vault_common::{
    errors::{VaultError, VaultResult},
    math::{bps_of, safe_add},
    types::Address,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct GaugeController {
    pub address: Address,
    pub creator_coin: Address,
    /// The only caller allowed to pay out jackpots
    lottery: Address,
    /// Jackpot reserve in vault shares
    reserve: u128,
    /// Additive win-chance boost at full swap size
    pub boost_ppm: u64,
    /// Vault shares won and not yet claimed
    prizes: BTreeMap<Address, u128>,
    total_paid: u128,
}

impl GaugeController {
    pub fn new(address: Address, creator_coin: Address, lottery: Address, boost_ppm: u64) -> Self {
        Self {
            address,
            creator_coin,
            lottery,
            reserve: 0,
            boost_ppm,
            prizes: BTreeMap::new(),
            total_paid: 0,
        }
    }

    pub fn reserve(&self) -> u128 {
        self.reserve
    }

    pub fn total_paid(&self) -> u128 {
        self.total_paid
    }

    pub fn prize_of(&self, winner: &Address) -> u128 {
        self.prizes.get(winner).copied().unwrap_or(0)
    }

    /// Add vault shares to the jackpot
    pub fn fund(&mut self, shares: u128) -> VaultResult<()> {
        if shares == 0 {
            return Err(VaultError::ZeroAmount);
        }
        self.reserve = safe_add(self.reserve, shares)?;
        Ok(())
    }

    /// Move `payout_bps` of the reserve to `winner`'s prize balance
    ///
    /// # Errors
    /// * `Unauthorized` unless called by the bound lottery
    /// * `EmptyJackpot` if the payout rounds to zero
    pub fn pay_jackpot(&mut self, caller: &Address, winner: &Address, payout_bps: u16) -> VaultResult<u128> {
        if *caller != self.lottery {
            return Err(VaultError::Unauthorized { expected: self.lottery, actual: *caller });
        }
        let paid = bps_of(self.reserve, payout_bps as u64)?;
        if paid == 0 {
            return Err(VaultError::EmptyJackpot { creator_coin: self.creator_coin });
        }
        self.reserve -= paid;
        self.total_paid = safe_add(self.total_paid, paid)?;
        let prize = self.prizes.entry(*winner).or_insert(0);
        *prize = safe_add(*prize, paid)?;
        Ok(paid)
    }

    /// Hand out a winner's accumulated prize
    pub fn claim(&mut self, winner: &Address) -> VaultResult<u128> {
        self.prizes.remove(winner).ok_or(VaultError::ZeroAmount)
    }
}
