//! Share Ledger
//!
//! Balances of vault shares per holder and the raw total supply. The vault
//! itself is a holder: locked profit shares sit in its own balance.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use creator_vault_common::{
    errors::{VaultError, VaultResult},
    math::{safe_add, safe_sub},
    types::{require_nonzero, Address},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ShareLedger {
    balances: BTreeMap<Address, u128>,
    total_supply: u128,
}

impl ShareLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, owner: &Address) -> u128 {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    /// Raw supply including locked profit shares
    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    pub fn holders(&self) -> impl Iterator<Item = (&Address, &u128)> {
        self.balances.iter()
    }

    pub fn mint(&mut self, to: &Address, shares: u128) -> VaultResult<()> {
        require_nonzero(to, "to")?;
        self.total_supply = safe_add(self.total_supply, shares)?;
        let balance = self.balances.entry(*to).or_insert(0);
        *balance = safe_add(*balance, shares)?;
        Ok(())
    }

    pub fn burn(&mut self, from: &Address, shares: u128) -> VaultResult<()> {
        let available = self.balance_of(from);
        if available < shares {
            return Err(VaultError::InsufficientBalance { available, requested: shares });
        }
        self.set_balance(from, available - shares);
        self.total_supply = safe_sub(self.total_supply, shares)?;
        Ok(())
    }

    /// Move shares between holders; supply is unchanged
    pub fn transfer(&mut self, from: &Address, to: &Address, shares: u128) -> VaultResult<()> {
        if shares == 0 {
            return Err(VaultError::ZeroAmount);
        }
        require_nonzero(to, "to")?;
        let available = self.balance_of(from);
        if available < shares {
            return Err(VaultError::InsufficientBalance { available, requested: shares });
        }
        self.set_balance(from, available - shares);
        let receiver = self.balances.entry(*to).or_insert(0);
        *receiver = safe_add(*receiver, shares)?;
        Ok(())
    }

    fn set_balance(&mut self, owner: &Address, balance: u128) {
        if balance == 0 {
            self.balances.remove(owner);
        } else {
            self.balances.insert(*owner, balance);
        }
    }

    /// Sum of balances equals the recorded supply
    pub fn is_consistent(&self) -> bool {
        self.balances
            .values()
            .try_fold(0u128, |acc, b| acc.checked_add(*b))
            .map(|sum| sum == self.total_supply)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: Address = [1u8; 20];
    const BOB: Address = [2u8; 20];

    #[test]
    fn test_mint_transfer_burn() {
        let mut ledger = ShareLedger::new();
        ledger.mint(&ALICE, 1_000).unwrap();
        ledger.transfer(&ALICE, &BOB, 400).unwrap();
        ledger.burn(&BOB, 100).unwrap();

        assert_eq!(ledger.balance_of(&ALICE), 600);
        assert_eq!(ledger.balance_of(&BOB), 300);
        assert_eq!(ledger.total_supply(), 900);
        assert!(ledger.is_consistent());
    }

    #[test]
    fn test_overdraw_rejected() {
        let mut ledger = ShareLedger::new();
        ledger.mint(&ALICE, 10).unwrap();
        assert_eq!(
            ledger.transfer(&ALICE, &BOB, 11),
            Err(VaultError::InsufficientBalance { available: 10, requested: 11 })
        );
        assert!(ledger.burn(&BOB, 1).is_err());
        assert!(matches!(ledger.mint(&[0u8; 20], 1), Err(VaultError::ZeroAddress { .. })));
    }
}
