//! Creator Coin Registry
//!
//! The directory of per-coin deployments. Components receive a registry at
//! construction and query it on every call; results are never cached.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::types::{Address, Eid};

/// A creator coin's vault on another chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct RemoteVault {
    pub chain_id: u64,
    pub vault: Address,
}

/// Registry lookups used by the protocol core
pub trait Registry {
    fn get_vault_for_token(&self, creator_coin: &Address) -> Option<Address>;
    fn get_share_oft_for_token(&self, creator_coin: &Address) -> Option<Address>;
    fn get_oracle_for_token(&self, creator_coin: &Address) -> Option<Address>;
    fn get_gauge_controller_for_token(&self, creator_coin: &Address) -> Option<Address>;
    fn is_creator_coin_active(&self, creator_coin: &Address) -> bool;
    fn get_all_creator_coins(&self) -> Vec<Address>;
    fn is_hub_chain(&self, chain_id: u64) -> bool;
    fn get_remote_vaults(&self, creator_coin: &Address) -> Vec<RemoteVault>;
    fn get_eid_for_chain_id(&self, chain_id: u64) -> Option<Eid>;
    /// Native balance that outbound messaging must leave untouched
    fn get_gas_reserve(&self) -> u128;
}

/// Per-coin deployment record
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct CoinRecord {
    pub vault: Option<Address>,
    pub share_oft: Option<Address>,
    pub oracle: Option<Address>,
    pub gauge_controller: Option<Address>,
    pub active: bool,
    pub remote_vaults: Vec<RemoteVault>,
}

/// Map-backed registry
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct InMemoryRegistry {
    coins: BTreeMap<Address, CoinRecord>,
    hub_chain_id: u64,
    eids: BTreeMap<u64, Eid>,
    gas_reserve: u128,
}

impl InMemoryRegistry {
    pub fn new(hub_chain_id: u64) -> Self {
        Self { hub_chain_id, ..Self::default() }
    }

    /// Register or replace a coin
    pub fn register_coin(&mut self, creator_coin: Address, record: CoinRecord) {
        self.coins.insert(creator_coin, record);
    }

    pub fn set_active(&mut self, creator_coin: &Address, active: bool) {
        if let Some(record) = self.coins.get_mut(creator_coin) {
            record.active = active;
        }
    }

    pub fn set_gauge_controller(&mut self, creator_coin: &Address, gauge: Option<Address>) {
        if let Some(record) = self.coins.get_mut(creator_coin) {
            record.gauge_controller = gauge;
        }
    }

    pub fn add_remote_vault(&mut self, creator_coin: &Address, remote: RemoteVault) {
        if let Some(record) = self.coins.get_mut(creator_coin) {
            record.remote_vaults.push(remote);
        }
    }

    pub fn set_eid(&mut self, chain_id: u64, eid: Eid) {
        self.eids.insert(chain_id, eid);
    }

    pub fn set_gas_reserve(&mut self, reserve: u128) {
        self.gas_reserve = reserve;
    }

    pub fn hub_chain_id(&self) -> u64 {
        self.hub_chain_id
    }
}

impl Registry for InMemoryRegistry {
    fn get_vault_for_token(&self, creator_coin: &Address) -> Option<Address> {
        self.coins.get(creator_coin).and_then(|r| r.vault)
    }

    fn get_share_oft_for_token(&self, creator_coin: &Address) -> Option<Address> {
        self.coins.get(creator_coin).and_then(|r| r.share_oft)
    }

    fn get_oracle_for_token(&self, creator_coin: &Address) -> Option<Address> {
        self.coins.get(creator_coin).and_then(|r| r.oracle)
    }

    fn get_gauge_controller_for_token(&self, creator_coin: &Address) -> Option<Address> {
        self.coins.get(creator_coin).and_then(|r| r.gauge_controller)
    }

    fn is_creator_coin_active(&self, creator_coin: &Address) -> bool {
        self.coins.get(creator_coin).map(|r| r.active).unwrap_or(false)
    }

    fn get_all_creator_coins(&self) -> Vec<Address> {
        self.coins.keys().copied().collect()
    }

    fn is_hub_chain(&self, chain_id: u64) -> bool {
        chain_id == self.hub_chain_id
    }

    fn get_remote_vaults(&self, creator_coin: &Address) -> Vec<RemoteVault> {
        self.coins
            .get(creator_coin)
            .map(|r| r.remote_vaults.clone())
            .unwrap_or_default()
    }

    fn get_eid_for_chain_id(&self, chain_id: u64) -> Option<Eid> {
        self.eids.get(&chain_id).copied()
    }

    fn get_gas_reserve(&self) -> u128 {
        self.gas_reserve
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookups() {
        let coin = [7u8; 20];
        let mut registry = InMemoryRegistry::new(8_453);
        registry.register_coin(
            coin,
            CoinRecord {
                vault: Some([1u8; 20]),
                share_oft: Some([2u8; 20]),
                active: true,
                ..CoinRecord::default()
            },
        );
        registry.set_eid(8_453, 30_184);
        registry.add_remote_vault(&coin, RemoteVault { chain_id: 1, vault: [9u8; 20] });

        assert_eq!(registry.get_vault_for_token(&coin), Some([1u8; 20]));
        assert_eq!(registry.get_share_oft_for_token(&coin), Some([2u8; 20]));
        assert_eq!(registry.get_gauge_controller_for_token(&coin), None);
        assert!(registry.is_creator_coin_active(&coin));
        assert!(!registry.is_creator_coin_active(&[8u8; 20]));
        assert!(registry.is_hub_chain(8_453));
        assert!(!registry.is_hub_chain(1));
        assert_eq!(registry.get_eid_for_chain_id(8_453), Some(30_184));
        assert_eq!(registry.get_remote_vaults(&coin).len(), 1);
        assert_eq!(registry.get_all_creator_coins(), vec![coin]);
    }
}
