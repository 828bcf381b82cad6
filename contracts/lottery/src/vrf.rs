//! Pending Randomness Requests
//!
//! Entries are keyed by `(VrfType, id)`: local requests use a SHA-256
//! derived id, cross-chain requests the messaging nonce (sequence) of
//! the paid send. A callback consumes its entry exactly once.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use creator_vault_common::{
    errors::{VaultError, VaultResult},
    types::{Address, VrfType},
};

/// A swap waiting for its draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct LotteryEntry {
    pub user: Address,
    pub creator_coin: Address,
    /// Swap value at 1e18 = $1
    pub usd_amount: u128,
    pub win_chance_ppm: u64,
    pub vrf_type: VrfType,
    pub requested_at: u64,
}

/// Local request id: first 8 bytes of `sha256(chain_id ++ user ++ creator_coin ++ nonce ++ now)`
pub fn derive_request_id(chain_id: u64, user: &Address, creator_coin: &Address, nonce: u64, now: u64) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(chain_id.to_be_bytes());
    hasher.update(user);
    hasher.update(creator_coin);
    hasher.update(nonce.to_be_bytes());
    hasher.update(now.to_be_bytes());
    let digest = hasher.finalize();

    let mut id = [0u8; 8];
    id.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(id)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct PendingRequests {
    entries: BTreeMap<(VrfType, u64), LotteryEntry>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, vrf_type: VrfType, id: u64) -> Option<&LotteryEntry> {
        self.entries.get(&(vrf_type, id))
    }

    /// Record a request; an id already in flight is rejected
    pub fn insert(&mut self, id: u64, entry: LotteryEntry) -> VaultResult<()> {
        let key = (entry.vrf_type, id);
        if self.entries.contains_key(&key) {
            return Err(VaultError::InvalidStateTransition);
        }
        self.entries.insert(key, entry);
        Ok(())
    }

    /// Lookup-and-clear
    ///
    /// # Errors
    /// * `UnknownRequest` if the id was never issued or was already consumed
    pub fn consume(&mut self, vrf_type: VrfType, id: u64) -> VaultResult<LotteryEntry> {
        self.entries
            .remove(&(vrf_type, id))
            .ok_or(VaultError::UnknownRequest { request_id: id })
    }
}
