//! Lottery configuration

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use creator_vault_common::{
    constants::lottery::{
        ABSOLUTE_MAX_WIN_CHANCE_PPM, DEFAULT_BASE_WIN_CHANCE_PPM, DEFAULT_MAX_WIN_CHANCE_PPM,
        DEFAULT_MIN_SWAP_USD, DEFAULT_PAYOUT_BPS,
    },
    constants::precision::BPS_DENOMINATOR,
    errors::{VaultError, VaultResult},
    types::{Eid, VrfType},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct LotteryConfig {
    /// Entries below this USD value (1e18 = $1) are ignored
    pub min_swap_usd: u128,
    /// Win chance at `min_swap_usd`
    pub base_win_chance_ppm: u64,
    /// Win chance at `min_swap_usd + $1000` and above
    pub max_win_chance_ppm: u64,
    /// Share of each jackpot paid to a winner
    pub payout_bps: u16,
    /// Where randomness is requested
    pub vrf_type: VrfType,
    /// Endpoint of the remote VRF coordinator (cross-chain randomness)
    pub vrf_eid: Option<Eid>,
    /// Chain id of the settlement hub
    pub hub_chain_id: u64,
    /// Master switch; an inactive lottery ignores swaps
    pub active: bool,
}

impl LotteryConfig {
    pub fn new(hub_chain_id: u64) -> Self {
        Self {
            min_swap_usd: DEFAULT_MIN_SWAP_USD,
            base_win_chance_ppm: DEFAULT_BASE_WIN_CHANCE_PPM,
            max_win_chance_ppm: DEFAULT_MAX_WIN_CHANCE_PPM,
            payout_bps: DEFAULT_PAYOUT_BPS,
            vrf_type: VrfType::Local,
            vrf_eid: None,
            hub_chain_id,
            active: true,
        }
    }

    pub fn validate(&self) -> VaultResult<()> {
        if self.base_win_chance_ppm > self.max_win_chance_ppm {
            return Err(VaultError::InvalidInput {
                param: "base_win_chance_ppm",
                reason: "above max_win_chance_ppm",
            });
        }
        if self.max_win_chance_ppm > ABSOLUTE_MAX_WIN_CHANCE_PPM {
            return Err(VaultError::InvalidInput {
                param: "max_win_chance_ppm",
                reason: "above absolute maximum",
            });
        }
        if self.payout_bps == 0 || self.payout_bps as u128 > BPS_DENOMINATOR {
            return Err(VaultError::InvalidInput { param: "payout_bps", reason: "must be in 1..=10000" });
        }
        if self.vrf_type == VrfType::CrossChain && self.vrf_eid.is_none() {
            return Err(VaultError::InvalidInput {
                param: "vrf_eid",
                reason: "required for cross-chain randomness",
            });
        }
        Ok(())
    }
}
