//! Pool Market Model
//!
//! A concentrated-liquidity pool reduced to what the vault needs: the
//! current tick, an observation ring of tick cumulatives for TWAP queries,
//! and range positions that can be minted, topped up, burned and credited
//! with fees. Swaps are simulated by moving the tick with `set_tick`; the
//! simulated traders act as counterparty, so positions are always valued
//! and paid out at the current price and `reserves` is notional.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::constants::ticks::OBSERVATION_CARDINALITY;
use crate::errors::{VaultError, VaultResult};
use crate::tick_math::{
    amounts_for_liquidity, check_range, check_tick, liquidity_for_amounts, sqrt_price_x18,
};
use crate::types::TokenPair;

/// Pool-assigned position identifier
pub type PositionId = u64;

/// One entry of the observation ring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Observation {
    /// Seconds timestamp of this observation
    pub timestamp: u64,
    /// Sum of `tick * seconds` up to `timestamp`
    pub tick_cumulative: i64,
}

/// A range position held in the pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct PoolPosition {
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity: u128,
    /// Fees credited and not yet collected
    pub tokens_owed: TokenPair,
}

/// Result of minting or topping up a position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidityReceipt {
    pub position_id: PositionId,
    /// Liquidity added by this call
    pub liquidity: u128,
    /// Tokens pulled from the caller
    pub used: TokenPair,
}

/// Concentrated-liquidity pool state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct PoolState {
    /// Current (spot) tick
    pub tick: i32,
    /// Tick spacing
    pub tick_spacing: i32,
    /// Observation ring buffer, oldest first once full
    observations: Vec<Observation>,
    /// Index of the most recent observation
    observation_index: usize,
    /// Open positions
    positions: BTreeMap<PositionId, PoolPosition>,
    /// Next position id
    next_position_id: PositionId,
    /// Tokens backing positions and owed fees
    pub reserves: TokenPair,
}

impl PoolState {
    /// Create a pool at `tick` whose history starts at `now`
    pub fn new(tick: i32, tick_spacing: i32, now: u64) -> VaultResult<Self> {
        check_tick(tick)?;
        if tick_spacing <= 0 {
            return Err(VaultError::InvalidInput {
                param: "tick_spacing",
                reason: "must be positive",
            });
        }
        Ok(Self {
            tick,
            tick_spacing,
            observations: vec![Observation { timestamp: now, tick_cumulative: 0 }],
            observation_index: 0,
            positions: BTreeMap::new(),
            next_position_id: 1,
            reserves: TokenPair::ZERO,
        })
    }

    // ============ Price & Observations ============

    /// Current spot tick
    pub fn spot_tick(&self) -> i32 {
        self.tick
    }

    fn latest_observation(&self) -> Observation {
        self.observations[self.observation_index]
    }

    fn oldest_observation(&self) -> Observation {
        if self.observations.len() < OBSERVATION_CARDINALITY {
            self.observations[0]
        } else {
            self.observations[(self.observation_index + 1) % OBSERVATION_CARDINALITY]
        }
    }

    /// Observations in chronological order
    fn chronological(&self) -> Vec<Observation> {
        let len = self.observations.len();
        if len < OBSERVATION_CARDINALITY {
            return self.observations.clone();
        }
        (1..=len)
            .map(|offset| self.observations[(self.observation_index + offset) % len])
            .collect()
    }

    /// Move the pool to `new_tick` at time `now` (simulates swaps)
    ///
    /// The elapsed time since the last observation is accrued at the old
    /// tick. At most one observation is written per timestamp.
    pub fn set_tick(&mut self, new_tick: i32, now: u64) -> VaultResult<()> {
        check_tick(new_tick)?;
        let last = self.latest_observation();
        if now < last.timestamp {
            return Err(VaultError::InvalidInput {
                param: "now",
                reason: "observation time went backwards",
            });
        }
        if now > last.timestamp {
            let elapsed = (now - last.timestamp) as i64;
            let observation = Observation {
                timestamp: now,
                tick_cumulative: last.tick_cumulative + self.tick as i64 * elapsed,
            };
            if self.observations.len() < OBSERVATION_CARDINALITY {
                self.observations.push(observation);
                self.observation_index = self.observations.len() - 1;
            } else {
                self.observation_index = (self.observation_index + 1) % OBSERVATION_CARDINALITY;
                self.observations[self.observation_index] = observation;
            }
        }
        self.tick = new_tick;
        Ok(())
    }

    /// Tick cumulative at `target` (interpolated between observations)
    fn tick_cumulative_at(&self, target: u64, now: u64) -> VaultResult<i64> {
        let last = self.latest_observation();
        if target >= last.timestamp {
            let elapsed = target.min(now) - last.timestamp;
            return Ok(last.tick_cumulative + self.tick as i64 * elapsed as i64);
        }

        let oldest = self.oldest_observation();
        if target < oldest.timestamp {
            return Err(VaultError::TwapUnavailable {
                requested_secs: now.saturating_sub(target).min(u32::MAX as u64) as u32,
                available_secs: now.saturating_sub(oldest.timestamp),
            });
        }

        let history = self.chronological();
        for pair in history.windows(2) {
            let (before, after) = (pair[0], pair[1]);
            if target >= before.timestamp && target < after.timestamp {
                let span = (after.timestamp - before.timestamp) as i64;
                let offset = (target - before.timestamp) as i64;
                let delta = after.tick_cumulative - before.tick_cumulative;
                return Ok(before.tick_cumulative + delta / span * offset + delta % span * offset / span);
            }
        }
        Ok(last.tick_cumulative)
    }

    /// Time-weighted average tick over the last `interval` seconds
    ///
    /// Rounds toward negative infinity. Fails with `TwapUnavailable` when
    /// the ring does not reach back far enough.
    pub fn observe_twap_tick(&self, interval: u32, now: u64) -> VaultResult<i32> {
        if interval == 0 {
            return Ok(self.tick);
        }
        let start = now.checked_sub(interval as u64).ok_or(VaultError::TwapUnavailable {
            requested_secs: interval,
            available_secs: now,
        })?;
        let end_cumulative = self.tick_cumulative_at(now, now)?;
        let start_cumulative = self.tick_cumulative_at(start, now)?;
        let mean = (end_cumulative - start_cumulative).div_euclid(interval as i64);
        Ok(mean as i32)
    }

    // ============ Positions ============

    /// Current sqrt price at 18 decimals
    pub fn sqrt_price(&self) -> VaultResult<u128> {
        sqrt_price_x18(self.tick)
    }

    /// Look up a position
    pub fn position(&self, id: PositionId) -> VaultResult<&PoolPosition> {
        self.positions.get(&id).ok_or(VaultError::InvalidInput {
            param: "position_id",
            reason: "unknown position",
        })
    }

    fn position_mut(&mut self, id: PositionId) -> VaultResult<&mut PoolPosition> {
        self.positions.get_mut(&id).ok_or(VaultError::InvalidInput {
            param: "position_id",
            reason: "unknown position",
        })
    }

    fn liquidity_quote(&self, tick_lower: i32, tick_upper: i32, max_amounts: TokenPair) -> VaultResult<(u128, TokenPair)> {
        let sqrt_price = self.sqrt_price()?;
        let sqrt_lower = sqrt_price_x18(tick_lower)?;
        let sqrt_upper = sqrt_price_x18(tick_upper)?;
        let liquidity = liquidity_for_amounts(sqrt_price, sqrt_lower, sqrt_upper, max_amounts)?;
        if liquidity == 0 {
            return Err(VaultError::ZeroLiquidity);
        }
        let used = amounts_for_liquidity(sqrt_price, sqrt_lower, sqrt_upper, liquidity)?;
        Ok((liquidity, used.min(&max_amounts)))
    }

    /// Mint a new position using at most `max_amounts`
    pub fn mint_position(
        &mut self,
        tick_lower: i32,
        tick_upper: i32,
        max_amounts: TokenPair,
    ) -> VaultResult<LiquidityReceipt> {
        check_range(tick_lower, tick_upper, self.tick_spacing)?;
        let (liquidity, used) = self.liquidity_quote(tick_lower, tick_upper, max_amounts)?;

        let position_id = self.next_position_id;
        self.next_position_id += 1;
        self.positions.insert(
            position_id,
            PoolPosition { tick_lower, tick_upper, liquidity, tokens_owed: TokenPair::ZERO },
        );
        self.reserves = self.reserves.checked_add(&used)?;

        Ok(LiquidityReceipt { position_id, liquidity, used })
    }

    /// Add liquidity to an existing position using at most `max_amounts`
    pub fn increase_liquidity(&mut self, id: PositionId, max_amounts: TokenPair) -> VaultResult<LiquidityReceipt> {
        let (lower, upper) = {
            let position = self.position(id)?;
            (position.tick_lower, position.tick_upper)
        };
        let (liquidity, used) = self.liquidity_quote(lower, upper, max_amounts)?;

        let position = self.position_mut(id)?;
        position.liquidity = position.liquidity.checked_add(liquidity).ok_or(VaultError::Overflow)?;
        self.reserves = self.reserves.checked_add(&used)?;

        Ok(LiquidityReceipt { position_id: id, liquidity, used })
    }

    /// Remove `liquidity` from a position, returning principal at the current price
    pub fn decrease_liquidity(&mut self, id: PositionId, liquidity: u128) -> VaultResult<TokenPair> {
        let sqrt_price = self.sqrt_price()?;
        let (lower, upper, held) = {
            let position = self.position(id)?;
            (position.tick_lower, position.tick_upper, position.liquidity)
        };
        if liquidity > held {
            return Err(VaultError::InsufficientBalance { available: held, requested: liquidity });
        }
        let amounts = amounts_for_liquidity(
            sqrt_price,
            sqrt_price_x18(lower)?,
            sqrt_price_x18(upper)?,
            liquidity,
        )?;

        self.position_mut(id)?.liquidity = held - liquidity;
        self.reserves = self.reserves.saturating_sub(&amounts);
        Ok(amounts)
    }

    /// Collect fees owed to a position
    pub fn collect(&mut self, id: PositionId) -> VaultResult<TokenPair> {
        let position = self.position_mut(id)?;
        let owed = position.tokens_owed;
        position.tokens_owed = TokenPair::ZERO;
        self.reserves = self.reserves.saturating_sub(&owed);
        Ok(owed)
    }

    /// Remove all liquidity, collect fees and delete the position
    pub fn burn_position(&mut self, id: PositionId) -> VaultResult<TokenPair> {
        let liquidity = self.position(id)?.liquidity;
        let principal = self.decrease_liquidity(id, liquidity)?;
        let fees = self.collect(id)?;
        self.positions.remove(&id);
        principal.checked_add(&fees)
    }

    /// Credit swap fees to a position (market simulation)
    pub fn accrue_fees(&mut self, id: PositionId, fees: TokenPair) -> VaultResult<()> {
        let position = self.position_mut(id)?;
        position.tokens_owed = position.tokens_owed.checked_add(&fees)?;
        self.reserves = self.reserves.checked_add(&fees)?;
        Ok(())
    }

    /// Principal at the current price plus uncollected fees
    pub fn position_value(&self, id: PositionId) -> VaultResult<TokenPair> {
        let position = self.position(id)?;
        let principal = amounts_for_liquidity(
            self.sqrt_price()?,
            sqrt_price_x18(position.tick_lower)?,
            sqrt_price_x18(position.tick_upper)?,
            position.liquidity,
        )?;
        principal.checked_add(&position.tokens_owed)
    }

    /// Number of open positions
    pub fn position_count(&self) -> usize {
        self.positions.len()
    }
}
