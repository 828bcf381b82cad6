//! Concentrated Rebalancer
//!
//! A base range centred on the current price, re-centred by keepers under
//! four manipulation guards checked in a fixed order:
//!
//! 1. the rebalance period has elapsed
//! 2. the price moved at least `min_tick_move` since the last rebalance
//!    (skipped before the first rebalance)
//! 3. spot is within `max_twap_deviation` ticks of the TWAP
//! 4. the price is not within `base_threshold + tick_spacing` of the global
//!    tick boundary
//!
//! ## State machine
//!
//! ```text
//! Uninitialized --deposit--> Positioned --rebalance--> Positioned
//!                                 |
//!                           withdraw_all
//!                                 v
//!                             Withdrawn --deposit--> Positioned
//! ```
//!
//! A failed guard is a local revert: the position and timers are untouched.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use creator_vault_common::{
    constants::rebalance::{
        DEFAULT_BASE_THRESHOLD, DEFAULT_MAX_TWAP_DEVIATION, DEFAULT_MIN_TICK_MOVE,
        DEFAULT_PERIOD_SECS, DEFAULT_TWAP_DURATION,
    },
    constants::ticks::{MAX_TICK, MIN_TICK},
    errors::{VaultError, VaultResult},
    events::ProtocolEvent,
    math::tick_distance,
    pool::PoolState,
    tick_math::floor_tick,
    types::{StrategyType, TokenPair},
};

use crate::strategy::{DepositReceipt, LiquidityStrategy, Position, StrategyContext};

// ============ Configuration ============

/// Rebalance parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ConcentratedConfig {
    /// Half-width of the base range in ticks (multiple of the tick spacing)
    pub base_threshold: i32,
    /// Minimum seconds between rebalances
    pub period: u64,
    /// Minimum tick movement since the last rebalance
    pub min_tick_move: i32,
    /// Maximum |spot - twap| in ticks
    pub max_twap_deviation: i32,
    /// TWAP window in seconds
    pub twap_duration: u32,
}

impl Default for ConcentratedConfig {
    fn default() -> Self {
        Self {
            base_threshold: DEFAULT_BASE_THRESHOLD,
            period: DEFAULT_PERIOD_SECS,
            min_tick_move: DEFAULT_MIN_TICK_MOVE,
            max_twap_deviation: DEFAULT_MAX_TWAP_DEVIATION,
            twap_duration: DEFAULT_TWAP_DURATION,
        }
    }
}

impl ConcentratedConfig {
    pub fn validate(&self, tick_spacing: i32) -> VaultResult<()> {
        if tick_spacing <= 0 {
            return Err(VaultError::InvalidInput { param: "tick_spacing", reason: "must be positive" });
        }
        if self.base_threshold <= 0 || self.base_threshold % tick_spacing != 0 {
            return Err(VaultError::InvalidInput {
                param: "base_threshold",
                reason: "must be a positive multiple of the tick spacing",
            });
        }
        if self.min_tick_move < 0 {
            return Err(VaultError::InvalidInput { param: "min_tick_move", reason: "must not be negative" });
        }
        if self.max_twap_deviation < 0 {
            return Err(VaultError::InvalidInput {
                param: "max_twap_deviation",
                reason: "must not be negative",
            });
        }
        if self.twap_duration == 0 {
            return Err(VaultError::InvalidInput { param: "twap_duration", reason: "must be non-zero" });
        }
        Ok(())
    }
}

// ============ State ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum RebalancerState {
    /// No deposit yet
    Uninitialized = 0,
    /// Holding a base position
    Positioned = 1,
    /// Fully unwound
    Withdrawn = 2,
}

/// Outcome of a successful guard check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebalanceCheck {
    pub tick: i32,
    pub twap_tick: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ConcentratedStrategy {
    pub config: ConcentratedConfig,
    pub tick_spacing: i32,
    state: RebalancerState,
    position: Option<Position>,
    /// Tokens held outside the pool (fees and range leftovers)
    idle: TokenPair,
    /// Tick at the last successful rebalance
    last_tick: Option<i32>,
    last_rebalance_time: u64,
    active: bool,
}

impl ConcentratedStrategy {
    pub fn new(config: ConcentratedConfig, tick_spacing: i32) -> Self {
        Self {
            config,
            tick_spacing,
            state: RebalancerState::Uninitialized,
            position: None,
            idle: TokenPair::ZERO,
            last_tick: None,
            last_rebalance_time: 0,
            active: true,
        }
    }

    pub fn state(&self) -> RebalancerState {
        self.state
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn idle(&self) -> TokenPair {
        self.idle
    }

    pub fn last_tick(&self) -> Option<i32> {
        self.last_tick
    }

    pub fn last_rebalance_time(&self) -> u64 {
        self.last_rebalance_time
    }

    /// Base range centred on the floored current tick
    pub fn base_range(&self, tick: i32) -> VaultResult<(i32, i32)> {
        let floor = floor_tick(tick, self.tick_spacing)?;
        Ok((floor - self.config.base_threshold, floor + self.config.base_threshold))
    }

    fn check_pool(&self, pool: &PoolState) -> VaultResult<()> {
        if pool.tick_spacing != self.tick_spacing {
            return Err(VaultError::InvalidInput {
                param: "tick_spacing",
                reason: "pool spacing differs from strategy spacing",
            });
        }
        Ok(())
    }

    /// Dry-run of the rebalance guards
    ///
    /// # Errors
    /// The first failing guard, in order: `PeriodNotElapsed`,
    /// `InsufficientTickMove`, `TwapDeviationTooHigh`,
    /// `PriceTooCloseToBoundary`. A TWAP query failure is returned as is.
    pub fn check_rebalance(&self, pool: &PoolState, now: u64) -> VaultResult<RebalanceCheck> {
        let next_allowed = self.last_rebalance_time.saturating_add(self.config.period);
        if now < next_allowed {
            return Err(VaultError::PeriodNotElapsed { next_allowed, now });
        }

        let tick = pool.spot_tick();
        if let Some(last) = self.last_tick {
            let moved = tick_distance(tick, last);
            if moved < self.config.min_tick_move {
                return Err(VaultError::InsufficientTickMove {
                    moved,
                    min_move: self.config.min_tick_move,
                });
            }
        }

        let twap_tick = pool.observe_twap_tick(self.config.twap_duration, now)?;
        let deviation = tick_distance(tick, twap_tick);
        if deviation > self.config.max_twap_deviation {
            return Err(VaultError::TwapDeviationTooHigh {
                deviation,
                max_deviation: self.config.max_twap_deviation,
            });
        }

        let limit = self.config.base_threshold + self.tick_spacing;
        if tick < MIN_TICK + limit || tick > MAX_TICK - limit {
            return Err(VaultError::PriceTooCloseToBoundary { tick, limit });
        }

        Ok(RebalanceCheck { tick, twap_tick })
    }

    /// Collect pool fees for the current position into idle
    pub fn collect(&mut self, ctx: &mut StrategyContext<'_>) -> VaultResult<TokenPair> {
        let Some(position) = self.position else {
            return Ok(TokenPair::ZERO);
        };
        let fees = ctx.pool.collect(position.position_id)?;
        if !fees.is_zero() {
            self.idle = self.idle.checked_add(&fees)?;
            ctx.events.emit(ProtocolEvent::FeesCollected {
                position_id: position.position_id,
                amount_a: fees.a,
                amount_b: fees.b,
                timestamp: ctx.now,
            });
        }
        Ok(fees)
    }

    fn burn(&mut self, ctx: &mut StrategyContext<'_>) -> VaultResult<TokenPair> {
        let Some(position) = self.position.take() else {
            return Ok(TokenPair::ZERO);
        };
        let returned = ctx.pool.burn_position(position.position_id)?;
        ctx.events.emit(ProtocolEvent::PositionBurned {
            position_id: position.position_id,
            amount_a: returned.a,
            amount_b: returned.b,
            timestamp: ctx.now,
        });
        Ok(returned)
    }

    fn mint_centred(&mut self, ctx: &mut StrategyContext<'_>, amounts: TokenPair) -> VaultResult<DepositReceipt> {
        let (lower, upper) = self.base_range(ctx.pool.spot_tick())?;
        let receipt = ctx.pool.mint_position(lower, upper, amounts)?;
        self.position = Some(Position {
            position_id: receipt.position_id,
            tick_lower: lower,
            tick_upper: upper,
            liquidity: receipt.liquidity,
        });
        self.state = RebalancerState::Positioned;
        ctx.events.emit(ProtocolEvent::PositionMinted {
            position_id: receipt.position_id,
            tick_lower: lower,
            tick_upper: upper,
            liquidity: receipt.liquidity,
            timestamp: ctx.now,
        });
        Ok(DepositReceipt { liquidity: receipt.liquidity, used: receipt.used })
    }
}

impl LiquidityStrategy for ConcentratedStrategy {
    fn strategy_type(&self) -> StrategyType {
        StrategyType::Concentrated
    }

    fn is_initialized(&self) -> bool {
        self.config.validate(self.tick_spacing).is_ok()
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    fn liquidity(&self) -> u128 {
        self.position.map(|p| p.liquidity).unwrap_or(0)
    }

    /// First deposit (or first after a full withdrawal) centres a new base
    /// range; later deposits top up the existing range. Amounts the range
    /// cannot take are handed back to the caller.
    fn deposit(&mut self, ctx: &mut StrategyContext<'_>, amounts: TokenPair) -> VaultResult<DepositReceipt> {
        self.check_pool(ctx.pool)?;
        match self.position.as_mut() {
            Some(position) => {
                let receipt = ctx.pool.increase_liquidity(position.position_id, amounts)?;
                position.liquidity += receipt.liquidity;
                Ok(DepositReceipt { liquidity: receipt.liquidity, used: receipt.used })
            }
            None => self.mint_centred(ctx, amounts),
        }
    }

    /// Partial exit, guarded against a manipulated spot price
    ///
    /// Fees are collected first; the caller receives the principal plus a
    /// pro-rata slice of idle balances.
    fn withdraw(&mut self, ctx: &mut StrategyContext<'_>, liquidity: u128) -> VaultResult<TokenPair> {
        if liquidity == 0 {
            return Ok(TokenPair::ZERO);
        }
        let position = self.position.ok_or(VaultError::InsufficientBalance {
            available: 0,
            requested: liquidity,
        })?;
        if liquidity > position.liquidity {
            return Err(VaultError::InsufficientBalance {
                available: position.liquidity,
                requested: liquidity,
            });
        }

        let tick = ctx.pool.spot_tick();
        let twap_tick = ctx
            .pool
            .observe_twap_tick(self.config.twap_duration, ctx.now)
            .unwrap_or(tick);
        let deviation = tick_distance(tick, twap_tick);
        if deviation > self.config.max_twap_deviation {
            return Err(VaultError::TwapDeviationTooHigh {
                deviation,
                max_deviation: self.config.max_twap_deviation,
            });
        }

        self.collect(ctx)?;
        let idle_share = self.idle.pro_rata(liquidity, position.liquidity)?;
        let principal = ctx.pool.decrease_liquidity(position.position_id, liquidity)?;

        self.idle = self.idle.checked_sub(&idle_share)?;
        if let Some(held) = self.position.as_mut() {
            held.liquidity -= liquidity;
        }
        principal.checked_add(&idle_share)
    }

    /// Unconditional exit: burns the position and sweeps idle balances
    fn withdraw_all(&mut self, ctx: &mut StrategyContext<'_>) -> VaultResult<TokenPair> {
        let returned = self.burn(ctx)?;
        let idle = std::mem::take(&mut self.idle);
        if self.state == RebalancerState::Positioned {
            self.state = RebalancerState::Withdrawn;
        }
        returned.checked_add(&idle)
    }

    fn rebalance(&mut self, ctx: &mut StrategyContext<'_>) -> VaultResult<()> {
        self.check_pool(ctx.pool)?;
        if self.state != RebalancerState::Positioned {
            return Err(VaultError::InvalidStateTransition);
        }
        let check = self.check_rebalance(ctx.pool, ctx.now)?;

        let released = self.burn(ctx)?;
        self.idle = self.idle.checked_add(&released)?;

        let idle = self.idle;
        let receipt = self.mint_centred(ctx, idle)?;
        self.idle = self.idle.checked_sub(&receipt.used)?;
        self.last_tick = Some(check.tick);
        self.last_rebalance_time = ctx.now;

        let (tick_lower, tick_upper) = self.base_range(check.tick)?;
        ctx.events.emit(ProtocolEvent::Rebalanced {
            tick: check.tick,
            twap_tick: check.twap_tick,
            tick_lower,
            tick_upper,
            liquidity: receipt.liquidity,
            timestamp: ctx.now,
        });
        Ok(())
    }

    fn total_value(&self, pool: &PoolState) -> VaultResult<TokenPair> {
        let in_pool = match self.position {
            Some(position) => pool.position_value(position.position_id)?,
            None => TokenPair::ZERO,
        };
        in_pool.checked_add(&self.idle)
    }
}
