//! Limit-Order Strategy
//!
//! Single-sided range just outside the current price. An ask holds asset A
//! in the spacing above the price and is filled as the price rises through
//! it; a bid holds asset B just below. Deposits of the wrong asset produce
//! no liquidity and fail with `ZeroLiquidity`.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use creator_vault_common::{
    constants::rebalance::DEFAULT_LIMIT_THRESHOLD,
    errors::{VaultError, VaultResult},
    events::ProtocolEvent,
    pool::PoolState,
    tick_math::floor_tick,
    types::{StrategyType, TokenPair},
};

use crate::strategy::{DepositReceipt, LiquidityStrategy, Position, StrategyContext};

/// Which side of the book the order rests on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum OrderSide {
    /// Sells asset A above the price
    Ask = 0,
    /// Buys asset A below the price
    Bid = 1,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct LimitOrderStrategy {
    pub side: OrderSide,
    /// Range width in ticks, a multiple of the pool spacing
    pub limit_threshold: i32,
    position: Option<Position>,
    /// Tokens released by re-placing the order and not yet redeployed
    idle: TokenPair,
    active: bool,
}

impl LimitOrderStrategy {
    pub fn new(side: OrderSide, limit_threshold: i32) -> Self {
        Self { side, limit_threshold, position: None, idle: TokenPair::ZERO, active: true }
    }

    pub fn ask() -> Self {
        Self::new(OrderSide::Ask, DEFAULT_LIMIT_THRESHOLD)
    }

    pub fn bid() -> Self {
        Self::new(OrderSide::Bid, DEFAULT_LIMIT_THRESHOLD)
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn idle(&self) -> TokenPair {
        self.idle
    }

    /// Target range for the current pool price
    pub fn target_range(&self, pool: &PoolState) -> VaultResult<(i32, i32)> {
        let spacing = pool.tick_spacing;
        let floor = floor_tick(pool.spot_tick(), spacing)?;
        Ok(match self.side {
            OrderSide::Ask => (floor + spacing, floor + spacing + self.limit_threshold),
            OrderSide::Bid => (floor - self.limit_threshold, floor),
        })
    }

    fn mint(&mut self, ctx: &mut StrategyContext<'_>, amounts: TokenPair) -> VaultResult<DepositReceipt> {
        let (lower, upper) = self.target_range(ctx.pool)?;
        let receipt = ctx.pool.mint_position(lower, upper, amounts)?;
        self.position = Some(Position {
            position_id: receipt.position_id,
            tick_lower: lower,
            tick_upper: upper,
            liquidity: receipt.liquidity,
        });
        ctx.events.emit(ProtocolEvent::PositionMinted {
            position_id: receipt.position_id,
            tick_lower: lower,
            tick_upper: upper,
            liquidity: receipt.liquidity,
            timestamp: ctx.now,
        });
        Ok(DepositReceipt { liquidity: receipt.liquidity, used: receipt.used })
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
}

impl LiquidityStrategy for LimitOrderStrategy {
    fn strategy_type(&self) -> StrategyType {
        StrategyType::LimitOrder
    }

    fn is_initialized(&self) -> bool {
        self.limit_threshold > 0
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

    fn deposit(&mut self, ctx: &mut StrategyContext<'_>, amounts: TokenPair) -> VaultResult<DepositReceipt> {
        match self.position.as_mut() {
            Some(position) => {
                let receipt = ctx.pool.increase_liquidity(position.position_id, amounts)?;
                position.liquidity += receipt.liquidity;
                Ok(DepositReceipt { liquidity: receipt.liquidity, used: receipt.used })
            }
            None => self.mint(ctx, amounts),
        }
    }

    fn withdraw(&mut self, ctx: &mut StrategyContext<'_>, liquidity: u128) -> VaultResult<TokenPair> {
        if liquidity == 0 {
            return Ok(TokenPair::ZERO);
        }
        let position = self.position.as_mut().ok_or(VaultError::InsufficientBalance {
            available: 0,
            requested: liquidity,
        })?;
        let held = position.liquidity;
        let idle_share = self.idle.pro_rata(liquidity.min(held), held)?;

        let principal = ctx.pool.decrease_liquidity(position.position_id, liquidity)?;
        let fees = ctx.pool.collect(position.position_id)?;
        position.liquidity -= liquidity;
        self.idle = self.idle.checked_sub(&idle_share)?;

        principal.checked_add(&fees)?.checked_add(&idle_share)
    }

    fn withdraw_all(&mut self, ctx: &mut StrategyContext<'_>) -> VaultResult<TokenPair> {
        let returned = self.burn(ctx)?;
        let idle = std::mem::take(&mut self.idle);
        returned.checked_add(&idle)
    }

    /// Re-place the order next to the current price
    ///
    /// Whatever cannot be re-minted (the filled side) stays idle until the
    /// next withdrawal.
    fn rebalance(&mut self, ctx: &mut StrategyContext<'_>) -> VaultResult<()> {
        let target = self.target_range(ctx.pool)?;
        if let Some(position) = self.position {
            if (position.tick_lower, position.tick_upper) == target {
                return Ok(());
            }
        }

        let released = self.burn(ctx)?;
        self.idle = self.idle.checked_add(&released)?;
        if self.idle.is_zero() {
            return Ok(());
        }

        let idle = self.idle;
        match self.mint(ctx, idle) {
            Ok(receipt) => {
                self.idle = self.idle.checked_sub(&receipt.used)?;
                Ok(())
            }
            Err(VaultError::ZeroLiquidity) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn total_value(&self, pool: &PoolState) -> VaultResult<TokenPair> {
        let in_pool = match self.position {
            Some(position) => pool.position_value(position.position_id)?,
            None => TokenPair::ZERO,
        };
        in_pool.checked_add(&self.idle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use creator_vault_common::constants::precision::WAD;
    use creator_vault_common::events::EventLog;

    #[test]
    fn test_ask_holds_only_asset_a() {
        let mut pool = PoolState::new(30, 60, 0).unwrap();
        let mut events = EventLog::new();
        let mut strategy = LimitOrderStrategy::ask();
        let mut ctx = StrategyContext { pool: &mut pool, now: 0, events: &mut events };

        let receipt = strategy.deposit(&mut ctx, TokenPair::new(10 * WAD, 10 * WAD)).unwrap();
        assert_eq!(receipt.used.b, 0);
        assert!(receipt.used.a > 0);

        let position = strategy.position().unwrap();
        assert_eq!((position.tick_lower, position.tick_upper), (60, 660));
    }

    #[test]
    fn test_bid_rejects_wrong_asset() {
        let mut pool = PoolState::new(30, 60, 0).unwrap();
        let mut events = EventLog::new();
        let mut strategy = LimitOrderStrategy::bid();
        let mut ctx = StrategyContext { pool: &mut pool, now: 0, events: &mut events };

        let err = strategy.deposit(&mut ctx, TokenPair::new(10 * WAD, 0)).unwrap_err();
        assert_eq!(err, VaultError::ZeroLiquidity);
        assert!(strategy.position().is_none());
    }

    #[test]
    fn test_rebalance_follows_price() {
        let mut pool = PoolState::new(30, 60, 0).unwrap();
        let mut events = EventLog::new();
        let mut strategy = LimitOrderStrategy::ask();

        {
            let mut ctx = StrategyContext { pool: &mut pool, now: 0, events: &mut events };
            strategy.deposit(&mut ctx, TokenPair::new(10 * WAD, 0)).unwrap();
        }
        let value_before = strategy.total_value(&pool).unwrap();

        // Price falls further away; the ask is re-placed one spacing above it
        pool.set_tick(-200, 100).unwrap();
        let mut ctx = StrategyContext { pool: &mut pool, now: 100, events: &mut events };
        strategy.rebalance(&mut ctx).unwrap();

        let position = strategy.position().unwrap();
        assert_eq!((position.tick_lower, position.tick_upper), (-180, 420));
        let value_after = strategy.total_value(&pool).unwrap();
        assert!(value_after.a <= value_before.a);
        assert!(value_before.a - value_after.a <= WAD / 1_000_000);
    }

    #[test]
    fn test_withdraw_all_returns_idle() {
        let mut pool = PoolState::new(30, 60, 0).unwrap();
        let mut events = EventLog::new();
        let mut strategy = LimitOrderStrategy::ask();
        let mut ctx = StrategyContext { pool: &mut pool, now: 0, events: &mut events };

        let receipt = strategy.deposit(&mut ctx, TokenPair::new(10 * WAD, 0)).unwrap();
        let returned = strategy.withdraw_all(&mut ctx).unwrap();
        assert!(receipt.used.a - returned.a <= 2);
        assert_eq!(strategy.liquidity(), 0);
    }
}
