//! Full-Range Strategy
//!
//! Holds a single position spanning every usable tick. It never goes out
//! of range, so rebalancing is a no-op.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use creator_vault_common::{
    errors::{VaultError, VaultResult},
    events::ProtocolEvent,
    pool::PoolState,
    tick_math::{max_usable_tick, min_usable_tick},
    types::{StrategyType, TokenPair},
};

use crate::strategy::{DepositReceipt, LiquidityStrategy, Position, StrategyContext};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct FullRangeStrategy {
    position: Option<Position>,
    active: bool,
}

impl Default for FullRangeStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl FullRangeStrategy {
    pub fn new() -> Self {
        Self { position: None, active: true }
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }
}

impl LiquidityStrategy for FullRangeStrategy {
    fn strategy_type(&self) -> StrategyType {
        StrategyType::FullRange
    }

    fn is_initialized(&self) -> bool {
        true
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
            None => {
                let spacing = ctx.pool.tick_spacing;
                let (lower, upper) = (min_usable_tick(spacing), max_usable_tick(spacing));
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
        let principal = ctx.pool.decrease_liquidity(position.position_id, liquidity)?;
        let fees = ctx.pool.collect(position.position_id)?;
        position.liquidity -= liquidity;
        principal.checked_add(&fees)
    }

    fn withdraw_all(&mut self, ctx: &mut StrategyContext<'_>) -> VaultResult<TokenPair> {
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

    fn rebalance(&mut self, _ctx: &mut StrategyContext<'_>) -> VaultResult<()> {
        Ok(())
    }

    fn total_value(&self, pool: &PoolState) -> VaultResult<TokenPair> {
        match self.position {
            Some(position) => pool.position_value(position.position_id),
            None => Ok(TokenPair::ZERO),
        }
    }
}
