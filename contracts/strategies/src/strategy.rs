//! Strategy Interface
//!
//! The allocator drives a closed set of strategy variants through one
//! interface. [`Strategy`] dispatches to the variant by `match`, so adding a
//! variant is checked for exhaustiveness at every call site.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use creator_vault_common::{
    errors::VaultResult,
    events::EventLog,
    pool::{PoolState, PositionId},
    types::{StrategyType, TokenPair},
};

use crate::concentrated::ConcentratedStrategy;
use crate::full_range::FullRangeStrategy;
use crate::limit_order::LimitOrderStrategy;

/// Execution context handed to strategy calls
pub struct StrategyContext<'a> {
    /// Pool the strategy provides liquidity to
    pub pool: &'a mut PoolState,
    /// Current timestamp (seconds)
    pub now: u64,
    /// Event sink
    pub events: &'a mut EventLog,
}

/// Result of a strategy deposit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DepositReceipt {
    /// Liquidity added
    pub liquidity: u128,
    /// Tokens consumed; the rest goes back to the caller
    pub used: TokenPair,
}

/// A strategy's record of its pool position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Position {
    pub position_id: PositionId,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity: u128,
}

/// Operations every strategy variant provides
pub trait LiquidityStrategy {
    fn strategy_type(&self) -> StrategyType;

    /// Strategy configuration is valid and it can accept funds
    fn is_initialized(&self) -> bool;

    fn is_active(&self) -> bool;

    fn set_active(&mut self, active: bool);

    /// Liquidity currently held
    fn liquidity(&self) -> u128;

    /// Provide liquidity from at most `amounts`
    fn deposit(&mut self, ctx: &mut StrategyContext<'_>, amounts: TokenPair) -> VaultResult<DepositReceipt>;

    /// Remove `liquidity`, returning tokens released
    fn withdraw(&mut self, ctx: &mut StrategyContext<'_>, liquidity: u128) -> VaultResult<TokenPair>;

    /// Unwind everything, including idle balances and fees
    fn withdraw_all(&mut self, ctx: &mut StrategyContext<'_>) -> VaultResult<TokenPair>;

    /// Strategy-specific repositioning
    fn rebalance(&mut self, ctx: &mut StrategyContext<'_>) -> VaultResult<()>;

    /// Tokens the strategy could return at the current price
    fn total_value(&self, pool: &PoolState) -> VaultResult<TokenPair>;
}

/// Closed set of strategy variants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum Strategy {
    FullRange(FullRangeStrategy),
    LimitOrder(LimitOrderStrategy),
    Concentrated(ConcentratedStrategy),
}

impl Strategy {
    /// The concentrated variant, if this is one
    pub fn as_concentrated(&self) -> Option<&ConcentratedStrategy> {
        match self {
            Strategy::Concentrated(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_concentrated_mut(&mut self) -> Option<&mut ConcentratedStrategy> {
        match self {
            Strategy::Concentrated(s) => Some(s),
            _ => None,
        }
    }
}

impl LiquidityStrategy for Strategy {
    fn strategy_type(&self) -> StrategyType {
        match self {
            Strategy::FullRange(s) => s.strategy_type(),
            Strategy::LimitOrder(s) => s.strategy_type(),
            Strategy::Concentrated(s) => s.strategy_type(),
        }
    }

    fn is_initialized(&self) -> bool {
        match self {
            Strategy::FullRange(s) => s.is_initialized(),
            Strategy::LimitOrder(s) => s.is_initialized(),
            Strategy::Concentrated(s) => s.is_initialized(),
        }
    }

    fn is_active(&self) -> bool {
        match self {
            Strategy::FullRange(s) => s.is_active(),
            Strategy::LimitOrder(s) => s.is_active(),
            Strategy::Concentrated(s) => s.is_active(),
        }
    }

    fn set_active(&mut self, active: bool) {
        match self {
            Strategy::FullRange(s) => s.set_active(active),
            Strategy::LimitOrder(s) => s.set_active(active),
            Strategy::Concentrated(s) => s.set_active(active),
        }
    }

    fn liquidity(&self) -> u128 {
        match self {
            Strategy::FullRange(s) => s.liquidity(),
            Strategy::LimitOrder(s) => s.liquidity(),
            Strategy::Concentrated(s) => s.liquidity(),
        }
    }

    fn deposit(&mut self, ctx: &mut StrategyContext<'_>, amounts: TokenPair) -> VaultResult<DepositReceipt> {
        match self {
            Strategy::FullRange(s) => s.deposit(ctx, amounts),
            Strategy::LimitOrder(s) => s.deposit(ctx, amounts),
            Strategy::Concentrated(s) => s.deposit(ctx, amounts),
        }
    }

    fn withdraw(&mut self, ctx: &mut StrategyContext<'_>, liquidity: u128) -> VaultResult<TokenPair> {
        match self {
            Strategy::FullRange(s) => s.withdraw(ctx, liquidity),
            Strategy::LimitOrder(s) => s.withdraw(ctx, liquidity),
            Strategy::Concentrated(s) => s.withdraw(ctx, liquidity),
        }
    }

    fn withdraw_all(&mut self, ctx: &mut StrategyContext<'_>) -> VaultResult<TokenPair> {
        match self {
            Strategy::FullRange(s) => s.withdraw_all(ctx),
            Strategy::LimitOrder(s) => s.withdraw_all(ctx),
            Strategy::Concentrated(s) => s.withdraw_all(ctx),
        }
    }

    fn rebalance(&mut self, ctx: &mut StrategyContext<'_>) -> VaultResult<()> {
        match self {
            Strategy::FullRange(s) => s.rebalance(ctx),
            Strategy::LimitOrder(s) => s.rebalance(ctx),
            Strategy::Concentrated(s) => s.rebalance(ctx),
        }
    }

    fn total_value(&self, pool: &PoolState) -> VaultResult<TokenPair> {
        match self {
            Strategy::FullRange(s) => s.total_value(pool),
            Strategy::LimitOrder(s) => s.total_value(pool),
            Strategy::Concentrated(s) => s.total_value(pool),
        }
    }
}
