//! Creator Vault Strategies
//!
//! AMM liquidity strategies and the allocator that spreads vault funds
//! across them.
//!
//! ## Variants
//!
//! - **FullRange**: one position over every usable tick
//! - **LimitOrder**: single-sided range just outside the price
//! - **Concentrated**: re-centred base range with manipulation guards
//!
//! All variants share the [`LiquidityStrategy`] interface and are held in
//! the closed [`Strategy`] enum.

pub mod strategy;
pub mod full_range;
pub mod limit_order;
pub mod concentrated;
pub mod allocator;

pub use allocator::{AllocationReport, AllocatorOperation, StrategyAllocator, StrategySlot};
pub use concentrated::{ConcentratedConfig, ConcentratedStrategy, RebalanceCheck, RebalancerState};
pub use full_range::FullRangeStrategy;
pub use limit_order::{LimitOrderStrategy, OrderSide};
pub use strategy::{DepositReceipt, LiquidityStrategy, Position, Strategy, StrategyContext};
