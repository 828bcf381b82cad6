//! Creator Vault Common Library
//!
//! Shared types, constants and pure building blocks for the creator vault
//! protocol core: a deterministic model of dual-asset ERC-4626-style vaults,
//! their AMM strategies, a share-token bridge and a cross-chain lottery.
//!
//! ## Modules
//!
//! - **oracle**: push-feed and pool-TWAP pricing with staleness/depeg guards
//! - **shares**: USD-value to share conversions and loss tolerance
//! - **profit_unlock**: linear release of reported profit
//! - **tick_math / pool**: concentrated-liquidity math and pool model
//! - **scheduler**: time-delayed admin operations
//! - **guard**: reentrancy guard with draft-and-commit execution
//! - **registry**: creator coin directory
//! - **messaging**: LayerZero-style endpoint, peers and GUIDs
//!
//! ## Execution Model
//!
//! Single-threaded and synchronous. Time is always passed in explicitly as
//! `now` (seconds). Every mutating entry point is atomic: a fatal error
//! leaves no state change and no events behind.

pub mod constants;
pub mod errors;
pub mod types;
pub mod math;
pub mod events;
pub mod tick_math;
pub mod pool;
pub mod oracle;
pub mod shares;
pub mod profit_unlock;
pub mod scheduler;
pub mod guard;
pub mod registry;
pub mod messaging;

// Re-exports for convenience
pub use errors::*;
pub use types::*;
pub use events::{EventLog, EventType, ProtocolEvent};
pub use guard::{ReentrancyGuard, Transactional};
pub use pool::PoolState;
pub use registry::{InMemoryRegistry, Registry};
