//! Protocol Constants
//!
//! All magic numbers and default configuration values for the creator vault
//! protocol. Runtime parameters that an owner may tune live in the `*Config`
//! structs of each component; the values here are their defaults and caps.
//!
//! # Network Configuration
//!
//! Use feature flags to compile for different networks:
//! - `mainnet` - Production values (longer timelocks, tighter staleness)
//! - Default (no feature) - Testnet values (short delays for testing)
//!
//! ```toml
//! # For mainnet deployment:
//! creator-vault-common = { path = "...", features = ["mainnet"] }
//! ```

/// Fixed-point precision
pub mod precision {
    /// 18-decimal fixed point (USD values, prices, token amounts)
    pub const WAD: u128 = 1_000_000_000_000_000_000;

    /// Basis points denominator
    pub const BPS_DENOMINATOR: u128 = 10_000;

    /// Parts-per-million denominator (lottery probabilities)
    pub const PPM_DENOMINATOR: u64 = 1_000_000;

    /// Divisor converting 18-decimal USD to the 6-decimal figure used on the wire
    pub const USD18_TO_USD6: u128 = 1_000_000_000_000;

    /// One US dollar at 18 decimals
    pub const ONE_USD: u128 = WAD;
}

/// Share accounting
pub mod shares {
    /// Shares minted per 18-decimal USD unit on the very first deposit.
    ///
    /// A first deposit worth $1 (1e18) mints 80_000e18 shares.
    pub const SEED_MULTIPLIER: u128 = 80_000;

    /// Hard cap on total share supply (raw)
    pub const MAX_TOTAL_SUPPLY: u128 = 50_000_000_000 * super::precision::WAD * 1_000;
}

/// Oracle configuration
pub mod oracle {
    /// Maximum age of a push-oracle answer (seconds)
    /// - Mainnet: 1 hour
    /// - Testnet: 1 day (test feeds update rarely)
    #[cfg(feature = "mainnet")]
    pub const MAX_PRICE_AGE_SECS: u64 = 3_600;
    #[cfg(not(feature = "mainnet"))]
    pub const MAX_PRICE_AGE_SECS: u64 = 86_400;

    /// Default TWAP window (seconds)
    pub const TWAP_INTERVAL_SECS: u32 = 1_800;

    /// Lower depeg bound for pegged stables ($0.95)
    pub const PEG_LOWER_BOUND: u128 = 950_000_000_000_000_000;

    /// Upper depeg bound for pegged stables ($1.05)
    pub const PEG_UPPER_BOUND: u128 = 1_050_000_000_000_000_000;

    /// Decimals of all internal prices
    pub const PRICE_DECIMALS: u8 = 18;

    /// Maximum decimals accepted from a push feed
    pub const MAX_FEED_DECIMALS: u8 = 36;
}

/// Profit locking and fees
pub mod profit {
    /// Default profit unlock period (7 days)
    pub const PROFIT_MAX_UNLOCK_TIME: u64 = 7 * 86_400;

    /// Default performance fee (10%)
    pub const DEFAULT_PERFORMANCE_FEE_BPS: u64 = 1_000;

    /// Maximum performance fee (50%)
    pub const MAX_PERFORMANCE_FEE_BPS: u64 = 5_000;
}

/// Strategy allocation
pub mod allocator {
    /// Sum of active strategy weights may not exceed this
    pub const MAX_TOTAL_WEIGHT_BPS: u64 = 10_000;

    /// Maximum number of strategies (active or retired) per allocator
    pub const MAX_STRATEGIES: usize = 16;

    /// Delay before a queued admin operation may run (seconds)
    /// - Mainnet: 2 days
    /// - Testnet: 1 hour
    #[cfg(feature = "mainnet")]
    pub const OPERATION_DELAY_SECS: u64 = 2 * 86_400;
    #[cfg(not(feature = "mainnet"))]
    pub const OPERATION_DELAY_SECS: u64 = 3_600;

    /// Share of vault assets kept idle on `tend` (5%)
    pub const DEFAULT_MIN_IDLE_BPS: u64 = 500;
}

/// Concentrated rebalancing defaults
pub mod rebalance {
    /// Minimum seconds between rebalances
    pub const DEFAULT_PERIOD_SECS: u64 = 3_600;

    /// Minimum tick movement since the last rebalance
    pub const DEFAULT_MIN_TICK_MOVE: i32 = 10;

    /// Maximum allowed |spot - twap| in ticks
    pub const DEFAULT_MAX_TWAP_DEVIATION: i32 = 100;

    /// Half-width of the base range in ticks
    pub const DEFAULT_BASE_THRESHOLD: i32 = 1_200;

    /// Width of single-sided limit ranges in ticks
    pub const DEFAULT_LIMIT_THRESHOLD: i32 = 600;

    /// TWAP window used by the rebalance guard (seconds)
    pub const DEFAULT_TWAP_DURATION: u32 = 600;
}

/// Tick bounds (Uniswap v3/v4)
pub mod ticks {
    /// Minimum tick
    pub const MIN_TICK: i32 = -887_272;

    /// Maximum tick
    pub const MAX_TICK: i32 = 887_272;

    /// Capacity of a pool's observation ring
    pub const OBSERVATION_CARDINALITY: usize = 64;
}

/// Lottery parameters
pub mod lottery {
    use super::precision::ONE_USD;

    /// Minimum swap size to enter ($1)
    pub const DEFAULT_MIN_SWAP_USD: u128 = ONE_USD;

    /// Win chance at the minimum swap size (0.004%)
    pub const DEFAULT_BASE_WIN_CHANCE_PPM: u64 = 40;

    /// Win chance at the top of the ramp (4%)
    pub const DEFAULT_MAX_WIN_CHANCE_PPM: u64 = 40_000;

    /// Width of the win-chance ramp above the minimum ($1000)
    pub const WIN_CHANCE_RAMP_USD: u128 = 1_000 * ONE_USD;

    /// Personal (ve) boost at par (1.0x)
    pub const BOOST_BASE_BPS: u64 = 10_000;

    /// Maximum personal boost (2.5x)
    pub const MAX_PERSONAL_BOOST_BPS: u64 = 25_000;

    /// Hard ceiling on any final win chance (10%)
    pub const ABSOLUTE_MAX_WIN_CHANCE_PPM: u64 = 100_000;

    /// Default share of each jackpot paid to a winner (69%)
    pub const DEFAULT_PAYOUT_BPS: u16 = 6_900;
}

/// Share wrapper and cross-chain share token
pub mod wrapper {
    /// Maximum wrap or unwrap fee (10%)
    pub const MAX_WRAP_FEE_BPS: u64 = 1_000;

    /// Decimals of wrapped shares on every chain
    pub const LOCAL_DECIMALS: u8 = 18;

    /// Decimals carried in cross-chain transfer messages
    pub const SHARED_DECIMALS: u8 = 6;
}

/// Cross-chain messaging
pub mod messaging {
    /// Message type tag of a spoke-to-hub win notification
    pub const MSG_TYPE_NOTIFY_HUB: u16 = 1;

    /// Payloads at least this long are first tried as notify tuples
    pub const NOTIFY_SNIFF_MIN_LEN: usize = 66;

    /// Base native fee per message (simulated endpoint)
    pub const DEFAULT_BASE_FEE: u128 = 2_000_000_000_000_000;

    /// Additional native fee per payload byte
    pub const DEFAULT_PER_BYTE_FEE: u128 = 1_000_000_000_000;
}
