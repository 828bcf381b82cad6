//! Oracle Module
//!
//! USD prices for the two vault assets at 18 decimals.
//!
//! ## Sources
//!
//! - **Push feed**: Chainlink-style rounds with staleness and depeg checks
//! - **Pool TWAP**: the floating leg priced from the pool's time-weighted tick
//!   and the other leg's push-feed price
//!
//! The TWAP path falls back to spot when the pool cannot serve the window.
//! That fallback carries no staleness check and is intentionally a last resort.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::constants::oracle::{
    MAX_FEED_DECIMALS, MAX_PRICE_AGE_SECS, PEG_LOWER_BOUND, PEG_UPPER_BOUND, PRICE_DECIMALS,
    TWAP_INTERVAL_SECS,
};
use crate::constants::precision::WAD;
use crate::errors::{PriceErrorReason, VaultError, VaultResult};
use crate::math::{mul_div, safe_add, wad_div, wad_mul};
use crate::pool::PoolState;
use crate::tick_math::price_x18_at_tick;
use crate::types::TokenPair;

// ============================================================================
// Push Feeds
// ============================================================================

/// One push-oracle round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct RoundData {
    pub round_id: u128,
    pub answer: i128,
    pub started_at: u64,
    pub updated_at: u64,
    pub answered_in_round: u128,
}

/// Push-oracle aggregator model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct PushFeed {
    /// Decimals of `answer`
    pub decimals: u8,
    latest: RoundData,
}

impl PushFeed {
    /// Create a feed with a first answered round at `now`
    pub fn new(decimals: u8, answer: i128, now: u64) -> Self {
        Self {
            decimals,
            latest: RoundData {
                round_id: 1,
                answer,
                started_at: now,
                updated_at: now,
                answered_in_round: 1,
            },
        }
    }

    /// Latest round as reported by the aggregator
    pub fn latest_round_data(&self) -> RoundData {
        self.latest
    }

    /// Start and answer a new round
    pub fn push_answer(&mut self, answer: i128, now: u64) {
        let round_id = self.latest.round_id + 1;
        self.latest = RoundData {
            round_id,
            answer,
            started_at: now,
            updated_at: now,
            answered_in_round: round_id,
        };
    }

    /// Overwrite the latest round verbatim (simulates a misbehaving aggregator)
    pub fn set_round(&mut self, round: RoundData) {
        self.latest = round;
    }
}

/// Tunable oracle limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct OracleConfig {
    /// Maximum answer age in seconds
    pub max_price_age: u64,
    /// TWAP window in seconds
    pub twap_interval: u32,
    /// Depeg floor for pegged stables
    pub peg_lower: u128,
    /// Depeg ceiling for pegged stables
    pub peg_upper: u128,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            max_price_age: MAX_PRICE_AGE_SECS,
            twap_interval: TWAP_INTERVAL_SECS,
            peg_lower: PEG_LOWER_BOUND,
            peg_upper: PEG_UPPER_BOUND,
        }
    }
}

impl OracleConfig {
    /// Validate configuration
    pub fn validate(&self) -> VaultResult<()> {
        if self.max_price_age == 0 {
            return Err(VaultError::InvalidInput {
                param: "max_price_age",
                reason: "must be positive",
            });
        }
        if self.peg_lower == 0 || self.peg_lower > WAD || self.peg_upper < WAD {
            return Err(VaultError::InvalidInput {
                param: "peg_bounds",
                reason: "must bracket $1",
            });
        }
        Ok(())
    }
}

fn scale_answer(answer: i128, decimals: u8) -> VaultResult<u128> {
    let invalid = |reason| VaultError::InvalidPrice { answer, reason };
    if answer <= 0 {
        return Err(invalid(PriceErrorReason::NonPositive));
    }
    if decimals > MAX_FEED_DECIMALS {
        return Err(invalid(PriceErrorReason::BadDecimals));
    }
    let raw = answer as u128;
    if decimals <= PRICE_DECIMALS {
        let factor = 10u128.pow((PRICE_DECIMALS - decimals) as u32);
        raw.checked_mul(factor).ok_or(invalid(PriceErrorReason::BadDecimals))
    } else {
        Ok(raw / 10u128.pow((decimals - PRICE_DECIMALS) as u32))
    }
}

/// USD price of a push-fed asset at 18 decimals
///
/// # Errors
/// * `StalePrice` if the answer is older than `max_price_age` or its round
///   was never answered
/// * `InvalidPrice` if the answer is non-positive, or for a pegged asset
///   outside the peg band
pub fn get_stable_price(feed: &PushFeed, pegged: bool, config: &OracleConfig, now: u64) -> VaultResult<u128> {
    let round = feed.latest_round_data();
    if now.saturating_sub(round.updated_at) > config.max_price_age
        || round.answered_in_round < round.round_id
    {
        return Err(VaultError::StalePrice {
            updated_at: round.updated_at,
            now,
            round_id: round.round_id,
            answered_in_round: round.answered_in_round,
        });
    }

    let price = scale_answer(round.answer, feed.decimals)?;
    if pegged && (price < config.peg_lower || price > config.peg_upper) {
        return Err(VaultError::InvalidPrice {
            answer: round.answer,
            reason: PriceErrorReason::Depegged,
        });
    }
    Ok(price)
}

/// USD price of the pool's asset A, from the TWAP ratio and asset B's USD price
///
/// Falls back to the spot tick when the TWAP query fails.
pub fn get_floating_price(pool: &PoolState, stable_price: u128, config: &OracleConfig, now: u64) -> VaultResult<u128> {
    let tick = pool
        .observe_twap_tick(config.twap_interval, now)
        .unwrap_or_else(|_| pool.spot_tick());
    let ratio = price_x18_at_tick(tick)?;
    wad_mul(ratio, stable_price)
}

/// `amount_a * price_a / 1e18 + amount_b * price_b / 1e18`
pub fn calculate_usd_value(amounts: TokenPair, price_a: u128, price_b: u128) -> VaultResult<u128> {
    safe_add(wad_mul(amounts.a, price_a)?, wad_mul(amounts.b, price_b)?)
}

// ============================================================================
// Per-Vault Oracle
// ============================================================================

/// How one vault asset is priced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum PriceSource {
    /// Push feed, optionally depeg-guarded
    PushFeed { feed: PushFeed, pegged: bool },
    /// Pool TWAP against the other asset's push feed
    PoolTwap,
}

/// USD prices for one vault's asset pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricePair {
    pub price_a: u128,
    pub price_b: u128,
}

impl PricePair {
    /// USD value of a token pair at these prices
    pub fn usd_value(&self, amounts: TokenPair) -> VaultResult<u128> {
        calculate_usd_value(amounts, self.price_a, self.price_b)
    }

    /// Convert a USD amount into units of asset A
    pub fn usd_to_a(&self, usd: u128) -> VaultResult<u128> {
        wad_div(usd, self.price_a)
    }
}

/// Oracle composed of one source per asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct PriceOracle {
    pub config: OracleConfig,
    pub source_a: PriceSource,
    pub source_b: PriceSource,
}

impl PriceOracle {
    pub fn new(config: OracleConfig, source_a: PriceSource, source_b: PriceSource) -> VaultResult<Self> {
        config.validate()?;
        if matches!(source_a, PriceSource::PoolTwap) && matches!(source_b, PriceSource::PoolTwap) {
            return Err(VaultError::OracleNotConfigured);
        }
        Ok(Self { config, source_a, source_b })
    }

    /// Mutable access to the push feed of asset A, if it has one
    pub fn feed_a_mut(&mut self) -> Option<&mut PushFeed> {
        match &mut self.source_a {
            PriceSource::PushFeed { feed, .. } => Some(feed),
            PriceSource::PoolTwap => None,
        }
    }

    /// Mutable access to the push feed of asset B, if it has one
    pub fn feed_b_mut(&mut self) -> Option<&mut PushFeed> {
        match &mut self.source_b {
            PriceSource::PushFeed { feed, .. } => Some(feed),
            PriceSource::PoolTwap => None,
        }
    }

    /// Price both assets
    pub fn prices(&self, pool: Option<&PoolState>, now: u64) -> VaultResult<PricePair> {
        match (&self.source_a, &self.source_b) {
            (
                PriceSource::PushFeed { feed: feed_a, pegged: pegged_a },
                PriceSource::PushFeed { feed: feed_b, pegged: pegged_b },
            ) => Ok(PricePair {
                price_a: get_stable_price(feed_a, *pegged_a, &self.config, now)?,
                price_b: get_stable_price(feed_b, *pegged_b, &self.config, now)?,
            }),
            (PriceSource::PoolTwap, PriceSource::PushFeed { feed, pegged }) => {
                let pool = pool.ok_or(VaultError::OracleNotConfigured)?;
                let price_b = get_stable_price(feed, *pegged, &self.config, now)?;
                let price_a = get_floating_price(pool, price_b, &self.config, now)?;
                Ok(PricePair { price_a, price_b })
            }
            (PriceSource::PushFeed { feed, pegged }, PriceSource::PoolTwap) => {
                let pool = pool.ok_or(VaultError::OracleNotConfigured)?;
                let price_a = get_stable_price(feed, *pegged, &self.config, now)?;
                // B per A from the pool; B = A / ratio
                let tick = pool
                    .observe_twap_tick(self.config.twap_interval, now)
                    .unwrap_or_else(|_| pool.spot_tick());
                let ratio = price_x18_at_tick(tick)?;
                let price_b = mul_div(price_a, WAD, ratio)?;
                Ok(PricePair { price_a, price_b })
            }
            (PriceSource::PoolTwap, PriceSource::PoolTwap) => Err(VaultError::OracleNotConfigured),
        }
    }

    /// USD value of `amounts` at current prices
    pub fn calculate_usd_value(&self, amounts: TokenPair, pool: Option<&PoolState>, now: u64) -> VaultResult<u128> {
        self.prices(pool, now)?.usd_value(amounts)
    }
}
