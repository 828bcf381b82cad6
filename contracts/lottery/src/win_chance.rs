//! Win Chance
//!
//! Piecewise-linear ramp from the base chance at the minimum swap size to
//! the maximum chance `$1000` above it, then two boosts:
//!
//! - personal (ve) boost, multiplicative, clamped to `[1.0x, 2.5x]`
//! - vault-gauge boost, additive, scaled by swap size over the same ramp
//!
//! The result never exceeds `ABSOLUTE_MAX_WIN_CHANCE_PPM`.

use creator_vault_common::{
    constants::lottery::{ABSOLUTE_MAX_WIN_CHANCE_PPM, BOOST_BASE_BPS, MAX_PERSONAL_BOOST_BPS, WIN_CHANCE_RAMP_USD},
    constants::precision::BPS_DENOMINATOR,
    errors::VaultResult,
    math::mul_div,
};

use crate::config::LotteryConfig;

/// Denominator of every win chance (parts per million)
pub const PPM: u64 = 1_000_000;

/// Unboosted win chance for a swap worth `usd_value`
///
/// Zero below the minimum swap size.
pub fn calculate_win_chance(usd_value: u128, config: &LotteryConfig) -> VaultResult<u64> {
    if usd_value < config.min_swap_usd {
        return Ok(0);
    }
    let excess = usd_value - config.min_swap_usd;
    if excess >= WIN_CHANCE_RAMP_USD {
        return Ok(config.max_win_chance_ppm);
    }
    let span = (config.max_win_chance_ppm - config.base_win_chance_ppm) as u128;
    let ramp = mul_div(span, excess, WIN_CHANCE_RAMP_USD)?;
    Ok(config.base_win_chance_ppm + ramp as u64)
}

/// Apply the personal and gauge boosts to a base chance
pub fn apply_boosts(
    base_ppm: u64,
    personal_boost_bps: u64,
    gauge_boost_ppm: u64,
    usd_value: u128,
) -> VaultResult<u64> {
    let boost = personal_boost_bps.clamp(BOOST_BASE_BPS, MAX_PERSONAL_BOOST_BPS);
    let boosted = mul_div(base_ppm as u128, boost as u128, BPS_DENOMINATOR)?;

    let size = usd_value.min(WIN_CHANCE_RAMP_USD);
    let gauge = mul_div(gauge_boost_ppm as u128, size, WIN_CHANCE_RAMP_USD)?;

    let total = boosted.saturating_add(gauge);
    Ok(total.min(ABSOLUTE_MAX_WIN_CHANCE_PPM as u128) as u64)
}

/// `word % 1_000_000`
pub fn roll(random_word: u128) -> u64 {
    (random_word % PPM as u128) as u64
}

/// A draw wins iff the roll lands strictly below the chance
pub fn is_win(roll: u64, win_chance_ppm: u64) -> bool {
    roll < win_chance_ppm
}

#[cfg(test)]
mod tests {
    use super::*;
    use creator_vault_common::constants::precision::ONE_USD;

    fn config() -> LotteryConfig {
        LotteryConfig::new(8_453)
    }

    #[test]
    fn test_ramp_midpoint() {
        let config = config();
        let chance = calculate_win_chance(config.min_swap_usd + 500 * ONE_USD, &config).unwrap();
        assert_eq!(chance, 20_020);
    }

    #[test]
    fn test_ramp_ends() {
        let config = config();
        assert_eq!(calculate_win_chance(config.min_swap_usd - 1, &config).unwrap(), 0);
        assert_eq!(calculate_win_chance(config.min_swap_usd, &config).unwrap(), 40);
        assert_eq!(calculate_win_chance(config.min_swap_usd + 1_000 * ONE_USD, &config).unwrap(), 40_000);
        assert_eq!(calculate_win_chance(u128::MAX, &config).unwrap(), 40_000);
    }

    #[test]
    fn test_chance_is_monotonic_in_size() {
        let config = config();
        let mut last = 0;
        for dollars in [1u128, 2, 10, 100, 250, 999, 1_000, 1_001, 5_000] {
            let chance = calculate_win_chance(dollars * ONE_USD, &config).unwrap();
            assert!(chance >= last);
            last = chance;
        }
    }

    #[test]
    fn test_boosts() {
        // Personal boost is clamped to 2.5x
        assert_eq!(apply_boosts(20_000, 40_000, 0, 0).unwrap(), 50_000);
        // Below par counts as par
        assert_eq!(apply_boosts(20_000, 0, 0, 0).unwrap(), 20_000);
        // Gauge boost scales with swap size
        assert_eq!(apply_boosts(1_000, 10_000, 10_000, 500 * ONE_USD).unwrap(), 6_000);
        assert_eq!(apply_boosts(1_000, 10_000, 10_000, 5_000 * ONE_USD).unwrap(), 11_000);
        // Hard ceiling
        assert_eq!(apply_boosts(40_000, 25_000, 90_000, 5_000 * ONE_USD).unwrap(), 100_000);
    }

    #[test]
    fn test_roll() {
        assert_eq!(roll(1_234_567), 234_567);
        assert!(is_win(19_999, 20_000));
        assert!(!is_win(20_000, 20_000));
    }

    #[test]
    fn test_win_rate_converges() {
        // Deterministic stream of words; frequency approaches the chance
        let chance = 20_020;
        let trials = 200_000u64;
        let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
        let mut wins = 0u64;
        for _ in 0..trials {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            if is_win(roll(state as u128), chance) {
                wins += 1;
            }
        }
        let expected = trials * chance / PPM;
        assert!(wins.abs_diff(expected) < expected / 10, "wins = {wins}, expected = {expected}");
    }
}
