//! Tick Math
//!
//! Concentrated-liquidity price math. `sqrt_ratio_at_tick_q96` is the
//! canonical bit-decomposition of `sqrt(1.0001^tick) * 2^96`; everything
//! downstream works in 18-decimal sqrt prices so positions can be valued
//! with the same fixed point as the rest of the protocol.
//!
//! Prices are quoted as asset B per asset A (token1 per token0).

use alloy_primitives::U256;

use crate::constants::precision::WAD;
use crate::constants::ticks::{MAX_TICK, MIN_TICK};
use crate::errors::{VaultError, VaultResult};
use crate::math::{floor_div, mul_div, to_u128};
use crate::types::TokenPair;

/// `sqrt(1.0001^-2^i) * 2^128` for bit `i` of |tick|
const TICK_FACTORS: [u128; 19] = [
    0xfff97272373d413259a46990580e213a,
    0xfff2e50f5f656932ef12357cf3c7fdcc,
    0xffe5caca7e10e4e61c3624eaa0941cd0,
    0xffcb9843d60f6159c9db58835c926644,
    0xff973b41fa98c081472e6896dfb254c0,
    0xff2ea16466c96a3843ec78b326b52861,
    0xfe5dee046a99a2a811c461f1969c3053,
    0xfcbe86c7900a88aedcffc83b479aa3a4,
    0xf987a7253ac413176f2b074cf7815e54,
    0xf3392b0822b70005940c7a398e4b70f3,
    0xe7159475a2c29b7443b29c7fa6e889d9,
    0xd097f3bdfd2022b8845ad8f792aa5825,
    0xa9f746462d870fdf8a65dc1f90e061e5,
    0x70d869a156d2a1b890bb3df62baf32f7,
    0x31be135f97d08fd981231505542fcfa6,
    0x9aa508b5b7a84e1c677de54f3e99bc9,
    0x5d6af8dedb81196699c329225ee604,
    0x2216e584f5fa1ea926041bedfe98,
    0x48a170391f7dc42444e8fa2,
];

const TICK_FACTOR_BIT0: u128 = 0xfffcb933bd6fad37aa2d162d1a594001;

/// Fails with `InvalidTickRange` if `tick` is outside the global bounds
pub fn check_tick(tick: i32) -> VaultResult<()> {
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        return Err(VaultError::InvalidTickRange { lower: tick, upper: tick });
    }
    Ok(())
}

/// `sqrt(1.0001^tick)` as a Q64.96 fixed-point number
pub fn sqrt_ratio_at_tick_q96(tick: i32) -> VaultResult<U256> {
    check_tick(tick)?;
    let abs_tick = tick.unsigned_abs();

    let mut ratio = if abs_tick & 0x1 != 0 {
        U256::from(TICK_FACTOR_BIT0)
    } else {
        U256::from(1u8) << 128
    };
    for (bit, factor) in TICK_FACTORS.iter().enumerate() {
        if abs_tick & (0x2 << bit) != 0 {
            ratio = (ratio * U256::from(*factor)) >> 128;
        }
    }

    if tick > 0 {
        ratio = U256::MAX / ratio;
    }

    // Q128.128 -> Q64.96, rounding up
    let round_up = !(ratio % (U256::from(1u8) << 32usize)).is_zero();
    let mut sqrt_q96 = ratio >> 32;
    if round_up {
        sqrt_q96 += U256::from(1u8);
    }
    Ok(sqrt_q96)
}

/// `sqrt(1.0001^tick)` at 18 decimals
pub fn sqrt_price_x18(tick: i32) -> VaultResult<u128> {
    let sqrt_q96 = sqrt_ratio_at_tick_q96(tick)?;
    // sqrt_q96 < 2^160, so multiplying by 1e18 stays inside 256 bits
    to_u128((sqrt_q96 * U256::from(WAD)) >> 96)
}

/// `1.0001^tick` at 18 decimals (B per A)
pub fn price_x18_at_tick(tick: i32) -> VaultResult<u128> {
    let sqrt = sqrt_price_x18(tick)?;
    mul_div(sqrt, sqrt, WAD)
}

/// Floors `tick` to a multiple of `spacing`, toward negative infinity
pub fn floor_tick(tick: i32, spacing: i32) -> VaultResult<i32> {
    Ok(floor_div(tick, spacing)? * spacing)
}

/// Lowest tick usable as a boundary at this spacing
pub fn min_usable_tick(spacing: i32) -> i32 {
    -(MAX_TICK / spacing) * spacing
}

/// Highest tick usable as a boundary at this spacing
pub fn max_usable_tick(spacing: i32) -> i32 {
    (MAX_TICK / spacing) * spacing
}

/// Validates a position range against a spacing
pub fn check_range(tick_lower: i32, tick_upper: i32, spacing: i32) -> VaultResult<()> {
    let invalid = VaultError::InvalidTickRange { lower: tick_lower, upper: tick_upper };
    if spacing <= 0 || tick_lower >= tick_upper {
        return Err(invalid);
    }
    if tick_lower % spacing != 0 || tick_upper % spacing != 0 {
        return Err(invalid);
    }
    if tick_lower < min_usable_tick(spacing) || tick_upper > max_usable_tick(spacing) {
        return Err(invalid);
    }
    Ok(())
}

// ============ Liquidity Amounts ============

fn liquidity_for_amount_a(sqrt_lower: u128, sqrt_upper: u128, amount_a: u128) -> VaultResult<u128> {
    let intermediate = mul_div(sqrt_lower, sqrt_upper, WAD)?;
    mul_div(amount_a, intermediate, sqrt_upper - sqrt_lower)
}

fn liquidity_for_amount_b(sqrt_lower: u128, sqrt_upper: u128, amount_b: u128) -> VaultResult<u128> {
    mul_div(amount_b, WAD, sqrt_upper - sqrt_lower)
}

fn amount_a_for_liquidity(sqrt_lower: u128, sqrt_upper: u128, liquidity: u128) -> VaultResult<u128> {
    let scaled = mul_div(liquidity, sqrt_upper - sqrt_lower, sqrt_upper)?;
    mul_div(scaled, WAD, sqrt_lower)
}

fn amount_b_for_liquidity(sqrt_lower: u128, sqrt_upper: u128, liquidity: u128) -> VaultResult<u128> {
    mul_div(liquidity, sqrt_upper - sqrt_lower, WAD)
}

/// Maximum liquidity the given amounts can provide to `[sqrt_lower, sqrt_upper]`
/// at the current sqrt price
pub fn liquidity_for_amounts(
    sqrt_price: u128,
    sqrt_lower: u128,
    sqrt_upper: u128,
    amounts: TokenPair,
) -> VaultResult<u128> {
    if sqrt_lower >= sqrt_upper {
        return Err(VaultError::InvalidInput {
            param: "sqrt_range",
            reason: "lower must be below upper",
        });
    }
    if sqrt_price <= sqrt_lower {
        liquidity_for_amount_a(sqrt_lower, sqrt_upper, amounts.a)
    } else if sqrt_price < sqrt_upper {
        let from_a = liquidity_for_amount_a(sqrt_price, sqrt_upper, amounts.a)?;
        let from_b = liquidity_for_amount_b(sqrt_lower, sqrt_price, amounts.b)?;
        Ok(from_a.min(from_b))
    } else {
        liquidity_for_amount_b(sqrt_lower, sqrt_upper, amounts.b)
    }
}

/// Token amounts backing `liquidity` in `[sqrt_lower, sqrt_upper]`, rounded down
pub fn amounts_for_liquidity(
    sqrt_price: u128,
    sqrt_lower: u128,
    sqrt_upper: u128,
    liquidity: u128,
) -> VaultResult<TokenPair> {
    if sqrt_lower >= sqrt_upper {
        return Err(VaultError::InvalidInput {
            param: "sqrt_range",
            reason: "lower must be below upper",
        });
    }
    if sqrt_price <= sqrt_lower {
        Ok(TokenPair::new(amount_a_for_liquidity(sqrt_lower, sqrt_upper, liquidity)?, 0))
    } else if sqrt_price < sqrt_upper {
        Ok(TokenPair::new(
            amount_a_for_liquidity(sqrt_price, sqrt_upper, liquidity)?,
            amount_b_for_liquidity(sqrt_lower, sqrt_price, liquidity)?,
        ))
    } else {
        Ok(TokenPair::new(0, amount_b_for_liquidity(sqrt_lower, sqrt_upper, liquidity)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: u128, b: u128, tolerance: u128) -> bool {
        a.abs_diff(b) <= tolerance
    }

    #[test]
    fn test_tick_zero_is_par() {
        assert_eq!(sqrt_ratio_at_tick_q96(0).unwrap(), U256::from(1u8) << 96);
        assert_eq!(sqrt_price_x18(0).unwrap(), WAD);
        assert_eq!(price_x18_at_tick(0).unwrap(), WAD);
    }

    #[test]
    fn test_price_doubles_near_6932() {
        let price = price_x18_at_tick(6_932).unwrap();
        assert!(approx_eq(price, 2 * WAD, WAD / 1_000), "price = {price}");

        let inverse = price_x18_at_tick(-6_932).unwrap();
        assert!(approx_eq(inverse, WAD / 2, WAD / 1_000), "inverse = {inverse}");
    }

    #[test]
    fn test_prices_monotonic() {
        let mut last = 0;
        for tick in [-100_000, -1_000, -1, 0, 1, 1_000, 100_000] {
            let price = price_x18_at_tick(tick).unwrap();
            assert!(price > last);
            last = price;
        }
    }

    #[test]
    fn test_out_of_bounds_tick() {
        assert!(sqrt_ratio_at_tick_q96(MAX_TICK + 1).is_err());
        assert!(sqrt_ratio_at_tick_q96(MIN_TICK - 1).is_err());
        assert!(sqrt_ratio_at_tick_q96(MAX_TICK).is_ok());
        assert!(sqrt_ratio_at_tick_q96(MIN_TICK).is_ok());
    }

    #[test]
    fn test_floor_tick() {
        assert_eq!(floor_tick(125, 60).unwrap(), 120);
        assert_eq!(floor_tick(-125, 60).unwrap(), -180);
        assert_eq!(floor_tick(-60, 60).unwrap(), -60);
    }

    #[test]
    fn test_check_range() {
        assert!(check_range(-120, 120, 60).is_ok());
        assert!(check_range(120, 120, 60).is_err());
        assert!(check_range(-100, 120, 60).is_err());
        assert!(check_range(min_usable_tick(60) - 60, 0, 60).is_err());
    }

    #[test]
    fn test_liquidity_roundtrip_in_range() {
        let sqrt_p = sqrt_price_x18(0).unwrap();
        let sqrt_l = sqrt_price_x18(-1_200).unwrap();
        let sqrt_u = sqrt_price_x18(1_200).unwrap();
        let amounts = TokenPair::new(1_000 * WAD, 1_000 * WAD);

        let liquidity = liquidity_for_amounts(sqrt_p, sqrt_l, sqrt_u, amounts).unwrap();
        assert!(liquidity > 0);

        let back = amounts_for_liquidity(sqrt_p, sqrt_l, sqrt_u, liquidity).unwrap();
        assert!(back.a <= amounts.a && back.b <= amounts.b);
        // Symmetric range at par consumes both legs almost fully
        assert!(approx_eq(back.a, amounts.a, WAD / 1_000_000));
        assert!(approx_eq(back.b, amounts.b, WAD / 1_000_000));
    }

    #[test]
    fn test_single_sided_ranges() {
        let sqrt_p = sqrt_price_x18(0).unwrap();
        let above_l = sqrt_price_x18(60).unwrap();
        let above_u = sqrt_price_x18(660).unwrap();

        // Range above price holds only asset A
        let only_b = TokenPair::new(0, 100 * WAD);
        assert_eq!(liquidity_for_amounts(sqrt_p, above_l, above_u, only_b).unwrap(), 0);

        let only_a = TokenPair::new(100 * WAD, 0);
        let liquidity = liquidity_for_amounts(sqrt_p, above_l, above_u, only_a).unwrap();
        let back = amounts_for_liquidity(sqrt_p, above_l, above_u, liquidity).unwrap();
        assert_eq!(back.b, 0);
        assert!(approx_eq(back.a, 100 * WAD, WAD / 1_000_000));
    }
}
