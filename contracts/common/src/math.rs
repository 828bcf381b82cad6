//! Mathematical Utilities for the Creator Vault Protocol
//!
//! Checked fixed-point helpers. Products of two 18-decimal values overflow
//! `u128`, so every multiply-then-divide goes through a `U256` intermediate.

use alloy_primitives::U256;

use crate::constants::precision::{BPS_DENOMINATOR, WAD};
use crate::errors::{VaultError, VaultResult};

/// Narrows a `U256` to `u128`, failing with `Overflow` if it does not fit
pub fn to_u128(value: U256) -> VaultResult<u128> {
    let limbs = value.as_limbs();
    if limbs[2] != 0 || limbs[3] != 0 {
        return Err(VaultError::Overflow);
    }
    Ok(((limbs[1] as u128) << 64) | limbs[0] as u128)
}

/// Calculates `a * b / denominator`, rounding down
///
/// # Errors
/// * `DivisionByZero` if `denominator == 0`
/// * `Overflow` if the quotient does not fit in `u128`
pub fn mul_div(a: u128, b: u128, denominator: u128) -> VaultResult<u128> {
    if denominator == 0 {
        return Err(VaultError::DivisionByZero);
    }
    // (2^128)^2 fits in 256 bits, so the product cannot wrap
    let product = U256::from(a) * U256::from(b);
    to_u128(product / U256::from(denominator))
}

/// Calculates `a * b / denominator`, rounding up
pub fn mul_div_up(a: u128, b: u128, denominator: u128) -> VaultResult<u128> {
    if denominator == 0 {
        return Err(VaultError::DivisionByZero);
    }
    let product = U256::from(a) * U256::from(b);
    let denominator = U256::from(denominator);
    let mut quotient = product / denominator;
    if !(product % denominator).is_zero() {
        quotient += U256::from(1u8);
    }
    to_u128(quotient)
}

/// `amount * bps / 10_000`
pub fn bps_of(amount: u128, bps: u64) -> VaultResult<u128> {
    mul_div(amount, bps as u128, BPS_DENOMINATOR)
}

/// Multiplies two 18-decimal fixed-point values
pub fn wad_mul(a: u128, b: u128) -> VaultResult<u128> {
    mul_div(a, b, WAD)
}

/// Divides two 18-decimal fixed-point values
pub fn wad_div(a: u128, b: u128) -> VaultResult<u128> {
    mul_div(a, WAD, b)
}

/// Shortfall of `actual` against `expected` in basis points (0 if no shortfall)
pub fn shortfall_bps(expected: u128, actual: u128) -> VaultResult<u64> {
    if actual >= expected {
        return Ok(0);
    }
    let bps = mul_div(expected - actual, BPS_DENOMINATOR, expected)?;
    // bps <= 10_000 since actual < expected
    Ok(bps as u64)
}

/// Integer division rounding toward negative infinity
pub fn floor_div(value: i32, divisor: i32) -> VaultResult<i32> {
    if divisor == 0 {
        return Err(VaultError::DivisionByZero);
    }
    if divisor < 0 {
        return Err(VaultError::InvalidInput {
            param: "divisor",
            reason: "must be positive",
        });
    }
    Ok(value.div_euclid(divisor))
}

/// Absolute distance between two ticks
pub fn tick_distance(a: i32, b: i32) -> i32 {
    // Both ticks lie within +-887_272, so the difference fits in i32
    (a as i64 - b as i64).unsigned_abs().min(i32::MAX as u64) as i32
}

/// Safe addition with overflow check
pub fn safe_add(a: u128, b: u128) -> VaultResult<u128> {
    a.checked_add(b).ok_or(VaultError::Overflow)
}

/// Safe subtraction with underflow check
pub fn safe_sub(a: u128, b: u128) -> VaultResult<u128> {
    a.checked_sub(b).ok_or(VaultError::Underflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mul_div_full_width() {
        // 1e30 * 1e30 overflows u128 but the quotient fits
        let big = 1_000_000_000_000_000_000_000_000_000_000u128;
        assert_eq!(mul_div(big, big, big).unwrap(), big);
        assert_eq!(mul_div(7, 3, 2).unwrap(), 10);
        assert_eq!(mul_div_up(7, 3, 2).unwrap(), 11);
        assert_eq!(mul_div_up(6, 3, 2).unwrap(), 9);
    }

    #[test]
    fn test_mul_div_errors() {
        assert_eq!(mul_div(1, 1, 0), Err(VaultError::DivisionByZero));
        assert_eq!(mul_div(u128::MAX, u128::MAX, 1), Err(VaultError::Overflow));
    }

    #[test]
    fn test_wad_helpers() {
        let half = WAD / 2;
        assert_eq!(wad_mul(3 * WAD, half).unwrap(), 3 * WAD / 2);
        assert_eq!(wad_div(WAD, 4 * WAD).unwrap(), WAD / 4);
        assert_eq!(bps_of(1_000_000, 250).unwrap(), 25_000);
    }

    #[test]
    fn test_shortfall_bps() {
        assert_eq!(shortfall_bps(100, 100).unwrap(), 0);
        assert_eq!(shortfall_bps(100, 120).unwrap(), 0);
        assert_eq!(shortfall_bps(100, 98).unwrap(), 200);
        assert_eq!(shortfall_bps(100, 0).unwrap(), 10_000);
    }

    #[test]
    fn test_floor_div_negative_ticks() {
        assert_eq!(floor_div(125, 60).unwrap(), 2);
        assert_eq!(floor_div(-125, 60).unwrap(), -3);
        assert_eq!(floor_div(-120, 60).unwrap(), -2);
        assert_eq!(floor_div(-1, 60).unwrap(), -1);
        assert!(floor_div(1, 0).is_err());
    }

    #[test]
    fn test_tick_distance() {
        assert_eq!(tick_distance(-5, 5), 10);
        assert_eq!(tick_distance(887_272, -887_272), 1_774_544);
    }
}
