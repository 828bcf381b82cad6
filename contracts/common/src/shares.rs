//! Share Accounting
//!
//! Pure conversions between USD value and vault shares. `total_supply`
//! arguments are always the effective supply from
//! [`ProfitUnlockState::effective_total_supply`](crate::profit_unlock::ProfitUnlockState::effective_total_supply).
//!
//! The first deposit mints `usd_value * SEED_MULTIPLIER` shares. The
//! multiplier bridges an 18-decimal USD value and a human-scale share count;
//! it is a fixed property of the share token, not a rounding guard.

use crate::constants::precision::BPS_DENOMINATOR;
use crate::constants::shares::{MAX_TOTAL_SUPPLY, SEED_MULTIPLIER};
use crate::errors::{AmountErrorReason, VaultError, VaultResult};
use crate::math::{mul_div, shortfall_bps};

/// Shares minted for a deposit worth `usd_value`
///
/// # Errors
/// * `ZeroAmount` if `usd_value == 0`
/// * `InvalidAmount` if the deposit rounds to zero shares or pushes the
///   supply over `MAX_TOTAL_SUPPLY`
pub fn shares_for_deposit(usd_value: u128, total_supply: u128, total_assets: u128) -> VaultResult<u128> {
    if usd_value == 0 {
        return Err(VaultError::ZeroAmount);
    }

    let shares = if total_supply == 0 {
        usd_value
            .checked_mul(SEED_MULTIPLIER)
            .ok_or(VaultError::InvalidAmount { amount: usd_value, reason: AmountErrorReason::TooLarge })?
    } else {
        mul_div(usd_value, total_supply, total_assets)?
    };

    if shares == 0 {
        return Err(VaultError::InvalidAmount { amount: usd_value, reason: AmountErrorReason::TooSmall });
    }
    let new_supply = total_supply.checked_add(shares).ok_or(VaultError::Overflow)?;
    if new_supply > MAX_TOTAL_SUPPLY {
        return Err(VaultError::InvalidAmount { amount: usd_value, reason: AmountErrorReason::TooLarge });
    }
    Ok(shares)
}

/// USD value redeemable for `shares`
pub fn assets_for_redeem(shares: u128, total_supply: u128, total_assets: u128) -> VaultResult<u128> {
    if shares == 0 {
        return Err(VaultError::ZeroAmount);
    }
    if shares > total_supply {
        return Err(VaultError::InsufficientBalance { available: total_supply, requested: shares });
    }
    mul_div(total_assets, shares, total_supply)
}

/// One asset's share of a redemption: `balance * shares / total_supply`
pub fn pro_rata_balance(balance: u128, shares: u128, total_supply: u128) -> VaultResult<u128> {
    mul_div(balance, shares, total_supply)
}

/// Enforces a caller's loss tolerance, returning the loss in bps
///
/// # Errors
/// * `LossExceeded` if `(expected - actual) * 10_000 / expected > max_loss_bps`
pub fn check_loss(expected: u128, actual: u128, max_loss_bps: u64) -> VaultResult<u64> {
    if max_loss_bps as u128 > BPS_DENOMINATOR {
        return Err(VaultError::InvalidInput {
            param: "max_loss_bps",
            reason: "above 10000",
        });
    }
    let loss_bps = shortfall_bps(expected, actual)?;
    if loss_bps > max_loss_bps {
        return Err(VaultError::LossExceeded { loss_bps, max_loss_bps });
    }
    Ok(loss_bps)
}
