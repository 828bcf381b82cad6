//! Core Types for the Creator Vault Protocol
//!
//! Fundamental data structures shared by the vault, strategy, wrapper and
//! lottery crates.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::errors::{VaultError, VaultResult};
use crate::math::{bps_of, mul_div};

/// 20-byte EVM account address
pub type Address = [u8; 20];

/// 32-byte word (LayerZero peers, GUIDs, operation ids)
pub type Bytes32 = [u8; 32];

/// LayerZero endpoint id
pub type Eid = u32;

/// The zero address
pub const ZERO_ADDRESS: Address = [0u8; 20];

/// Fails with `ZeroAddress` when `address` is the zero address
pub fn require_nonzero(address: &Address, param: &'static str) -> VaultResult<()> {
    if *address == ZERO_ADDRESS {
        return Err(VaultError::ZeroAddress { param });
    }
    Ok(())
}

/// Left-pads an address into a 32-byte peer word
pub fn address_to_bytes32(address: &Address) -> Bytes32 {
    let mut out = [0u8; 32];
    out[12..].copy_from_slice(address);
    out
}

/// Takes the low 20 bytes of a 32-byte peer word
pub fn bytes32_to_address(word: &Bytes32) -> Address {
    let mut out = [0u8; 20];
    out.copy_from_slice(&word[12..]);
    out
}

// ============ Token Amounts ============

/// Amounts of the vault's two underlying assets (A = creator token, B = paired stable)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct TokenPair {
    pub a: u128,
    pub b: u128,
}

impl TokenPair {
    pub const ZERO: TokenPair = TokenPair { a: 0, b: 0 };

    pub const fn new(a: u128, b: u128) -> Self {
        Self { a, b }
    }

    pub fn is_zero(&self) -> bool {
        self.a == 0 && self.b == 0
    }

    pub fn checked_add(&self, other: &TokenPair) -> VaultResult<TokenPair> {
        Ok(TokenPair {
            a: self.a.checked_add(other.a).ok_or(VaultError::Overflow)?,
            b: self.b.checked_add(other.b).ok_or(VaultError::Overflow)?,
        })
    }

    pub fn checked_sub(&self, other: &TokenPair) -> VaultResult<TokenPair> {
        Ok(TokenPair {
            a: self.a.checked_sub(other.a).ok_or(VaultError::Underflow)?,
            b: self.b.checked_sub(other.b).ok_or(VaultError::Underflow)?,
        })
    }

    pub fn saturating_sub(&self, other: &TokenPair) -> TokenPair {
        TokenPair {
            a: self.a.saturating_sub(other.a),
            b: self.b.saturating_sub(other.b),
        }
    }

    /// Component-wise minimum
    pub fn min(&self, other: &TokenPair) -> TokenPair {
        TokenPair {
            a: self.a.min(other.a),
            b: self.b.min(other.b),
        }
    }

    /// Scales both legs by `bps / 10_000`
    pub fn scale_bps(&self, bps: u64) -> VaultResult<TokenPair> {
        Ok(TokenPair {
            a: bps_of(self.a, bps)?,
            b: bps_of(self.b, bps)?,
        })
    }

    /// Scales both legs by `numerator / denominator`, rounding down
    pub fn pro_rata(&self, numerator: u128, denominator: u128) -> VaultResult<TokenPair> {
        Ok(TokenPair {
            a: mul_div(self.a, numerator, denominator)?,
            b: mul_div(self.b, numerator, denominator)?,
        })
    }
}

// ============ Strategy Types ============

/// Strategy variant tag
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum StrategyType {
    /// Position across the full usable tick range
    FullRange = 0,
    /// Single-sided range just outside the current price
    LimitOrder = 1,
    /// Actively re-centred range with manipulation guards
    Concentrated = 2,
}

// ============ Lottery Types ============

/// How a lottery entry obtains its randomness
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, BorshSerialize,
    BorshDeserialize,
)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum VrfType {
    /// Coordinator on this chain
    Local = 0,
    /// Request forwarded over messaging to a remote coordinator
    CrossChain = 1,
}
