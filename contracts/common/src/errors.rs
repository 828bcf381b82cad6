//! Error Types for the Creator Vault Protocol
//!
//! Typed errors with stable codes. Every fatal error aborts the calling
//! operation with no partial state change; best-effort failures are carried
//! in reports and events instead of being returned.

use crate::types::Address;

/// Result type alias for protocol operations
pub type VaultResult<T> = Result<T, VaultError>;

/// Main error enum for all protocol errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    // ============ Input Validation Errors ============
    /// Zero amount not allowed
    ZeroAmount,

    /// Zero address not allowed
    ZeroAddress { param: &'static str },

    /// Invalid amount provided
    InvalidAmount { amount: u128, reason: AmountErrorReason },

    /// Insufficient balance for operation
    InsufficientBalance { available: u128, requested: u128 },

    /// Invalid input parameter
    InvalidInput { param: &'static str, reason: &'static str },

    /// Strategy weight is zero or would push total weight over the cap
    InvalidWeight { weight_bps: u64, total_after: u64 },

    /// Allocator already holds the maximum number of strategies
    TooManyStrategies { max: usize },

    /// No strategy at this index
    StrategyNotFound { index: usize },

    /// Strategy is deactivated
    StrategyInactive { index: usize },

    /// Strategy reports itself uninitialized
    StrategyNotInitialized,

    /// Tick range is not ordered or not aligned to spacing
    InvalidTickRange { lower: i32, upper: i32 },

    // ============ Authorization Errors ============
    /// Caller is not authorized for this operation
    Unauthorized { expected: Address, actual: Address },

    /// Entry point re-entered while a call is in progress
    Reentrancy,

    // ============ Oracle Errors ============
    /// Push-oracle answer is too old or belongs to an unanswered round
    StalePrice {
        updated_at: u64,
        now: u64,
        round_id: u128,
        answered_in_round: u128,
    },

    /// Oracle answer is non-positive, depegged or unusable
    InvalidPrice { answer: i128, reason: PriceErrorReason },

    /// Pool cannot serve a TWAP over the requested window
    TwapUnavailable { requested_secs: u32, available_secs: u64 },

    /// No price source configured for the asset
    OracleNotConfigured,

    // ============ Rebalance Guard Errors ============
    /// Rebalance cooldown has not elapsed
    PeriodNotElapsed { next_allowed: u64, now: u64 },

    /// Price has not moved enough since the last rebalance
    InsufficientTickMove { moved: i32, min_move: i32 },

    /// Spot deviates too far from the TWAP
    TwapDeviationTooHigh { deviation: i32, max_deviation: i32 },

    /// Current tick is too close to the global tick boundary
    PriceTooCloseToBoundary { tick: i32, limit: i32 },

    // ============ External Call Errors (best effort) ============
    /// Amounts provided produce no liquidity for the range
    ZeroLiquidity,

    /// Native balance cannot cover a messaging fee
    InsufficientFee { required: u128, available: u128 },

    /// No peer configured for destination
    PeerNotSet { eid: u32 },

    /// Inbound message from an untrusted sender
    InvalidPeer { eid: u32, sender: [u8; 32] },

    /// Inbound nonce is a replay or out of order on its path
    NonceOutOfOrder { expected: u64, received: u64 },

    /// Payload could not be decoded
    MessageDecode { len: usize },

    /// Randomness request id is unknown or already consumed
    UnknownRequest { request_id: u64 },

    /// No gauge controller registered for the creator coin
    GaugeNotConfigured { creator_coin: Address },

    /// Jackpot reserve is empty
    EmptyJackpot { creator_coin: Address },

    // ============ Economic Protection Errors ============
    /// Output below caller's minimum
    SlippageExceeded { min_out: u128, actual: u128 },

    /// Withdrawal loss above caller's tolerance
    LossExceeded { loss_bps: u64, max_loss_bps: u64 },

    // ============ State Errors ============
    /// Vault is shut down
    VaultShutdown,

    /// Component is paused
    Paused,

    /// Invalid state transition
    InvalidStateTransition,

    /// Queued operation not found
    OperationNotFound { id: [u8; 32] },

    /// Queued operation delay not elapsed
    OperationNotReady { execute_after: u64, now: u64 },

    /// Queued operation already executed or cancelled
    OperationAlreadyExecuted { id: [u8; 32] },

    /// Accounting invariant does not hold
    InvariantViolated { invariant: &'static str },

    // ============ Math Errors ============
    /// Arithmetic overflow occurred
    Overflow,

    /// Arithmetic underflow occurred
    Underflow,

    /// Division by zero
    DivisionByZero,
}

/// Reasons for amount-related errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountErrorReason {
    /// Amount is zero when non-zero required
    Zero,
    /// Amount exceeds maximum
    TooLarge,
    /// Amount below minimum
    TooSmall,
    /// Amount doesn't match expected
    Mismatch,
}

/// Reasons an oracle answer is rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceErrorReason {
    /// Answer is zero or negative
    NonPositive,
    /// Pegged asset outside [0.95, 1.05]
    Depegged,
    /// Answer cannot be scaled to 18 decimals
    BadDecimals,
}

/// Failure classes, used by callers to decide how to react
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad input; never retry unchanged
    InputValidation,
    /// Caller lacks the required role
    Authorization,
    /// Oracle problem; wait for a fresh round
    Oracle,
    /// Routine rebalance guard; a keeper polls again later
    Guard,
    /// External call failure that flows degrade around
    BestEffort,
    /// Slippage or loss protection tripped
    EconomicProtection,
    /// Component state forbids the call
    State,
    /// Arithmetic failure
    Math,
}

impl VaultError {
    /// Returns a human-readable error code for logging/debugging
    pub fn code(&self) -> &'static str {
        match self {
            Self::ZeroAmount => "E001_ZERO_AMOUNT",
            Self::ZeroAddress { .. } => "E002_ZERO_ADDRESS",
            Self::InvalidAmount { .. } => "E003_INVALID_AMOUNT",
            Self::InsufficientBalance { .. } => "E004_INSUFFICIENT_BALANCE",
            Self::InvalidInput { .. } => "E005_INVALID_INPUT",
            Self::InvalidWeight { .. } => "E006_INVALID_WEIGHT",
            Self::TooManyStrategies { .. } => "E007_TOO_MANY_STRATEGIES",
            Self::StrategyNotFound { .. } => "E008_STRATEGY_NOT_FOUND",
            Self::StrategyInactive { .. } => "E009_STRATEGY_INACTIVE",
            Self::StrategyNotInitialized => "E010_STRATEGY_NOT_INIT",
            Self::InvalidTickRange { .. } => "E011_INVALID_TICK_RANGE",
            Self::Unauthorized { .. } => "E020_UNAUTHORIZED",
            Self::Reentrancy => "E021_REENTRANCY",
            Self::StalePrice { .. } => "E030_STALE_PRICE",
            Self::InvalidPrice { .. } => "E031_INVALID_PRICE",
            Self::TwapUnavailable { .. } => "E032_TWAP_UNAVAILABLE",
            Self::OracleNotConfigured => "E033_ORACLE_NOT_CONFIGURED",
            Self::PeriodNotElapsed { .. } => "E040_PERIOD_NOT_ELAPSED",
            Self::InsufficientTickMove { .. } => "E041_INSUFFICIENT_TICK_MOVE",
            Self::TwapDeviationTooHigh { .. } => "E042_TWAP_DEVIATION",
            Self::PriceTooCloseToBoundary { .. } => "E043_NEAR_BOUNDARY",
            Self::ZeroLiquidity => "E050_ZERO_LIQUIDITY",
            Self::InsufficientFee { .. } => "E051_INSUFFICIENT_FEE",
            Self::PeerNotSet { .. } => "E052_PEER_NOT_SET",
            Self::InvalidPeer { .. } => "E053_INVALID_PEER",
            Self::NonceOutOfOrder { .. } => "E054_NONCE_ORDER",
            Self::MessageDecode { .. } => "E055_MESSAGE_DECODE",
            Self::UnknownRequest { .. } => "E056_UNKNOWN_REQUEST",
            Self::GaugeNotConfigured { .. } => "E057_GAUGE_NOT_CONFIGURED",
            Self::EmptyJackpot { .. } => "E058_EMPTY_JACKPOT",
            Self::SlippageExceeded { .. } => "E060_SLIPPAGE",
            Self::LossExceeded { .. } => "E061_LOSS_EXCEEDED",
            Self::VaultShutdown => "E070_SHUTDOWN",
            Self::Paused => "E071_PAUSED",
            Self::InvalidStateTransition => "E072_INVALID_STATE",
            Self::OperationNotFound { .. } => "E073_OP_NOT_FOUND",
            Self::OperationNotReady { .. } => "E074_OP_NOT_READY",
            Self::OperationAlreadyExecuted { .. } => "E075_OP_EXECUTED",
            Self::InvariantViolated { .. } => "E076_INVARIANT",
            Self::Overflow => "E080_OVERFLOW",
            Self::Underflow => "E081_UNDERFLOW",
            Self::DivisionByZero => "E082_DIV_ZERO",
        }
    }

    /// Failure class of this error
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::ZeroAmount
            | Self::ZeroAddress { .. }
            | Self::InvalidAmount { .. }
            | Self::InsufficientBalance { .. }
            | Self::InvalidInput { .. }
            | Self::InvalidWeight { .. }
            | Self::TooManyStrategies { .. }
            | Self::StrategyNotFound { .. }
            | Self::StrategyInactive { .. }
            | Self::StrategyNotInitialized
            | Self::InvalidTickRange { .. } => ErrorClass::InputValidation,
            Self::Unauthorized { .. } | Self::Reentrancy => ErrorClass::Authorization,
            Self::StalePrice { .. }
            | Self::InvalidPrice { .. }
            | Self::TwapUnavailable { .. }
            | Self::OracleNotConfigured => ErrorClass::Oracle,
            Self::PeriodNotElapsed { .. }
            | Self::InsufficientTickMove { .. }
            | Self::TwapDeviationTooHigh { .. }
            | Self::PriceTooCloseToBoundary { .. } => ErrorClass::Guard,
            Self::ZeroLiquidity
            | Self::InsufficientFee { .. }
            | Self::PeerNotSet { .. }
            | Self::InvalidPeer { .. }
            | Self::NonceOutOfOrder { .. }
            | Self::MessageDecode { .. }
            | Self::UnknownRequest { .. }
            | Self::GaugeNotConfigured { .. }
            | Self::EmptyJackpot { .. } => ErrorClass::BestEffort,
            Self::SlippageExceeded { .. } | Self::LossExceeded { .. } => {
                ErrorClass::EconomicProtection
            }
            Self::VaultShutdown
            | Self::Paused
            | Self::InvalidStateTransition
            | Self::OperationNotFound { .. }
            | Self::OperationNotReady { .. }
            | Self::OperationAlreadyExecuted { .. }
            | Self::InvariantViolated { .. } => ErrorClass::State,
            Self::Overflow | Self::Underflow | Self::DivisionByZero => ErrorClass::Math,
        }
    }

    /// Returns true if retrying later (unchanged) may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::StalePrice { .. } => true,        // Wait for a fresh round
            Self::TwapUnavailable { .. } => true,   // Wait for observations
            Self::OperationNotReady { .. } => true, // Wait for the delay
            Self::InsufficientFee { .. } => true,   // Top up native balance
            _ => self.class() == ErrorClass::Guard,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_error_codes_unique() {
        let errors = [
            VaultError::ZeroAmount,
            VaultError::StalePrice { updated_at: 0, now: 1, round_id: 1, answered_in_round: 1 },
            VaultError::PeriodNotElapsed { next_allowed: 10, now: 5 },
            VaultError::LossExceeded { loss_bps: 200, max_loss_bps: 100 },
            VaultError::SlippageExceeded { min_out: 2, actual: 1 },
            VaultError::Overflow,
        ];

        let codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        let unique: BTreeSet<_> = codes.iter().collect();
        assert_eq!(codes.len(), unique.len(), "Error codes must be unique");
    }

    #[test]
    fn test_error_classes() {
        assert_eq!(
            VaultError::InsufficientTickMove { moved: 5, min_move: 10 }.class(),
            ErrorClass::Guard
        );
        assert_eq!(
            VaultError::LossExceeded { loss_bps: 200, max_loss_bps: 100 }.class(),
            ErrorClass::EconomicProtection
        );
        assert_eq!(
            VaultError::InvalidPrice { answer: -1, reason: PriceErrorReason::NonPositive }.class(),
            ErrorClass::Oracle
        );
        assert_eq!(VaultError::ZeroLiquidity.class(), ErrorClass::BestEffort);
    }

    #[test]
    fn test_guard_errors_are_recoverable() {
        assert!(VaultError::TwapDeviationTooHigh { deviation: 200, max_deviation: 100 }.is_recoverable());
        assert!(VaultError::StalePrice { updated_at: 0, now: 1, round_id: 2, answered_in_round: 1 }.is_recoverable());
        assert!(!VaultError::ZeroAmount.is_recoverable());
        assert!(!VaultError::LossExceeded { loss_bps: 200, max_loss_bps: 100 }.is_recoverable());
    }
}
