//! Protocol Events for the Creator Vault Protocol
//!
//! Events are emitted during execution and can be indexed off-chain for
//! analytics and keeper automation. Best-effort failures (skipped strategies,
//! failed payouts, failed broadcasts) are observable only here.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::types::{Address, Bytes32, Eid, StrategyType, VrfType};

/// Event types for indexing and filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum EventType {
    // Vault Events (0x01 - 0x1F)
    Deposit = 0x01,
    Withdraw = 0x02,
    Reported = 0x03,
    Tended = 0x04,
    SharesTransferred = 0x05,
    PerformanceFeeUpdated = 0x06,
    VaultShutdown = 0x07,
    EmergencyWithdrawal = 0x08,
    EmergencyRedeem = 0x09,

    // Allocator Events (0x20 - 0x3F)
    StrategyAdded = 0x20,
    StrategyRemoved = 0x21,
    StrategyWeightUpdated = 0x22,
    StrategyDeposit = 0x23,
    StrategyCallFailed = 0x24,
    OperationQueued = 0x25,
    OperationExecuted = 0x26,
    OperationCancelled = 0x27,
    LiquidityDrift = 0x28,

    // Position Events (0x40 - 0x5F)
    PositionMinted = 0x40,
    PositionBurned = 0x41,
    Rebalanced = 0x42,
    FeesCollected = 0x43,

    // Wrapper Events (0x60 - 0x7F)
    Wrapped = 0x60,
    Unwrapped = 0x61,
    OftSent = 0x62,
    OftReceived = 0x63,
    PeerSet = 0x64,

    // Lottery Events (0x80 - 0x9F)
    LotteryEntered = 0x80,
    LotteryLost = 0x81,
    JackpotPaid = 0x82,
    CrossChainPayoutFailed = 0x83,
    MultiTokenJackpotWon = 0x84,
    CrossChainBroadcastSent = 0x85,
    CrossChainBroadcastFailed = 0x86,
    HubNotified = 0x87,
    HubNotificationFailed = 0x88,
    CrossChainWinReceived = 0x89,
    JackpotFunded = 0x8A,
}

/// Main event enum containing all possible protocol events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum ProtocolEvent {
    // ============ Vault Events ============

    /// Dual-asset deposit minted shares
    Deposit {
        owner: Address,
        amount_a: u128,
        amount_b: u128,
        usd_value: u128,
        shares: u128,
        timestamp: u64,
    },

    /// Shares redeemed for both assets
    Withdraw {
        owner: Address,
        receiver: Address,
        shares: u128,
        amount_a: u128,
        amount_b: u128,
        loss_bps: u64,
        timestamp: u64,
    },

    /// Profit or loss recognized
    Reported {
        profit: u128,
        loss: u128,
        fee_shares: u128,
        locked_shares: u128,
        burned_shares: u128,
        timestamp: u64,
    },

    /// Idle funds routed to strategies
    Tended {
        deployed_a: u128,
        deployed_b: u128,
        returned_a: u128,
        returned_b: u128,
        timestamp: u64,
    },

    /// Vault shares moved between holders
    SharesTransferred {
        from: Address,
        to: Address,
        shares: u128,
        timestamp: u64,
    },

    PerformanceFeeUpdated {
        old_bps: u64,
        new_bps: u64,
        timestamp: u64,
    },

    VaultShutdown {
        by: Address,
        timestamp: u64,
    },

    /// Owner pulled all strategy funds back to idle
    EmergencyWithdrawal {
        amount_a: u128,
        amount_b: u128,
        timestamp: u64,
    },

    /// Holder redeemed pro-rata from idle balances during shutdown
    EmergencyRedeem {
        owner: Address,
        shares: u128,
        amount_a: u128,
        amount_b: u128,
        timestamp: u64,
    },

    // ============ Allocator Events ============

    StrategyAdded {
        index: u32,
        strategy_type: StrategyType,
        weight_bps: u64,
        timestamp: u64,
    },

    StrategyRemoved {
        index: u32,
        returned_a: u128,
        returned_b: u128,
        timestamp: u64,
    },

    StrategyWeightUpdated {
        index: u32,
        old_bps: u64,
        new_bps: u64,
        timestamp: u64,
    },

    /// A strategy accepted funds
    StrategyDeposit {
        index: u32,
        liquidity: u128,
        used_a: u128,
        used_b: u128,
        timestamp: u64,
    },

    /// A best-effort strategy call failed and was skipped
    StrategyCallFailed {
        index: u32,
        call: String,
        error_code: String,
        timestamp: u64,
    },

    OperationQueued {
        id: Bytes32,
        execute_after: u64,
        timestamp: u64,
    },

    OperationExecuted {
        id: Bytes32,
        timestamp: u64,
    },

    OperationCancelled {
        id: Bytes32,
        timestamp: u64,
    },

    /// Allocator-tracked liquidity differs from the strategy's own figure
    LiquidityDrift {
        index: u32,
        tracked: u128,
        reported: u128,
        timestamp: u64,
    },

    // ============ Position Events ============

    PositionMinted {
        position_id: u64,
        tick_lower: i32,
        tick_upper: i32,
        liquidity: u128,
        timestamp: u64,
    },

    PositionBurned {
        position_id: u64,
        amount_a: u128,
        amount_b: u128,
        timestamp: u64,
    },

    /// Concentrated position re-centred
    Rebalanced {
        tick: i32,
        twap_tick: i32,
        tick_lower: i32,
        tick_upper: i32,
        liquidity: u128,
        timestamp: u64,
    },

    FeesCollected {
        position_id: u64,
        amount_a: u128,
        amount_b: u128,
        timestamp: u64,
    },

    // ============ Wrapper Events ============

    Wrapped {
        account: Address,
        shares_locked: u128,
        minted: u128,
        fee_shares: u128,
        timestamp: u64,
    },

    Unwrapped {
        account: Address,
        burned: u128,
        shares_released: u128,
        fee_shares: u128,
        timestamp: u64,
    },

    OftSent {
        guid: Bytes32,
        dst_eid: Eid,
        from: Address,
        amount: u128,
        timestamp: u64,
    },

    OftReceived {
        guid: Bytes32,
        src_eid: Eid,
        to: Address,
        amount: u128,
        timestamp: u64,
    },

    PeerSet {
        eid: Eid,
        peer: Bytes32,
        timestamp: u64,
    },

    // ============ Lottery Events ============

    /// Swap entered the lottery and randomness was requested
    LotteryEntered {
        request_id: u64,
        vrf_type: VrfType,
        buyer: Address,
        creator_coin: Address,
        usd_amount_6: u64,
        win_chance_ppm: u64,
        timestamp: u64,
    },

    LotteryLost {
        request_id: u64,
        buyer: Address,
        roll: u64,
        win_chance_ppm: u64,
        timestamp: u64,
    },

    /// One vault's jackpot paid to a winner
    JackpotPaid {
        creator_coin: Address,
        winner: Address,
        shares: u128,
        timestamp: u64,
    },

    /// One vault's jackpot could not be paid and was skipped
    CrossChainPayoutFailed {
        creator_coin: Address,
        winner: Address,
        error_code: String,
        timestamp: u64,
    },

    MultiTokenJackpotWon {
        winner: Address,
        trigger_coin: Address,
        num_vaults_paid: u32,
        timestamp: u64,
    },

    CrossChainBroadcastSent {
        dst_eid: Eid,
        guid: Bytes32,
        timestamp: u64,
    },

    CrossChainBroadcastFailed {
        dst_eid: Eid,
        error_code: String,
        timestamp: u64,
    },

    HubNotified {
        hub_eid: Eid,
        guid: Bytes32,
        timestamp: u64,
    },

    HubNotificationFailed {
        creator_coin: Address,
        winner: Address,
        error_code: String,
        timestamp: u64,
    },

    CrossChainWinReceived {
        src_eid: Eid,
        creator_coin: Address,
        winner: Address,
        payout_bps: u16,
        timestamp: u64,
    },

    JackpotFunded {
        creator_coin: Address,
        shares: u128,
        timestamp: u64,
    },
}

impl ProtocolEvent {
    /// Get the event type for filtering
    pub fn event_type(&self) -> EventType {
        match self {
            Self::Deposit { .. } => EventType::Deposit,
            Self::Withdraw { .. } => EventType::Withdraw,
            Self::Reported { .. } => EventType::Reported,
            Self::Tended { .. } => EventType::Tended,
            Self::SharesTransferred { .. } => EventType::SharesTransferred,
            Self::PerformanceFeeUpdated { .. } => EventType::PerformanceFeeUpdated,
            Self::VaultShutdown { .. } => EventType::VaultShutdown,
            Self::EmergencyWithdrawal { .. } => EventType::EmergencyWithdrawal,
            Self::EmergencyRedeem { .. } => EventType::EmergencyRedeem,
            Self::StrategyAdded { .. } => EventType::StrategyAdded,
            Self::StrategyRemoved { .. } => EventType::StrategyRemoved,
            Self::StrategyWeightUpdated { .. } => EventType::StrategyWeightUpdated,
            Self::StrategyDeposit { .. } => EventType::StrategyDeposit,
            Self::StrategyCallFailed { .. } => EventType::StrategyCallFailed,
            Self::OperationQueued { .. } => EventType::OperationQueued,
            Self::OperationExecuted { .. } => EventType::OperationExecuted,
            Self::OperationCancelled { .. } => EventType::OperationCancelled,
            Self::LiquidityDrift { .. } => EventType::LiquidityDrift,
            Self::PositionMinted { .. } => EventType::PositionMinted,
            Self::PositionBurned { .. } => EventType::PositionBurned,
            Self::Rebalanced { .. } => EventType::Rebalanced,
            Self::FeesCollected { .. } => EventType::FeesCollected,
            Self::Wrapped { .. } => EventType::Wrapped,
            Self::Unwrapped { .. } => EventType::Unwrapped,
            Self::OftSent { .. } => EventType::OftSent,
            Self::OftReceived { .. } => EventType::OftReceived,
            Self::PeerSet { .. } => EventType::PeerSet,
            Self::LotteryEntered { .. } => EventType::LotteryEntered,
            Self::LotteryLost { .. } => EventType::LotteryLost,
            Self::JackpotPaid { .. } => EventType::JackpotPaid,
            Self::CrossChainPayoutFailed { .. } => EventType::CrossChainPayoutFailed,
            Self::MultiTokenJackpotWon { .. } => EventType::MultiTokenJackpotWon,
            Self::CrossChainBroadcastSent { .. } => EventType::CrossChainBroadcastSent,
            Self::CrossChainBroadcastFailed { .. } => EventType::CrossChainBroadcastFailed,
            Self::HubNotified { .. } => EventType::HubNotified,
            Self::HubNotificationFailed { .. } => EventType::HubNotificationFailed,
            Self::CrossChainWinReceived { .. } => EventType::CrossChainWinReceived,
            Self::JackpotFunded { .. } => EventType::JackpotFunded,
        }
    }

    /// Get the timestamp when the event occurred
    pub fn timestamp(&self) -> u64 {
        match self {
            Self::Deposit { timestamp, .. }
            | Self::Withdraw { timestamp, .. }
            | Self::Reported { timestamp, .. }
            | Self::Tended { timestamp, .. }
            | Self::SharesTransferred { timestamp, .. }
            | Self::PerformanceFeeUpdated { timestamp, .. }
            | Self::VaultShutdown { timestamp, .. }
            | Self::EmergencyWithdrawal { timestamp, .. }
            | Self::EmergencyRedeem { timestamp, .. }
            | Self::StrategyAdded { timestamp, .. }
            | Self::StrategyRemoved { timestamp, .. }
            | Self::StrategyWeightUpdated { timestamp, .. }
            | Self::StrategyDeposit { timestamp, .. }
            | Self::StrategyCallFailed { timestamp, .. }
            | Self::OperationQueued { timestamp, .. }
            | Self::OperationExecuted { timestamp, .. }
            | Self::OperationCancelled { timestamp, .. }
            | Self::LiquidityDrift { timestamp, .. }
            | Self::PositionMinted { timestamp, .. }
            | Self::PositionBurned { timestamp, .. }
            | Self::Rebalanced { timestamp, .. }
            | Self::FeesCollected { timestamp, .. }
            | Self::Wrapped { timestamp, .. }
            | Self::Unwrapped { timestamp, .. }
            | Self::OftSent { timestamp, .. }
            | Self::OftReceived { timestamp, .. }
            | Self::PeerSet { timestamp, .. }
            | Self::LotteryEntered { timestamp, .. }
            | Self::LotteryLost { timestamp, .. }
            | Self::JackpotPaid { timestamp, .. }
            | Self::CrossChainPayoutFailed { timestamp, .. }
            | Self::MultiTokenJackpotWon { timestamp, .. }
            | Self::CrossChainBroadcastSent { timestamp, .. }
            | Self::CrossChainBroadcastFailed { timestamp, .. }
            | Self::HubNotified { timestamp, .. }
            | Self::HubNotificationFailed { timestamp, .. }
            | Self::CrossChainWinReceived { timestamp, .. }
            | Self::JackpotFunded { timestamp, .. } => *timestamp,
        }
    }

    /// Serialize event to bytes for storage/transmission
    pub fn to_bytes(&self) -> Vec<u8> {
        borsh::to_vec(self).unwrap_or_default()
    }

    /// Deserialize event from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        borsh::from_slice(bytes).ok()
    }
}

/// Event log for collecting multiple events during execution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct EventLog {
    events: Vec<ProtocolEvent>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Emit an event (add to log)
    pub fn emit(&mut self, event: ProtocolEvent) {
        self.events.push(event);
    }

    /// Get all events
    pub fn events(&self) -> &[ProtocolEvent] {
        &self.events
    }

    /// Take ownership of all events
    pub fn into_events(self) -> Vec<ProtocolEvent> {
        self.events
    }

    /// Filter events by type
    pub fn filter_by_type(&self, event_type: EventType) -> Vec<&ProtocolEvent> {
        self.events
            .iter()
            .filter(|e| e.event_type() == event_type)
            .collect()
    }

    /// Count events of one type
    pub fn count_of(&self, event_type: EventType) -> usize {
        self.events.iter().filter(|e| e.event_type() == event_type).count()
    }

    /// Most recent event, if any
    pub fn last(&self) -> Option<&ProtocolEvent> {
        self.events.last()
    }

    /// Check if any events were emitted
    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }

    /// Get number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if no events were emitted
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Clear all events
    pub fn clear(&mut self) {
        self.events.clear();
    }
}
