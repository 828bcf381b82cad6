//! Strategy Allocator
//!
//! Splits vault funds across weighted strategies. Every per-strategy call
//! is best effort: the call runs against a draft of the strategy and the
//! pool, a failure discards the draft and is recorded as a
//! `StrategyCallFailed` event plus an `Err` entry in the returned
//! [`AllocationReport`], and the loop moves on.
//!
//! Weight changes and removals can also be scheduled through a delayed
//! operation queue.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use creator_vault_common::{
    constants::allocator::{MAX_STRATEGIES, MAX_TOTAL_WEIGHT_BPS, OPERATION_DELAY_SECS},
    constants::precision::BPS_DENOMINATOR,
    errors::{VaultError, VaultResult},
    events::{EventLog, ProtocolEvent},
    math::mul_div,
    pool::PoolState,
    scheduler::{OperationQueue, ScheduledOperation},
    types::{Bytes32, TokenPair},
};

use crate::concentrated::RebalanceCheck;
use crate::strategy::{DepositReceipt, LiquidityStrategy, Strategy, StrategyContext};

// ============ Types ============

/// A strategy with its allocation weight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct StrategySlot {
    pub strategy: Strategy,
    pub weight_bps: u64,
    /// Liquidity the allocator believes the strategy holds
    pub tracked_liquidity: u128,
}

/// Admin operations that can be queued behind the operation delay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum AllocatorOperation {
    SetWeight { index: u32, weight_bps: u64 },
    RemoveStrategy { index: u32 },
}

/// Per-strategy outcomes of a best-effort call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationReport<T> {
    pub entries: Vec<(u32, VaultResult<T>)>,
}

impl<T> Default for AllocationReport<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<T> AllocationReport<T> {
    pub fn succeeded(&self) -> usize {
        self.entries.iter().filter(|(_, r)| r.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.entries.iter().filter(|(_, r)| r.is_err()).count()
    }

    /// Every attempted call succeeded
    pub fn is_clean(&self) -> bool {
        self.failed() == 0
    }

    /// Error for a strategy index, if its call failed
    pub fn error_for(&self, index: u32) -> Option<&VaultError> {
        self.entries
            .iter()
            .find(|(i, _)| *i == index)
            .and_then(|(_, r)| r.as_ref().err())
    }
}

// ============ Allocator ============

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct StrategyAllocator {
    slots: Vec<StrategySlot>,
    queue: OperationQueue<AllocatorOperation>,
}

impl Default for StrategyAllocator {
    fn default() -> Self {
        Self::new(OPERATION_DELAY_SECS)
    }
}

impl StrategyAllocator {
    pub fn new(operation_delay: u64) -> Self {
        Self { slots: Vec::new(), queue: OperationQueue::new(operation_delay) }
    }

    pub fn slots(&self) -> &[StrategySlot] {
        &self.slots
    }

    pub fn slot(&self, index: u32) -> VaultResult<&StrategySlot> {
        self.slots
            .get(index as usize)
            .ok_or(VaultError::StrategyNotFound { index: index as usize })
    }

    fn active_slot_mut(&mut self, index: u32) -> VaultResult<&mut StrategySlot> {
        let slot = self
            .slots
            .get_mut(index as usize)
            .ok_or(VaultError::StrategyNotFound { index: index as usize })?;
        if !slot.strategy.is_active() {
            return Err(VaultError::StrategyInactive { index: index as usize });
        }
        Ok(slot)
    }

    pub fn strategy_count(&self) -> usize {
        self.slots.len()
    }

    /// Sum of active strategy weights
    pub fn total_weight_bps(&self) -> u64 {
        self.slots
            .iter()
            .filter(|s| s.strategy.is_active())
            .map(|s| s.weight_bps)
            .sum()
    }

    pub fn operation_delay(&self) -> u64 {
        self.queue.delay
    }

    // ============ Registration ============

    /// Register a strategy, returning its index
    ///
    /// # Errors
    /// * `TooManyStrategies` at capacity
    /// * `StrategyNotInitialized` if the strategy cannot accept funds
    /// * `InvalidWeight` for a zero weight or a total above 10 000 bps
    pub fn add_strategy(
        &mut self,
        strategy: Strategy,
        weight_bps: u64,
        now: u64,
        events: &mut EventLog,
    ) -> VaultResult<u32> {
        if self.slots.len() >= MAX_STRATEGIES {
            return Err(VaultError::TooManyStrategies { max: MAX_STRATEGIES });
        }
        if !strategy.is_initialized() {
            return Err(VaultError::StrategyNotInitialized);
        }
        let total_after = self.total_weight_bps().saturating_add(weight_bps);
        if weight_bps == 0 || total_after > MAX_TOTAL_WEIGHT_BPS {
            return Err(VaultError::InvalidWeight { weight_bps, total_after });
        }

        let index = self.slots.len() as u32;
        let strategy_type = strategy.strategy_type();
        self.slots.push(StrategySlot { strategy, weight_bps, tracked_liquidity: 0 });
        events.emit(ProtocolEvent::StrategyAdded { index, strategy_type, weight_bps, timestamp: now });
        Ok(index)
    }

    /// Change an active strategy's weight (zero pauses new deposits)
    pub fn set_weight(&mut self, index: u32, weight_bps: u64, now: u64, events: &mut EventLog) -> VaultResult<()> {
        let others = self.total_weight_bps() - self.active_slot_mut(index)?.weight_bps;
        let total_after = others.saturating_add(weight_bps);
        if total_after > MAX_TOTAL_WEIGHT_BPS {
            return Err(VaultError::InvalidWeight { weight_bps, total_after });
        }
        let slot = self.active_slot_mut(index)?;
        let old_bps = slot.weight_bps;
        slot.weight_bps = weight_bps;
        events.emit(ProtocolEvent::StrategyWeightUpdated { index, old_bps, new_bps: weight_bps, timestamp: now });
        Ok(())
    }

    /// Unwind a strategy completely and deactivate it
    ///
    /// The slot is kept so indices stay stable. Returns the released tokens.
    pub fn remove_strategy(&mut self, ctx: &mut StrategyContext<'_>, index: u32) -> VaultResult<TokenPair> {
        let slot = self.active_slot_mut(index)?;
        let returned = slot.strategy.withdraw_all(ctx)?;
        slot.strategy.set_active(false);
        slot.weight_bps = 0;
        slot.tracked_liquidity = 0;
        ctx.events.emit(ProtocolEvent::StrategyRemoved {
            index,
            returned_a: returned.a,
            returned_b: returned.b,
            timestamp: ctx.now,
        });
        Ok(returned)
    }

    // ============ Best-Effort Calls ============

    /// Run `call` against drafts of one strategy and the pool, committing
    /// both (and the call's events) only on success
    fn isolated<R>(
        strategy: &mut Strategy,
        ctx: &mut StrategyContext<'_>,
        call: impl FnOnce(&mut Strategy, &mut StrategyContext<'_>) -> VaultResult<R>,
    ) -> VaultResult<R> {
        let mut draft_strategy = strategy.clone();
        let mut draft_pool = ctx.pool.clone();
        let mut scratch = EventLog::new();
        let result = {
            let mut sub = StrategyContext { pool: &mut draft_pool, now: ctx.now, events: &mut scratch };
            call(&mut draft_strategy, &mut sub)
        };
        if result.is_ok() {
            *strategy = draft_strategy;
            *ctx.pool = draft_pool;
            for event in scratch.into_events() {
                ctx.events.emit(event);
            }
        }
        result
    }

    fn record_failure(events: &mut EventLog, index: u32, call: &str, error: &VaultError, now: u64) {
        events.emit(ProtocolEvent::StrategyCallFailed {
            index,
            call: call.to_string(),
            error_code: error.code().to_string(),
            timestamp: now,
        });
    }

    /// Deposit `amounts * weight / 10 000` into each active strategy
    ///
    /// Returns the per-strategy report and the unconsumed remainder.
    pub fn deposit(
        &mut self,
        ctx: &mut StrategyContext<'_>,
        amounts: TokenPair,
    ) -> VaultResult<(AllocationReport<DepositReceipt>, TokenPair)> {
        let mut report = AllocationReport::default();
        let mut used = TokenPair::ZERO;

        for (i, slot) in self.slots.iter_mut().enumerate() {
            let index = i as u32;
            if !slot.strategy.is_active() || slot.weight_bps == 0 {
                continue;
            }
            let share = amounts.scale_bps(slot.weight_bps)?;
            if share.is_zero() {
                continue;
            }

            match Self::isolated(&mut slot.strategy, ctx, |s, c| s.deposit(c, share)) {
                Ok(receipt) => {
                    slot.tracked_liquidity = slot.tracked_liquidity.saturating_add(receipt.liquidity);
                    used = used.checked_add(&receipt.used)?;
                    ctx.events.emit(ProtocolEvent::StrategyDeposit {
                        index,
                        liquidity: receipt.liquidity,
                        used_a: receipt.used.a,
                        used_b: receipt.used.b,
                        timestamp: ctx.now,
                    });
                    report.entries.push((index, Ok(receipt)));
                }
                Err(e) => {
                    Self::record_failure(ctx.events, index, "deposit", &e, ctx.now);
                    report.entries.push((index, Err(e)));
                }
            }
        }

        let remainder = amounts.checked_sub(&used)?;
        Ok((report, remainder))
    }

    /// Withdraw `pct_bps / 10 000` of every active strategy's liquidity
    ///
    /// Goes through each strategy's guarded `withdraw`, so a strategy whose
    /// exit guard trips is skipped. The summed amounts actually returned
    /// are authoritative.
    pub fn withdraw(
        &mut self,
        ctx: &mut StrategyContext<'_>,
        pct_bps: u64,
    ) -> VaultResult<(AllocationReport<TokenPair>, TokenPair)> {
        if pct_bps == 0 || pct_bps > BPS_DENOMINATOR as u64 {
            return Err(VaultError::InvalidInput { param: "pct_bps", reason: "must be in 1..=10000" });
        }
        let mut report = AllocationReport::default();
        let mut total = TokenPair::ZERO;

        for (i, slot) in self.slots.iter_mut().enumerate() {
            let index = i as u32;
            if !slot.strategy.is_active() {
                continue;
            }
            let liquidity = mul_div(slot.strategy.liquidity(), pct_bps as u128, BPS_DENOMINATOR)?;
            if liquidity == 0 {
                continue;
            }

            match Self::isolated(&mut slot.strategy, ctx, |s, c| s.withdraw(c, liquidity)) {
                Ok(returned) => {
                    slot.tracked_liquidity = slot.tracked_liquidity.saturating_sub(liquidity);
                    total = total.checked_add(&returned)?;
                    report.entries.push((index, Ok(returned)));
                }
                Err(e) => {
                    Self::record_failure(ctx.events, index, "withdraw", &e, ctx.now);
                    report.entries.push((index, Err(e)));
                }
            }
        }
        Ok((report, total))
    }

    /// Unwind every active strategy completely, bypassing exit guards
    ///
    /// Idle balances and uncollected fees held by strategies are swept too.
    pub fn withdraw_all(&mut self, ctx: &mut StrategyContext<'_>) -> VaultResult<(AllocationReport<TokenPair>, TokenPair)> {
        let mut report = AllocationReport::default();
        let mut total = TokenPair::ZERO;

        for (i, slot) in self.slots.iter_mut().enumerate() {
            let index = i as u32;
            if !slot.strategy.is_active() {
                continue;
            }
            match Self::isolated(&mut slot.strategy, ctx, |s, c| s.withdraw_all(c)) {
                Ok(returned) => {
                    slot.tracked_liquidity = 0;
                    total = total.checked_add(&returned)?;
                    report.entries.push((index, Ok(returned)));
                }
                Err(e) => {
                    Self::record_failure(ctx.events, index, "withdraw_all", &e, ctx.now);
                    report.entries.push((index, Err(e)));
                }
            }
        }
        Ok((report, total))
    }

    /// Delegate to each active strategy's own rebalance
    ///
    /// Weights are not re-applied across strategies here. A rebalance
    /// re-mints positions, so tracked liquidity is resynced afterwards.
    pub fn rebalance(&mut self, ctx: &mut StrategyContext<'_>) -> AllocationReport<()> {
        let mut report = AllocationReport::default();
        for (i, slot) in self.slots.iter_mut().enumerate() {
            let index = i as u32;
            if !slot.strategy.is_active() {
                continue;
            }
            match Self::isolated(&mut slot.strategy, ctx, |s, c| s.rebalance(c)) {
                Ok(()) => report.entries.push((index, Ok(()))),
                Err(e) => {
                    Self::record_failure(ctx.events, index, "rebalance", &e, ctx.now);
                    report.entries.push((index, Err(e)));
                }
            }
        }
        self.sync_liquidity();
        report
    }

    /// Guard dry-run for a concentrated strategy
    pub fn check_rebalance(&self, index: u32, pool: &PoolState, now: u64) -> VaultResult<RebalanceCheck> {
        let slot = self.slot(index)?;
        let concentrated = slot.strategy.as_concentrated().ok_or(VaultError::InvalidInput {
            param: "index",
            reason: "not a concentrated strategy",
        })?;
        concentrated.check_rebalance(pool, now)
    }

    // ============ Views ============

    /// Summed value of all strategies at the current pool price
    pub fn total_value(&self, pool: &PoolState) -> VaultResult<TokenPair> {
        self.slots.iter().try_fold(TokenPair::ZERO, |acc, slot| {
            acc.checked_add(&slot.strategy.total_value(pool)?)
        })
    }

    /// Compare tracked and reported liquidity, emitting `LiquidityDrift`
    /// for each mismatch. Returns true when everything matches.
    pub fn verify_liquidity(&self, now: u64, events: &mut EventLog) -> bool {
        let mut consistent = true;
        for (i, slot) in self.slots.iter().enumerate() {
            let reported = slot.strategy.liquidity();
            if reported != slot.tracked_liquidity {
                consistent = false;
                events.emit(ProtocolEvent::LiquidityDrift {
                    index: i as u32,
                    tracked: slot.tracked_liquidity,
                    reported,
                    timestamp: now,
                });
            }
        }
        consistent
    }

    /// Adopt each strategy's reported liquidity as the tracked figure
    pub fn sync_liquidity(&mut self) {
        for slot in &mut self.slots {
            slot.tracked_liquidity = slot.strategy.liquidity();
        }
    }

    // ============ Queued Operations ============

    /// Queue an operation to run after the operation delay
    pub fn queue_operation(
        &mut self,
        operation: AllocatorOperation,
        now: u64,
        events: &mut EventLog,
    ) -> VaultResult<Bytes32> {
        let index = match &operation {
            AllocatorOperation::SetWeight { index, .. } | AllocatorOperation::RemoveStrategy { index } => *index,
        };
        self.slot(index)?;

        let id = self.queue.queue(operation, now)?;
        let execute_after = now.saturating_add(self.queue.delay);
        events.emit(ProtocolEvent::OperationQueued { id, execute_after, timestamp: now });
        Ok(id)
    }

    /// Apply a queued operation whose delay has passed
    ///
    /// Returns tokens released by a removal (zero for weight changes).
    pub fn execute_operation(&mut self, ctx: &mut StrategyContext<'_>, id: &Bytes32) -> VaultResult<TokenPair> {
        let operation = self.queue.check_ready(id, ctx.now)?.operation.clone();
        let released = match operation {
            AllocatorOperation::SetWeight { index, weight_bps } => {
                self.set_weight(index, weight_bps, ctx.now, ctx.events)?;
                TokenPair::ZERO
            }
            AllocatorOperation::RemoveStrategy { index } => self.remove_strategy(ctx, index)?,
        };
        self.queue.take_ready(id, ctx.now)?;
        ctx.events.emit(ProtocolEvent::OperationExecuted { id: *id, timestamp: ctx.now });
        Ok(released)
    }

    /// Cancel a queued operation; it can never run afterwards
    pub fn cancel_operation(&mut self, id: &Bytes32, now: u64, events: &mut EventLog) -> VaultResult<()> {
        self.queue.cancel(id)?;
        events.emit(ProtocolEvent::OperationCancelled { id: *id, timestamp: now });
        Ok(())
    }

    pub fn operation(&self, id: &Bytes32) -> Option<&ScheduledOperation<AllocatorOperation>> {
        self.queue.get(id)
    }

    pub fn pending_operations(&self, now: u64) -> Vec<&ScheduledOperation<AllocatorOperation>> {
        self.queue.pending(now).collect()
    }
}
