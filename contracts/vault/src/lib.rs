//! Creator Vault
//!
//! Dual-asset ERC-4626-style vault for a creator coin (asset A) and its
//! paired stable (asset B). Deposits are priced in USD by the vault's
//! oracle and mint shares; idle funds are routed into AMM strategies on
//! `tend`; reported profit is skimmed for the performance fee and released
//! to holders over the unlock window.
//!
//! ## Core Operations
//!
//! - **deposit_dual**: price both assets, mint shares
//! - **withdraw_dual**: burn shares for a pro-rata slice of both assets,
//!   idle first then strategies, under a caller loss tolerance
//! - **report**: recognize profit or loss since the last report
//! - **tend**: deploy idle funds above the minimum idle buffer
//!
//! ## Emergency
//!
//! After `shutdown` every mutation is frozen except
//! `emergency_withdraw_strategies` (owner) and `emergency_redeem` (holders).
//!
//! ## Atomicity
//!
//! Every mutating entry point runs through [`Transactional::transact`]:
//! a failed call leaves no state change and no events behind.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

pub mod ledger;

#[cfg(test)]
mod integration_tests;

use creator_vault_common::{
    constants::allocator::{DEFAULT_MIN_IDLE_BPS, OPERATION_DELAY_SECS},
    constants::precision::{BPS_DENOMINATOR, WAD},
    constants::profit::{DEFAULT_PERFORMANCE_FEE_BPS, MAX_PERFORMANCE_FEE_BPS, PROFIT_MAX_UNLOCK_TIME},
    constants::shares::SEED_MULTIPLIER,
    errors::{VaultError, VaultResult},
    events::{EventLog, ProtocolEvent},
    guard::{ReentrancyGuard, Transactional},
    math::{bps_of, mul_div, mul_div_up, safe_add},
    oracle::{PriceOracle, PricePair},
    pool::PoolState,
    profit_unlock::ProfitUnlockState,
    shares::{assets_for_redeem, check_loss, shares_for_deposit},
    types::{require_nonzero, Address, Bytes32, TokenPair},
};
use creator_vault_strategies::{
    AllocationReport, AllocatorOperation, DepositReceipt, RebalanceCheck, Strategy, StrategyAllocator,
    StrategyContext,
};

pub use ledger::ShareLedger;

// ============ Configuration ============

/// Roles and tunables of one vault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct VaultConfig {
    /// Can shut down, change fees and run emergency paths
    pub owner: Address,
    /// Manages strategies, reports and tends
    pub management: Address,
    /// Receives performance-fee shares
    pub fee_recipient: Address,
    /// Share of reported profit taken as fee
    pub performance_fee_bps: u64,
    /// Length of the profit unlock window in seconds
    pub profit_max_unlock_time: u64,
    /// Share of holdings kept idle on `tend`
    pub min_idle_bps: u64,
    /// Delay on queued allocator operations
    pub operation_delay: u64,
}

impl VaultConfig {
    /// Defaults with every role held by `owner`
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            management: owner,
            fee_recipient: owner,
            performance_fee_bps: DEFAULT_PERFORMANCE_FEE_BPS,
            profit_max_unlock_time: PROFIT_MAX_UNLOCK_TIME,
            min_idle_bps: DEFAULT_MIN_IDLE_BPS,
            operation_delay: OPERATION_DELAY_SECS,
        }
    }

    pub fn validate(&self) -> VaultResult<()> {
        require_nonzero(&self.owner, "owner")?;
        require_nonzero(&self.management, "management")?;
        require_nonzero(&self.fee_recipient, "fee_recipient")?;
        if self.performance_fee_bps > MAX_PERFORMANCE_FEE_BPS {
            return Err(VaultError::InvalidInput {
                param: "performance_fee_bps",
                reason: "above maximum",
            });
        }
        if self.min_idle_bps > BPS_DENOMINATOR as u64 {
            return Err(VaultError::InvalidInput { param: "min_idle_bps", reason: "above 10000" });
        }
        if self.profit_max_unlock_time == 0 {
            return Err(VaultError::InvalidInput {
                param: "profit_max_unlock_time",
                reason: "must be positive",
            });
        }
        Ok(())
    }
}

/// What a report recognized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReportOutcome {
    /// USD gained since the last report
    pub profit: u128,
    /// USD lost since the last report
    pub loss: u128,
    /// Shares minted to the fee recipient
    pub fee_shares: u128,
    /// Shares minted to the vault and locked
    pub locked_shares: u128,
    /// Locked shares burned to absorb a loss
    pub burned_shares: u128,
    /// Unlocked profit shares burned before the report was priced
    pub released_shares: u128,
}

/// Cumulative token movements through the idle buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct TokenFlows {
    /// Taken in by deposits
    pub deposited: TokenPair,
    /// Paid out by withdrawals and emergency redemptions
    pub withdrawn: TokenPair,
    /// Sent to strategies by `tend`
    pub deployed: TokenPair,
    /// Handed back by strategies, fees included
    pub returned: TokenPair,
}

impl TokenFlows {
    /// `deposited + returned - withdrawn - deployed`, per leg
    pub fn expected_idle(&self) -> VaultResult<TokenPair> {
        self.deposited
            .checked_add(&self.returned)?
            .checked_sub(&self.withdrawn)?
            .checked_sub(&self.deployed)
    }
}

// ============ Vault ============

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct CreatorVault {
    /// The vault's own address; holds locked profit shares
    pub address: Address,
    pub config: VaultConfig,
    oracle: PriceOracle,
    pool: PoolState,
    allocator: StrategyAllocator,
    /// Asset balances not deployed to strategies
    idle: TokenPair,
    ledger: ShareLedger,
    profit: ProfitUnlockState,
    /// USD baseline for the next report (last report plus net flows)
    last_total_assets: u128,
    flows: TokenFlows,
    shutdown: bool,
    guard: ReentrancyGuard,
    pub events: EventLog,
}

impl Transactional for CreatorVault {
    fn guard_mut(&mut self) -> &mut ReentrancyGuard {
        &mut self.guard
    }
}

impl CreatorVault {
    pub fn new(
        address: Address,
        config: VaultConfig,
        oracle: PriceOracle,
        pool: PoolState,
        now: u64,
    ) -> VaultResult<Self> {
        require_nonzero(&address, "vault")?;
        config.validate()?;
        Ok(Self {
            address,
            config,
            oracle,
            pool,
            allocator: StrategyAllocator::new(config.operation_delay),
            idle: TokenPair::ZERO,
            ledger: ShareLedger::new(),
            profit: ProfitUnlockState::new(config.profit_max_unlock_time, now),
            last_total_assets: 0,
            flows: TokenFlows::default(),
            shutdown: false,
            guard: ReentrancyGuard::new(),
            events: EventLog::new(),
        })
    }

    // ============ Access Checks ============

    fn only_owner(&self, caller: &Address) -> VaultResult<()> {
        if *caller != self.config.owner {
            return Err(VaultError::Unauthorized { expected: self.config.owner, actual: *caller });
        }
        Ok(())
    }

    fn only_management(&self, caller: &Address) -> VaultResult<()> {
        if *caller != self.config.management && *caller != self.config.owner {
            return Err(VaultError::Unauthorized { expected: self.config.management, actual: *caller });
        }
        Ok(())
    }

    fn require_live(&self) -> VaultResult<()> {
        if self.shutdown {
            return Err(VaultError::VaultShutdown);
        }
        Ok(())
    }

    // ============ Views ============

    pub fn is_shutdown(&self) -> bool {
        self.shutdown
    }

    pub fn idle(&self) -> TokenPair {
        self.idle
    }

    pub fn pool(&self) -> &PoolState {
        &self.pool
    }

    pub fn oracle(&self) -> &PriceOracle {
        &self.oracle
    }

    pub fn allocator(&self) -> &StrategyAllocator {
        &self.allocator
    }

    pub fn profit_unlock(&self) -> &ProfitUnlockState {
        &self.profit
    }

    pub fn ledger(&self) -> &ShareLedger {
        &self.ledger
    }

    pub fn flows(&self) -> &TokenFlows {
        &self.flows
    }

    pub fn balance_of(&self, owner: &Address) -> u128 {
        self.ledger.balance_of(owner)
    }

    /// Raw share supply, locked profit shares included
    pub fn raw_total_supply(&self) -> u128 {
        self.ledger.total_supply()
    }

    /// Supply used by every share-price computation
    pub fn effective_total_supply(&self, now: u64) -> u128 {
        self.profit.effective_total_supply(self.ledger.total_supply(), now)
    }

    pub fn prices(&self, now: u64) -> VaultResult<PricePair> {
        self.oracle.prices(Some(&self.pool), now)
    }

    /// Idle balances plus everything deployed, at the current pool price
    pub fn total_holdings(&self) -> VaultResult<TokenPair> {
        self.idle.checked_add(&self.allocator.total_value(&self.pool)?)
    }

    /// `usd(idle) + usd(strategy values)`
    pub fn total_assets(&self, now: u64) -> VaultResult<u128> {
        self.prices(now)?.usd_value(self.total_holdings()?)
    }

    /// Shares a deposit of `amounts` would mint now
    pub fn preview_deposit(&self, amounts: TokenPair, now: u64) -> VaultResult<u128> {
        let prices = self.prices(now)?;
        let usd_value = prices.usd_value(amounts)?;
        let total_assets = prices.usd_value(self.total_holdings()?)?;
        shares_for_deposit(usd_value, self.effective_total_supply(now), total_assets)
    }

    /// Pro-rata assets `shares` would redeem for if strategies pay in full
    pub fn preview_redeem(&self, shares: u128, now: u64) -> VaultResult<TokenPair> {
        let supply = self.effective_total_supply(now);
        if shares > supply {
            return Err(VaultError::InsufficientBalance { available: supply, requested: shares });
        }
        self.total_holdings()?.pro_rata(shares, supply)
    }

    /// USD value of one whole share (1e18 units)
    pub fn price_per_share(&self, now: u64) -> VaultResult<u128> {
        let supply = self.effective_total_supply(now);
        if supply == 0 {
            return Ok(WAD / SEED_MULTIPLIER);
        }
        mul_div(self.total_assets(now)?, WAD, supply)
    }

    /// Accounting self-check used by tests and keepers
    ///
    /// # Errors
    /// * `InvariantViolated` naming the first broken invariant
    pub fn check_invariants(&self, now: u64) -> VaultResult<()> {
        if !self.ledger.is_consistent() {
            return Err(VaultError::InvariantViolated { invariant: "ledger balances sum to supply" });
        }
        // Scheduled shares, released ones awaiting their burn included
        if self.ledger.balance_of(&self.address) < self.profit.locked_shares {
            return Err(VaultError::InvariantViolated { invariant: "locked shares held by vault" });
        }
        if self.profit.still_locked(now) > self.effective_total_supply(now) {
            return Err(VaultError::InvariantViolated { invariant: "locked shares within effective supply" });
        }
        let expected_idle = self
            .flows
            .expected_idle()
            .map_err(|_| VaultError::InvariantViolated { invariant: "idle flows balance" })?;
        if expected_idle != self.idle {
            return Err(VaultError::InvariantViolated { invariant: "idle flows balance" });
        }
        Ok(())
    }

    /// Burn the profit shares the unlock schedule released since it was
    /// last settled; the effective supply already excludes them
    fn burn_released(&mut self, now: u64) -> VaultResult<u128> {
        let released = self.profit.settle(now);
        let burned = released.min(self.ledger.balance_of(&self.address));
        if burned > 0 {
            let vault_address = self.address;
            self.ledger.burn(&vault_address, burned)?;
        }
        Ok(burned)
    }

    fn require_holder(&self, owner: &Address) -> VaultResult<()> {
        if *owner == self.address {
            return Err(VaultError::InvalidInput {
                param: "owner",
                reason: "vault-held profit shares cannot leave the vault",
            });
        }
        Ok(())
    }

    // ============ Deposit / Withdraw ============

    /// Deposit both assets, minting shares to `owner`
    ///
    /// # Errors
    /// * `VaultShutdown` after shutdown
    /// * `ZeroAmount` / `ZeroAddress` for empty input
    /// * oracle errors abort the whole deposit
    /// * `InvalidAmount` if the deposit mints zero shares or exceeds the cap
    pub fn deposit_dual(&mut self, owner: Address, amounts: TokenPair, now: u64) -> VaultResult<u128> {
        self.transact(|vault| {
            // 1. Vault must be live and the input non-empty
            vault.require_live()?;
            require_nonzero(&owner, "owner")?;
            if amounts.is_zero() {
                return Err(VaultError::ZeroAmount);
            }

            // 2. Price the deposit and the vault at the same prices
            vault.burn_released(now)?;
            let prices = vault.prices(now)?;
            let usd_value = prices.usd_value(amounts)?;
            let total_assets = prices.usd_value(vault.total_holdings()?)?;

            // 3. Shares against the effective supply
            let shares = shares_for_deposit(usd_value, vault.effective_total_supply(now), total_assets)?;

            // 4. Take the assets and mint
            vault.idle = vault.idle.checked_add(&amounts)?;
            vault.flows.deposited = vault.flows.deposited.checked_add(&amounts)?;
            vault.ledger.mint(&owner, shares)?;
            vault.last_total_assets = safe_add(vault.last_total_assets, usd_value)?;

            vault.events.emit(ProtocolEvent::Deposit {
                owner,
                amount_a: amounts.a,
                amount_b: amounts.b,
                usd_value,
                shares,
                timestamp: now,
            });
            Ok(shares)
        })
    }

    /// Burn `shares` of `owner` for a pro-rata slice of both assets
    ///
    /// Idle balances pay first; any shortfall is pulled from strategies as a
    /// percentage of their liquidity. Strategies that fail to pay are
    /// skipped and the shortfall counts as loss.
    ///
    /// # Errors
    /// * `LossExceeded` if the USD value paid is more than `max_loss_bps`
    ///   below the share-ratio value
    pub fn withdraw_dual(
        &mut self,
        owner: Address,
        shares: u128,
        receiver: Address,
        max_loss_bps: u64,
        now: u64,
    ) -> VaultResult<TokenPair> {
        self.transact(|vault| {
            // 1. Validate
            vault.require_live()?;
            vault.require_holder(&owner)?;
            require_nonzero(&receiver, "receiver")?;
            if shares == 0 {
                return Err(VaultError::ZeroAmount);
            }
            let balance = vault.ledger.balance_of(&owner);
            if balance < shares {
                return Err(VaultError::InsufficientBalance { available: balance, requested: shares });
            }

            // 2. Expected value from the share ratio
            vault.burn_released(now)?;
            let prices = vault.prices(now)?;
            let supply = vault.effective_total_supply(now);
            let holdings = vault.total_holdings()?;
            let expected_usd = assets_for_redeem(shares, supply, prices.usd_value(holdings)?)?;
            let target = holdings.pro_rata(shares, supply)?;

            // 3. Pull the shortfall from strategies
            let shortfall = target.saturating_sub(&vault.idle);
            if !shortfall.is_zero() {
                let deployed = vault.allocator.total_value(&vault.pool)?;
                let pct_bps = withdrawal_pct_bps(&shortfall, &deployed)?;
                if pct_bps > 0 {
                    let mut ctx = StrategyContext { pool: &mut vault.pool, now, events: &mut vault.events };
                    let (_, returned) = vault.allocator.withdraw(&mut ctx, pct_bps)?;
                    vault.idle = vault.idle.checked_add(&returned)?;
                    vault.flows.returned = vault.flows.returned.checked_add(&returned)?;
                }
            }

            // 4. Pay what is available, then enforce the loss tolerance
            let payout = target.min(&vault.idle);
            let actual_usd = prices.usd_value(payout)?;
            let loss_bps = check_loss(expected_usd, actual_usd, max_loss_bps)?;

            vault.idle = vault.idle.checked_sub(&payout)?;
            vault.flows.withdrawn = vault.flows.withdrawn.checked_add(&payout)?;
            vault.ledger.burn(&owner, shares)?;
            vault.last_total_assets = vault.last_total_assets.saturating_sub(actual_usd);

            vault.events.emit(ProtocolEvent::Withdraw {
                owner,
                receiver,
                shares,
                amount_a: payout.a,
                amount_b: payout.b,
                loss_bps,
                timestamp: now,
            });
            Ok(payout)
        })
    }

    /// Move `caller`'s shares to `to`
    ///
    /// Transfers stay open after shutdown so wrapped positions can unwind.
    ///
    /// # Errors
    /// * `Unauthorized` unless `caller` owns the shares
    /// * `InvalidInput` for the vault's own profit shares
    pub fn transfer_shares(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        shares: u128,
        now: u64,
    ) -> VaultResult<()> {
        self.transact(|vault| {
            if caller != from {
                return Err(VaultError::Unauthorized { expected: from, actual: caller });
            }
            vault.require_holder(&from)?;
            vault.ledger.transfer(&from, &to, shares)?;
            vault.events.emit(ProtocolEvent::SharesTransferred { from, to, shares, timestamp: now });
            Ok(())
        })
    }

    // ============ Yield ============

    /// Recognize profit or loss since the last report
    ///
    /// Profit shares released since the last settlement are burned first.
    /// Profit: the performance fee is minted to the fee recipient and the
    /// rest is minted to the vault and locked, both at the pre-profit share
    /// price. Loss: up to the still-locked amount of vault-held shares is
    /// burned.
    pub fn report(&mut self, caller: Address, now: u64) -> VaultResult<ReportOutcome> {
        self.transact(|vault| {
            vault.require_live()?;
            vault.only_management(&caller)?;

            let released_shares = vault.burn_released(now)?;
            let mut outcome = ReportOutcome { released_shares, ..ReportOutcome::default() };
            let current = vault.total_assets(now)?;
            let baseline = vault.last_total_assets;
            let supply = vault.effective_total_supply(now);

            if current > baseline {
                outcome.profit = current - baseline;
                // Nothing to price against before the first deposit
                if supply > 0 && baseline > 0 {
                    let fee_usd = bps_of(outcome.profit, vault.config.performance_fee_bps)?;
                    outcome.fee_shares = mul_div(fee_usd, supply, baseline)?;
                    outcome.locked_shares = mul_div(outcome.profit - fee_usd, supply, baseline)?;

                    if outcome.fee_shares > 0 {
                        let recipient = vault.config.fee_recipient;
                        vault.ledger.mint(&recipient, outcome.fee_shares)?;
                    }
                    let vault_address = vault.address;
                    vault.ledger.mint(&vault_address, outcome.locked_shares)?;
                    vault.profit.lock_profit(outcome.locked_shares, now)?;
                }
            } else if current < baseline {
                outcome.loss = baseline - current;
                if supply > 0 {
                    let loss_shares = mul_div(outcome.loss, supply, baseline)?;
                    outcome.burned_shares = vault.profit.absorb_loss(loss_shares, now)?;
                    let vault_address = vault.address;
                    vault.ledger.burn(&vault_address, outcome.burned_shares)?;
                }
            }
            vault.last_total_assets = current;

            vault.events.emit(ProtocolEvent::Reported {
                profit: outcome.profit,
                loss: outcome.loss,
                fee_shares: outcome.fee_shares,
                locked_shares: outcome.locked_shares,
                burned_shares: outcome.burned_shares,
                timestamp: now,
            });
            Ok(outcome)
        })
    }

    /// Deploy idle funds above the minimum idle buffer into strategies
    pub fn tend(&mut self, caller: Address, now: u64) -> VaultResult<AllocationReport<DepositReceipt>> {
        self.transact(|vault| {
            vault.require_live()?;
            vault.only_management(&caller)?;

            let keep = vault.total_holdings()?.scale_bps(vault.config.min_idle_bps)?;
            let deployable = vault.idle.saturating_sub(&keep);
            if deployable.is_zero() {
                return Ok(AllocationReport::default());
            }

            let mut ctx = StrategyContext { pool: &mut vault.pool, now, events: &mut vault.events };
            let (report, remainder) = vault.allocator.deposit(&mut ctx, deployable)?;
            let deployed = deployable.checked_sub(&remainder)?;
            vault.idle = vault.idle.checked_sub(&deployed)?;
            vault.flows.deployed = vault.flows.deployed.checked_add(&deployed)?;

            vault.events.emit(ProtocolEvent::Tended {
                deployed_a: deployed.a,
                deployed_b: deployed.b,
                returned_a: remainder.a,
                returned_b: remainder.b,
                timestamp: now,
            });
            Ok(report)
        })
    }

    /// Run every strategy's own rebalance (best effort)
    pub fn rebalance(&mut self, caller: Address, now: u64) -> VaultResult<AllocationReport<()>> {
        self.transact(|vault| {
            vault.require_live()?;
            vault.only_management(&caller)?;
            let mut ctx = StrategyContext { pool: &mut vault.pool, now, events: &mut vault.events };
            Ok(vault.allocator.rebalance(&mut ctx))
        })
    }

    /// Guard dry-run for a concentrated strategy
    pub fn check_rebalance(&self, index: u32, now: u64) -> VaultResult<RebalanceCheck> {
        self.allocator.check_rebalance(index, &self.pool, now)
    }

    // ============ Strategy Management ============

    pub fn add_strategy(&mut self, caller: Address, strategy: Strategy, weight_bps: u64, now: u64) -> VaultResult<u32> {
        self.transact(|vault| {
            vault.require_live()?;
            vault.only_management(&caller)?;
            vault.allocator.add_strategy(strategy, weight_bps, now, &mut vault.events)
        })
    }

    /// Queue a weight change or a strategy removal behind the operation delay
    pub fn queue_operation(&mut self, caller: Address, operation: AllocatorOperation, now: u64) -> VaultResult<Bytes32> {
        self.transact(|vault| {
            vault.require_live()?;
            vault.only_management(&caller)?;
            vault.allocator.queue_operation(operation, now, &mut vault.events)
        })
    }

    /// Execute a queued operation once its delay has passed (anyone may call)
    ///
    /// A removal unwinds the strategy and returns its funds to idle.
    pub fn execute_operation(&mut self, id: Bytes32, now: u64) -> VaultResult<TokenPair> {
        self.transact(|vault| {
            vault.require_live()?;
            let mut ctx = StrategyContext { pool: &mut vault.pool, now, events: &mut vault.events };
            let released = vault.allocator.execute_operation(&mut ctx, &id)?;
            vault.idle = vault.idle.checked_add(&released)?;
            vault.flows.returned = vault.flows.returned.checked_add(&released)?;
            Ok(released)
        })
    }

    pub fn cancel_operation(&mut self, caller: Address, id: Bytes32, now: u64) -> VaultResult<()> {
        self.transact(|vault| {
            vault.only_management(&caller)?;
            vault.allocator.cancel_operation(&id, now, &mut vault.events)
        })
    }

    /// Compare allocator-tracked and strategy-reported liquidity
    pub fn verify_liquidity(&mut self, now: u64) -> bool {
        self.allocator.verify_liquidity(now, &mut self.events)
    }

    // ============ Admin ============

    pub fn set_performance_fee(&mut self, caller: Address, new_bps: u64, now: u64) -> VaultResult<()> {
        self.transact(|vault| {
            vault.only_owner(&caller)?;
            if new_bps > MAX_PERFORMANCE_FEE_BPS {
                return Err(VaultError::InvalidInput {
                    param: "performance_fee_bps",
                    reason: "above maximum",
                });
            }
            let old_bps = vault.config.performance_fee_bps;
            vault.config.performance_fee_bps = new_bps;
            vault.events.emit(ProtocolEvent::PerformanceFeeUpdated { old_bps, new_bps, timestamp: now });
            Ok(())
        })
    }

    pub fn set_profit_max_unlock_time(&mut self, caller: Address, seconds: u64) -> VaultResult<()> {
        self.transact(|vault| {
            vault.only_owner(&caller)?;
            if seconds == 0 {
                return Err(VaultError::InvalidInput {
                    param: "profit_max_unlock_time",
                    reason: "must be positive",
                });
            }
            vault.config.profit_max_unlock_time = seconds;
            vault.profit.set_profit_max_unlock_time(seconds);
            Ok(())
        })
    }

    /// Freeze the vault; only emergency paths remain open
    pub fn shutdown(&mut self, caller: Address, now: u64) -> VaultResult<()> {
        self.transact(|vault| {
            vault.only_owner(&caller)?;
            vault.require_live()?;
            vault.shutdown = true;
            vault.events.emit(ProtocolEvent::VaultShutdown { by: caller, timestamp: now });
            Ok(())
        })
    }

    /// Pull everything out of every strategy into idle, bypassing exit guards
    pub fn emergency_withdraw_strategies(&mut self, caller: Address, now: u64) -> VaultResult<TokenPair> {
        self.transact(|vault| {
            vault.only_owner(&caller)?;
            let mut ctx = StrategyContext { pool: &mut vault.pool, now, events: &mut vault.events };
            let (_, returned) = vault.allocator.withdraw_all(&mut ctx)?;
            vault.idle = vault.idle.checked_add(&returned)?;
            vault.flows.returned = vault.flows.returned.checked_add(&returned)?;
            vault.events.emit(ProtocolEvent::EmergencyWithdrawal {
                amount_a: returned.a,
                amount_b: returned.b,
                timestamp: now,
            });
            Ok(returned)
        })
    }

    /// Redeem pro-rata from idle balances after shutdown
    ///
    /// Needs no oracle, so it works while feeds are stale.
    pub fn emergency_redeem(&mut self, owner: Address, shares: u128, now: u64) -> VaultResult<TokenPair> {
        self.transact(|vault| {
            if !vault.shutdown {
                return Err(VaultError::InvalidStateTransition);
            }
            vault.require_holder(&owner)?;
            if shares == 0 {
                return Err(VaultError::ZeroAmount);
            }
            let balance = vault.ledger.balance_of(&owner);
            if balance < shares {
                return Err(VaultError::InsufficientBalance { available: balance, requested: shares });
            }

            vault.burn_released(now)?;
            let supply = vault.effective_total_supply(now);
            let payout = vault.idle.pro_rata(shares, supply)?;
            vault.idle = vault.idle.checked_sub(&payout)?;
            vault.flows.withdrawn = vault.flows.withdrawn.checked_add(&payout)?;
            vault.ledger.burn(&owner, shares)?;

            vault.events.emit(ProtocolEvent::EmergencyRedeem {
                owner,
                shares,
                amount_a: payout.a,
                amount_b: payout.b,
                timestamp: now,
            });
            Ok(payout)
        })
    }

    // ============ Market Simulation ============

    /// Pool access for the simulation harness (price moves, fee accrual)
    pub fn pool_mut(&mut self) -> &mut PoolState {
        &mut self.pool
    }

    /// Oracle access for the simulation harness (feed updates)
    pub fn oracle_mut(&mut self) -> &mut PriceOracle {
        &mut self.oracle
    }
}

/// Percentage of strategy liquidity to pull so both legs cover `shortfall`
fn withdrawal_pct_bps(shortfall: &TokenPair, deployed: &TokenPair) -> VaultResult<u64> {
    let leg = |short: u128, held: u128| -> VaultResult<u128> {
        if short == 0 || held == 0 {
            return Ok(0);
        }
        mul_div_up(short, BPS_DENOMINATOR, held)
    };
    let pct = leg(shortfall.a, deployed.a)?.max(leg(shortfall.b, deployed.b)?);
    Ok(pct.min(BPS_DENOMINATOR) as u64)
}
