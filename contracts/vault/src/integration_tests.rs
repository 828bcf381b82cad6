//! End-to-end vault flows against the simulated pool and push feeds

use super::*;

use creator_vault_common::events::EventType;
use creator_vault_common::oracle::{OracleConfig, PriceSource, PushFeed};
use creator_vault_strategies::{ConcentratedConfig, ConcentratedStrategy, FullRangeStrategy, LiquidityStrategy};

const OWNER: Address = [0xA0; 20];
const VAULT: Address = [0xBB; 20];
const FEES: Address = [0xFE; 20];
const ALICE: Address = [0x01; 20];
const BOB: Address = [0x02; 20];
const STRANGER: Address = [0x66; 20];

const START: u64 = 1_000_000;
const ONE_DOLLAR_8DP: i128 = 100_000_000;

fn oracle(answer_a: i128, answer_b: i128) -> PriceOracle {
    PriceOracle::new(
        OracleConfig::default(),
        PriceSource::PushFeed { feed: PushFeed::new(8, answer_a, START), pegged: false },
        PriceSource::PushFeed { feed: PushFeed::new(8, answer_b, START), pegged: true },
    )
    .unwrap()
}

fn vault_priced(answer_a: i128, answer_b: i128) -> CreatorVault {
    let config = VaultConfig { fee_recipient: FEES, ..VaultConfig::new(OWNER) };
    let pool = PoolState::new(0, 60, START).unwrap();
    CreatorVault::new(VAULT, config, oracle(answer_a, answer_b), pool, START).unwrap()
}

fn dollar_vault() -> CreatorVault {
    vault_priced(ONE_DOLLAR_8DP, ONE_DOLLAR_8DP)
}

/// Push $1 answers to both feeds at `now`
fn refresh_feeds(vault: &mut CreatorVault, now: u64) {
    vault.oracle_mut().feed_a_mut().unwrap().push_answer(ONE_DOLLAR_8DP, now);
    vault.oracle_mut().feed_b_mut().unwrap().push_answer(ONE_DOLLAR_8DP, now);
}

/// Alice's 1000A + 1000B deployed to a concentrated strategy that then
/// earns `fees` in swap fees
fn earning_vault(fees: TokenPair) -> (CreatorVault, u128) {
    let mut vault = dollar_vault();
    let alice = vault.deposit_dual(ALICE, TokenPair::new(1_000 * WAD, 1_000 * WAD), START).unwrap();
    vault.add_strategy(OWNER, concentrated(), 10_000, START).unwrap();
    vault.tend(OWNER, START).unwrap();
    let id = concentrated_position_id(&vault, 0);
    vault.pool_mut().accrue_fees(id, fees).unwrap();
    (vault, alice)
}

fn concentrated() -> Strategy {
    Strategy::Concentrated(ConcentratedStrategy::new(ConcentratedConfig::default(), 60))
}

fn concentrated_position_id(vault: &CreatorVault, index: u32) -> u64 {
    vault
        .allocator()
        .slot(index)
        .unwrap()
        .strategy
        .as_concentrated()
        .unwrap()
        .position()
        .unwrap()
        .position_id
}

// ============ Share Accounting ============

#[test]
fn test_first_deposit_prices_both_assets() {
    // $0.20 creator coin, $0.9994 stable
    let mut vault = vault_priced(20_000_000, 99_940_000);
    let shares = vault
        .deposit_dual(ALICE, TokenPair::new(100 * WAD, 100 * WAD), START)
        .unwrap();

    // 119.94 USD * 80 000
    assert_eq!(shares, 119_940_000_000_000_000_000 * 80_000);
    assert_eq!(vault.balance_of(&ALICE), shares);
    assert_eq!(vault.total_assets(START).unwrap(), 119_940_000_000_000_000_000);
    assert_eq!(vault.events.count_of(EventType::Deposit), 1);
    vault.check_invariants(START).unwrap();
}

#[test]
fn test_later_deposit_is_proportional() {
    let mut vault = dollar_vault();
    let alice = vault.deposit_dual(ALICE, TokenPair::new(1_000 * WAD, 1_000 * WAD), START).unwrap();
    let bob = vault.deposit_dual(BOB, TokenPair::new(500 * WAD, 500 * WAD), START).unwrap();

    assert_eq!(bob * 2, alice);
    assert_eq!(vault.preview_deposit(TokenPair::new(WAD, WAD), START).unwrap(), alice / 1_000);
}

#[test]
fn test_deposit_rejects_bad_input_without_side_effects() {
    let mut vault = dollar_vault();
    assert_eq!(vault.deposit_dual(ALICE, TokenPair::ZERO, START), Err(VaultError::ZeroAmount));

    // Stale feed aborts the whole deposit
    let before = vault.clone();
    let later = START + OracleConfig::default().max_price_age + 1;
    let err = vault.deposit_dual(ALICE, TokenPair::new(WAD, WAD), later).unwrap_err();
    assert!(matches!(err, VaultError::StalePrice { .. }));
    assert_eq!(vault, before);
}

// ============ Withdraw ============

#[test]
fn test_withdraw_pulls_shortfall_from_strategies() {
    let mut vault = dollar_vault();
    let shares = vault.deposit_dual(ALICE, TokenPair::new(1_000 * WAD, 1_000 * WAD), START).unwrap();
    vault
        .add_strategy(OWNER, Strategy::FullRange(FullRangeStrategy::new()), 10_000, START)
        .unwrap();
    vault.tend(OWNER, START).unwrap();

    // 5% stays idle
    assert!(vault.idle().a >= 50 * WAD && vault.idle().a < 51 * WAD);

    let out = vault.withdraw_dual(ALICE, shares, ALICE, 10, START + 60).unwrap();
    assert!(1_000 * WAD - out.a <= WAD / 1_000_000);
    assert!(1_000 * WAD - out.b <= WAD / 1_000_000);
    assert_eq!(vault.balance_of(&ALICE), 0);
    assert_eq!(vault.raw_total_supply(), 0);
    vault.check_invariants(START + 60).unwrap();
}

#[test]
fn test_skipped_strategy_counts_as_loss() {
    let mut vault = dollar_vault();
    let shares = vault.deposit_dual(ALICE, TokenPair::new(1_000 * WAD, 1_000 * WAD), START).unwrap();
    vault.add_strategy(OWNER, concentrated(), 200, START).unwrap();
    vault.tend(OWNER, START).unwrap();

    // A one-second price spike right before the exit trips the TWAP guard
    let now = START + 3_600;
    vault.pool_mut().set_tick(150, now - 1).unwrap();

    let before = vault.clone();
    let err = vault.withdraw_dual(ALICE, shares, ALICE, 100, now).unwrap_err();
    match err {
        VaultError::LossExceeded { loss_bps, max_loss_bps } => {
            assert!((150..=250).contains(&loss_bps), "loss_bps = {loss_bps}");
            assert_eq!(max_loss_bps, 100);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    // Atomic: nothing moved, no events left behind
    assert_eq!(vault, before);

    // A tolerant holder exits with the idle portion only
    let out = vault.withdraw_dual(ALICE, shares, ALICE, 300, now).unwrap();
    assert!(out.a < 1_000 * WAD && out.a > 970 * WAD);
    assert_eq!(vault.events.count_of(EventType::StrategyCallFailed), 1);
    assert!(vault.allocator().slot(0).unwrap().strategy.liquidity() > 0);
}

#[test]
fn test_withdraw_more_than_balance_rejected() {
    let mut vault = dollar_vault();
    let shares = vault.deposit_dual(ALICE, TokenPair::new(WAD, WAD), START).unwrap();
    assert_eq!(
        vault.withdraw_dual(ALICE, shares + 1, ALICE, 0, START),
        Err(VaultError::InsufficientBalance { available: shares, requested: shares + 1 })
    );
    assert_eq!(
        vault.withdraw_dual(BOB, 1, BOB, 0, START),
        Err(VaultError::InsufficientBalance { available: 0, requested: 1 })
    );
}

// ============ Report / Profit Unlock ============

#[test]
fn test_report_locks_profit_and_pays_fee() {
    let mut vault = dollar_vault();
    let alice = vault.deposit_dual(ALICE, TokenPair::new(1_000 * WAD, 1_000 * WAD), START).unwrap();
    vault.add_strategy(OWNER, concentrated(), 10_000, START).unwrap();
    vault.tend(OWNER, START).unwrap();

    let id = concentrated_position_id(&vault, 0);
    vault.pool_mut().accrue_fees(id, TokenPair::new(100 * WAD, 100 * WAD)).unwrap();

    let now = START + 10;
    let outcome = vault.report(OWNER, now).unwrap();
    assert!(outcome.profit.abs_diff(200 * WAD) <= WAD / 1_000_000);
    assert_eq!(outcome.loss, 0);
    assert_eq!(vault.balance_of(&FEES), outcome.fee_shares);
    assert_eq!(vault.balance_of(&VAULT), outcome.locked_shares);
    // 10% fee, 90% locked, both at the pre-profit price
    assert!((outcome.fee_shares * 9).abs_diff(outcome.locked_shares) <= WAD);

    // Nothing has unlocked yet, so every minted share counts
    assert_eq!(outcome.released_shares, 0);
    assert_eq!(vault.raw_total_supply(), alice + outcome.fee_shares + outcome.locked_shares);
    assert_eq!(vault.effective_total_supply(now), vault.raw_total_supply());

    // Released linearly; fully released at the end of the window
    let half = now + PROFIT_MAX_UNLOCK_TIME / 2;
    let unlocked_half = vault.profit_unlock().unlocked_shares(half);
    assert!(unlocked_half.abs_diff(outcome.locked_shares / 2) <= 1);
    let end = now + PROFIT_MAX_UNLOCK_TIME;
    assert_eq!(vault.profit_unlock().unlocked_shares(end), outcome.locked_shares);
    // Released shares leave the effective supply before they are burned
    assert_eq!(vault.effective_total_supply(end), alice + outcome.fee_shares);
    vault.check_invariants(now).unwrap();
}

#[test]
fn test_report_loss_burns_locked_shares() {
    let mut vault = dollar_vault();
    vault.deposit_dual(ALICE, TokenPair::new(1_000 * WAD, 1_000 * WAD), START).unwrap();
    vault.add_strategy(OWNER, concentrated(), 10_000, START).unwrap();
    vault.tend(OWNER, START).unwrap();
    let id = concentrated_position_id(&vault, 0);
    vault.pool_mut().accrue_fees(id, TokenPair::new(100 * WAD, 100 * WAD)).unwrap();
    let profit = vault.report(OWNER, START + 10).unwrap();

    // Creator coin drops to $0.90
    let now = START + 20;
    vault.oracle_mut().feed_a_mut().unwrap().push_answer(90_000_000, now);
    let locked_before = vault.profit_unlock().still_locked(now);
    let vault_balance_before = vault.balance_of(&VAULT);

    let outcome = vault.report(OWNER, now).unwrap();
    assert_eq!(outcome.profit, 0);
    assert!(outcome.loss.abs_diff(110 * WAD) <= WAD / 1_000_000);
    assert!(outcome.burned_shares > 0);
    assert!(outcome.burned_shares <= locked_before);
    assert!(outcome.burned_shares <= profit.locked_shares);
    assert_eq!(
        vault.balance_of(&VAULT),
        vault_balance_before - outcome.released_shares - outcome.burned_shares
    );
    vault.check_invariants(now).unwrap();
}

#[test]
fn test_unlocked_profit_reaches_holders() {
    let (mut vault, alice) = earning_vault(TokenPair::new(100 * WAD, 100 * WAD));
    // First deposit price: 1 USD buys SEED_MULTIPLIER shares
    let deposit_price = WAD / SEED_MULTIPLIER;

    let now = START + 10;
    let outcome = vault.report(OWNER, now).unwrap();
    assert!(outcome.locked_shares > 0);
    // Locking happens at the pre-profit price
    let at_report = vault.price_per_share(now).unwrap();
    assert!(at_report.abs_diff(deposit_price) <= 1);

    // Price per share never falls while the profit streams out
    let mut last = at_report;
    for step in 1..=4u64 {
        let t = now + PROFIT_MAX_UNLOCK_TIME * step / 4;
        refresh_feeds(&mut vault, t);
        let price = vault.price_per_share(t).unwrap();
        assert!(price >= last, "price per share fell at step {step}: {last} -> {price}");
        last = price;
    }
    let end = now + PROFIT_MAX_UNLOCK_TIME;
    assert!(last > at_report);
    vault.check_invariants(end).unwrap();

    // Alice gets everything but the fee recipient's slice: 2200 * 100 / 101
    let payout = vault.withdraw_dual(ALICE, alice, ALICE, 10, end).unwrap();
    let expected = mul_div(2_200 * WAD, 100, 101).unwrap();
    assert!((payout.a + payout.b).abs_diff(expected) <= WAD / 1_000, "payout = {payout:?}");
    assert!(payout.a + payout.b > 2_000 * WAD + 178 * WAD);

    // Every profit share has been burned; only the fee recipient is left
    assert_eq!(vault.balance_of(&VAULT), 0);
    assert_eq!(vault.profit_unlock().locked_shares, 0);
    assert_eq!(vault.raw_total_supply(), outcome.fee_shares);
    let fee_stake = vault.preview_redeem(outcome.fee_shares, end).unwrap();
    assert!((fee_stake.a + fee_stake.b + payout.a + payout.b).abs_diff(2_200 * WAD) <= WAD / 1_000);
    vault.check_invariants(end).unwrap();
}

#[test]
fn test_partial_unlock_shares_profit_pro_rata() {
    let (mut vault, alice) = earning_vault(TokenPair::new(100 * WAD, 100 * WAD));
    let outcome = vault.report(OWNER, START + 10).unwrap();

    // Halfway through: half of the locked profit is already priced in
    let half = START + 10 + PROFIT_MAX_UNLOCK_TIME / 2;
    refresh_feeds(&mut vault, half);
    let payout = vault.withdraw_dual(ALICE, alice / 2, ALICE, 10, half).unwrap();
    assert!(vault.balance_of(&VAULT).abs_diff(outcome.locked_shares / 2) <= 1);

    // 2200 USD over alice + fee + half the lock, Alice redeeming half her stake
    let supply = alice + outcome.fee_shares + (outcome.locked_shares - outcome.locked_shares / 2);
    let expected = mul_div(2_200 * WAD, alice / 2, supply).unwrap();
    assert!((payout.a + payout.b).abs_diff(expected) <= WAD / 1_000, "payout = {payout:?}");
    assert!(payout.a + payout.b > 1_000 * WAD + 40 * WAD);
    vault.check_invariants(half).unwrap();
}

#[test]
fn test_token_flows_are_conserved() {
    let (mut vault, _) = earning_vault(TokenPair::new(30 * WAD, 10 * WAD));
    let bob = vault.deposit_dual(BOB, TokenPair::new(500 * WAD, 500 * WAD), START).unwrap();
    vault.tend(OWNER, START).unwrap();
    vault.withdraw_dual(BOB, bob, BOB, 10, START + 60).unwrap();

    // deposits - withdrawals + fees == idle + strategy value
    let flows = *vault.flows();
    assert_eq!(flows.deposited, TokenPair::new(1_500 * WAD, 1_500 * WAD));
    let expected = flows
        .deposited
        .checked_sub(&flows.withdrawn)
        .unwrap()
        .checked_add(&TokenPair::new(30 * WAD, 10 * WAD))
        .unwrap();
    let held = vault.total_holdings().unwrap();
    assert!(held.a.abs_diff(expected.a) <= WAD / 1_000_000, "held = {held:?}, expected = {expected:?}");
    assert!(held.b.abs_diff(expected.b) <= WAD / 1_000_000, "held = {held:?}, expected = {expected:?}");
    assert_eq!(flows.expected_idle().unwrap(), vault.idle());
    vault.check_invariants(START + 60).unwrap();

    // Idle that did not arrive through a tracked flow is caught
    vault.idle.a += 1;
    assert_eq!(
        vault.check_invariants(START + 60),
        Err(VaultError::InvariantViolated { invariant: "idle flows balance" })
    );
}

#[test]
fn test_report_before_any_deposit_mints_nothing() {
    let mut vault = dollar_vault();
    let outcome = vault.report(OWNER, START).unwrap();
    assert_eq!(outcome, ReportOutcome::default());
    assert_eq!(vault.events.count_of(EventType::Reported), 1);
}

#[test]
fn test_management_calls_require_role() {
    let mut vault = dollar_vault();
    assert_eq!(
        vault.tend(STRANGER, START).unwrap_err(),
        VaultError::Unauthorized { expected: OWNER, actual: STRANGER }
    );
    assert!(matches!(vault.report(STRANGER, START), Err(VaultError::Unauthorized { .. })));
    assert!(matches!(vault.shutdown(STRANGER, START), Err(VaultError::Unauthorized { .. })));
    assert!(matches!(
        vault.set_performance_fee(OWNER, MAX_PERFORMANCE_FEE_BPS + 1, START),
        Err(VaultError::InvalidInput { .. })
    ));
    vault.set_performance_fee(OWNER, 2_000, START).unwrap();
    assert_eq!(vault.config.performance_fee_bps, 2_000);
}

// ============ Tend / Strategies ============

#[test]
fn test_tend_keeps_idle_buffer() {
    let mut vault = dollar_vault();
    vault.deposit_dual(ALICE, TokenPair::new(1_000 * WAD, 1_000 * WAD), START).unwrap();
    vault
        .add_strategy(OWNER, Strategy::FullRange(FullRangeStrategy::new()), 6_000, START)
        .unwrap();

    let report = vault.tend(OWNER, START).unwrap();
    assert!(report.is_clean());
    // 950 deployable, 60% of it used, the rest returned
    assert!(vault.idle().a >= 430 * WAD && vault.idle().a <= 431 * WAD);
    assert_eq!(vault.events.count_of(EventType::Tended), 1);

    let total = vault.total_holdings().unwrap();
    assert!(1_000 * WAD - total.a <= WAD / 1_000_000);
    vault.check_invariants(START).unwrap();
}

#[test]
fn test_queued_weight_change_respects_delay() {
    let mut vault = dollar_vault();
    vault
        .add_strategy(OWNER, Strategy::FullRange(FullRangeStrategy::new()), 5_000, START)
        .unwrap();
    let id = vault
        .queue_operation(OWNER, AllocatorOperation::SetWeight { index: 0, weight_bps: 8_000 }, START)
        .unwrap();

    let ready_at = START + vault.allocator().operation_delay();
    assert_eq!(
        vault.execute_operation(id, START + 10),
        Err(VaultError::OperationNotReady { execute_after: ready_at, now: START + 10 })
    );
    vault.execute_operation(id, ready_at).unwrap();
    assert_eq!(vault.allocator().slot(0).unwrap().weight_bps, 8_000);
    assert_eq!(vault.events.count_of(EventType::OperationExecuted), 1);
}

#[test]
fn test_strategy_removal_waits_for_delay() {
    let mut vault = dollar_vault();
    vault.deposit_dual(ALICE, TokenPair::new(100 * WAD, 100 * WAD), START).unwrap();
    vault.add_strategy(OWNER, concentrated(), 10_000, START).unwrap();
    vault.tend(OWNER, START).unwrap();

    assert!(matches!(
        vault.queue_operation(STRANGER, AllocatorOperation::RemoveStrategy { index: 0 }, START),
        Err(VaultError::Unauthorized { .. })
    ));
    let id = vault
        .queue_operation(OWNER, AllocatorOperation::RemoveStrategy { index: 0 }, START)
        .unwrap();

    // Too early: the strategy keeps its funds
    let ready_at = START + vault.allocator().operation_delay();
    assert_eq!(
        vault.execute_operation(id, START + 1),
        Err(VaultError::OperationNotReady { execute_after: ready_at, now: START + 1 })
    );
    assert!(vault.allocator().slot(0).unwrap().strategy.is_active());
    assert!(vault.idle().a < 6 * WAD);

    refresh_feeds(&mut vault, ready_at);
    let returned = vault.execute_operation(id, ready_at).unwrap();
    assert!(returned.a > 94 * WAD);
    assert!(100 * WAD - vault.idle().a <= WAD / 1_000_000);
    assert!(!vault.allocator().slot(0).unwrap().strategy.is_active());
    assert!(vault.verify_liquidity(ready_at));
    vault.check_invariants(ready_at).unwrap();
}

#[test]
fn test_shutdown_blocks_queued_removal() {
    let mut vault = dollar_vault();
    vault
        .add_strategy(OWNER, Strategy::FullRange(FullRangeStrategy::new()), 5_000, START)
        .unwrap();
    let id = vault
        .queue_operation(OWNER, AllocatorOperation::RemoveStrategy { index: 0 }, START)
        .unwrap();
    vault.shutdown(OWNER, START + 1).unwrap();

    let ready_at = START + vault.allocator().operation_delay();
    assert_eq!(vault.execute_operation(id, ready_at), Err(VaultError::VaultShutdown));
    assert_eq!(
        vault.queue_operation(OWNER, AllocatorOperation::SetWeight { index: 0, weight_bps: 1 }, START + 2),
        Err(VaultError::VaultShutdown)
    );
}

// ============ Share Transfers ============

#[test]
fn test_transfer_requires_owner() {
    let mut vault = dollar_vault();
    let alice = vault.deposit_dual(ALICE, TokenPair::new(WAD, WAD), START).unwrap();

    let before = vault.clone();
    assert_eq!(
        vault.transfer_shares(STRANGER, ALICE, STRANGER, alice, START),
        Err(VaultError::Unauthorized { expected: ALICE, actual: STRANGER })
    );
    assert_eq!(vault, before);

    vault.transfer_shares(ALICE, ALICE, BOB, alice / 4, START).unwrap();
    assert_eq!(vault.balance_of(&BOB), alice / 4);
    assert_eq!(vault.events.count_of(EventType::SharesTransferred), 1);
}

#[test]
fn test_vault_held_profit_shares_cannot_leave() {
    let (mut vault, _) = earning_vault(TokenPair::new(100 * WAD, 100 * WAD));
    let outcome = vault.report(OWNER, START + 10).unwrap();
    let locked = outcome.locked_shares;

    assert!(matches!(
        vault.transfer_shares(VAULT, VAULT, STRANGER, locked, START + 10),
        Err(VaultError::InvalidInput { param: "owner", .. })
    ));
    assert!(matches!(
        vault.withdraw_dual(VAULT, locked, STRANGER, 10_000, START + 10),
        Err(VaultError::InvalidInput { param: "owner", .. })
    ));
    assert_eq!(vault.balance_of(&VAULT), locked);
}

// ============ Snapshots ============

#[test]
fn test_cbor_snapshot_roundtrip() {
    let (mut vault, _) = earning_vault(TokenPair::new(100 * WAD, 100 * WAD));
    vault.report(OWNER, START + 10).unwrap();
    vault
        .queue_operation(OWNER, AllocatorOperation::SetWeight { index: 0, weight_bps: 5_000 }, START + 10)
        .unwrap();

    let mut bytes = Vec::new();
    ciborium::into_writer(&vault, &mut bytes).unwrap();
    let restored: CreatorVault = ciborium::from_reader(bytes.as_slice()).unwrap();

    assert_eq!(restored, vault);
    let later = START + 100;
    assert_eq!(restored.price_per_share(later).unwrap(), vault.price_per_share(later).unwrap());
    assert_eq!(restored.profit_unlock().still_locked(later), vault.profit_unlock().still_locked(later));
    restored.check_invariants(later).unwrap();
}

// ============ Shutdown ============

#[test]
fn test_shutdown_freezes_all_but_emergency_paths() {
    let mut vault = dollar_vault();
    let alice = vault.deposit_dual(ALICE, TokenPair::new(1_000 * WAD, 1_000 * WAD), START).unwrap();
    let bob = vault.deposit_dual(BOB, TokenPair::new(1_000 * WAD, 1_000 * WAD), START).unwrap();
    vault
        .add_strategy(OWNER, Strategy::FullRange(FullRangeStrategy::new()), 10_000, START)
        .unwrap();
    vault.tend(OWNER, START).unwrap();

    assert_eq!(vault.emergency_redeem(ALICE, alice, START), Err(VaultError::InvalidStateTransition));
    vault.shutdown(OWNER, START + 1).unwrap();
    assert!(vault.is_shutdown());

    assert_eq!(
        vault.deposit_dual(ALICE, TokenPair::new(WAD, WAD), START + 2),
        Err(VaultError::VaultShutdown)
    );
    assert_eq!(vault.withdraw_dual(ALICE, alice, ALICE, 10_000, START + 2), Err(VaultError::VaultShutdown));
    assert!(matches!(vault.tend(OWNER, START + 2), Err(VaultError::VaultShutdown)));

    vault.emergency_withdraw_strategies(OWNER, START + 2).unwrap();
    assert_eq!(vault.allocator().total_value(vault.pool()).unwrap(), TokenPair::ZERO);

    // Works without a fresh oracle answer
    let much_later = START + 10 * OracleConfig::default().max_price_age;
    let out = vault.emergency_redeem(ALICE, alice, much_later).unwrap();
    assert!(1_000 * WAD - out.a <= WAD / 1_000_000);

    // Transfers stay open
    vault.transfer_shares(BOB, BOB, ALICE, bob / 2, much_later).unwrap();
    let last = vault.emergency_redeem(ALICE, bob / 2, much_later).unwrap();
    assert!(last.a > 499 * WAD);
    assert_eq!(vault.events.count_of(EventType::EmergencyRedeem), 2);
}
