//! Creator Vault Wrapper
//!
//! Locks vault shares and mints wrapped shares (the [`ShareOft`] token)
//! one for one, less an optional fee taken in vault shares.
//!
//! ## Accounting
//!
//! - `total_locked`: vault shares the wrapper holds
//! - `total_minted`: wrapped shares outstanding on every chain
//!
//! Fees are moved to the fee recipient before locking, so the two counters
//! move together and `verify()` checks them against the wrapper's actual
//! vault-share balance.
//!
//! ## Atomicity
//!
//! `deposit` and `withdraw` touch the vault and the wrapper in one call.
//! Both are worked on drafts and committed together, so a slippage failure
//! after the vault deposit leaves neither changed.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

pub mod share_oft;

use creator_vault::CreatorVault;
use creator_vault_common::{
    constants::wrapper::MAX_WRAP_FEE_BPS,
    errors::{VaultError, VaultResult},
    events::{EventLog, ProtocolEvent},
    guard::{ReentrancyGuard, Transactional},
    math::{bps_of, safe_add, safe_sub},
    types::{require_nonzero, Address, TokenPair},
};

pub use share_oft::{OftReceipt, SendParam, ShareOft};

/// Fee settings of a wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct WrapperFees {
    pub wrap_fee_bps: u64,
    pub unwrap_fee_bps: u64,
    pub fee_recipient: Address,
}

impl WrapperFees {
    pub fn validate(&self) -> VaultResult<()> {
        if self.wrap_fee_bps > MAX_WRAP_FEE_BPS || self.unwrap_fee_bps > MAX_WRAP_FEE_BPS {
            return Err(VaultError::InvalidInput { param: "wrap_fee_bps", reason: "above maximum" });
        }
        if self.wrap_fee_bps + self.unwrap_fee_bps > 0 {
            require_nonzero(&self.fee_recipient, "fee_recipient")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct CreatorVaultWrapper {
    /// Holder of locked vault shares; also the token's minter
    pub address: Address,
    owner: Address,
    fees: WrapperFees,
    token: ShareOft,
    total_locked: u128,
    total_minted: u128,
    guard: ReentrancyGuard,
    pub events: EventLog,
}

impl Transactional for CreatorVaultWrapper {
    fn guard_mut(&mut self) -> &mut ReentrancyGuard {
        &mut self.guard
    }
}

impl CreatorVaultWrapper {
    /// `token` must name `address` as its minter
    pub fn new(address: Address, owner: Address, fees: WrapperFees, token: ShareOft) -> VaultResult<Self> {
        require_nonzero(&address, "address")?;
        require_nonzero(&owner, "owner")?;
        fees.validate()?;
        Ok(Self {
            address,
            owner,
            fees,
            token,
            total_locked: 0,
            total_minted: 0,
            guard: ReentrancyGuard::new(),
            events: EventLog::new(),
        })
    }

    // ============ Views ============

    pub fn total_locked(&self) -> u128 {
        self.total_locked
    }

    pub fn total_minted(&self) -> u128 {
        self.total_minted
    }

    pub fn fees(&self) -> WrapperFees {
        self.fees
    }

    pub fn token(&self) -> &ShareOft {
        &self.token
    }

    /// Cross-chain operations (peers, sends, deliveries) go through the token
    pub fn token_mut(&mut self) -> &mut ShareOft {
        &mut self.token
    }

    /// `vault_share_balance(wrapper) == total_locked == total_minted`
    pub fn verify(&self, vault: &CreatorVault) -> bool {
        vault.balance_of(&self.address) == self.total_locked && self.total_locked == self.total_minted
    }

    /// Wrapped shares minted for wrapping `shares`
    pub fn preview_wrap(&self, shares: u128) -> VaultResult<u128> {
        safe_sub(shares, bps_of(shares, self.fees.wrap_fee_bps)?)
    }

    /// Vault shares released for unwrapping `amount`
    pub fn preview_unwrap(&self, amount: u128) -> VaultResult<u128> {
        safe_sub(amount, bps_of(amount, self.fees.unwrap_fee_bps)?)
    }

    // ============ Admin ============

    pub fn set_fees(&mut self, caller: Address, fees: WrapperFees) -> VaultResult<()> {
        if caller != self.owner {
            return Err(VaultError::Unauthorized { expected: self.owner, actual: caller });
        }
        fees.validate()?;
        self.fees = fees;
        Ok(())
    }

    // ============ Internal ============

    /// Run `body` on drafts of the wrapper and the vault, committing both on success
    fn with_vault<R>(
        &mut self,
        vault: &mut CreatorVault,
        body: impl FnOnce(&mut Self, &mut CreatorVault) -> VaultResult<R>,
    ) -> VaultResult<R> {
        self.transact(|wrapper| {
            let mut draft = vault.clone();
            let result = body(wrapper, &mut draft)?;
            *vault = draft;
            Ok(result)
        })
    }

    fn lock_and_mint(&mut self, vault: &mut CreatorVault, account: Address, shares: u128, now: u64) -> VaultResult<u128> {
        if shares == 0 {
            return Err(VaultError::ZeroAmount);
        }
        let fee_shares = bps_of(shares, self.fees.wrap_fee_bps)?;
        let net = shares - fee_shares;
        if net == 0 {
            return Err(VaultError::ZeroAmount);
        }

        if fee_shares > 0 {
            vault.transfer_shares(account, account, self.fees.fee_recipient, fee_shares, now)?;
        }
        vault.transfer_shares(account, account, self.address, net, now)?;
        let minter = self.address;
        self.token.mint(minter, account, net)?;
        self.total_locked = safe_add(self.total_locked, net)?;
        self.total_minted = safe_add(self.total_minted, net)?;

        self.events.emit(ProtocolEvent::Wrapped {
            account,
            shares_locked: net,
            minted: net,
            fee_shares,
            timestamp: now,
        });
        Ok(net)
    }

    fn burn_and_release(&mut self, vault: &mut CreatorVault, account: Address, amount: u128, now: u64) -> VaultResult<u128> {
        if amount == 0 {
            return Err(VaultError::ZeroAmount);
        }
        let minter = self.address;
        self.token.burn(minter, account, amount)?;
        self.total_minted = safe_sub(self.total_minted, amount)?;
        self.total_locked = safe_sub(self.total_locked, amount)?;

        let fee_shares = bps_of(amount, self.fees.unwrap_fee_bps)?;
        let released = amount - fee_shares;
        if fee_shares > 0 {
            vault.transfer_shares(self.address, self.address, self.fees.fee_recipient, fee_shares, now)?;
        }
        if released > 0 {
            vault.transfer_shares(self.address, self.address, account, released, now)?;
        }

        self.events.emit(ProtocolEvent::Unwrapped {
            account,
            burned: amount,
            shares_released: released,
            fee_shares,
            timestamp: now,
        });
        Ok(released)
    }

    // ============ Entry Points ============

    /// Lock existing vault shares of `account` and mint wrapped shares
    pub fn wrap(&mut self, vault: &mut CreatorVault, account: Address, shares: u128, now: u64) -> VaultResult<u128> {
        self.with_vault(vault, |wrapper, vault| wrapper.lock_and_mint(vault, account, shares, now))
    }

    /// Burn wrapped shares of `account` and release vault shares
    pub fn unwrap(&mut self, vault: &mut CreatorVault, account: Address, amount: u128, now: u64) -> VaultResult<u128> {
        self.with_vault(vault, |wrapper, vault| wrapper.burn_and_release(vault, account, amount, now))
    }

    /// Deposit into the vault and wrap the resulting shares
    ///
    /// # Errors
    /// * any vault deposit error
    /// * `SlippageExceeded` if fewer than `min_out` wrapped shares result;
    ///   the vault deposit is rolled back with it
    pub fn deposit(
        &mut self,
        vault: &mut CreatorVault,
        account: Address,
        amounts: TokenPair,
        min_out: u128,
        now: u64,
    ) -> VaultResult<u128> {
        self.with_vault(vault, |wrapper, vault| {
            // 1. Vault deposit mints shares to the account
            let shares = vault.deposit_dual(account, amounts, now)?;

            // 2. Wrap them
            let minted = wrapper.lock_and_mint(vault, account, shares, now)?;

            // 3. Slippage check after the fact
            if minted < min_out {
                return Err(VaultError::SlippageExceeded { min_out, actual: minted });
            }
            Ok(minted)
        })
    }

    /// Unwrap and redeem from the vault in one call
    pub fn withdraw(
        &mut self,
        vault: &mut CreatorVault,
        account: Address,
        amount: u128,
        receiver: Address,
        max_loss_bps: u64,
        now: u64,
    ) -> VaultResult<TokenPair> {
        self.with_vault(vault, |wrapper, vault| {
            let shares = wrapper.burn_and_release(vault, account, amount, now)?;
            vault.withdraw_dual(account, shares, receiver, max_loss_bps, now)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use creator_vault::VaultConfig;
    use creator_vault_common::constants::precision::WAD;
    use creator_vault_common::events::EventType;
    use creator_vault_common::messaging::Endpoint;
    use creator_vault_common::oracle::{OracleConfig, PriceOracle, PriceSource, PushFeed};
    use creator_vault_common::pool::PoolState;

    const OWNER: Address = [0xA0; 20];
    const VAULT: Address = [0xBB; 20];
    const WRAPPER: Address = [0xCC; 20];
    const TOKEN: Address = [0xDD; 20];
    const FEES: Address = [0xFE; 20];
    const ALICE: Address = [0x01; 20];
    const START: u64 = 1_000_000;

    fn vault() -> CreatorVault {
        let feed = |answer| PriceSource::PushFeed { feed: PushFeed::new(8, answer, START), pegged: true };
        let oracle = PriceOracle::new(OracleConfig::default(), feed(100_000_000), feed(100_000_000)).unwrap();
        let pool = PoolState::new(0, 60, START).unwrap();
        CreatorVault::new(VAULT, VaultConfig::new(OWNER), oracle, pool, START).unwrap()
    }

    fn wrapper(fees: WrapperFees) -> CreatorVaultWrapper {
        let token = ShareOft::new(TOKEN, OWNER, Some(WRAPPER), Endpoint::new(30_184)).unwrap();
        CreatorVaultWrapper::new(WRAPPER, OWNER, fees, token).unwrap()
    }

    fn with_fee(bps: u64) -> WrapperFees {
        WrapperFees { wrap_fee_bps: bps, unwrap_fee_bps: bps, fee_recipient: FEES }
    }

    #[test]
    fn test_parity_without_fees() {
        let mut vault = vault();
        let mut wrapper = wrapper(WrapperFees::default());
        let amounts = TokenPair::new(10 * WAD, 10 * WAD);

        let minted = wrapper.deposit(&mut vault, ALICE, amounts, 0, START).unwrap();
        assert!(wrapper.verify(&vault));
        assert_eq!(wrapper.token().balance_of(&ALICE), minted);
        assert_eq!(vault.balance_of(&ALICE), 0);

        let released = wrapper.unwrap(&mut vault, ALICE, minted / 4, START).unwrap();
        assert_eq!(released, minted / 4);
        assert!(wrapper.verify(&vault));

        wrapper.wrap(&mut vault, ALICE, released, START).unwrap();
        assert!(wrapper.verify(&vault));
        assert_eq!(wrapper.total_minted(), minted);

        let out = wrapper.withdraw(&mut vault, ALICE, minted, ALICE, 0, START).unwrap();
        assert_eq!(out, amounts);
        assert!(wrapper.verify(&vault));
        assert_eq!(wrapper.total_locked(), 0);
    }

    #[test]
    fn test_fees_paid_in_vault_shares() {
        let mut vault = vault();
        let mut wrapper = wrapper(with_fee(100));
        let shares = vault.deposit_dual(ALICE, TokenPair::new(WAD, WAD), START).unwrap();

        let minted = wrapper.wrap(&mut vault, ALICE, shares, START).unwrap();
        assert_eq!(minted, shares - shares / 100);
        assert_eq!(vault.balance_of(&FEES), shares / 100);
        assert!(wrapper.verify(&vault));

        let released = wrapper.unwrap(&mut vault, ALICE, minted, START).unwrap();
        assert_eq!(released, wrapper.preview_unwrap(minted).unwrap());
        assert_eq!(vault.balance_of(&FEES), shares / 100 + (minted - released));
        assert!(wrapper.verify(&vault));
        assert_eq!(wrapper.events.count_of(EventType::Unwrapped), 1);
    }

    #[test]
    fn test_slippage_rolls_back_vault_deposit() {
        let mut vault = vault();
        let mut wrapper = wrapper(with_fee(100));
        let amounts = TokenPair::new(WAD, WAD);
        let expected = wrapper.preview_wrap(vault.preview_deposit(amounts, START).unwrap()).unwrap();

        let vault_before = vault.clone();
        let wrapper_before = wrapper.clone();
        assert_eq!(
            wrapper.deposit(&mut vault, ALICE, amounts, expected + 1, START),
            Err(VaultError::SlippageExceeded { min_out: expected + 1, actual: expected })
        );
        assert_eq!(vault, vault_before);
        assert_eq!(wrapper, wrapper_before);

        assert_eq!(wrapper.deposit(&mut vault, ALICE, amounts, expected, START), Ok(expected));
    }

    #[test]
    fn test_fee_limits() {
        let mut wrapper = wrapper(WrapperFees::default());
        assert!(wrapper.set_fees(OWNER, with_fee(MAX_WRAP_FEE_BPS + 1)).is_err());
        assert!(matches!(wrapper.set_fees(ALICE, with_fee(10)), Err(VaultError::Unauthorized { .. })));
        let no_recipient = WrapperFees { fee_recipient: [0u8; 20], ..with_fee(10) };
        assert!(matches!(wrapper.set_fees(OWNER, no_recipient), Err(VaultError::ZeroAddress { .. })));
    }

    #[test]
    fn test_wrapper_state_survives_cbor_snapshot() {
        let mut vault = vault();
        let mut wrapper = wrapper(with_fee(50));
        wrapper.deposit(&mut vault, ALICE, TokenPair::new(WAD, WAD), 0, START).unwrap();

        let mut bytes = Vec::new();
        ciborium::into_writer(&wrapper, &mut bytes).unwrap();
        let restored: CreatorVaultWrapper = ciborium::from_reader(bytes.as_slice()).unwrap();
        assert_eq!(restored, wrapper);
        assert!(restored.verify(&vault));
    }
}
