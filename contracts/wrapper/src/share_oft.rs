//! Share OFT
//!
//! Omnichain fungible token carrying wrapped vault shares between chains.
//! Sending burns on the source chain; delivery mints on the destination.
//! Amounts travel in shared decimals (6), so dust below `10^12` local
//! units stays with the sender.
//!
//! ## Wire Format
//!
//! `to (32 bytes) ++ amount_sd (u64, big-endian)`, packed.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use creator_vault_common::{
    constants::wrapper::{LOCAL_DECIMALS, SHARED_DECIMALS},
    errors::{AmountErrorReason, VaultError, VaultResult},
    events::{EventLog, ProtocolEvent},
    guard::{ReentrancyGuard, Transactional},
    math::{safe_add, safe_sub},
    messaging::{Endpoint, MessagingFee, MessagingReceipt, Origin, PeerBook},
    types::{address_to_bytes32, bytes32_to_address, require_nonzero, Address, Bytes32, Eid},
};

/// Length of an encoded transfer message
pub const OFT_MESSAGE_LEN: usize = 40;

/// Local units per shared-decimal unit
const DECIMAL_CONVERSION_RATE: u128 = 10u128.pow((LOCAL_DECIMALS - SHARED_DECIMALS) as u32);

/// Parameters of a cross-chain send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct SendParam {
    pub dst_eid: Eid,
    /// Recipient on the destination chain
    pub to: Bytes32,
    /// Amount in local decimals, before dust removal
    pub amount: u128,
    /// Minimum amount credited on the destination after dust removal
    pub min_amount: u128,
}

/// Accepted send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OftReceipt {
    pub messaging: MessagingReceipt,
    /// Amount burned here and minted on the destination
    pub amount_sent: u128,
}

fn remove_dust(amount: u128) -> u128 {
    amount - amount % DECIMAL_CONVERSION_RATE
}

/// Encode a transfer message
pub fn encode_transfer(to: &Bytes32, amount_ld: u128) -> VaultResult<Vec<u8>> {
    let amount_sd = u64::try_from(amount_ld / DECIMAL_CONVERSION_RATE).map_err(|_| VaultError::InvalidAmount {
        amount: amount_ld,
        reason: AmountErrorReason::TooLarge,
    })?;
    let mut message = Vec::with_capacity(OFT_MESSAGE_LEN);
    message.extend_from_slice(to);
    message.extend_from_slice(&amount_sd.to_be_bytes());
    Ok(message)
}

/// Decode a transfer message into `(recipient, amount in local decimals)`
pub fn decode_transfer(message: &[u8]) -> VaultResult<(Bytes32, u128)> {
    if message.len() != OFT_MESSAGE_LEN {
        return Err(VaultError::MessageDecode { len: message.len() });
    }
    let mut to = [0u8; 32];
    to.copy_from_slice(&message[..32]);
    let mut amount = [0u8; 8];
    amount.copy_from_slice(&message[32..]);
    let amount_ld = (u64::from_be_bytes(amount) as u128)
        .checked_mul(DECIMAL_CONVERSION_RATE)
        .ok_or(VaultError::Overflow)?;
    Ok((to, amount_ld))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ShareOft {
    /// This token's address on its chain
    pub address: Address,
    owner: Address,
    /// Only account allowed to mint and burn outside messaging (the wrapper)
    minter: Option<Address>,
    balances: BTreeMap<Address, u128>,
    total_supply: u128,
    peers: PeerBook,
    endpoint: Endpoint,
    paused: bool,
    bridged_out: u128,
    bridged_in: u128,
    guard: ReentrancyGuard,
    pub events: EventLog,
}

impl Transactional for ShareOft {
    fn guard_mut(&mut self) -> &mut ReentrancyGuard {
        &mut self.guard
    }
}

impl ShareOft {
    pub fn new(address: Address, owner: Address, minter: Option<Address>, endpoint: Endpoint) -> VaultResult<Self> {
        require_nonzero(&address, "address")?;
        require_nonzero(&owner, "owner")?;
        Ok(Self {
            address,
            owner,
            minter,
            balances: BTreeMap::new(),
            total_supply: 0,
            peers: PeerBook::new(),
            endpoint,
            paused: false,
            bridged_out: 0,
            bridged_in: 0,
            guard: ReentrancyGuard::new(),
            events: EventLog::new(),
        })
    }

    // ============ Views ============

    pub fn eid(&self) -> Eid {
        self.endpoint.eid
    }

    pub fn balance_of(&self, account: &Address) -> u128 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    /// Supply on this chain
    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Total burned here by outbound sends
    pub fn bridged_out(&self) -> u128 {
        self.bridged_out
    }

    /// Total minted here by inbound deliveries
    pub fn bridged_in(&self) -> u128 {
        self.bridged_in
    }

    pub fn peer(&self, eid: Eid) -> VaultResult<Bytes32> {
        self.peers.peer(eid)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn endpoint_mut(&mut self) -> &mut Endpoint {
        &mut self.endpoint
    }

    /// The 32-byte word other chains use to address this token
    pub fn peer_address(&self) -> Bytes32 {
        address_to_bytes32(&self.address)
    }

    // ============ Admin ============

    fn only_owner(&self, caller: &Address) -> VaultResult<()> {
        if *caller != self.owner {
            return Err(VaultError::Unauthorized { expected: self.owner, actual: *caller });
        }
        Ok(())
    }

    /// Trust `peer` as this token's counterpart on `eid` (zero word clears)
    pub fn set_peer(&mut self, caller: Address, eid: Eid, peer: Bytes32, now: u64) -> VaultResult<()> {
        self.only_owner(&caller)?;
        self.peers.set_peer(eid, peer);
        self.events.emit(ProtocolEvent::PeerSet { eid, peer, timestamp: now });
        Ok(())
    }

    /// Pause outbound sends; inbound deliveries stay open
    pub fn set_paused(&mut self, caller: Address, paused: bool) -> VaultResult<()> {
        self.only_owner(&caller)?;
        self.paused = paused;
        Ok(())
    }

    // ============ Ledger ============

    fn credit(&mut self, to: &Address, amount: u128) -> VaultResult<()> {
        require_nonzero(to, "to")?;
        self.total_supply = safe_add(self.total_supply, amount)?;
        let balance = self.balances.entry(*to).or_insert(0);
        *balance = safe_add(*balance, amount)?;
        Ok(())
    }

    fn debit(&mut self, from: &Address, amount: u128) -> VaultResult<()> {
        let available = self.balance_of(from);
        if available < amount {
            return Err(VaultError::InsufficientBalance { available, requested: amount });
        }
        if available == amount {
            self.balances.remove(from);
        } else {
            self.balances.insert(*from, available - amount);
        }
        self.total_supply = safe_sub(self.total_supply, amount)?;
        Ok(())
    }

    fn only_minter(&self, caller: &Address) -> VaultResult<()> {
        match self.minter {
            Some(minter) if minter == *caller => Ok(()),
            Some(minter) => Err(VaultError::Unauthorized { expected: minter, actual: *caller }),
            None => Err(VaultError::Unauthorized { expected: [0u8; 20], actual: *caller }),
        }
    }

    pub fn mint(&mut self, caller: Address, to: Address, amount: u128) -> VaultResult<()> {
        self.only_minter(&caller)?;
        self.credit(&to, amount)
    }

    pub fn burn(&mut self, caller: Address, from: Address, amount: u128) -> VaultResult<()> {
        self.only_minter(&caller)?;
        self.debit(&from, amount)
    }

    pub fn transfer(&mut self, from: Address, to: Address, amount: u128) -> VaultResult<()> {
        if amount == 0 {
            return Err(VaultError::ZeroAmount);
        }
        require_nonzero(&to, "to")?;
        self.debit(&from, amount)?;
        self.credit(&to, amount)
    }

    // ============ Cross-Chain ============

    /// Native fee for sending to `dst_eid`
    pub fn quote_send(&self, param: &SendParam) -> VaultResult<MessagingFee> {
        self.peers.peer(param.dst_eid)?;
        let message = encode_transfer(&param.to, remove_dust(param.amount))?;
        Ok(self.endpoint.quote(message.len()))
    }

    /// Burn `param.amount` (less dust) from `from` and message the peer
    ///
    /// # Errors
    /// * `Paused` while sends are paused
    /// * `PeerNotSet` without a trusted peer on the destination
    /// * `SlippageExceeded` if dust removal drops below `min_amount`
    /// * `InsufficientFee` if `native_fee` is below the quote
    pub fn send(&mut self, from: Address, param: SendParam, native_fee: u128, now: u64) -> VaultResult<OftReceipt> {
        self.transact(|oft| {
            // 1. Sends must be open and the route trusted
            if oft.paused {
                return Err(VaultError::Paused);
            }
            let peer = oft.peers.peer(param.dst_eid)?;

            // 2. Dust removal and slippage
            let amount_sent = remove_dust(param.amount);
            if amount_sent == 0 {
                return Err(VaultError::ZeroAmount);
            }
            if amount_sent < param.min_amount {
                return Err(VaultError::SlippageExceeded { min_out: param.min_amount, actual: amount_sent });
            }

            // 3. Burn, then hand the message to the endpoint
            oft.debit(&from, amount_sent)?;
            let message = encode_transfer(&param.to, amount_sent)?;
            let sender = oft.peer_address();
            let messaging = oft.endpoint.send(sender, param.dst_eid, peer, message, native_fee)?;
            oft.bridged_out = safe_add(oft.bridged_out, amount_sent)?;

            oft.events.emit(ProtocolEvent::OftSent {
                guid: messaging.guid,
                dst_eid: param.dst_eid,
                from,
                amount: amount_sent,
                timestamp: now,
            });
            Ok(OftReceipt { messaging, amount_sent })
        })
    }

    /// Deliver an inbound transfer
    ///
    /// # Errors
    /// * `InvalidPeer` unless the sender is the trusted peer for `src_eid`
    /// * `NonceOutOfOrder` on a replay or gap
    /// * `MessageDecode` for a malformed payload
    pub fn lz_receive(&mut self, origin: Origin, guid: Bytes32, message: &[u8], now: u64) -> VaultResult<u128> {
        self.transact(|oft| {
            oft.peers.check_origin(&origin)?;
            oft.endpoint.accept_inbound(&origin)?;

            let (to, amount) = decode_transfer(message)?;
            let recipient = bytes32_to_address(&to);
            oft.credit(&recipient, amount)?;
            oft.bridged_in = safe_add(oft.bridged_in, amount)?;

            oft.events.emit(ProtocolEvent::OftReceived {
                guid,
                src_eid: origin.src_eid,
                to: recipient,
                amount,
                timestamp: now,
            });
            Ok(amount)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use creator_vault_common::constants::precision::WAD;
    use creator_vault_common::events::EventType;

    const OWNER: Address = [0xA0; 20];
    const HUB_TOKEN: Address = [0x11; 20];
    const SPOKE_TOKEN: Address = [0x22; 20];
    const ALICE: Address = [0x01; 20];
    const BOB: Address = [0x02; 20];
    const HUB_EID: Eid = 30_184;
    const SPOKE_EID: Eid = 30_101;

    fn linked_pair() -> (ShareOft, ShareOft) {
        let mut hub = ShareOft::new(HUB_TOKEN, OWNER, Some(OWNER), Endpoint::new(HUB_EID)).unwrap();
        let mut spoke = ShareOft::new(SPOKE_TOKEN, OWNER, None, Endpoint::new(SPOKE_EID)).unwrap();
        hub.set_peer(OWNER, SPOKE_EID, spoke.peer_address(), 0).unwrap();
        spoke.set_peer(OWNER, HUB_EID, hub.peer_address(), 0).unwrap();
        hub.mint(OWNER, ALICE, 100 * WAD).unwrap();
        (hub, spoke)
    }

    fn deliver(from: &mut ShareOft, to: &mut ShareOft) -> Vec<VaultResult<u128>> {
        from.endpoint_mut()
            .take_outbox()
            .into_iter()
            .map(|packet| to.lz_receive(packet.origin, packet.guid, &packet.message, 10))
            .collect()
    }

    fn send_param(amount: u128) -> SendParam {
        SendParam { dst_eid: SPOKE_EID, to: address_to_bytes32(&BOB), amount, min_amount: 0 }
    }

    #[test]
    fn test_send_burns_and_receive_mints() {
        let (mut hub, mut spoke) = linked_pair();
        let param = send_param(40 * WAD + 123);
        let fee = hub.quote_send(&param).unwrap();

        let receipt = hub.send(ALICE, param, fee.native_fee, 5).unwrap();
        assert_eq!(receipt.amount_sent, 40 * WAD);
        assert_eq!(receipt.messaging.nonce, 1);
        assert_eq!(hub.balance_of(&ALICE), 60 * WAD);
        assert_eq!(hub.total_supply(), 60 * WAD);
        assert_eq!(hub.bridged_out(), 40 * WAD);

        let delivered = deliver(&mut hub, &mut spoke);
        assert_eq!(delivered, vec![Ok(40 * WAD)]);
        assert_eq!(spoke.balance_of(&BOB), 40 * WAD);
        assert_eq!(spoke.bridged_in(), 40 * WAD);
        assert_eq!(spoke.events.count_of(EventType::OftReceived), 1);
    }

    #[test]
    fn test_send_guards() {
        let (mut hub, _spoke) = linked_pair();
        let fee = hub.quote_send(&send_param(WAD)).unwrap().native_fee;

        let strict = SendParam { min_amount: WAD + 1, ..send_param(WAD + 5) };
        assert_eq!(
            hub.send(ALICE, strict, fee, 1),
            Err(VaultError::SlippageExceeded { min_out: WAD + 1, actual: WAD })
        );
        assert_eq!(hub.send(ALICE, send_param(1_000), fee, 1), Err(VaultError::ZeroAmount));
        assert!(matches!(hub.send(ALICE, send_param(WAD), 0, 1), Err(VaultError::InsufficientFee { .. })));

        let unknown = SendParam { dst_eid: 40_000, ..send_param(WAD) };
        assert_eq!(hub.send(ALICE, unknown, fee, 1), Err(VaultError::PeerNotSet { eid: 40_000 }));

        hub.set_paused(OWNER, true).unwrap();
        assert_eq!(hub.send(ALICE, send_param(WAD), fee, 1), Err(VaultError::Paused));

        // Nothing was burned by any failed send
        assert_eq!(hub.balance_of(&ALICE), 100 * WAD);
        assert!(hub.endpoint().outbox().is_empty());
    }

    #[test]
    fn test_receive_rejects_untrusted_and_replayed() {
        let (mut hub, mut spoke) = linked_pair();
        let fee = hub.quote_send(&send_param(WAD)).unwrap().native_fee;
        hub.send(ALICE, send_param(WAD), fee, 1).unwrap();
        let packet = hub.endpoint_mut().take_outbox().remove(0);

        let forged = Origin { sender: [0xEE; 32], ..packet.origin };
        assert!(matches!(
            spoke.lz_receive(forged, packet.guid, &packet.message, 2),
            Err(VaultError::InvalidPeer { .. })
        ));

        spoke.lz_receive(packet.origin, packet.guid, &packet.message, 2).unwrap();
        assert_eq!(
            spoke.lz_receive(packet.origin, packet.guid, &packet.message, 3),
            Err(VaultError::NonceOutOfOrder { expected: 2, received: 1 })
        );
        assert_eq!(spoke.balance_of(&BOB), WAD);
    }

    #[test]
    fn test_minting_is_restricted() {
        let (mut hub, mut spoke) = linked_pair();
        assert!(matches!(hub.mint(ALICE, ALICE, 1), Err(VaultError::Unauthorized { .. })));
        assert!(matches!(spoke.mint(OWNER, ALICE, 1), Err(VaultError::Unauthorized { .. })));
        assert_eq!(decode_transfer(&[0u8; 39]), Err(VaultError::MessageDecode { len: 39 }));
    }
}
