//! Cross-Chain Messaging
//!
//! A LayerZero-style endpoint model. The transport itself is a black box
//! that delivers each `(src_eid, sender, nonce)` at most once and in order
//! per path; `Endpoint::accept_inbound` enforces exactly that, so replays
//! are rejected before an application handler runs.
//!
//! Outbound packets accumulate in the endpoint's outbox. A simulation
//! harness drains the outbox and hands each packet to the receiving
//! application's `lz_receive`.

use std::collections::BTreeMap;

use alloy_primitives::keccak256;
use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::constants::messaging::{DEFAULT_BASE_FEE, DEFAULT_PER_BYTE_FEE};
use crate::errors::{VaultError, VaultResult};
use crate::types::{Bytes32, Eid};

/// Source coordinates of an inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Origin {
    pub src_eid: Eid,
    pub sender: Bytes32,
    pub nonce: u64,
}

/// Native fee for one message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct MessagingFee {
    pub native_fee: u128,
}

/// Proof of an accepted send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct MessagingReceipt {
    pub guid: Bytes32,
    pub nonce: u64,
    pub fee: MessagingFee,
}

/// A message in flight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Packet {
    pub origin: Origin,
    pub dst_eid: Eid,
    pub receiver: Bytes32,
    pub guid: Bytes32,
    pub message: Vec<u8>,
}

/// Fee model of the simulated transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct FeeSchedule {
    pub base_fee: u128,
    pub per_byte_fee: u128,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            base_fee: DEFAULT_BASE_FEE,
            per_byte_fee: DEFAULT_PER_BYTE_FEE,
        }
    }
}

/// `keccak256(nonce ++ src_eid ++ sender ++ dst_eid ++ receiver)`, big-endian packed
pub fn compute_guid(nonce: u64, src_eid: Eid, sender: &Bytes32, dst_eid: Eid, receiver: &Bytes32) -> Bytes32 {
    let mut packed = Vec::with_capacity(8 + 4 + 32 + 4 + 32);
    packed.extend_from_slice(&nonce.to_be_bytes());
    packed.extend_from_slice(&src_eid.to_be_bytes());
    packed.extend_from_slice(sender);
    packed.extend_from_slice(&dst_eid.to_be_bytes());
    packed.extend_from_slice(receiver);
    keccak256(&packed).0
}

/// One chain's messaging endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Endpoint {
    pub eid: Eid,
    pub fees: FeeSchedule,
    outbound_nonces: BTreeMap<(Eid, Bytes32, Bytes32), u64>,
    inbound_nonces: BTreeMap<(Eid, Bytes32), u64>,
    outbox: Vec<Packet>,
}

impl Endpoint {
    pub fn new(eid: Eid) -> Self {
        Self::with_fees(eid, FeeSchedule::default())
    }

    pub fn with_fees(eid: Eid, fees: FeeSchedule) -> Self {
        Self {
            eid,
            fees,
            outbound_nonces: BTreeMap::new(),
            inbound_nonces: BTreeMap::new(),
            outbox: Vec::new(),
        }
    }

    /// Fee for a message of `message_len` bytes
    pub fn quote(&self, message_len: usize) -> MessagingFee {
        let per_byte = self.fees.per_byte_fee.saturating_mul(message_len as u128);
        MessagingFee { native_fee: self.fees.base_fee.saturating_add(per_byte) }
    }

    /// Accept a paid message for delivery
    ///
    /// # Errors
    /// * `InsufficientFee` if `native_fee_paid` is below the quote
    pub fn send(
        &mut self,
        sender: Bytes32,
        dst_eid: Eid,
        receiver: Bytes32,
        message: Vec<u8>,
        native_fee_paid: u128,
    ) -> VaultResult<MessagingReceipt> {
        let fee = self.quote(message.len());
        if native_fee_paid < fee.native_fee {
            return Err(VaultError::InsufficientFee {
                required: fee.native_fee,
                available: native_fee_paid,
            });
        }

        let nonce_slot = self.outbound_nonces.entry((dst_eid, sender, receiver)).or_insert(0);
        *nonce_slot += 1;
        let nonce = *nonce_slot;
        let guid = compute_guid(nonce, self.eid, &sender, dst_eid, &receiver);

        self.outbox.push(Packet {
            origin: Origin { src_eid: self.eid, sender, nonce },
            dst_eid,
            receiver,
            guid,
            message,
        });
        Ok(MessagingReceipt { guid, nonce, fee })
    }

    /// Transport-level delivery check: next nonce on the path, exactly once
    pub fn accept_inbound(&mut self, origin: &Origin) -> VaultResult<()> {
        let last = self.inbound_nonce(origin.src_eid, &origin.sender);
        let expected = last + 1;
        if origin.nonce != expected {
            return Err(VaultError::NonceOutOfOrder { expected, received: origin.nonce });
        }
        self.inbound_nonces.insert((origin.src_eid, origin.sender), origin.nonce);
        Ok(())
    }

    /// Last delivered nonce on a path
    pub fn inbound_nonce(&self, src_eid: Eid, sender: &Bytes32) -> u64 {
        self.inbound_nonces.get(&(src_eid, *sender)).copied().unwrap_or(0)
    }

    /// Packets sent and not yet drained
    pub fn outbox(&self) -> &[Packet] {
        &self.outbox
    }

    /// Drain all outbound packets
    pub fn take_outbox(&mut self) -> Vec<Packet> {
        std::mem::take(&mut self.outbox)
    }
}

/// Trusted remote applications by endpoint id
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct PeerBook {
    peers: BTreeMap<Eid, Bytes32>,
}

impl PeerBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or clear (zero word) the peer for `eid`
    pub fn set_peer(&mut self, eid: Eid, peer: Bytes32) {
        if peer == [0u8; 32] {
            self.peers.remove(&eid);
        } else {
            self.peers.insert(eid, peer);
        }
    }

    /// Peer for `eid`, failing with `PeerNotSet`
    pub fn peer(&self, eid: Eid) -> VaultResult<Bytes32> {
        self.peers.get(&eid).copied().ok_or(VaultError::PeerNotSet { eid })
    }

    /// Fails with `InvalidPeer` unless the origin's sender is the trusted peer
    pub fn check_origin(&self, origin: &Origin) -> VaultResult<()> {
        match self.peers.get(&origin.src_eid) {
            Some(peer) if *peer == origin.sender => Ok(()),
            _ => Err(VaultError::InvalidPeer { eid: origin.src_eid, sender: origin.sender }),
        }
    }

    /// All configured endpoint ids
    pub fn eids(&self) -> Vec<Eid> {
        self.peers.keys().copied().collect()
    }
}
