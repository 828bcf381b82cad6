//! Cross-Chain Winner Messages
//!
//! ABI-encoded tuples, matching the EVM deployments byte for byte:
//!
//! - notify (spoke to hub): `(uint16 msgType, address creatorCoin, address winner, uint16 payoutBps)`, 128 bytes
//! - broadcast (hub to spokes): `(address creatorCoin, address winner, uint16 payoutBps)`, 96 bytes
//! - VRF request: `(address requester, uint32 numWords)`, 64 bytes
//!
//! Broadcasts carry no tag. Payloads of at least `NOTIFY_SNIFF_MIN_LEN`
//! bytes are first tried as a notify tuple; anything else is decoded as a
//! broadcast. Decoding is strict: the payload must re-encode to itself.

use alloy_primitives::Address as EvmAddress;
use alloy_sol_types::{sol_data, SolType};

use creator_vault_common::{
    constants::messaging::{MSG_TYPE_NOTIFY_HUB, NOTIFY_SNIFF_MIN_LEN},
    errors::{VaultError, VaultResult},
    types::Address,
};

type NotifyTuple = (sol_data::Uint<16>, sol_data::Address, sol_data::Address, sol_data::Uint<16>);
type BroadcastTuple = (sol_data::Address, sol_data::Address, sol_data::Uint<16>);
type VrfRequestTuple = (sol_data::Address, sol_data::Uint<32>);

/// A win travelling between chains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WinnerMessage {
    pub creator_coin: Address,
    pub winner: Address,
    pub payout_bps: u16,
}

/// A decoded inbound payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundMessage {
    /// Spoke asking the hub to settle and re-broadcast
    NotifyHub(WinnerMessage),
    /// Hub instructing a spoke to pay its local jackpots
    Broadcast(WinnerMessage),
}

fn evm(address: &Address) -> EvmAddress {
    EvmAddress::from(*address)
}

fn native(address: EvmAddress) -> Address {
    address.0 .0
}

pub fn encode_notify(message: &WinnerMessage) -> Vec<u8> {
    NotifyTuple::abi_encode_params(&(
        MSG_TYPE_NOTIFY_HUB,
        evm(&message.creator_coin),
        evm(&message.winner),
        message.payout_bps,
    ))
}

pub fn encode_broadcast(message: &WinnerMessage) -> Vec<u8> {
    BroadcastTuple::abi_encode_params(&(evm(&message.creator_coin), evm(&message.winner), message.payout_bps))
}

pub fn encode_vrf_request(requester: &Address, num_words: u32) -> Vec<u8> {
    VrfRequestTuple::abi_encode_params(&(evm(requester), num_words))
}

fn decode_notify(payload: &[u8]) -> Option<WinnerMessage> {
    let (msg_type, creator_coin, winner, payout_bps) = NotifyTuple::abi_decode_params(payload, true).ok()?;
    if msg_type != MSG_TYPE_NOTIFY_HUB {
        return None;
    }
    Some(WinnerMessage { creator_coin: native(creator_coin), winner: native(winner), payout_bps })
}

/// Classify and decode an inbound payload
///
/// # Errors
/// * `MessageDecode` if the payload is neither tuple
pub fn decode_inbound(payload: &[u8]) -> VaultResult<InboundMessage> {
    if payload.len() >= NOTIFY_SNIFF_MIN_LEN {
        if let Some(message) = decode_notify(payload) {
            return Ok(InboundMessage::NotifyHub(message));
        }
    }
    let (creator_coin, winner, payout_bps) = BroadcastTuple::abi_decode_params(payload, true)
        .map_err(|_| VaultError::MessageDecode { len: payload.len() })?;
    Ok(InboundMessage::Broadcast(WinnerMessage {
        creator_coin: native(creator_coin),
        winner: native(winner),
        payout_bps,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn win() -> WinnerMessage {
        WinnerMessage { creator_coin: [0xC0; 20], winner: [0x01; 20], payout_bps: 6_900 }
    }

    #[test]
    fn test_layouts() {
        let notify = encode_notify(&win());
        assert_eq!(notify.len(), 128);
        assert_eq!(notify[31], 1);
        assert_eq!(&notify[44..64], &[0xC0; 20]);
        assert_eq!(&notify[126..128], &6_900u16.to_be_bytes());

        let broadcast = encode_broadcast(&win());
        assert_eq!(broadcast.len(), 96);
        assert_eq!(&broadcast[12..32], &[0xC0; 20]);
        assert_eq!(&broadcast[44..64], &[0x01; 20]);

        assert_eq!(encode_vrf_request(&[0x01; 20], 1).len(), 64);
    }

    #[test]
    fn test_sniff_classifies_both_shapes() {
        assert_eq!(decode_inbound(&encode_notify(&win())), Ok(InboundMessage::NotifyHub(win())));
        assert_eq!(decode_inbound(&encode_broadcast(&win())), Ok(InboundMessage::Broadcast(win())));
    }

    #[test]
    fn test_malformed_payloads_rejected() {
        assert_eq!(decode_inbound(&[0u8; 10]), Err(VaultError::MessageDecode { len: 10 }));

        // Notify shape with an unknown type tag is not a broadcast either
        let mut bad_tag = encode_notify(&win());
        bad_tag[31] = 9;
        assert_eq!(decode_inbound(&bad_tag), Err(VaultError::MessageDecode { len: 128 }));

        // Dirty padding in an address word
        let mut dirty = encode_broadcast(&win());
        dirty[0] = 0xFF;
        assert!(decode_inbound(&dirty).is_err());
    }
}
