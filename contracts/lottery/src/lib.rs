//! Creator Lottery
//!
//! Every qualifying buy of a creator coin (or its vault shares) is an entry
//! into a jackpot draw. Randomness comes from a VRF coordinator, either on
//! this chain or across the messaging layer. Settlement is hub-and-spoke:
//!
//! - on the hub, a win pays every active vault's jackpot and is broadcast
//!   to every remote chain
//! - on a spoke, a win is forwarded to the hub, which settles and
//!   re-broadcasts; if the hub cannot be reached the local jackpot is paid
//!
//! Per-vault payouts and per-destination sends are best effort: a failure
//! is recorded as an event and the rest of the settlement carries on.

use std::collections::{BTreeMap, BTreeSet};

use creator_vault_common::{
    constants::lottery::BOOST_BASE_BPS,
    errors::{VaultError, VaultResult},
    events::{EventLog, ProtocolEvent},
    guard::{ReentrancyGuard, Transactional},
    messaging::{Endpoint, MessagingReceipt, Origin, PeerBook},
    registry::Registry,
    types::{address_to_bytes32, require_nonzero, Address, Bytes32, Eid, VrfType},
};

pub mod config;
pub mod gauge;
pub mod messages;
pub mod vrf;
pub mod win_chance;

pub use config::LotteryConfig;
pub use gauge::GaugeController;
pub use messages::{InboundMessage, WinnerMessage};
pub use vrf::{LotteryEntry, PendingRequests};

use messages::{decode_inbound, encode_broadcast, encode_notify, encode_vrf_request};
use win_chance::{apply_boosts, calculate_win_chance, is_win, roll};

/// Values a swap in USD (1e18 = $1)
pub trait PriceQuoter {
    fn usd_value(&self, token: &Address, amount: u128, now: u64) -> VaultResult<u128>;
}

/// Receipt for a swap that entered the draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LotteryTicket {
    pub vrf_type: VrfType,
    /// Local request id, or the messaging sequence of a cross-chain request
    pub request_id: u64,
    pub creator_coin: Address,
    pub win_chance_ppm: u64,
}

/// Outcome of a randomness callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawResult {
    pub request_id: u64,
    pub roll: u64,
    pub won: bool,
}

/// One coin's jackpot as seen from this chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JackpotStatus {
    pub creator_coin: Address,
    pub gauge: Option<Address>,
    pub reserve: u128,
}

/// Read-only health snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LotteryStatus {
    pub active: bool,
    pub is_hub: bool,
    pub pending_requests: usize,
    pub native_balance: u128,
    /// Native balance above the registry's gas reserve
    pub spendable_native: u128,
    pub jackpots: Vec<JackpotStatus>,
}

#[derive(Debug, Clone)]
pub struct LotteryManager<R: Registry + Clone> {
    pub address: Address,
    owner: Address,
    chain_id: u64,
    config: LotteryConfig,
    registry: R,
    endpoint: Endpoint,
    peers: PeerBook,
    /// Only caller allowed to deliver random words
    vrf_coordinator: Address,
    pending: PendingRequests,
    /// Gauge controllers deployed on this chain, by address
    gauges: BTreeMap<Address, GaugeController>,
    personal_boosts: BTreeMap<Address, u64>,
    native_balance: u128,
    request_nonce: u64,
    guard: ReentrancyGuard,
    pub events: EventLog,
}

impl<R: Registry + Clone> Transactional for LotteryManager<R> {
    fn guard_mut(&mut self) -> &mut ReentrancyGuard {
        &mut self.guard
    }
}

impl<R: Registry + Clone> LotteryManager<R> {
    pub fn new(
        address: Address,
        owner: Address,
        chain_id: u64,
        config: LotteryConfig,
        registry: R,
        endpoint: Endpoint,
        vrf_coordinator: Address,
    ) -> VaultResult<Self> {
        require_nonzero(&address, "address")?;
        require_nonzero(&owner, "owner")?;
        require_nonzero(&vrf_coordinator, "vrf_coordinator")?;
        config.validate()?;

        Ok(Self {
            address,
            owner,
            chain_id,
            config,
            registry,
            endpoint,
            peers: PeerBook::new(),
            vrf_coordinator,
            pending: PendingRequests::new(),
            gauges: BTreeMap::new(),
            personal_boosts: BTreeMap::new(),
            native_balance: 0,
            request_nonce: 0,
            guard: ReentrancyGuard::new(),
            events: EventLog::new(),
        })
    }

    // ============ Views ============

    pub fn config(&self) -> &LotteryConfig {
        &self.config
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut R {
        &mut self.registry
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn endpoint_mut(&mut self) -> &mut Endpoint {
        &mut self.endpoint
    }

    pub fn pending(&self) -> &PendingRequests {
        &self.pending
    }

    pub fn gauge(&self, gauge: &Address) -> Option<&GaugeController> {
        self.gauges.get(gauge)
    }

    pub fn native_balance(&self) -> u128 {
        self.native_balance
    }

    pub fn is_hub(&self) -> bool {
        self.registry.is_hub_chain(self.chain_id)
    }

    pub fn peer_address(&self) -> Bytes32 {
        address_to_bytes32(&self.address)
    }

    fn spendable_native(&self) -> u128 {
        self.native_balance.saturating_sub(self.registry.get_gas_reserve())
    }

    /// Gauge controller the registry names for `creator_coin`, if deployed here
    fn gauge_for(&self, creator_coin: &Address) -> Option<&GaugeController> {
        self.registry
            .get_gauge_controller_for_token(creator_coin)
            .and_then(|gauge| self.gauges.get(&gauge))
    }

    /// Creator coin whose coin, vault or share token is `token`
    fn resolve_creator_coin(&self, token: &Address) -> Option<Address> {
        self.registry.get_all_creator_coins().into_iter().find(|coin| {
            coin == token
                || self.registry.get_vault_for_token(coin).as_ref() == Some(token)
                || self.registry.get_share_oft_for_token(coin).as_ref() == Some(token)
        })
    }

    /// Endpoint ids of every chain holding a remote vault of an active coin
    fn broadcast_destinations(&self) -> BTreeSet<Eid> {
        let own_eid = self.endpoint.eid;
        self.registry
            .get_all_creator_coins()
            .iter()
            .filter(|coin| self.registry.is_creator_coin_active(coin))
            .flat_map(|coin| self.registry.get_remote_vaults(coin))
            .filter_map(|remote| self.registry.get_eid_for_chain_id(remote.chain_id))
            .filter(|eid| *eid != own_eid)
            .collect()
    }

    pub fn lottery_status(&self) -> LotteryStatus {
        let jackpots = self
            .registry
            .get_all_creator_coins()
            .into_iter()
            .filter(|coin| self.registry.is_creator_coin_active(coin))
            .map(|coin| {
                let gauge = self.registry.get_gauge_controller_for_token(&coin);
                let reserve = self.gauge_for(&coin).map(|g| g.reserve()).unwrap_or(0);
                JackpotStatus { creator_coin: coin, gauge, reserve }
            })
            .collect();

        LotteryStatus {
            active: self.config.active,
            is_hub: self.is_hub(),
            pending_requests: self.pending.len(),
            native_balance: self.native_balance,
            spendable_native: self.spendable_native(),
            jackpots,
        }
    }

    // ============ Admin ============

    fn only_owner(&self, caller: &Address) -> VaultResult<()> {
        if *caller != self.owner {
            return Err(VaultError::Unauthorized { expected: self.owner, actual: *caller });
        }
        Ok(())
    }

    pub fn set_config(&mut self, caller: Address, config: LotteryConfig) -> VaultResult<()> {
        self.transact(|lottery| {
            lottery.only_owner(&caller)?;
            config.validate()?;
            lottery.config = config;
            Ok(())
        })
    }

    pub fn set_peer(&mut self, caller: Address, eid: Eid, peer: Bytes32, now: u64) -> VaultResult<()> {
        self.transact(|lottery| {
            lottery.only_owner(&caller)?;
            lottery.peers.set_peer(eid, peer);
            lottery.events.emit(ProtocolEvent::PeerSet { eid, peer, timestamp: now });
            Ok(())
        })
    }

    /// Deploy a gauge controller bound to this lottery
    pub fn attach_gauge(
        &mut self,
        caller: Address,
        gauge: Address,
        creator_coin: Address,
        boost_ppm: u64,
    ) -> VaultResult<()> {
        self.transact(|lottery| {
            lottery.only_owner(&caller)?;
            require_nonzero(&gauge, "gauge")?;
            let controller = GaugeController::new(gauge, creator_coin, lottery.address, boost_ppm);
            lottery.gauges.insert(gauge, controller);
            Ok(())
        })
    }

    /// Add vault shares to a gauge's jackpot reserve
    pub fn fund_jackpot(&mut self, gauge: Address, shares: u128, now: u64) -> VaultResult<()> {
        self.transact(|lottery| {
            let controller = lottery
                .gauges
                .get_mut(&gauge)
                .ok_or(VaultError::InvalidInput { param: "gauge", reason: "not attached" })?;
            controller.fund(shares)?;
            let creator_coin = controller.creator_coin;
            lottery.events.emit(ProtocolEvent::JackpotFunded { creator_coin, shares, timestamp: now });
            Ok(())
        })
    }

    /// Personal boost in bps, clamped to `[1.0x, 2.5x]` when applied
    pub fn set_personal_boost(&mut self, caller: Address, user: Address, boost_bps: u64) -> VaultResult<()> {
        self.transact(|lottery| {
            lottery.only_owner(&caller)?;
            lottery.personal_boosts.insert(user, boost_bps);
            Ok(())
        })
    }

    /// Top up the native balance that pays messaging fees
    pub fn fund_native(&mut self, amount: u128) -> VaultResult<()> {
        self.transact(|lottery| {
            lottery.native_balance = lottery
                .native_balance
                .checked_add(amount)
                .ok_or(VaultError::Overflow)?;
            Ok(())
        })
    }

    /// Claim a winner's accumulated prize from one gauge
    pub fn claim_prize(&mut self, gauge: Address, winner: Address) -> VaultResult<u128> {
        self.transact(|lottery| {
            lottery
                .gauges
                .get_mut(&gauge)
                .ok_or(VaultError::InvalidInput { param: "gauge", reason: "not attached" })?
                .claim(&winner)
        })
    }

    // ============ Entry ============

    /// Enter a swap into the draw
    ///
    /// Swaps of unknown or inactive coins, swaps below the minimum and
    /// swaps while the lottery is switched off are ignored with `Ok(None)`.
    pub fn process_swap_lottery<Q: PriceQuoter>(
        &mut self,
        buyer: Address,
        token_in: Address,
        amount_in: u128,
        quoter: &Q,
        now: u64,
    ) -> VaultResult<Option<LotteryTicket>> {
        self.transact(|lottery| lottery.enter(buyer, token_in, amount_in, quoter, now))
    }

    fn enter<Q: PriceQuoter>(
        &mut self,
        buyer: Address,
        token_in: Address,
        amount_in: u128,
        quoter: &Q,
        now: u64,
    ) -> VaultResult<Option<LotteryTicket>> {
        // 1. Eligibility
        if !self.config.active || amount_in == 0 {
            return Ok(None);
        }
        let creator_coin = match self.resolve_creator_coin(&token_in) {
            Some(coin) if self.registry.is_creator_coin_active(&coin) => coin,
            _ => return Ok(None),
        };
        let usd_amount = quoter.usd_value(&token_in, amount_in, now)?;
        if usd_amount < self.config.min_swap_usd {
            return Ok(None);
        }
        let usd_amount_6 = u64::try_from(usd_amount / 1_000_000_000_000).map_err(|_| VaultError::Overflow)?;

        // 2. Win chance
        let base = calculate_win_chance(usd_amount, &self.config)?;
        let personal = self.personal_boosts.get(&buyer).copied().unwrap_or(BOOST_BASE_BPS);
        let gauge_boost = self.gauge_for(&creator_coin).map(|g| g.boost_ppm).unwrap_or(0);
        let win_chance_ppm = apply_boosts(base, personal, gauge_boost, usd_amount)?;

        // 3. Randomness request; cross-chain falls back to local
        self.request_nonce += 1;
        let (vrf_type, request_id) = match self.config.vrf_type {
            VrfType::CrossChain => match self.request_cross_chain() {
                Ok(sequence) => (VrfType::CrossChain, sequence),
                Err(_) => (VrfType::Local, self.local_request_id(&buyer, &creator_coin, now)),
            },
            VrfType::Local => (VrfType::Local, self.local_request_id(&buyer, &creator_coin, now)),
        };

        // 4. Record
        self.pending.insert(
            request_id,
            LotteryEntry { user: buyer, creator_coin, usd_amount, win_chance_ppm, vrf_type, requested_at: now },
        )?;
        self.events.emit(ProtocolEvent::LotteryEntered {
            request_id,
            vrf_type,
            buyer,
            creator_coin,
            usd_amount_6,
            win_chance_ppm,
            timestamp: now,
        });

        Ok(Some(LotteryTicket { vrf_type, request_id, creator_coin, win_chance_ppm }))
    }

    fn local_request_id(&self, buyer: &Address, creator_coin: &Address, now: u64) -> u64 {
        vrf::derive_request_id(self.chain_id, buyer, creator_coin, self.request_nonce, now)
    }

    /// Paid request to the remote coordinator; the send's nonce is the sequence
    fn request_cross_chain(&mut self) -> VaultResult<u64> {
        let vrf_eid = self.config.vrf_eid.ok_or(VaultError::InvalidInput {
            param: "vrf_eid",
            reason: "required for cross-chain randomness",
        })?;
        let message = encode_vrf_request(&self.address, 1);
        let receipt = self.send_paid(vrf_eid, message)?;
        Ok(receipt.nonce)
    }

    /// Send funded from the native balance above the gas reserve
    fn send_paid(&mut self, dst_eid: Eid, message: Vec<u8>) -> VaultResult<MessagingReceipt> {
        let receiver = self.peers.peer(dst_eid)?;
        let fee = self.endpoint.quote(message.len()).native_fee;
        let available = self.spendable_native();
        if available < fee {
            return Err(VaultError::InsufficientFee { required: fee, available });
        }
        let receipt = self.endpoint.send(self.peer_address(), dst_eid, receiver, message, fee)?;
        self.native_balance -= fee;
        Ok(receipt)
    }

    // ============ Draw ============

    /// Callback for a local randomness request
    pub fn receive_random_words(
        &mut self,
        caller: Address,
        request_id: u64,
        random_words: &[u128],
        now: u64,
    ) -> VaultResult<DrawResult> {
        self.transact(|lottery| lottery.draw(caller, VrfType::Local, request_id, random_words, now))
    }

    /// Callback for a cross-chain randomness request, keyed by send sequence
    pub fn receive_random_words_cross_chain(
        &mut self,
        caller: Address,
        random_words: &[u128],
        sequence: u64,
        now: u64,
    ) -> VaultResult<DrawResult> {
        self.transact(|lottery| lottery.draw(caller, VrfType::CrossChain, sequence, random_words, now))
    }

    fn draw(
        &mut self,
        caller: Address,
        vrf_type: VrfType,
        request_id: u64,
        random_words: &[u128],
        now: u64,
    ) -> VaultResult<DrawResult> {
        if caller != self.vrf_coordinator {
            return Err(VaultError::Unauthorized { expected: self.vrf_coordinator, actual: caller });
        }
        let word = random_words.first().copied().ok_or(VaultError::InvalidInput {
            param: "random_words",
            reason: "empty",
        })?;
        let entry = self.pending.consume(vrf_type, request_id)?;

        let roll = roll(word);
        let won = is_win(roll, entry.win_chance_ppm);
        if !won {
            self.events.emit(ProtocolEvent::LotteryLost {
                request_id,
                buyer: entry.user,
                roll,
                win_chance_ppm: entry.win_chance_ppm,
                timestamp: now,
            });
            return Ok(DrawResult { request_id, roll, won });
        }

        let message = WinnerMessage {
            creator_coin: entry.creator_coin,
            winner: entry.user,
            payout_bps: self.config.payout_bps,
        };
        if self.is_hub() {
            self.settle_on_hub(&message, now);
        } else {
            self.notify_hub(&message, now);
        }
        Ok(DrawResult { request_id, roll, won })
    }

    // ============ Settlement ============

    /// Pay one coin's jackpot on this chain
    fn pay_jackpot(&mut self, creator_coin: &Address, winner: &Address, payout_bps: u16, now: u64) -> VaultResult<u128> {
        let gauge = self
            .registry
            .get_gauge_controller_for_token(creator_coin)
            .ok_or(VaultError::GaugeNotConfigured { creator_coin: *creator_coin })?;
        let lottery = self.address;
        let shares = self
            .gauges
            .get_mut(&gauge)
            .ok_or(VaultError::GaugeNotConfigured { creator_coin: *creator_coin })?
            .pay_jackpot(&lottery, winner, payout_bps)?;

        self.events.emit(ProtocolEvent::JackpotPaid {
            creator_coin: *creator_coin,
            winner: *winner,
            shares,
            timestamp: now,
        });
        Ok(shares)
    }

    /// Pay the jackpot of every active coin, skipping failures
    fn pay_all_jackpots(&mut self, winner: &Address, payout_bps: u16, now: u64) -> u32 {
        let mut paid = 0u32;
        for coin in self.registry.get_all_creator_coins() {
            if !self.registry.is_creator_coin_active(&coin) {
                continue;
            }
            match self.pay_jackpot(&coin, winner, payout_bps, now) {
                Ok(_) => paid += 1,
                Err(err) => self.events.emit(ProtocolEvent::CrossChainPayoutFailed {
                    creator_coin: coin,
                    winner: *winner,
                    error_code: err.code().to_string(),
                    timestamp: now,
                }),
            }
        }
        paid
    }

    fn settle_on_hub(&mut self, message: &WinnerMessage, now: u64) {
        let num_vaults_paid = self.pay_all_jackpots(&message.winner, message.payout_bps, now);
        self.events.emit(ProtocolEvent::MultiTokenJackpotWon {
            winner: message.winner,
            trigger_coin: message.creator_coin,
            num_vaults_paid,
            timestamp: now,
        });
        self.broadcast_win(message, now);
    }

    fn broadcast_win(&mut self, message: &WinnerMessage, now: u64) {
        let payload = encode_broadcast(message);
        for dst_eid in self.broadcast_destinations() {
            match self.send_paid(dst_eid, payload.clone()) {
                Ok(receipt) => self.events.emit(ProtocolEvent::CrossChainBroadcastSent {
                    dst_eid,
                    guid: receipt.guid,
                    timestamp: now,
                }),
                Err(err) => self.events.emit(ProtocolEvent::CrossChainBroadcastFailed {
                    dst_eid,
                    error_code: err.code().to_string(),
                    timestamp: now,
                }),
            }
        }
    }

    /// Forward a spoke win to the hub, paying the local jackpot if that fails
    fn notify_hub(&mut self, message: &WinnerMessage, now: u64) {
        let sent = match self.registry.get_eid_for_chain_id(self.config.hub_chain_id) {
            Some(hub_eid) => self.send_paid(hub_eid, encode_notify(message)).map(|receipt| (hub_eid, receipt)),
            None => Err(VaultError::InvalidInput { param: "hub_chain_id", reason: "no endpoint id registered" }),
        };

        match sent {
            Ok((hub_eid, receipt)) => self.events.emit(ProtocolEvent::HubNotified {
                hub_eid,
                guid: receipt.guid,
                timestamp: now,
            }),
            Err(err) => {
                self.events.emit(ProtocolEvent::HubNotificationFailed {
                    creator_coin: message.creator_coin,
                    winner: message.winner,
                    error_code: err.code().to_string(),
                    timestamp: now,
                });
                if let Err(err) = self.pay_jackpot(&message.creator_coin, &message.winner, message.payout_bps, now) {
                    self.events.emit(ProtocolEvent::CrossChainPayoutFailed {
                        creator_coin: message.creator_coin,
                        winner: message.winner,
                        error_code: err.code().to_string(),
                        timestamp: now,
                    });
                }
            }
        }
    }

    /// Deliver a win message from a trusted peer
    ///
    /// # Errors
    /// * `InvalidPeer` if the sender is not the configured peer for its endpoint
    /// * `NonceOutOfOrder` on a replayed or skipped delivery
    /// * `MessageDecode` on a malformed payload
    /// * `InvalidStateTransition` if a spoke receives a hub notification
    pub fn lz_receive(&mut self, origin: Origin, message: &[u8], now: u64) -> VaultResult<InboundMessage> {
        self.transact(|lottery| {
            lottery.peers.check_origin(&origin)?;
            lottery.endpoint.accept_inbound(&origin)?;
            let inbound = decode_inbound(message)?;

            let win = match inbound {
                InboundMessage::NotifyHub(win) | InboundMessage::Broadcast(win) => win,
            };
            lottery.events.emit(ProtocolEvent::CrossChainWinReceived {
                src_eid: origin.src_eid,
                creator_coin: win.creator_coin,
                winner: win.winner,
                payout_bps: win.payout_bps,
                timestamp: now,
            });

            match inbound {
                InboundMessage::NotifyHub(win) => {
                    if !lottery.is_hub() {
                        return Err(VaultError::InvalidStateTransition);
                    }
                    lottery.settle_on_hub(&win, now);
                }
                InboundMessage::Broadcast(win) => {
                    let num_vaults_paid = lottery.pay_all_jackpots(&win.winner, win.payout_bps, now);
                    lottery.events.emit(ProtocolEvent::MultiTokenJackpotWon {
                        winner: win.winner,
                        trigger_coin: win.creator_coin,
                        num_vaults_paid,
                        timestamp: now,
                    });
                }
            }
            Ok(inbound)
        })
    }
}
