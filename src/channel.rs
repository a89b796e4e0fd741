mod balance_proof;
mod deposit;
mod identity;
mod network;
mod registry;
pub mod settlement;


use crate::types::{Address, BlockNumber, Hash, Nonce, TokenAmount};

pub use balance_proof::*;
pub use identity::ParticipantPair;
pub use network::TokenNetwork;
pub use settlement::{Payout, SettlementInput, SettlementOutcome};

/// Index of a participant within its [ParticipantPair].
///
/// `0` is the participant with the lower address.
pub type PartIdx = usize;

/// Unique, immutable identifier of a channel.
pub type ChannelId = Hash;

/// Lifecycle of a channel. Transitions only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ChannelState {
    Nonexistent,
    Opened,
    Closed,
    Settled,
}

/// Per participant bookkeeping of a channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParticipantState {
    pub deposit: TokenAmount,
    pub withdrawn: TokenAmount,
    pub is_closer: bool,
    /// Summary of the last balance proof accepted for this participant.
    pub balance_hash: Hash,
    pub nonce: Nonce,
    pub additional_hash: Hash,
}

/// A channel record as kept by the registry.
#[derive(Debug, Clone)]
pub struct Channel {
    id: ChannelId,
    participants: ParticipantPair,
    state: ChannelState,
    settle_timeout: u64,
    opened_at: BlockNumber,
    closed_at: Option<BlockNumber>,
    settle_block: Option<BlockNumber>,
    /// Whether the closer's proof was already updated in this close cycle.
    updated: bool,
    records: [ParticipantState; 2],
}

impl Channel {
    pub(crate) fn new(
        id: ChannelId,
        participants: ParticipantPair,
        settle_timeout: u64,
        opened_at: BlockNumber,
    ) -> Self {
        Channel {
            id,
            participants,
            state: ChannelState::Opened,
            settle_timeout,
            opened_at,
            closed_at: None,
            settle_block: None,
            updated: false,
            records: [ParticipantState::default(); 2],
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    pub fn participants(&self) -> ParticipantPair {
        self.participants
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn settle_timeout(&self) -> u64 {
        self.settle_timeout
    }

    pub fn opened_at(&self) -> BlockNumber {
        self.opened_at
    }

    pub fn closed_at(&self) -> Option<BlockNumber> {
        self.closed_at
    }

    /// First block at which the channel can be settled. Only known once the
    /// channel is closed.
    pub fn settle_block(&self) -> Option<BlockNumber> {
        self.settle_block
    }

    pub fn is_updated(&self) -> bool {
        self.updated
    }

    pub fn participant(&self, participant: Address) -> Option<&ParticipantState> {
        self.participants
            .index_of(participant)
            .map(|idx| &self.records[idx])
    }

    pub(crate) fn record(&self, idx: PartIdx) -> &ParticipantState {
        &self.records[idx]
    }

    pub(crate) fn record_mut(&mut self, idx: PartIdx) -> &mut ParticipantState {
        &mut self.records[idx]
    }

    /// Tokens the channel holds in escrow: deposits of both participants
    /// minus what both already withdrew.
    ///
    /// One participant may have withdrawn more than its own deposit, so this
    /// is not the sum of per-participant differences.
    pub fn total_available(&self) -> TokenAmount {
        let [p1, p2] = &self.records;
        settlement::escrow([p1.deposit, p2.deposit], [p1.withdrawn, p2.withdrawn])
            .unwrap_or_default()
    }

    pub(crate) fn close(&mut self, closer: PartIdx, block: BlockNumber) {
        debug_assert_eq!(self.state, ChannelState::Opened);
        self.records[closer].is_closer = true;
        self.state = ChannelState::Closed;
        self.closed_at = Some(block);
        self.settle_block = Some(block.saturating_add(self.settle_timeout));
    }

    pub(crate) fn mark_updated(&mut self) {
        debug_assert_eq!(self.state, ChannelState::Closed);
        self.updated = true;
    }

    pub(crate) fn settle(&mut self, block: BlockNumber) {
        debug_assert!(self.state == ChannelState::Opened || self.state == ChannelState::Closed);
        if self.closed_at.is_none() {
            // Cooperative settlement skips the closed state.
            self.closed_at = Some(block);
            self.settle_block = Some(block);
        }
        self.state = ChannelState::Settled;
    }
}

/// Answer to [TokenNetwork::get_channel_info].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelInfo {
    pub channel_id: ChannelId,
    pub settle_block: Option<BlockNumber>,
    pub state: ChannelState,
}

impl ChannelInfo {
    pub(crate) fn nonexistent() -> Self {
        ChannelInfo {
            channel_id: ChannelId::default(),
            settle_block: None,
            state: ChannelState::Nonexistent,
        }
    }
}

impl From<&Channel> for ChannelInfo {
    fn from(channel: &Channel) -> Self {
        ChannelInfo {
            channel_id: channel.id,
            settle_block: channel.settle_block,
            state: channel.state,
        }
    }
}

/// Answer to [TokenNetwork::get_channel_participant_info].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParticipantInfo {
    pub deposit: TokenAmount,
    pub withdrawn: TokenAmount,
    pub is_closer: bool,
    pub balance_hash: Hash,
    pub nonce: Nonce,
}

impl From<&ParticipantState> for ParticipantInfo {
    fn from(state: &ParticipantState) -> Self {
        ParticipantInfo {
            deposit: state.deposit,
            withdrawn: state.withdrawn,
            is_closer: state.is_closer,
            balance_hash: state.balance_hash,
            nonce: state.nonce,
        }
    }
}
