//! Participant pairs and channel identifiers.

use serde::Serialize;

use super::{ChannelId, PartIdx};
use crate::{
    error::ArgumentError,
    packed,
    types::{Address, U256},
};

/// The two participants of a channel in canonical (ascending) order.
///
/// `(a, b)` and `(b, a)` map to the same pair, so a channel is found no
/// matter which side asks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticipantPair([Address; 2]);

impl ParticipantPair {
    pub fn new(a: Address, b: Address) -> Result<Self, ArgumentError> {
        if a.is_zero() || b.is_zero() {
            return Err(ArgumentError::InvalidParticipant("zero address"));
        }
        if a == b {
            return Err(ArgumentError::InvalidParticipant(
                "participants must be distinct",
            ));
        }
        Ok(if a < b { Self([a, b]) } else { Self([b, a]) })
    }

    pub fn participants(&self) -> [Address; 2] {
        self.0
    }

    pub fn index_of(&self, participant: Address) -> Option<PartIdx> {
        self.0.iter().position(|p| *p == participant)
    }

    /// Index of the participant that is not `idx`.
    pub fn other(idx: PartIdx) -> PartIdx {
        1 - idx
    }

    /// `keccak256(abi.encodePacked(lower, higher, uint256(counter)))`
    ///
    /// The counter is the registry's open sequence number, so reopening a
    /// channel between the same participants yields a fresh identifier.
    pub fn channel_id(&self, counter: u64) -> Result<ChannelId, packed::Error> {
        #[derive(Serialize)]
        struct ChannelIdPreimage {
            lower: Address,
            higher: Address,
            counter: U256,
        }

        packed::to_hash(&ChannelIdPreimage {
            lower: self.0[0],
            higher: self.0[1],
            counter: counter.into(),
        })
    }
}
