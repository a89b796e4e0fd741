//! Error types returned by the token network.
//!
//! Failures come in two tiers. [ArgumentError] covers calls that are
//! malformed and are rejected before any channel is looked at. [ChannelError]
//! covers well-formed calls that the channel refuses in its current state.
//! Neither tier leaves partial effects behind.

use thiserror::Error;

use crate::{
    channel::{ChannelId, ChannelState},
    host::VaultError,
    packed, sig,
    types::{Address, BlockNumber, Nonce, U256},
};

/// Precondition failures: the call could never succeed as written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    /// Address bytes that are not exactly 20 bytes (including empty input or
    /// invalid hex). Holds the number of bytes that were found.
    #[error("malformed address: expected 20 bytes, got {0}")]
    MalformedAddress(usize),
    /// Zero address passed where a participant is required.
    #[error("invalid address for {0}: zero address")]
    InvalidAddress(&'static str),
    /// Participants of a new channel must be distinct and non-zero.
    #[error("invalid participant: {0}")]
    InvalidParticipant(&'static str),
    #[error("settle timeout {timeout} outside of [{min}, {max}]")]
    SettleTimeoutOutOfRange { timeout: u64, min: u64, max: u64 },
    /// The address is not one of the two participants of the channel.
    #[error("{0:?} is not a participant of channel {1:?}")]
    NotParticipant(Address, ChannelId),
}

/// Business rule failures: the call is well formed but not acceptable now.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("a channel between these participants is already open: {0:?}")]
    AlreadyOpen(ChannelId),
    #[error("channel is not open (state {0:?})")]
    NotOpen(ChannelState),
    #[error("channel is not closed (state {0:?})")]
    NotClosed(ChannelState),
    #[error("{0:?} did not close the channel")]
    NotCloser(Address),
    #[error("new total deposit must be larger than {0}")]
    NonIncreasingDeposit(U256),
    #[error("new total withdraw must be larger than {0}")]
    NonIncreasingWithdraw(U256),
    #[error("withdrawals would exceed the deposits of the channel")]
    InsufficientChannelBalance,
    #[error("signature recovers to {recovered:?}, expected {expected:?}")]
    BadSignature {
        expected: Address,
        recovered: Option<Address>,
    },
    #[error("nonce {submitted} does not exceed recorded nonce {recorded}")]
    StaleNonce { recorded: Nonce, submitted: Nonce },
    #[error("settle window ended at block {settle_block}")]
    UpdateAfterSettleWindow { settle_block: BlockNumber },
    #[error("non-closing balance proof was already updated")]
    AlreadyUpdated,
    #[error("settle window ends at block {settle_block}, current block is {current}")]
    SettleWindowNotElapsed {
        settle_block: BlockNumber,
        current: BlockNumber,
    },
    #[error("settlement data of {0:?} does not match the recorded balance hash")]
    BalanceHashMismatch(Address),
    #[error("cooperative settle balances do not add up to the channel deposit")]
    BalanceSumMismatch,
    #[error("token transfer failed: {0}")]
    Vault(#[from] VaultError),
}

/// Any failure of a token network call.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    InvalidArgument(#[from] ArgumentError),
    #[error(transparent)]
    Rejected(#[from] ChannelError),
    #[error("could not encode signed message: {0}")]
    Encoding(#[from] packed::Error),
    #[error("could not sign message: {0}")]
    Signing(#[from] sig::Error),
}

impl Error {
    /// The business rule that rejected the call, if any.
    pub fn rejection(&self) -> Option<&ChannelError> {
        match self {
            Error::Rejected(e) => Some(e),
            _ => None,
        }
    }
}

impl From<VaultError> for Error {
    fn from(e: VaultError) -> Self {
        Self::Rejected(e.into())
    }
}

pub type Result<T, E = Error> = core::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_is_only_set_for_business_rules() {
        let e: Error = ChannelError::AlreadyUpdated.into();
        assert_eq!(e.rejection(), Some(&ChannelError::AlreadyUpdated));

        let e: Error = ArgumentError::InvalidAddress("partner").into();
        assert_eq!(e.rejection(), None);

        let vault = VaultError::InsufficientBalance {
            account: Address::ZERO,
            needed: 2.into(),
            available: 1.into(),
        };
        let e: Error = vault.clone().into();
        assert_eq!(e.rejection(), Some(&ChannelError::Vault(vault)));
    }

    #[test]
    fn result_defaults_to_crate_error() {
        fn parse(s: &str) -> Result<Address> {
            Ok(s.parse::<Address>()?)
        }
        assert!(matches!(
            parse("0x12"),
            Err(Error::InvalidArgument(ArgumentError::MalformedAddress(1)))
        ));
    }
}
