//! A token network of two-party payment channels.
//!
//! Participants lock tokens into a channel, exchange signed balance proofs
//! off-chain and only come back to the [TokenNetwork] to close the channel
//! and split the escrow. The ledger this runs against is abstracted behind
//! [host::BlockClock], [host::TokenVault] and [events::EventSink].

pub mod packed {
    //! `abi.encodePacked` for anything implementing `serde::Serialize`.

    mod error;
    mod hashing;
    mod ser;

    pub use error::{Error, Result};
    pub use hashing::{to_hash, Keccak256Writer};
    pub use ser::{to_vec, to_writer, Serializer, Writer};

    #[cfg(test)]
    mod tests;
}
pub mod sig;

pub mod channel;
pub mod config;
pub mod error;
pub mod events;
pub mod host;
pub mod types;

pub use channel::TokenNetwork;
pub use error::Error;
pub use types::{Address, Hash, Signature, TokenAmount, U256};
