//! Handles the creation and verification of (Ethereum) Signatures.
//!
//! Balance proofs and the authorizations around them are signed with 65 byte
//! recoverable ECDSA signatures over `keccak256` hashes, prefixed the same way
//! `eth_sign` does. The backend is selected with the `k256` (default) or
//! `secp256k1` feature.

use crate::types::{Address, Hash, Signature};
use sha3::{Digest, Keccak256};
use thiserror::Error;

#[cfg(feature = "k256")]
mod k256;
#[cfg(feature = "secp256k1")]
mod secp256k1;

#[cfg(feature = "secp256k1")]
pub use self::secp256k1::{EcRecover, LocalSigner};
#[cfg(all(feature = "k256", not(feature = "secp256k1")))]
pub use self::k256::{EcRecover, LocalSigner};

#[cfg(not(any(feature = "k256", feature = "secp256k1")))]
compile_error!("enable one of the signature backends: `k256` or `secp256k1`");


#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// `v` must be 27 or 28.
    #[error("invalid recovery id {0}")]
    InvalidRecoveryId(u8),
    #[error("signature is malformed or does not recover to a public key")]
    RecoveryFailed,
    #[error("signing failed")]
    SigningFailed,
}

/// Produces signatures for a single address.
pub trait Signer {
    fn address(&self) -> Address;

    /// Sign `msg` the way `eth_sign` does, i.e. after adding the
    /// `\x19Ethereum Signed Message` prefix.
    fn sign_eth(&self, msg: Hash) -> Result<Signature, Error>;
}

/// Recovers the address that produced a signature created by
/// [Signer::sign_eth].
pub trait Verifier {
    fn recover_signer(&self, msg: Hash, sig: Signature) -> Result<Address, Error>;
}

impl<T: Signer + ?Sized> Signer for &T {
    fn address(&self) -> Address {
        (**self).address()
    }

    fn sign_eth(&self, msg: Hash) -> Result<Signature, Error> {
        (**self).sign_eth(msg)
    }
}

/// Add the `\x19Ethereum Signed Message\n<length>` prefix to hash.
///
/// This is the format expected by the Solidity contracts.
fn hash_to_eth_signed_msg_hash(hash: Hash) -> Hash {
    // Packed encoding => We can't use the serializer
    let mut hasher = Keccak256::new();
    hasher.update(b"\x19Ethereum Signed Message:\n32");
    hasher.update(hash.0);
    Hash(hasher.finalize().into())
}

/// The Ethereum address of an uncompressed (65 byte, `0x04` prefixed)
/// public key.
fn address_from_uncompressed(pk_bytes: &[u8; 65]) -> Address {
    // Throw away the first byte, which is not part of the public key. It is
    // added by the SEC1 encoding.
    let hash: [u8; 32] = Keccak256::digest(&pk_bytes[1..]).into();

    let mut addr = Address::ZERO;
    addr.0.copy_from_slice(&hash[32 - 20..]);
    addr
}

/// Undo the `+27` offset Ethereum adds to `v`.
fn recovery_id(sig: &Signature) -> Result<u8, Error> {
    match sig.0[64] {
        v @ (27 | 28) => Ok(v - 27),
        v => Err(Error::InvalidRecoveryId(v)),
    }
}
