//! Signer using the k256 Rust crate (implementation of ecdsa in Rust).

use crate::types::{Address, Hash, Signature};
use k256::{
    ecdsa::{
        recoverable,
        signature::{hazmat::PrehashSigner, Signature as k256Signature},
        SigningKey, VerifyingKey,
    },
    elliptic_curve::sec1::ToEncodedPoint,
};

use super::{address_from_uncompressed, hash_to_eth_signed_msg_hash, recovery_id, Error};

fn address_of(key: &VerifyingKey) -> Result<Address, Error> {
    let pk_bytes: [u8; 65] = key
        .to_encoded_point(false)
        .as_bytes()
        .try_into()
        .map_err(|_| Error::RecoveryFailed)?;
    Ok(address_from_uncompressed(&pk_bytes))
}

/// A private key held in memory.
#[derive(Debug)]
pub struct LocalSigner {
    key: SigningKey,
    addr: Address,
}

impl LocalSigner {
    pub fn new<R: rand::Rng + rand::CryptoRng>(rng: &mut R) -> Self {
        let key = SigningKey::random(rng);
        // address_of only fails if the uncompressed SEC1 encoding of a
        // valid point is not 65 bytes, which is unlikely to change in the
        // dependency. If it does we have bigger problems, given that its
        // layout will likely change, too. `secp256k1::LocalSigner::new` is
        // infallible as well, both backends keep the same signature.
        let addr = address_of(&key.verifying_key())
            .expect("a freshly generated key always encodes to 65 bytes");
        Self { key, addr }
    }

    /// Import a raw 32 byte secret key.
    pub fn from_bytes(secret: &[u8; 32]) -> Result<Self, Error> {
        let key = SigningKey::from_bytes(secret).map_err(|_| Error::SigningFailed)?;
        let addr = address_of(&key.verifying_key())?;
        Ok(Self { key, addr })
    }
}

impl super::Signer for LocalSigner {
    fn address(&self) -> Address {
        self.addr
    }

    fn sign_eth(&self, msg: Hash) -> Result<Signature, Error> {
        // "\x19Ethereum Signed Message:\n32" format
        let hash = hash_to_eth_signed_msg_hash(msg);

        let sig: recoverable::Signature = self
            .key
            .sign_prehash(&hash.0)
            .map_err(|_| Error::SigningFailed)?;

        // This Signature type already has the format we need: 65 bytes
        // containing r, s and v in this order. We still have to add 27 to v
        // for the signature to be valid in the EVM.
        let mut sig_bytes: [u8; 65] = sig
            .as_bytes()
            .try_into()
            .map_err(|_| Error::SigningFailed)?;
        debug_assert!(sig_bytes[32] & 0x80 == 0);
        sig_bytes[64] += 27;

        Ok(Signature(sig_bytes))
    }
}

/// Address recovery backed by k256.
#[derive(Debug, Default, Clone, Copy)]
pub struct EcRecover;

impl super::Verifier for EcRecover {
    fn recover_signer(&self, msg: Hash, eth_sig: Signature) -> Result<Address, Error> {
        let hash = hash_to_eth_signed_msg_hash(msg);

        let mut sig_bytes: [u8; 65] = eth_sig.0;
        sig_bytes[64] = recovery_id(&eth_sig)?;

        let sig =
            recoverable::Signature::from_bytes(&sig_bytes).map_err(|_| Error::RecoveryFailed)?;

        let verifying_key = sig
            .recover_verifying_key_from_digest_bytes(&hash.0.into())
            .map_err(|_| Error::RecoveryFailed)?;
        address_of(&verifying_key)
    }
}
