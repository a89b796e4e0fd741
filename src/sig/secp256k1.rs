//! Signer using the C libsecp256k1 bindings.

use crate::types::{Address, Hash, Signature};
use secp256k1::{
    ecdsa::{RecoverableSignature, RecoveryId},
    All, Message, PublicKey, Secp256k1, SecretKey,
};

use super::{address_from_uncompressed, hash_to_eth_signed_msg_hash, recovery_id, Error};

fn address_of(pk: &PublicKey) -> Address {
    address_from_uncompressed(&pk.serialize_uncompressed())
}

/// A private key held in memory.
#[derive(Debug)]
pub struct LocalSigner {
    secp: Secp256k1<All>,
    sk: SecretKey,
    addr: Address,
}

impl LocalSigner {
    pub fn new<R: rand::Rng + rand::CryptoRng>(rng: &mut R) -> Self {
        let secp = Secp256k1::new();
        let sk = SecretKey::new(rng);
        let addr = address_of(&PublicKey::from_secret_key(&secp, &sk));
        Self { secp, sk, addr }
    }

    /// Import a raw 32 byte secret key.
    pub fn from_bytes(secret: &[u8; 32]) -> Result<Self, Error> {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(secret).map_err(|_| Error::SigningFailed)?;
        let addr = address_of(&PublicKey::from_secret_key(&secp, &sk));
        Ok(Self { secp, sk, addr })
    }
}

impl super::Signer for LocalSigner {
    fn address(&self) -> Address {
        self.addr
    }

    fn sign_eth(&self, msg: Hash) -> Result<Signature, Error> {
        // "\x19Ethereum Signed Message:\n32" format
        let hash = hash_to_eth_signed_msg_hash(msg);
        let msg = Message::from_slice(&hash.0).map_err(|_| Error::SigningFailed)?;

        // We have to use sign_ecdsa_recoverable because the contract must be
        // able to recover the address. This gives us the additional
        // information needed for v.
        let sig = self.secp.sign_ecdsa_recoverable(&msg, &self.sk);
        let (v, rs) = sig.serialize_compact();

        // EIP-2 rejects signatures with a non-canonical s. The library
        // produces canonical signatures, fail early if that changes.
        debug_assert!(rs[32] & 0x80 == 0);

        Ok(Signature::new(&rs, 27 + v.to_i32() as u8))
    }
}

/// Address recovery backed by libsecp256k1.
#[derive(Debug)]
pub struct EcRecover {
    secp: Secp256k1<All>,
}

impl Default for EcRecover {
    fn default() -> Self {
        Self {
            secp: Secp256k1::new(),
        }
    }
}

impl super::Verifier for EcRecover {
    fn recover_signer(&self, msg: Hash, eth_sig: Signature) -> Result<Address, Error> {
        let hash = hash_to_eth_signed_msg_hash(msg);
        let msg = Message::from_slice(&hash.0).map_err(|_| Error::RecoveryFailed)?;

        let v = recovery_id(&eth_sig)?;
        let recid = RecoveryId::from_i32(v.into()).map_err(|_| Error::InvalidRecoveryId(v))?;
        let sig = RecoverableSignature::from_compact(&eth_sig.0[..64], recid)
            .map_err(|_| Error::RecoveryFailed)?;

        let pk = self
            .secp
            .recover_ecdsa(&msg, &sig)
            .map_err(|_| Error::RecoveryFailed)?;
        Ok(address_of(&pk))
    }
}
