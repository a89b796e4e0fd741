//! Balance proofs and the messages signed by channel participants.
//!
//! Every signed message is `keccak256(abi.encodePacked(...))` of one of the
//! layouts below, prefixed with the token network address, the chain id and
//! a message type so a signature for one purpose can never be replayed for
//! another.

use serde::Serialize;

use super::{ChannelId, ParticipantState};
use crate::{
    config::NetworkConfig,
    error::ChannelError,
    packed,
    sig::{Signer, Verifier},
    types::{Address, Hash, Nonce, Signature, TokenAmount, U256},
    Error,
};

/// Discriminates the different signed messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    BalanceProof = 1,
    BalanceProofUpdate = 2,
    Withdraw = 3,
    CooperativeSettle = 4,
}

impl Serialize for MessageType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u8(*self as u8)
    }
}

/// The off-chain transfer state a balance hash commits to.
#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BalanceData {
    pub transferred_amount: TokenAmount,
    pub locked_amount: TokenAmount,
    /// Root of the pending locks, unlocked through a separate path.
    pub locksroot: Hash,
}

impl BalanceData {
    /// `keccak256(abi.encodePacked(transferred_amount, locked_amount, locksroot))`
    pub fn balance_hash(&self) -> Result<Hash, packed::Error> {
        packed::to_hash(self)
    }

    /// Whether this data is what `record` committed to.
    ///
    /// A record without any accepted proof has a zero balance hash and only
    /// matches data without transfers.
    pub fn matches(&self, record: &ParticipantState) -> Result<bool, packed::Error> {
        if record.balance_hash.is_zero() {
            return Ok(self.transferred_amount.is_zero() && self.locked_amount.is_zero());
        }
        Ok(self.balance_hash()? == record.balance_hash)
    }
}

/// The balance data one participant's recorded balance hash commits to, as
/// revealed on settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleClaim {
    pub participant: Address,
    pub balance: BalanceData,
}

impl SettleClaim {
    /// Claim of a participant without any accepted balance proof.
    pub fn empty(participant: Address) -> Self {
        SettleClaim {
            participant,
            balance: BalanceData::default(),
        }
    }
}

/// A signed commitment of one participant to its off-chain transfers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BalanceProof {
    pub balance_hash: Hash,
    pub nonce: Nonce,
    pub additional_hash: Hash,
    pub signature: Signature,
}

impl BalanceProof {
    /// The proof submitted by a participant that never received anything.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.nonce == 0
    }
}

/// Binds signatures to one token network on one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageDomain {
    pub token_network: Address,
    pub chain_id: U256,
}

impl From<&NetworkConfig> for MessageDomain {
    fn from(config: &NetworkConfig) -> Self {
        MessageDomain {
            token_network: config.token_network,
            chain_id: config.chain_id.into(),
        }
    }
}

#[derive(Serialize)]
struct BalanceProofMessage {
    token_network: Address,
    chain_id: U256,
    msg_type: MessageType,
    channel_id: ChannelId,
    balance_hash: Hash,
    nonce: U256,
    additional_hash: Hash,
}

#[derive(Serialize)]
struct BalanceProofUpdateMessage {
    proof: BalanceProofMessage,
    closing_signature: Signature,
}

#[derive(Serialize)]
struct WithdrawMessage {
    token_network: Address,
    chain_id: U256,
    msg_type: MessageType,
    channel_id: ChannelId,
    participant: Address,
    total_withdraw: TokenAmount,
}

#[derive(Serialize)]
struct CooperativeSettleMessage {
    token_network: Address,
    chain_id: U256,
    msg_type: MessageType,
    channel_id: ChannelId,
    participant1: Address,
    participant1_balance: TokenAmount,
    participant2: Address,
    participant2_balance: TokenAmount,
}

impl MessageDomain {
    fn balance_proof_message(
        &self,
        msg_type: MessageType,
        channel_id: ChannelId,
        proof: &BalanceProof,
    ) -> BalanceProofMessage {
        BalanceProofMessage {
            token_network: self.token_network,
            chain_id: self.chain_id,
            msg_type,
            channel_id,
            balance_hash: proof.balance_hash,
            nonce: proof.nonce.into(),
            additional_hash: proof.additional_hash,
        }
    }

    /// Hash signed by the owner of a balance proof. The signature of `proof`
    /// is not part of it.
    pub fn balance_proof_hash(
        &self,
        channel_id: ChannelId,
        proof: &BalanceProof,
    ) -> Result<Hash, packed::Error> {
        packed::to_hash(&self.balance_proof_message(
            MessageType::BalanceProof,
            channel_id,
            proof,
        ))
    }

    /// Hash the non-closing participant signs to allow posting the closer's
    /// `proof` (including its signature) after close.
    pub fn balance_proof_update_hash(
        &self,
        channel_id: ChannelId,
        proof: &BalanceProof,
    ) -> Result<Hash, packed::Error> {
        packed::to_hash(&BalanceProofUpdateMessage {
            proof: self.balance_proof_message(
                MessageType::BalanceProofUpdate,
                channel_id,
                proof,
            ),
            closing_signature: proof.signature,
        })
    }

    pub fn withdraw_hash(
        &self,
        channel_id: ChannelId,
        participant: Address,
        total_withdraw: TokenAmount,
    ) -> Result<Hash, packed::Error> {
        packed::to_hash(&WithdrawMessage {
            token_network: self.token_network,
            chain_id: self.chain_id,
            msg_type: MessageType::Withdraw,
            channel_id,
            participant,
            total_withdraw,
        })
    }

    pub fn cooperative_settle_hash(
        &self,
        channel_id: ChannelId,
        (participant1, participant1_balance): (Address, TokenAmount),
        (participant2, participant2_balance): (Address, TokenAmount),
    ) -> Result<Hash, packed::Error> {
        packed::to_hash(&CooperativeSettleMessage {
            token_network: self.token_network,
            chain_id: self.chain_id,
            msg_type: MessageType::CooperativeSettle,
            channel_id,
            participant1,
            participant1_balance,
            participant2,
            participant2_balance,
        })
    }

    /// Create a balance proof the way a participant does off-chain.
    pub fn sign_balance_proof<S: Signer>(
        &self,
        signer: &S,
        channel_id: ChannelId,
        balance: &BalanceData,
        nonce: Nonce,
        additional_hash: Hash,
    ) -> Result<BalanceProof, Error> {
        let mut proof = BalanceProof {
            balance_hash: balance.balance_hash()?,
            nonce,
            additional_hash,
            signature: Signature::default(),
        };
        proof.signature = signer.sign_eth(self.balance_proof_hash(channel_id, &proof)?)?;
        Ok(proof)
    }

    /// Countersign the closer's `proof` so it can be posted after close.
    pub fn sign_balance_proof_update<S: Signer>(
        &self,
        signer: &S,
        channel_id: ChannelId,
        proof: &BalanceProof,
    ) -> Result<Signature, Error> {
        Ok(signer.sign_eth(self.balance_proof_update_hash(channel_id, proof)?)?)
    }

    pub fn sign_withdraw<S: Signer>(
        &self,
        signer: &S,
        channel_id: ChannelId,
        participant: Address,
        total_withdraw: TokenAmount,
    ) -> Result<Signature, Error> {
        Ok(signer.sign_eth(self.withdraw_hash(channel_id, participant, total_withdraw)?)?)
    }

    pub fn sign_cooperative_settle<S: Signer>(
        &self,
        signer: &S,
        channel_id: ChannelId,
        participant1: (Address, TokenAmount),
        participant2: (Address, TokenAmount),
    ) -> Result<Signature, Error> {
        Ok(signer.sign_eth(self.cooperative_settle_hash(
            channel_id,
            participant1,
            participant2,
        )?)?)
    }
}

/// A balance proof that passed [ProofVerifier::verify].
///
/// Can only be obtained through verification, so holding one means the
/// signature and the nonce were checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedProof {
    balance_hash: Hash,
    nonce: Nonce,
    additional_hash: Hash,
}

impl ValidatedProof {
    pub fn nonce(&self) -> Nonce {
        self.nonce
    }

    pub fn balance_hash(&self) -> Hash {
        self.balance_hash
    }

    pub(crate) fn apply_to(&self, record: &mut ParticipantState) {
        record.balance_hash = self.balance_hash;
        record.nonce = self.nonce;
        record.additional_hash = self.additional_hash;
    }
}

/// Checks signatures of the messages above. Stateless: the caller hands in
/// the nonce currently on record.
#[derive(Debug)]
pub struct ProofVerifier<'a, V: Verifier> {
    domain: &'a MessageDomain,
    verifier: &'a V,
}

impl<'a, V: Verifier> ProofVerifier<'a, V> {
    pub fn new(domain: &'a MessageDomain, verifier: &'a V) -> Self {
        Self { domain, verifier }
    }

    /// Fails with [ChannelError::BadSignature] unless `signature` over `hash`
    /// recovers to `expected`.
    pub fn check_signature(
        &self,
        hash: Hash,
        signature: Signature,
        expected: Address,
    ) -> Result<(), ChannelError> {
        let recovered = self.verifier.recover_signer(hash, signature).ok();
        if recovered == Some(expected) {
            Ok(())
        } else {
            Err(ChannelError::BadSignature {
                expected,
                recovered,
            })
        }
    }

    /// Verify that `proof` was signed by `signer` and is newer than
    /// `recorded_nonce`.
    pub fn verify(
        &self,
        channel_id: ChannelId,
        signer: Address,
        proof: &BalanceProof,
        recorded_nonce: Nonce,
    ) -> Result<ValidatedProof, Error> {
        let hash = self.domain.balance_proof_hash(channel_id, proof)?;
        self.check_signature(hash, proof.signature, signer)?;

        if proof.nonce <= recorded_nonce {
            return Err(ChannelError::StaleNonce {
                recorded: recorded_nonce,
                submitted: proof.nonce,
            }
            .into());
        }

        Ok(ValidatedProof {
            balance_hash: proof.balance_hash,
            nonce: proof.nonce,
            additional_hash: proof.additional_hash,
        })
    }

    /// Verify that `non_closing` authorized posting `proof` after close.
    pub fn verify_update(
        &self,
        channel_id: ChannelId,
        non_closing: Address,
        proof: &BalanceProof,
        update_signature: Signature,
    ) -> Result<(), Error> {
        let hash = self.domain.balance_proof_update_hash(channel_id, proof)?;
        Ok(self.check_signature(hash, update_signature, non_closing)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sig::{EcRecover, LocalSigner};
    use rand::{rngs::StdRng, SeedableRng};

    fn domain() -> MessageDomain {
        MessageDomain {
            token_network: Address([0x70; 20]),
            chain_id: 1.into(),
        }
    }

    fn signer(seed: u64) -> LocalSigner {
        LocalSigner::new(&mut StdRng::seed_from_u64(seed))
    }

    fn balance(transferred: u64) -> BalanceData {
        BalanceData {
            transferred_amount: transferred.into(),
            locked_amount: 0.into(),
            locksroot: Hash([0x02; 32]),
        }
    }

    const CHANNEL: ChannelId = Hash([0x11; 32]);

    #[test]
    fn balance_proof_message_layout() {
        let proof = BalanceProof {
            balance_hash: Hash([0xbb; 32]),
            nonce: 5,
            additional_hash: Hash([0xad; 32]),
            signature: Signature([0xee; 65]),
        };
        let message = domain().balance_proof_message(MessageType::BalanceProof, CHANNEL, &proof);
        let bytes = packed::to_vec(&message).unwrap();

        // address + chain id + type + channel id + balance hash + nonce + additional hash
        assert_eq!(bytes.len(), 20 + 32 + 1 + 32 + 32 + 32 + 32);
        assert_eq!(&bytes[..20], &[0x70; 20]);
        assert_eq!(bytes[20 + 31], 1);
        assert_eq!(bytes[52], MessageType::BalanceProof as u8);
        assert_eq!(&bytes[53..85], &[0x11; 32]);
        assert_eq!(bytes[20 + 32 + 1 + 32 + 32 + 31], 5);
        // The signature never is part of its own message.
        assert!(!bytes.windows(4).any(|w| w == [0xee; 4]));
    }

    #[test]
    fn update_hash_covers_closing_signature() {
        let mut proof = BalanceProof {
            nonce: 1,
            ..BalanceProof::default()
        };
        let h1 = domain().balance_proof_update_hash(CHANNEL, &proof).unwrap();
        proof.signature.0[0] = 1;
        let h2 = domain().balance_proof_update_hash(CHANNEL, &proof).unwrap();
        assert_ne!(h1, h2);
        // ... while the balance proof hash itself does not change.
        assert_eq!(
            domain().balance_proof_hash(CHANNEL, &proof).unwrap(),
            domain()
                .balance_proof_hash(CHANNEL, &BalanceProof { signature: Signature::default(), ..proof })
                .unwrap()
        );
    }

    #[test]
    fn verify_accepts_owner_signature() {
        let bob = signer(2);
        let proof = domain()
            .sign_balance_proof(&bob, CHANNEL, &balance(5), 3, Hash([0x02; 32]))
            .unwrap();

        let d = domain();
        let verified = ProofVerifier::new(&d, &EcRecover::default())
            .verify(CHANNEL, bob.address(), &proof, 0)
            .unwrap();
        assert_eq!(verified.nonce(), 3);
        assert_eq!(verified.balance_hash(), balance(5).balance_hash().unwrap());
    }

    #[test]
    fn verify_rejects_foreign_signature() {
        let (bob, charlie) = (signer(2), signer(3));
        let proof = domain()
            .sign_balance_proof(&charlie, CHANNEL, &balance(5), 3, Hash::default())
            .unwrap();

        let d = domain();
        match ProofVerifier::new(&d, &EcRecover::default()).verify(CHANNEL, bob.address(), &proof, 0) {
            Err(Error::Rejected(ChannelError::BadSignature {
                expected,
                recovered,
            })) => {
                assert_eq!(expected, bob.address());
                assert_eq!(recovered, Some(charlie.address()));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn verify_rejects_other_channel_and_network() {
        let bob = signer(2);
        let proof = domain()
            .sign_balance_proof(&bob, CHANNEL, &balance(5), 3, Hash::default())
            .unwrap();

        let d = domain();
        let verifier = EcRecover::default();
        assert!(ProofVerifier::new(&d, &verifier)
            .verify(Hash([0x12; 32]), bob.address(), &proof, 0)
            .is_err());

        let other = MessageDomain {
            chain_id: 2.into(),
            ..domain()
        };
        assert!(ProofVerifier::new(&other, &verifier)
            .verify(CHANNEL, bob.address(), &proof, 0)
            .is_err());
    }

    #[test]
    fn verify_rejects_stale_nonce() {
        let bob = signer(2);
        let proof = domain()
            .sign_balance_proof(&bob, CHANNEL, &balance(5), 3, Hash::default())
            .unwrap();

        let d = domain();
        let verifier = EcRecover::default();
        for recorded in [3, 4] {
            match ProofVerifier::new(&d, &verifier).verify(CHANNEL, bob.address(), &proof, recorded) {
                Err(Error::Rejected(ChannelError::StaleNonce {
                    recorded: r,
                    submitted: 3,
                })) => assert_eq!(r, recorded),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn malformed_signature_is_bad_signature() {
        let proof = BalanceProof {
            nonce: 1,
            ..BalanceProof::default()
        };
        let d = domain();
        assert!(matches!(
            ProofVerifier::new(&d, &EcRecover::default()).verify(CHANNEL, Address([1; 20]), &proof, 0),
            Err(Error::Rejected(ChannelError::BadSignature { recovered: None, .. }))
        ));
    }

    #[test]
    fn empty_record_matches_only_empty_data() {
        let record = ParticipantState::default();
        assert!(BalanceData::default().matches(&record).unwrap());
        assert!(!balance(1).matches(&record).unwrap());
    }

    #[test]
    fn recorded_hash_must_match() {
        let record = ParticipantState {
            balance_hash: balance(5).balance_hash().unwrap(),
            nonce: 3,
            ..ParticipantState::default()
        };
        assert!(balance(5).matches(&record).unwrap());
        assert!(!balance(6).matches(&record).unwrap());
        assert!(!BalanceData::default().matches(&record).unwrap());
    }
}
