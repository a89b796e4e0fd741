//! The token network: the public call surface and the channel state machine.

use tracing::{debug, info};

use super::{
    registry::{ChannelCell, Registry},
    settlement::{self, SettlementInput, SettlementOutcome},
    BalanceProof, Channel, ChannelId, ChannelInfo, ChannelState, MessageDomain, PartIdx,
    ParticipantInfo, ParticipantPair, ProofVerifier, SettleClaim,
};
use crate::{
    config::{ConfigError, NetworkConfig},
    error::{ArgumentError, ChannelError, Result},
    events::{ChannelEvent, EventSink},
    host::{BlockClock, TokenVault},
    sig::Verifier,
    types::{Address, Signature, TokenAmount},
};

/// Manages all payment channels of one token.
///
/// Calls on the same channel are serialized, calls on different channels
/// run independently. A call that returns an error has changed nothing:
/// every check happens before the single vault call, and state is only
/// written after that call succeeded.
#[derive(Debug)]
pub struct TokenNetwork<V, C, T, E> {
    config: NetworkConfig,
    domain: MessageDomain,
    verifier: V,
    clock: C,
    vault: T,
    events: E,
    registry: Registry,
}

fn traced<R>(op: &'static str, call: impl FnOnce() -> Result<R>) -> Result<R> {
    call().map_err(|e| {
        match e.rejection() {
            Some(rejection) => debug!(op, %rejection, "call rejected"),
            None => debug!(op, error = %e, "invalid call"),
        }
        e
    })
}

fn index_of(channel: &Channel, participant: Address) -> Result<PartIdx, ArgumentError> {
    channel
        .participants()
        .index_of(participant)
        .ok_or(ArgumentError::NotParticipant(participant, channel.id()))
}

fn expect_opened(channel: &Channel) -> Result<(), ChannelError> {
    match channel.state() {
        ChannelState::Opened => Ok(()),
        state => Err(ChannelError::NotOpen(state)),
    }
}

fn expect_closed(channel: &Channel) -> Result<(), ChannelError> {
    match channel.state() {
        ChannelState::Closed => Ok(()),
        state => Err(ChannelError::NotClosed(state)),
    }
}

impl<V, C, T, E> TokenNetwork<V, C, T, E>
where
    V: Verifier,
    C: BlockClock,
    T: TokenVault,
    E: EventSink,
{
    pub fn new(
        config: NetworkConfig,
        verifier: V,
        clock: C,
        vault: T,
        events: E,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(TokenNetwork {
            domain: MessageDomain::from(&config),
            config,
            verifier,
            clock,
            vault,
            events,
            registry: Registry::default(),
        })
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// The domain participants have to sign their messages in.
    pub fn domain(&self) -> &MessageDomain {
        &self.domain
    }

    fn proof_verifier(&self) -> ProofVerifier<'_, V> {
        ProofVerifier::new(&self.domain, &self.verifier)
    }

    /// Latest channel of the pair, if any.
    fn find(&self, participant: Address, partner: Address) -> Result<Option<ChannelCell>> {
        if participant.is_zero() {
            return Err(ArgumentError::InvalidAddress("participant").into());
        }
        if partner.is_zero() {
            return Err(ArgumentError::InvalidAddress("partner").into());
        }
        let pair = ParticipantPair::new(participant, partner)?;
        Ok(self.registry.find(&pair))
    }

    /// Open a channel between `a` and `b`, which must not have an open or
    /// closed channel already.
    pub fn open_channel(&self, a: Address, b: Address, settle_timeout: u64) -> Result<ChannelId> {
        traced("open_channel", || {
            let pair = ParticipantPair::new(a, b)?;
            self.config.check_settle_timeout(settle_timeout)?;

            self.registry
                .open(pair, settle_timeout, self.clock.current_block(), |channel| {
                    let [participant1, participant2] = pair.participants();
                    info!(channel_id = ?channel.id(), ?participant1, ?participant2, settle_timeout, "channel opened");
                    self.events.emit(ChannelEvent::ChannelOpened {
                        channel_id: channel.id(),
                        participant1,
                        participant2,
                        settle_timeout,
                    });
                })
        })
    }

    /// Raise the deposit of `participant` to `total_deposit`, moving the
    /// difference into escrow.
    pub fn set_deposit(
        &self,
        participant: Address,
        total_deposit: TokenAmount,
        partner: Address,
    ) -> Result<()> {
        traced("set_deposit", || {
            let cell = self
                .find(participant, partner)?
                .ok_or(ChannelError::NotOpen(ChannelState::Nonexistent))?;
            let mut channel = cell.lock();
            expect_opened(&channel)?;
            let idx = index_of(&channel, participant)?;
            let delta = channel.deposit_delta(idx, total_deposit)?;

            self.vault.deposit(channel.id(), participant, delta)?;
            channel.record_mut(idx).deposit = total_deposit;

            info!(channel_id = ?channel.id(), ?participant, %total_deposit, "deposit increased");
            self.events.emit(ChannelEvent::DepositIncreased {
                channel_id: channel.id(),
                participant,
                total_deposit,
            });
            Ok(())
        })
    }

    /// Raise the withdrawn total of `participant` to `total_withdraw` while
    /// the channel stays open. Both participants have to sign the withdraw
    /// message.
    pub fn set_total_withdraw(
        &self,
        participant: Address,
        total_withdraw: TokenAmount,
        partner: Address,
        participant_signature: Signature,
        partner_signature: Signature,
    ) -> Result<()> {
        traced("set_total_withdraw", || {
            let cell = self
                .find(participant, partner)?
                .ok_or(ChannelError::NotOpen(ChannelState::Nonexistent))?;
            let mut channel = cell.lock();
            expect_opened(&channel)?;
            let idx = index_of(&channel, participant)?;

            let hash = self
                .domain
                .withdraw_hash(channel.id(), participant, total_withdraw)?;
            let verifier = self.proof_verifier();
            verifier.check_signature(hash, participant_signature, participant)?;
            verifier.check_signature(hash, partner_signature, partner)?;

            let delta = channel.withdraw_delta(idx, total_withdraw)?;
            self.vault.pay_out(channel.id(), &[(participant, delta)])?;
            channel.record_mut(idx).withdrawn = total_withdraw;

            info!(channel_id = ?channel.id(), ?participant, %total_withdraw, "withdraw increased");
            self.events.emit(ChannelEvent::WithdrawIncreased {
                channel_id: channel.id(),
                participant,
                total_withdraw,
            });
            Ok(())
        })
    }

    /// Close the channel, optionally recording the latest balance proof the
    /// closer received from `partner`.
    ///
    /// A proof with nonce 0 stands for "nothing received" and is neither
    /// verified nor recorded.
    pub fn close_channel(
        &self,
        closer: Address,
        partner: Address,
        proof: &BalanceProof,
    ) -> Result<()> {
        traced("close_channel", || {
            let cell = self
                .find(closer, partner)?
                .ok_or(ChannelError::NotOpen(ChannelState::Nonexistent))?;
            let mut channel = cell.lock();
            expect_opened(&channel)?;
            let closer_idx = index_of(&channel, closer)?;
            let partner_idx = ParticipantPair::other(closer_idx);

            let validated = if proof.is_empty() {
                None
            } else {
                Some(self.proof_verifier().verify(
                    channel.id(),
                    partner,
                    proof,
                    channel.record(partner_idx).nonce,
                )?)
            };

            let block = self.clock.current_block();
            channel.close(closer_idx, block);
            if let Some(validated) = validated {
                validated.apply_to(channel.record_mut(partner_idx));
            }

            info!(
                channel_id = ?channel.id(),
                ?closer,
                nonce = proof.nonce,
                settle_block = ?channel.settle_block(),
                "channel closed"
            );
            self.events.emit(ChannelEvent::ChannelClosed {
                channel_id: channel.id(),
                closing_participant: closer,
                nonce: proof.nonce,
            });
            Ok(())
        })
    }

    /// Replace the closer's recorded balance proof with a newer one during
    /// the settle window.
    ///
    /// `proof` is signed by `closing`, `non_closing_signature` is the
    /// non-closing participant's signature over the update message. Anyone
    /// holding both can submit the call. Only one update per close is
    /// accepted.
    pub fn update_non_closing_balance_proof(
        &self,
        closing: Address,
        non_closing: Address,
        proof: &BalanceProof,
        non_closing_signature: Signature,
    ) -> Result<()> {
        traced("update_non_closing_balance_proof", || {
            let cell = self
                .find(closing, non_closing)?
                .ok_or(ChannelError::NotClosed(ChannelState::Nonexistent))?;
            let mut channel = cell.lock();
            expect_closed(&channel)?;
            let closing_idx = index_of(&channel, closing)?;
            if !channel.record(closing_idx).is_closer {
                return Err(ChannelError::NotCloser(closing).into());
            }

            if let Some(settle_block) = channel.settle_block() {
                if self.clock.current_block() >= settle_block {
                    return Err(ChannelError::UpdateAfterSettleWindow { settle_block }.into());
                }
            }
            if channel.is_updated() {
                return Err(ChannelError::AlreadyUpdated.into());
            }

            let verifier = self.proof_verifier();
            verifier.verify_update(channel.id(), non_closing, proof, non_closing_signature)?;
            let validated = verifier.verify(
                channel.id(),
                closing,
                proof,
                channel.record(closing_idx).nonce,
            )?;

            validated.apply_to(channel.record_mut(closing_idx));
            channel.mark_updated();

            info!(channel_id = ?channel.id(), participant = ?closing, nonce = proof.nonce, "transfer updated");
            self.events.emit(ChannelEvent::TransferUpdated {
                channel_id: channel.id(),
                participant: closing,
                nonce: proof.nonce,
            });
            Ok(())
        })
    }

    /// Pay out the escrow of a closed channel once its settle window has
    /// elapsed.
    ///
    /// Each claim reveals the balance data behind the participant's recorded
    /// balance hash. Locked amounts stay in escrow.
    pub fn settle_channel(
        &self,
        claim1: SettleClaim,
        claim2: SettleClaim,
    ) -> Result<SettlementOutcome> {
        traced("settle_channel", || {
            let cell = self
                .find(claim1.participant, claim2.participant)?
                .ok_or(ChannelError::NotClosed(ChannelState::Nonexistent))?;
            let mut channel = cell.lock();
            expect_closed(&channel)?;

            let current = self.clock.current_block();
            if let Some(settle_block) = channel.settle_block() {
                if current < settle_block {
                    return Err(ChannelError::SettleWindowNotElapsed {
                        settle_block,
                        current,
                    }
                    .into());
                }
            }

            let mut inputs = [SettlementInput::default(); 2];
            for (input, claim) in inputs.iter_mut().zip([&claim1, &claim2]) {
                let record = channel.record(index_of(&channel, claim.participant)?);
                if !claim.balance.matches(record)? {
                    return Err(ChannelError::BalanceHashMismatch(claim.participant).into());
                }
                *input = SettlementInput {
                    deposit: record.deposit,
                    withdrawn: record.withdrawn,
                    transferred: claim.balance.transferred_amount,
                    locked: claim.balance.locked_amount,
                };
            }

            let outcome = settlement::settle(&inputs[0], &inputs[1]);
            self.vault.pay_out(
                channel.id(),
                &[
                    (claim1.participant, outcome.participant1.amount),
                    (claim2.participant, outcome.participant2.amount),
                ],
            )?;
            channel.settle(current);

            self.settled(&channel, &outcome, claim1.participant, claim2.participant);
            Ok(outcome)
        })
    }

    /// Settle an open channel right away with balances both participants
    /// agreed on. The balances must add up to the channel's escrow.
    pub fn cooperative_settle(
        &self,
        participant1: (Address, TokenAmount),
        participant2: (Address, TokenAmount),
        signature1: Signature,
        signature2: Signature,
    ) -> Result<SettlementOutcome> {
        traced("cooperative_settle", || {
            let cell = self
                .find(participant1.0, participant2.0)?
                .ok_or(ChannelError::NotOpen(ChannelState::Nonexistent))?;
            let mut channel = cell.lock();
            expect_opened(&channel)?;

            let hash = self
                .domain
                .cooperative_settle_hash(channel.id(), participant1, participant2)?;
            let verifier = self.proof_verifier();
            verifier.check_signature(hash, signature1, participant1.0)?;
            verifier.check_signature(hash, signature2, participant2.0)?;

            if participant1.1.checked_add(participant2.1) != Some(channel.total_available()) {
                return Err(ChannelError::BalanceSumMismatch.into());
            }

            self.vault.pay_out(channel.id(), &[participant1, participant2])?;
            channel.settle(self.clock.current_block());

            let outcome = SettlementOutcome {
                participant1: settlement::Payout {
                    amount: participant1.1,
                    locked_withheld: TokenAmount::zero(),
                },
                participant2: settlement::Payout {
                    amount: participant2.1,
                    locked_withheld: TokenAmount::zero(),
                },
            };
            self.settled(&channel, &outcome, participant1.0, participant2.0);
            Ok(outcome)
        })
    }

    fn settled(
        &self,
        channel: &Channel,
        outcome: &SettlementOutcome,
        participant1: Address,
        participant2: Address,
    ) {
        info!(
            channel_id = ?channel.id(),
            ?participant1,
            participant1_amount = %outcome.participant1.amount,
            ?participant2,
            participant2_amount = %outcome.participant2.amount,
            "channel settled"
        );
        self.events.emit(ChannelEvent::ChannelSettled {
            channel_id: channel.id(),
            participant1_amount: outcome.participant1.amount,
            participant2_amount: outcome.participant2.amount,
        });
    }

    /// Identifier, settle block and state of the latest channel between `a`
    /// and `b`. Reports [ChannelState::Nonexistent] for unknown pairs.
    pub fn get_channel_info(&self, a: Address, b: Address) -> Result<ChannelInfo> {
        Ok(self
            .find(a, b)?
            .map(|cell| ChannelInfo::from(&*cell.lock()))
            .unwrap_or_else(ChannelInfo::nonexistent))
    }

    /// Bookkeeping of `participant` in its latest channel with `partner`. All
    /// zero for unknown pairs.
    pub fn get_channel_participant_info(
        &self,
        participant: Address,
        partner: Address,
    ) -> Result<ParticipantInfo> {
        Ok(self
            .find(participant, partner)?
            .and_then(|cell| cell.lock().participant(participant).map(ParticipantInfo::from))
            .unwrap_or_default())
    }

    /// Snapshot of a channel by identifier, including settled ones.
    pub fn channel(&self, id: &ChannelId) -> Option<Channel> {
        self.registry.get(id).map(|cell| cell.lock().clone())
    }

    /// Number of channels ever opened.
    pub fn channel_count(&self) -> usize {
        self.registry.len()
    }
}
