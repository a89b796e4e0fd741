//! Final distribution of a channel's escrow.
//!
//! Pure arithmetic on [TokenAmount], never wrapping: the escrow a channel
//! holds is never exceeded, no matter what the (signed but possibly
//! nonsensical) balance proofs claim.

use core::cmp::min;

use crate::types::TokenAmount;

/// Everything the settlement needs to know about one participant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettlementInput {
    pub deposit: TokenAmount,
    pub withdrawn: TokenAmount,
    /// Amount this participant sent off-chain, from its partner's claim.
    pub transferred: TokenAmount,
    /// Amount this participant sent in pending locks.
    pub locked: TokenAmount,
}

impl SettlementInput {
    fn max_transferred(&self) -> TokenAmount {
        self.transferred.saturating_add(self.locked)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Payout {
    /// Paid out to the participant on settlement.
    pub amount: TokenAmount,
    /// Stays in escrow until the partner's pending locks are resolved.
    pub locked_withheld: TokenAmount,
}

impl Payout {
    fn new(entitled: TokenAmount, partner_locked: TokenAmount) -> Self {
        let locked_withheld = min(entitled, partner_locked);
        Payout {
            amount: entitled - locked_withheld,
            locked_withheld,
        }
    }

    pub fn total(&self) -> TokenAmount {
        self.amount + self.locked_withheld
    }
}

/// Payouts in the same order as the inputs passed to [settle].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettlementOutcome {
    pub participant1: Payout,
    pub participant2: Payout,
}

/// Tokens held in escrow: both deposits minus both withdrawals.
///
/// Withdrawals are bounded by both deposits together, not by the own deposit,
/// so the difference can only be taken over the sums. `None` if the
/// withdrawals exceed the deposits.
pub fn escrow(deposits: [TokenAmount; 2], withdrawn: [TokenAmount; 2]) -> Option<TokenAmount> {
    let deposits = deposits[0].checked_add(deposits[1])?;
    let withdrawn = withdrawn[0].checked_add(withdrawn[1])?;
    deposits.checked_sub(withdrawn)
}

/// Split the escrow between both participants.
///
/// The participant that transferred less (including locks) is the net
/// receiver. It gets the difference on top of its own deposit minus its
/// withdrawals, capped at what the channel holds. The partner gets the rest.
/// Pending locks were credited to the partner of whoever locked them, so
/// they are withheld from that partner's amount.
pub fn settle(p1: &SettlementInput, p2: &SettlementInput) -> SettlementOutcome {
    let total = escrow([p1.deposit, p2.deposit], [p1.withdrawn, p2.withdrawn]).unwrap_or_default();

    let p1_receives = p1.max_transferred() <= p2.max_transferred();
    let (receiver, sender) = if p1_receives { (p1, p2) } else { (p2, p1) };

    let receivable = (sender.max_transferred() - receiver.max_transferred())
        .saturating_add(receiver.deposit)
        .saturating_sub(receiver.withdrawn);
    let receiver_amount = min(receivable, total);
    let sender_amount = total - receiver_amount;

    let (amount1, amount2) = if p1_receives {
        (receiver_amount, sender_amount)
    } else {
        (sender_amount, receiver_amount)
    };

    SettlementOutcome {
        participant1: Payout::new(amount1, p2.locked),
        participant2: Payout::new(amount2, p1.locked),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn input(deposit: u64, withdrawn: u64, transferred: u64, locked: u64) -> SettlementInput {
        SettlementInput {
            deposit: deposit.into(),
            withdrawn: withdrawn.into(),
            transferred: transferred.into(),
            locked: locked.into(),
        }
    }

    fn amounts(outcome: &SettlementOutcome) -> (u64, u64) {
        (
            outcome.participant1.amount.as_u64(),
            outcome.participant2.amount.as_u64(),
        )
    }

    #[test]
    fn nothing_transferred_returns_deposits() {
        let outcome = settle(&input(20, 0, 0, 0), &input(7, 0, 0, 0));
        assert_eq!(amounts(&outcome), (20, 7));
    }

    #[test]
    fn net_transfer_moves_to_receiver() {
        // A deposited 20 and sent 10, B sent 5 back.
        let outcome = settle(&input(20, 0, 10, 0), &input(0, 0, 5, 0));
        assert_eq!(amounts(&outcome), (15, 5));

        // Argument order does not matter.
        let outcome = settle(&input(0, 0, 5, 0), &input(20, 0, 10, 0));
        assert_eq!(amounts(&outcome), (5, 15));
    }

    #[test]
    fn receiver_is_capped_at_escrow() {
        // B claims A sent far more than A ever deposited.
        let outcome = settle(&input(10, 0, 1_000, 0), &input(5, 0, 0, 0));
        assert_eq!(amounts(&outcome), (0, 15));
    }

    #[test]
    fn withdrawals_reduce_the_escrow() {
        let outcome = settle(&input(20, 5, 10, 0), &input(10, 10, 0, 0));
        // total = 15 + 0, B receives 10 + 10 - 10 = 10.
        assert_eq!(amounts(&outcome), (5, 10));
    }

    #[test]
    fn overdrawn_participant_gets_nothing() {
        // A withdrew its own 10 and 5 of B's deposit.
        let outcome = settle(&input(10, 15, 0, 0), &input(5, 0, 0, 0));
        assert_eq!(amounts(&outcome), (0, 0));

        let outcome = settle(&input(10, 12, 0, 0), &input(5, 0, 0, 0));
        assert_eq!(amounts(&outcome), (0, 3));
        assert_eq!(
            escrow([10.into(), 5.into()], [12.into(), 0.into()]),
            Some(3.into())
        );
    }

    #[test]
    fn escrow_rejects_overdraw() {
        assert_eq!(escrow([10.into(), 5.into()], [12.into(), 4.into()]), None);
        assert_eq!(
            escrow([TokenAmount::MAX, 1.into()], [0.into(), 0.into()]),
            None
        );
    }

    #[test]
    fn locked_amounts_are_withheld_from_the_partner() {
        // A sent 5 and locked 4 more. B is credited 10 + 9 but only 10 + 5
        // are final, the 4 stay in escrow until the locks resolve.
        let outcome = settle(&input(20, 0, 5, 4), &input(10, 0, 0, 0));
        assert_eq!(
            outcome.participant1,
            Payout {
                amount: 11.into(),
                locked_withheld: 0.into()
            }
        );
        assert_eq!(
            outcome.participant2,
            Payout {
                amount: 15.into(),
                locked_withheld: 4.into()
            }
        );
    }

    #[test]
    fn withheld_never_exceeds_entitlement() {
        let outcome = settle(&input(5, 0, 0, 100), &input(5, 0, 0, 0));
        // A's locks exceed everything: all 10 are credited to B and all of
        // it stays locked.
        assert_eq!(outcome.participant1, Payout::default());
        assert_eq!(
            outcome.participant2,
            Payout {
                amount: 0.into(),
                locked_withheld: 10.into()
            }
        );
    }

    #[test]
    fn saturates_on_huge_claims() {
        let huge = SettlementInput {
            deposit: 3.into(),
            withdrawn: 0.into(),
            transferred: TokenAmount::MAX,
            locked: TokenAmount::MAX,
        };
        let outcome = settle(&huge, &input(4, 0, 0, 0));
        assert_eq!(
            outcome.participant1.total() + outcome.participant2.total(),
            7.into()
        );
    }

    /// Two participants whose withdrawals together stay within their
    /// deposits together, the bound enforced when withdrawing.
    fn arb_pair() -> impl Strategy<Value = (SettlementInput, SettlementInput)> {
        (0..1_000u64, 0..1_000u64)
            .prop_flat_map(|(d1, d2)| (Just(d1), Just(d2), 0..=d1 + d2))
            .prop_flat_map(|(d1, d2, w1)| {
                (
                    Just((d1, d2, w1)),
                    0..=d1 + d2 - w1,
                    (0..5_000u64, 0..1_000u64),
                    (0..5_000u64, 0..1_000u64),
                )
            })
            .prop_map(|((d1, d2, w1), w2, (t1, l1), (t2, l2))| {
                (input(d1, w1, t1, l1), input(d2, w2, t2, l2))
            })
    }

    fn signed(amount: TokenAmount) -> i128 {
        amount.as_u64().into()
    }

    proptest! {
        #[test]
        fn conserves_the_escrow((p1, p2) in arb_pair()) {
            let outcome = settle(&p1, &p2);
            let total = escrow([p1.deposit, p2.deposit], [p1.withdrawn, p2.withdrawn]).unwrap();
            prop_assert_eq!(outcome.participant1.total() + outcome.participant2.total(), total);
            prop_assert!(outcome.participant1.amount + outcome.participant2.amount <= p1.deposit + p2.deposit);
        }

        #[test]
        fn pending_locks_are_never_paid_out((p1, p2) in arb_pair()) {
            let outcome = settle(&p1, &p2);
            for (payout, own, partner) in [(outcome.participant1, p1, p2), (outcome.participant2, p2, p1)] {
                let earned = signed(own.deposit) - signed(own.withdrawn) + signed(partner.transferred);
                prop_assert!(signed(payout.amount) <= earned.max(0));
            }
        }

        #[test]
        fn symmetric((p1, p2) in arb_pair()) {
            let forward = settle(&p1, &p2);
            let backward = settle(&p2, &p1);
            prop_assert_eq!(forward.participant1, backward.participant2);
            prop_assert_eq!(forward.participant2, backward.participant1);
        }
    }
}
