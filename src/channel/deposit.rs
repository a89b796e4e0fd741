//! Cumulative deposit and withdraw bookkeeping.
//!
//! Callers always name the new *total*, never a delta. Replaying a call is
//! therefore harmless: the second attempt is simply not increasing anymore.

use super::{Channel, PartIdx, ParticipantPair};
use crate::{error::ChannelError, types::TokenAmount};

impl Channel {
    /// Amount that has to be moved into escrow to raise the deposit of `idx`
    /// to `total_deposit`.
    pub(crate) fn deposit_delta(
        &self,
        idx: PartIdx,
        total_deposit: TokenAmount,
    ) -> Result<TokenAmount, ChannelError> {
        let recorded = self.record(idx).deposit;
        if total_deposit <= recorded {
            return Err(ChannelError::NonIncreasingDeposit(recorded));
        }
        Ok(total_deposit - recorded)
    }

    /// Amount that has to be paid out of escrow to raise the withdrawn total
    /// of `idx` to `total_withdraw`.
    ///
    /// Withdrawals of both participants together can never exceed their
    /// deposits together, otherwise settlement would pay out tokens the
    /// escrow does not hold.
    pub(crate) fn withdraw_delta(
        &self,
        idx: PartIdx,
        total_withdraw: TokenAmount,
    ) -> Result<TokenAmount, ChannelError> {
        let own = self.record(idx);
        let partner = self.record(ParticipantPair::other(idx));
        if total_withdraw <= own.withdrawn {
            return Err(ChannelError::NonIncreasingWithdraw(own.withdrawn));
        }

        let total_deposit = own
            .deposit
            .checked_add(partner.deposit)
            .ok_or(ChannelError::InsufficientChannelBalance)?;
        let total_withdrawn = total_withdraw
            .checked_add(partner.withdrawn)
            .ok_or(ChannelError::InsufficientChannelBalance)?;
        if total_withdrawn > total_deposit {
            return Err(ChannelError::InsufficientChannelBalance);
        }
        Ok(total_withdraw - own.withdrawn)
    }
}
