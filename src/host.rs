//! Interfaces to the ledger hosting the token network.
//!
//! The channel logic only needs to know the current block and to move tokens
//! in and out of channel escrow. Both are injected so the same code runs
//! against a real chain adapter or the in-memory simulation below.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;
use thiserror::Error;

use crate::{
    channel::ChannelId,
    types::{Address, BlockNumber, TokenAmount},
};

/// Source of the current block height.
pub trait BlockClock {
    fn current_block(&self) -> BlockNumber;
}

impl<T: BlockClock + ?Sized> BlockClock for &T {
    fn current_block(&self) -> BlockNumber {
        (**self).current_block()
    }
}

impl<T: BlockClock + ?Sized> BlockClock for Arc<T> {
    fn current_block(&self) -> BlockNumber {
        (**self).current_block()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    #[error("{account:?} holds {available} tokens, {needed} needed")]
    InsufficientBalance {
        account: Address,
        needed: TokenAmount,
        available: TokenAmount,
    },
    #[error("escrow of {channel:?} holds {available} tokens, {needed} needed")]
    InsufficientEscrow {
        channel: ChannelId,
        needed: TokenAmount,
        available: TokenAmount,
    },
}

/// Token custody for channel deposits.
///
/// Each call must either apply completely or not at all.
pub trait TokenVault {
    /// Debit `from` and credit the escrow of `channel`.
    fn deposit(
        &self,
        channel: ChannelId,
        from: Address,
        amount: TokenAmount,
    ) -> Result<(), VaultError>;

    /// Debit the escrow of `channel` and credit every receiver.
    fn pay_out(
        &self,
        channel: ChannelId,
        transfers: &[(Address, TokenAmount)],
    ) -> Result<(), VaultError>;
}

impl<T: TokenVault + ?Sized> TokenVault for &T {
    fn deposit(
        &self,
        channel: ChannelId,
        from: Address,
        amount: TokenAmount,
    ) -> Result<(), VaultError> {
        (**self).deposit(channel, from, amount)
    }

    fn pay_out(
        &self,
        channel: ChannelId,
        transfers: &[(Address, TokenAmount)],
    ) -> Result<(), VaultError> {
        (**self).pay_out(channel, transfers)
    }
}

impl<T: TokenVault + ?Sized> TokenVault for Arc<T> {
    fn deposit(
        &self,
        channel: ChannelId,
        from: Address,
        amount: TokenAmount,
    ) -> Result<(), VaultError> {
        (**self).deposit(channel, from, amount)
    }

    fn pay_out(
        &self,
        channel: ChannelId,
        transfers: &[(Address, TokenAmount)],
    ) -> Result<(), VaultError> {
        (**self).pay_out(channel, transfers)
    }
}

/// Block height driven by hand, for simulations and tests.
#[derive(Debug, Default)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn new(block: BlockNumber) -> Self {
        Self(AtomicU64::new(block))
    }

    /// Mine `blocks` empty blocks.
    pub fn advance(&self, blocks: u64) -> BlockNumber {
        self.0.fetch_add(blocks, Ordering::SeqCst) + blocks
    }

    pub fn set(&self, block: BlockNumber) {
        self.0.store(block, Ordering::SeqCst);
    }
}

impl BlockClock for ManualClock {
    fn current_block(&self) -> BlockNumber {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct Ledger {
    balances: HashMap<Address, TokenAmount>,
    escrow: HashMap<ChannelId, TokenAmount>,
}

/// Token balances kept in memory.
#[derive(Debug, Default)]
pub struct InMemoryVault {
    ledger: Mutex<Ledger>,
}

impl InMemoryVault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `amount` new tokens for `account`.
    pub fn mint(&self, account: Address, amount: TokenAmount) {
        let mut ledger = self.ledger.lock();
        let balance = ledger.balances.entry(account).or_default();
        *balance = balance.saturating_add(amount);
    }

    pub fn balance_of(&self, account: Address) -> TokenAmount {
        self.ledger
            .lock()
            .balances
            .get(&account)
            .copied()
            .unwrap_or_default()
    }

    pub fn escrow_of(&self, channel: ChannelId) -> TokenAmount {
        self.ledger
            .lock()
            .escrow
            .get(&channel)
            .copied()
            .unwrap_or_default()
    }
}

impl TokenVault for InMemoryVault {
    fn deposit(
        &self,
        channel: ChannelId,
        from: Address,
        amount: TokenAmount,
    ) -> Result<(), VaultError> {
        let mut ledger = self.ledger.lock();
        let available = ledger.balances.get(&from).copied().unwrap_or_default();
        if available < amount {
            return Err(VaultError::InsufficientBalance {
                account: from,
                needed: amount,
                available,
            });
        }
        ledger.balances.insert(from, available - amount);
        let escrow = ledger.escrow.entry(channel).or_default();
        *escrow = escrow.saturating_add(amount);
        Ok(())
    }

    fn pay_out(
        &self,
        channel: ChannelId,
        transfers: &[(Address, TokenAmount)],
    ) -> Result<(), VaultError> {
        let mut ledger = self.ledger.lock();
        let available = ledger.escrow.get(&channel).copied().unwrap_or_default();
        let needed = transfers
            .iter()
            .fold(TokenAmount::zero(), |sum, (_, amount)| sum.saturating_add(*amount));
        if available < needed {
            return Err(VaultError::InsufficientEscrow {
                channel,
                needed,
                available,
            });
        }
        ledger.escrow.insert(channel, available - needed);
        for (receiver, amount) in transfers {
            let balance = ledger.balances.entry(*receiver).or_default();
            *balance = balance.saturating_add(*amount);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Hash;

    #[test]
    fn clock_advances() {
        let clock = ManualClock::new(10);
        assert_eq!(clock.advance(5), 15);
        assert_eq!(clock.current_block(), 15);
        clock.set(3);
        assert_eq!(clock.current_block(), 3);
    }

    #[test]
    fn deposit_moves_tokens_into_escrow() {
        let vault = InMemoryVault::new();
        let alice = Address([1; 20]);
        let channel = Hash([7; 32]);
        vault.mint(alice, 100.into());

        vault.deposit(channel, alice, 30.into()).unwrap();
        assert_eq!(vault.balance_of(alice), 70.into());
        assert_eq!(vault.escrow_of(channel), 30.into());
    }

    #[test]
    fn failed_deposit_changes_nothing() {
        let vault = InMemoryVault::new();
        let alice = Address([1; 20]);
        let channel = Hash([7; 32]);
        vault.mint(alice, 10.into());

        let err = vault.deposit(channel, alice, 11.into()).unwrap_err();
        assert_eq!(
            err,
            VaultError::InsufficientBalance {
                account: alice,
                needed: 11.into(),
                available: 10.into(),
            }
        );
        assert_eq!(vault.balance_of(alice), 10.into());
        assert_eq!(vault.escrow_of(channel), 0.into());
    }

    #[test]
    fn pay_out_is_all_or_nothing() {
        let vault = InMemoryVault::new();
        let (alice, bob) = (Address([1; 20]), Address([2; 20]));
        let channel = Hash([7; 32]);
        vault.mint(alice, 20.into());
        vault.deposit(channel, alice, 20.into()).unwrap();

        assert!(vault
            .pay_out(channel, &[(alice, 15.into()), (bob, 6.into())])
            .is_err());
        assert_eq!(vault.balance_of(bob), 0.into());
        assert_eq!(vault.escrow_of(channel), 20.into());

        vault
            .pay_out(channel, &[(alice, 15.into()), (bob, 5.into())])
            .unwrap();
        assert_eq!(vault.balance_of(alice), 15.into());
        assert_eq!(vault.balance_of(bob), 5.into());
        assert_eq!(vault.escrow_of(channel), 0.into());
    }
}
