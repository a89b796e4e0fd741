//! Events emitted by the token network for off-chain watchers.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    channel::ChannelId,
    types::{Address, Nonce, TokenAmount},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    ChannelOpened {
        channel_id: ChannelId,
        participant1: Address,
        participant2: Address,
        settle_timeout: u64,
    },
    DepositIncreased {
        channel_id: ChannelId,
        participant: Address,
        total_deposit: TokenAmount,
    },
    WithdrawIncreased {
        channel_id: ChannelId,
        participant: Address,
        total_withdraw: TokenAmount,
    },
    ChannelClosed {
        channel_id: ChannelId,
        closing_participant: Address,
        nonce: Nonce,
    },
    /// The recorded balance proof of `participant` was replaced after close.
    TransferUpdated {
        channel_id: ChannelId,
        participant: Address,
        nonce: Nonce,
    },
    ChannelSettled {
        channel_id: ChannelId,
        participant1_amount: TokenAmount,
        participant2_amount: TokenAmount,
    },
}

impl ChannelEvent {
    pub fn channel_id(&self) -> ChannelId {
        match self {
            ChannelEvent::ChannelOpened { channel_id, .. }
            | ChannelEvent::DepositIncreased { channel_id, .. }
            | ChannelEvent::WithdrawIncreased { channel_id, .. }
            | ChannelEvent::ChannelClosed { channel_id, .. }
            | ChannelEvent::TransferUpdated { channel_id, .. }
            | ChannelEvent::ChannelSettled { channel_id, .. } => *channel_id,
        }
    }
}

/// Receives every event after the call producing it has been committed.
pub trait EventSink {
    fn emit(&self, event: ChannelEvent);
}

impl<T: EventSink + ?Sized> EventSink for &T {
    fn emit(&self, event: ChannelEvent) {
        (**self).emit(event)
    }
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn emit(&self, event: ChannelEvent) {
        (**self).emit(event)
    }
}

/// Keeps all events in memory, in emission order.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<ChannelEvent>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ChannelEvent> {
        self.events.lock().clone()
    }

    /// Remove and return everything logged so far.
    pub fn take(&self) -> Vec<ChannelEvent> {
        core::mem::take(&mut *self.events.lock())
    }

    pub fn last(&self) -> Option<ChannelEvent> {
        self.events.lock().last().cloned()
    }
}

impl EventSink for EventLog {
    fn emit(&self, event: ChannelEvent) {
        self.events.lock().push(event);
    }
}
