//! Channel records by identifier and by participant pair.

use std::{collections::HashMap, sync::Arc};

use parking_lot::{Mutex, RwLock};

use super::{Channel, ChannelId, ChannelState, ParticipantPair};
use crate::{error::ChannelError, types::BlockNumber, Error};

/// Every record sits behind its own lock. Holding it for the duration of a
/// call serializes all calls on that channel while calls on other channels
/// proceed independently.
pub(crate) type ChannelCell = Arc<Mutex<Channel>>;

#[derive(Debug, Default)]
struct Channels {
    by_id: HashMap<ChannelId, ChannelCell>,
    /// Latest channel of every pair that ever opened one.
    by_pair: HashMap<ParticipantPair, ChannelId>,
    /// Open sequence number, part of every channel identifier.
    counter: u64,
}

/// Lock order: the registry lock is only ever taken before a channel lock,
/// never while one is held.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    channels: RwLock<Channels>,
}

impl Registry {
    /// Create a new channel for `pair` in state Opened.
    ///
    /// Fails if the latest channel of the pair is still Opened or Closed. A
    /// settled channel does not block reopening. `on_open` sees the new
    /// channel before any other call can.
    pub(crate) fn open(
        &self,
        pair: ParticipantPair,
        settle_timeout: u64,
        block: BlockNumber,
        on_open: impl FnOnce(&Channel),
    ) -> Result<ChannelId, Error> {
        let mut channels = self.channels.write();

        if let Some(existing) = channels.by_pair.get(&pair) {
            let active = channels
                .by_id
                .get(existing)
                .map(|cell| cell.lock().state() != ChannelState::Settled)
                .unwrap_or(false);
            if active {
                return Err(ChannelError::AlreadyOpen(*existing).into());
            }
        }

        let counter = channels.counter + 1;
        let id = pair.channel_id(counter)?;
        channels.counter = counter;
        let channel = Channel::new(id, pair, settle_timeout, block);
        on_open(&channel);
        channels.by_id.insert(id, Arc::new(Mutex::new(channel)));
        channels.by_pair.insert(pair, id);
        Ok(id)
    }

    pub(crate) fn get(&self, id: &ChannelId) -> Option<ChannelCell> {
        self.channels.read().by_id.get(id).cloned()
    }

    /// Latest channel of `pair`, in whatever state it is.
    pub(crate) fn find(&self, pair: &ParticipantPair) -> Option<ChannelCell> {
        let channels = self.channels.read();
        channels
            .by_pair
            .get(pair)
            .and_then(|id| channels.by_id.get(id))
            .cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.channels.read().by_id.len()
    }
}
