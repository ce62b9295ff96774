//! Message-queue transport
//!
//! Every channel owns a FIFO of message entries. Entries come from a single
//! pool sized for every channel at full depth, so a channel can only run
//! out of room by hitting its own depth cap. Both failures count as drops.
//!
//! Permissions are not enforced: any endpoint may send on any channel.

use core_types::{ChannelId, EndpointId, Link, Linked, ListHead, Pool};
use ipc::{IpcMessage, Rights};
use kernel_api::{
    ChannelStats, IpcError, IpcTransport, KernelComponent, TransportDetail, TransportStats,
};

pub const MAX_CHANNELS: usize = 32;
pub const MAX_QUEUE_DEPTH: usize = 16;
pub const ENTRY_POOL_SIZE: usize = MAX_CHANNELS * MAX_QUEUE_DEPTH;

#[derive(Debug)]
struct Entry {
    message: IpcMessage,
    link: Link,
}

impl Linked for Entry {
    fn link(&self) -> &Link {
        &self.link
    }

    fn link_mut(&mut self) -> &mut Link {
        &mut self.link
    }
}

#[derive(Debug)]
struct Channel {
    id: ChannelId,
    sender: EndpointId,
    receiver: EndpointId,
    queue: ListHead,
    max_depth: usize,
    /// Informational: transfers never block
    blocking: bool,
    sent: u64,
    received: u64,
    dropped: u64,
}

impl Channel {
    fn stats(&self) -> ChannelStats {
        ChannelStats {
            id: self.id,
            sender: self.sender,
            receiver: self.receiver,
            pending: self.queue.len(),
            sent: self.sent,
            received: self.received,
            dropped: self.dropped,
        }
    }
}

#[derive(Debug)]
pub struct MessageQueueTransport {
    channels: Vec<Option<Channel>>,
    entries: Pool<Entry>,
    next_id: ChannelId,
    clock: u32,
    total_sent: u64,
    total_received: u64,
    total_dropped: u64,
    initialized: bool,
}

impl Default for MessageQueueTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageQueueTransport {
    pub fn new() -> Self {
        Self {
            channels: (0..MAX_CHANNELS).map(|_| None).collect(),
            entries: Pool::with_capacity(ENTRY_POOL_SIZE),
            next_id: ChannelId::FIRST,
            clock: 0,
            total_sent: 0,
            total_received: 0,
            total_dropped: 0,
            initialized: false,
        }
    }

    pub fn clock(&self) -> u32 {
        self.clock
    }

    /// Lowers or restores the depth cap of one channel (1..=16). Messages
    /// already queued beyond a lowered cap stay queued.
    pub fn set_queue_depth(&mut self, id: ChannelId, depth: usize) -> Result<(), IpcError> {
        if !(1..=MAX_QUEUE_DEPTH).contains(&depth) {
            return Err(IpcError::InvalidQueueDepth {
                depth,
                max: MAX_QUEUE_DEPTH,
            });
        }
        self.channel_mut(id)?.max_depth = depth;
        Ok(())
    }

    pub fn set_blocking_mode(&mut self, id: ChannelId, blocking: bool) -> Result<(), IpcError> {
        self.channel_mut(id)?.blocking = blocking;
        Ok(())
    }

    pub fn is_blocking(&self, id: ChannelId) -> Option<bool> {
        self.channel(id).map(|ch| ch.blocking)
    }

    /// Entries currently loaned out of the shared pool.
    pub fn pool_in_use(&self) -> usize {
        self.entries.len()
    }

    fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.iter().flatten().find(|ch| ch.id == id)
    }

    fn channel_mut(&mut self, id: ChannelId) -> Result<&mut Channel, IpcError> {
        if !self.initialized {
            return Err(IpcError::NotInitialized);
        }
        self.channels
            .iter_mut()
            .flatten()
            .find(|ch| ch.id == id)
            .ok_or(IpcError::UnknownChannel(id))
    }

    fn slot_of(&self, id: ChannelId) -> Option<usize> {
        self.channels
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|ch| ch.id == id))
    }

    /// Returns every entry queued on `channel` to the pool.
    fn drain(entries: &mut Pool<Entry>, channel: &mut Channel) {
        while let Some(handle) = channel.queue.pop_front(entries) {
            entries.remove(handle);
        }
    }
}

impl KernelComponent for MessageQueueTransport {
    fn name(&self) -> &'static str {
        "message_queue"
    }

    fn description(&self) -> &'static str {
        "Traditional message passing with configurable queues"
    }
}

impl IpcTransport for MessageQueueTransport {
    /// Advances the clock used to timestamp queued messages.
    fn tick(&mut self) {
        self.clock = self.clock.wrapping_add(1);
    }

    fn init(&mut self) {
        *self = Self::new();
        self.initialized = true;
    }

    fn shutdown(&mut self) {
        *self = Self::new();
    }

    fn create_channel(
        &mut self,
        sender: EndpointId,
        receiver: EndpointId,
    ) -> Result<ChannelId, IpcError> {
        if !self.initialized {
            return Err(IpcError::NotInitialized);
        }
        if let Some(existing) = self
            .channels
            .iter()
            .flatten()
            .find(|ch| ch.sender == sender && ch.receiver == receiver)
        {
            return Ok(existing.id);
        }

        let slot = self
            .channels
            .iter()
            .position(Option::is_none)
            .ok_or(IpcError::ChannelLimit { max: MAX_CHANNELS })?;
        let id = self.next_id;
        self.next_id = id.next();
        self.channels[slot] = Some(Channel {
            id,
            sender,
            receiver,
            queue: ListHead::new(),
            max_depth: MAX_QUEUE_DEPTH,
            blocking: true,
            sent: 0,
            received: 0,
            dropped: 0,
        });
        log::debug!("message_queue: {} created for {} -> {}", id, sender, receiver);
        Ok(id)
    }

    fn destroy_channel(&mut self, id: ChannelId) {
        let Some(slot) = self.slot_of(id) else {
            return;
        };
        if let Some(mut channel) = self.channels[slot].take() {
            Self::drain(&mut self.entries, &mut channel);
            log::debug!("message_queue: {} destroyed", id);
        }
    }

    fn send_message(&mut self, id: ChannelId, msg: &IpcMessage) -> Result<(), IpcError> {
        if !self.initialized {
            return Err(IpcError::NotInitialized);
        }
        let slot = self.slot_of(id).ok_or(IpcError::UnknownChannel(id))?;
        let Some(channel) = self.channels[slot].as_mut() else {
            return Err(IpcError::UnknownChannel(id));
        };

        if channel.queue.len() >= channel.max_depth {
            channel.dropped += 1;
            self.total_dropped += 1;
            log::debug!("message_queue: {} full, message dropped", id);
            return Err(IpcError::QueueFull {
                channel: id,
                depth: channel.max_depth,
            });
        }

        let mut message = msg.clone();
        message.timestamp = self.clock;
        let handle = match self.entries.insert(Entry {
            message,
            link: Link::default(),
        }) {
            Ok(handle) => handle,
            Err(_) => {
                channel.dropped += 1;
                self.total_dropped += 1;
                log::debug!("message_queue: entry pool exhausted, message dropped");
                return Err(IpcError::PoolExhausted {
                    capacity: ENTRY_POOL_SIZE,
                });
            }
        };
        channel.queue.push_back(&mut self.entries, handle);
        channel.sent += 1;
        self.total_sent += 1;
        Ok(())
    }

    fn receive_message(&mut self, id: ChannelId) -> Result<IpcMessage, IpcError> {
        if !self.initialized {
            return Err(IpcError::NotInitialized);
        }
        let slot = self.slot_of(id).ok_or(IpcError::UnknownChannel(id))?;
        let Some(channel) = self.channels[slot].as_mut() else {
            return Err(IpcError::UnknownChannel(id));
        };
        let entry = channel
            .queue
            .pop_front(&mut self.entries)
            .and_then(|handle| self.entries.remove(handle))
            .ok_or(IpcError::Empty(id))?;
        channel.received += 1;
        self.total_received += 1;
        Ok(entry.message)
    }

    fn can_send(&self, id: ChannelId) -> bool {
        self.channel(id)
            .is_some_and(|ch| ch.queue.len() < ch.max_depth)
    }

    fn has_messages(&self, id: ChannelId) -> bool {
        self.queue_size(id) > 0
    }

    fn queue_size(&self, id: ChannelId) -> usize {
        self.channel(id).map_or(0, |ch| ch.queue.len())
    }

    fn check_permission(&self, _sender: EndpointId, _receiver: EndpointId) -> bool {
        true
    }

    fn grant_capability(&mut self, _grantor: EndpointId, _grantee: EndpointId, _rights: Rights) {}

    fn channel_count(&self) -> usize {
        self.channels.iter().flatten().count()
    }

    fn channel_stats(&self, id: ChannelId) -> Option<ChannelStats> {
        self.channel(id).map(Channel::stats)
    }

    fn stats(&self) -> TransportStats {
        TransportStats {
            name: self.name(),
            active_channels: self.channel_count(),
            messages_sent: self.total_sent,
            messages_received: self.total_received,
            messages_dropped: self.total_dropped,
            detail: TransportDetail::MessageQueue {
                pool_in_use: self.entries.len(),
                pool_capacity: ENTRY_POOL_SIZE,
                clock: self.clock,
            },
        }
    }
}
