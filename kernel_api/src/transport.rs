//! IPC transport contract
//!
//! A channel connects a sender endpoint to a receiver endpoint. Creating a
//! channel for a pair that already has one returns the existing id.
//!
//! Transfers never block. `receive_message` on an empty channel fails
//! immediately; callers poll with [`IpcTransport::has_messages`] and
//! [`IpcTransport::can_send`].

use crate::component::KernelComponent;
use crate::error::IpcError;
use core_types::{ChannelId, EndpointId};
use ipc::{IpcMessage, Rights};
use serde::Serialize;
use std::fmt;

pub trait IpcTransport: KernelComponent + Send {
    fn init(&mut self);

    /// Destroys every channel and returns to the uninitialised state.
    fn shutdown(&mut self);

    /// Advances the transport's clock by one timer tick. Transports without
    /// a clock ignore it.
    fn tick(&mut self) {}

    fn create_channel(
        &mut self,
        sender: EndpointId,
        receiver: EndpointId,
    ) -> Result<ChannelId, IpcError>;

    /// Unknown ids are ignored.
    fn destroy_channel(&mut self, id: ChannelId);

    /// Sends on behalf of `msg.sender_id`.
    fn send_message(&mut self, id: ChannelId, msg: &IpcMessage) -> Result<(), IpcError>;

    fn receive_message(&mut self, id: ChannelId) -> Result<IpcMessage, IpcError>;

    /// Non-blocking receive. Transfers never block, so this is `receive_message`.
    fn try_receive(&mut self, id: ChannelId) -> Result<IpcMessage, IpcError> {
        self.receive_message(id)
    }

    fn can_send(&self, id: ChannelId) -> bool;

    fn has_messages(&self, id: ChannelId) -> bool;

    /// Messages pending on the channel, 0 for unknown ids.
    fn queue_size(&self, id: ChannelId) -> usize;

    /// Whether `sender` may send to `receiver`.
    fn check_permission(&self, sender: EndpointId, receiver: EndpointId) -> bool;

    fn grant_capability(&mut self, grantor: EndpointId, grantee: EndpointId, rights: Rights);

    /// Number of live channels.
    fn channel_count(&self) -> usize;

    fn channel_stats(&self, id: ChannelId) -> Option<ChannelStats>;

    fn stats(&self) -> TransportStats;

    fn print_stats(&self) {
        log::info!("{}", self.stats());
    }
}

/// Per-channel counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    pub id: ChannelId,
    pub sender: EndpointId,
    pub receiver: EndpointId,
    pub pending: usize,
    pub sent: u64,
    pub received: u64,
    pub dropped: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportDetail {
    MessageQueue {
        pool_in_use: usize,
        pool_capacity: usize,
        /// Tick clock used for message timestamps
        clock: u32,
    },
    SharedMemory {
        regions_created: u64,
        capability_violations: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransportStats {
    pub name: &'static str,
    pub active_channels: usize,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub messages_dropped: u64,
    pub detail: TransportDetail,
}

impl TransportStats {
    /// Received over sent, as a percentage.
    pub fn delivery_rate(&self) -> f64 {
        if self.messages_sent == 0 {
            return 0.0;
        }
        self.messages_received as f64 * 100.0 / self.messages_sent as f64
    }

    /// Dropped over attempted, as a percentage.
    pub fn drop_rate(&self) -> f64 {
        let attempted = self.messages_sent + self.messages_dropped;
        if attempted == 0 {
            return 0.0;
        }
        self.messages_dropped as f64 * 100.0 / attempted as f64
    }
}

impl fmt::Display for TransportStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} transport statistics:", self.name)?;
        writeln!(f, "  Active channels: {}", self.active_channels)?;
        writeln!(f, "  Messages sent: {}", self.messages_sent)?;
        writeln!(f, "  Messages received: {}", self.messages_received)?;
        writeln!(f, "  Messages dropped: {}", self.messages_dropped)?;
        writeln!(f, "  Delivery rate: {:.1}%", self.delivery_rate())?;
        write!(f, "  Drop rate: {:.1}%", self.drop_rate())?;
        match &self.detail {
            TransportDetail::MessageQueue {
                pool_in_use,
                pool_capacity,
                clock,
            } => {
                write!(f, "\n  Pool usage: {}/{}", pool_in_use, pool_capacity)?;
                write!(f, "\n  Clock: {}", clock)?;
            }
            TransportDetail::SharedMemory {
                regions_created,
                capability_violations,
            } => {
                write!(f, "\n  Regions created: {}", regions_created)?;
                write!(f, "\n  Capability violations: {}", capability_violations)?;
            }
        }
        Ok(())
    }
}
