//! Shared-memory transport
//!
//! Each channel is a [`SharedRegion`]: memory holding one message slot,
//! guarded by a spin lock. A send encodes the message into the region and
//! raises the slot's valid flag; a receive decodes it and clears the flag.
//! There is no queueing: a second send fails until the slot is read.
//!
//! The slot holds the message in its fixed-size wire form
//! ([`ipc::WIRE_SIZE`] bytes, see [`IpcMessage::encode`]), the same layout
//! every transport exchanges.
//!
//! Participants hold individual [`Rights`]. The creator of a region may add
//! participants with [`IpcTransport::grant_capability`].

use core_types::{ChannelId, EndpointId};
use ipc::{IpcMessage, Rights, WIRE_SIZE};
use kernel_api::{
    ChannelStats, IpcError, IpcTransport, KernelComponent, TransportDetail, TransportStats,
};
use std::sync::Arc;

pub const MAX_REGIONS: usize = 64;
pub const MAX_PARTICIPANTS: usize = 8;
/// Payloads longer than this are truncated on send.
pub const MAX_MESSAGE_SIZE: usize = 1024;

#[derive(Debug)]
struct Slot {
    bytes: Box<[u8; WIRE_SIZE]>,
    valid: bool,
}

/// Memory of one shared-memory channel.
///
/// Handles are reference counted so that threads standing in for separate
/// processes can exchange messages through the same region directly.
#[derive(Debug)]
pub struct SharedRegion {
    id: ChannelId,
    slot: spin::Mutex<Slot>,
}

impl SharedRegion {
    fn new(id: ChannelId) -> Self {
        Self {
            id,
            slot: spin::Mutex::new(Slot {
                bytes: Box::new([0; WIRE_SIZE]),
                valid: false,
            }),
        }
    }

    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Encodes `msg` into the slot. Returns `false` if a message is pending.
    pub fn write(&self, msg: &IpcMessage) -> bool {
        let mut slot = self.slot.lock();
        if slot.valid {
            return false;
        }
        let encoded = if msg.payload_len() > MAX_MESSAGE_SIZE {
            let mut cut = msg.clone();
            cut.truncate_payload(MAX_MESSAGE_SIZE);
            cut.encode()
        } else {
            msg.encode()
        };
        slot.bytes.copy_from_slice(&encoded);
        slot.valid = true;
        true
    }

    /// Decodes the pending message and clears the slot.
    pub fn read(&self) -> Option<IpcMessage> {
        let mut slot = self.slot.lock();
        if !slot.valid {
            return None;
        }
        slot.valid = false;
        match IpcMessage::decode(&slot.bytes[..]) {
            Ok(msg) => Some(msg),
            Err(e) => {
                log::warn!("shared_memory: dropped undecodable message on {}: {}", self.id, e);
                None
            }
        }
    }

    pub fn has_data(&self) -> bool {
        self.slot.lock().valid
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Participant {
    endpoint: EndpointId,
    rights: Rights,
}

#[derive(Debug)]
struct Region {
    shared: Arc<SharedRegion>,
    creator: EndpointId,
    receiver: EndpointId,
    participants: Vec<Participant>,
    sent: u64,
    received: u64,
}

impl Region {
    fn rights_of(&self, endpoint: EndpointId) -> Option<Rights> {
        self.participants
            .iter()
            .find(|p| p.endpoint == endpoint)
            .map(|p| p.rights)
    }

    fn is_participant(&self, endpoint: EndpointId) -> bool {
        self.rights_of(endpoint).is_some()
    }
}

#[derive(Debug)]
pub struct SharedMemoryTransport {
    regions: Vec<Option<Region>>,
    next_id: ChannelId,
    regions_created: u64,
    total_sent: u64,
    total_received: u64,
    violations: u64,
    initialized: bool,
}

impl Default for SharedMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedMemoryTransport {
    pub fn new() -> Self {
        Self {
            regions: (0..MAX_REGIONS).map(|_| None).collect(),
            next_id: ChannelId::FIRST,
            regions_created: 0,
            total_sent: 0,
            total_received: 0,
            violations: 0,
            initialized: false,
        }
    }

    /// Shared handle to the region behind `id`.
    pub fn region(&self, id: ChannelId) -> Option<Arc<SharedRegion>> {
        self.find(id).map(|r| Arc::clone(&r.shared))
    }

    /// Rights `endpoint` holds on channel `id`, if it participates.
    pub fn rights(&self, id: ChannelId, endpoint: EndpointId) -> Option<Rights> {
        self.find(id).and_then(|r| r.rights_of(endpoint))
    }

    pub fn participants(&self, id: ChannelId) -> Vec<EndpointId> {
        self.find(id)
            .map(|r| r.participants.iter().map(|p| p.endpoint).collect())
            .unwrap_or_default()
    }

    /// Sends refused for missing rights.
    pub fn capability_violations(&self) -> u64 {
        self.violations
    }

    fn live(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter().flatten()
    }

    fn find(&self, id: ChannelId) -> Option<&Region> {
        self.live().find(|r| r.shared.id() == id)
    }

    fn find_mut(&mut self, id: ChannelId) -> Result<&mut Region, IpcError> {
        if !self.initialized {
            return Err(IpcError::NotInitialized);
        }
        self.regions
            .iter_mut()
            .flatten()
            .find(|r| r.shared.id() == id)
            .ok_or(IpcError::UnknownChannel(id))
    }
}

impl KernelComponent for SharedMemoryTransport {
    fn name(&self) -> &'static str {
        "shared_memory"
    }

    fn description(&self) -> &'static str {
        "High-performance IPC using shared memory regions with basic synchronization"
    }
}

impl IpcTransport for SharedMemoryTransport {
    fn init(&mut self) {
        *self = Self::new();
        self.initialized = true;
    }

    fn shutdown(&mut self) {
        *self = Self::new();
    }

    /// Returns the existing region when both endpoints already participate
    /// in one.
    fn create_channel(
        &mut self,
        sender: EndpointId,
        receiver: EndpointId,
    ) -> Result<ChannelId, IpcError> {
        if !self.initialized {
            return Err(IpcError::NotInitialized);
        }
        if let Some(existing) = self
            .live()
            .find(|r| r.is_participant(sender) && r.is_participant(receiver))
        {
            return Ok(existing.shared.id());
        }

        let slot = self
            .regions
            .iter()
            .position(Option::is_none)
            .ok_or(IpcError::ChannelLimit { max: MAX_REGIONS })?;
        let id = self.next_id;
        self.next_id = id.next();

        let both = Rights::READ | Rights::WRITE;
        let mut participants = vec![Participant {
            endpoint: sender,
            rights: both,
        }];
        if receiver != sender {
            participants.push(Participant {
                endpoint: receiver,
                rights: both,
            });
        }
        self.regions[slot] = Some(Region {
            shared: Arc::new(SharedRegion::new(id)),
            creator: sender,
            receiver,
            participants,
            sent: 0,
            received: 0,
        });
        self.regions_created += 1;
        log::debug!("shared_memory: {} created by {} for {}", id, sender, receiver);
        Ok(id)
    }

    /// Releases the slot. Outstanding [`SharedRegion`] handles keep the old
    /// memory alive, detached from the transport.
    fn destroy_channel(&mut self, id: ChannelId) {
        if let Some(slot) = self
            .regions
            .iter_mut()
            .find(|slot| slot.as_ref().is_some_and(|r| r.shared.id() == id))
        {
            *slot = None;
            log::debug!("shared_memory: {} destroyed", id);
        }
    }

    fn send_message(&mut self, id: ChannelId, msg: &IpcMessage) -> Result<(), IpcError> {
        let region = self.find_mut(id)?;
        let allowed = region
            .rights_of(msg.sender_id)
            .is_some_and(|rights| rights.contains(Rights::WRITE));
        if !allowed {
            self.violations += 1;
            log::debug!(
                "shared_memory: {} denied write on {}",
                msg.sender_id,
                id
            );
            return Err(IpcError::PermissionDenied {
                channel: id,
                endpoint: msg.sender_id,
                needed: Rights::WRITE,
            });
        }
        if !region.shared.write(msg) {
            return Err(IpcError::SlotOccupied(id));
        }
        region.sent += 1;
        self.total_sent += 1;
        Ok(())
    }

    fn receive_message(&mut self, id: ChannelId) -> Result<IpcMessage, IpcError> {
        let region = self.find_mut(id)?;
        let msg = region.shared.read().ok_or(IpcError::Empty(id))?;
        region.received += 1;
        self.total_received += 1;
        Ok(msg)
    }

    fn can_send(&self, id: ChannelId) -> bool {
        self.find(id).is_some_and(|r| !r.shared.has_data())
    }

    fn has_messages(&self, id: ChannelId) -> bool {
        self.find(id).is_some_and(|r| r.shared.has_data())
    }

    fn queue_size(&self, id: ChannelId) -> usize {
        usize::from(self.has_messages(id))
    }

    /// True when some region lets `sender` write and `receiver` read.
    fn check_permission(&self, sender: EndpointId, receiver: EndpointId) -> bool {
        self.live().any(|r| {
            r.rights_of(sender).is_some_and(|s| s.contains(Rights::WRITE))
                && r.rights_of(receiver).is_some_and(|d| d.contains(Rights::READ))
        })
    }

    /// Adds `grantee` to every region `grantor` created that has room.
    /// Existing participants keep the rights they have.
    fn grant_capability(&mut self, grantor: EndpointId, grantee: EndpointId, rights: Rights) {
        for region in self.regions.iter_mut().flatten() {
            if region.creator != grantor
                || region.participants.len() >= MAX_PARTICIPANTS
                || region.is_participant(grantee)
            {
                continue;
            }
            region.participants.push(Participant {
                endpoint: grantee,
                rights,
            });
            log::debug!(
                "shared_memory: {} granted {:?} on {} by {}",
                grantee,
                rights,
                region.shared.id(),
                grantor
            );
        }
    }

    fn channel_count(&self) -> usize {
        self.live().count()
    }

    fn channel_stats(&self, id: ChannelId) -> Option<ChannelStats> {
        self.find(id).map(|r| ChannelStats {
            id,
            sender: r.creator,
            receiver: r.receiver,
            pending: usize::from(r.shared.has_data()),
            sent: r.sent,
            received: r.received,
            dropped: 0,
        })
    }

    fn stats(&self) -> TransportStats {
        TransportStats {
            name: self.name(),
            active_channels: self.channel_count(),
            messages_sent: self.total_sent,
            messages_received: self.total_received,
            messages_dropped: 0,
            detail: TransportDetail::SharedMemory {
                regions_created: self.regions_created,
                capability_violations: self.violations,
            },
        }
    }
}
