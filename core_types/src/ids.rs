//! Unique identifiers for system entities

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a schedulable process
///
/// Processes are created by the caller and handed to the active scheduler,
/// which owns the record from then on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pid(u32);

impl Pid {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid:{}", self.0)
    }
}

/// Identity of a communication endpoint (sender, receiver or participant)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EndpointId(u32);

impl EndpointId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl From<u32> for EndpointId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ep:{}", self.0)
    }
}

/// Identifier of an IPC channel
///
/// Channel ids are issued by the transport that created the channel and are
/// only meaningful to that transport. Ids increase monotonically and are never
/// handed out twice by the same transport instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelId(u32);

impl ChannelId {
    /// The first id a freshly initialised transport hands out.
    pub const FIRST: ChannelId = ChannelId(1);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Returns the id following this one.
    pub fn next(&self) -> Self {
        Self(self.0.wrapping_add(1).max(1))
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Channel({})", self.0)
    }
}
