//! Kernel error types
//!
//! Each contract has its own error enum. Every variant maps to exactly one
//! [`FailureClass`] so callers can reason about failures without matching
//! on every variant.

use crate::component::Category;
use core_types::{ChannelId, EndpointId, Pid, PhysAddr};
use ipc::Rights;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Coarse failure taxonomy shared by every contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// A bounded resource (pages, pool entries, queue slots) is exhausted.
    OutOfResource,
    /// The caller named something this component does not own.
    InvalidReference,
    /// The caller lacks the rights for the operation.
    PolicyDenied,
    /// A name or tunable was out of range or unknown.
    Configuration,
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureClass::OutOfResource => "out-of-resource",
            FailureClass::InvalidReference => "invalid-reference",
            FailureClass::PolicyDenied => "policy-denied",
            FailureClass::Configuration => "configuration",
        };
        f.write_str(s)
    }
}

/// Errors returned by physical page allocators
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AllocError {
    /// `init` has not been called
    #[error("Allocator not initialized")]
    NotInitialized,

    /// The managed range is empty or inverted
    #[error("Invalid memory range {start}..{end}")]
    InvalidRange { start: PhysAddr, end: PhysAddr },

    /// Zero-sized request
    #[error("Cannot allocate zero pages")]
    ZeroPages,

    /// Alignment of zero bytes
    #[error("Invalid alignment: {0}")]
    InvalidAlignment(usize),

    /// The request exceeds the largest block the allocator can describe
    #[error("Request of {pages} pages exceeds the allocator limit of {max}")]
    TooLarge { pages: usize, max: usize },

    /// No free run satisfies the request
    #[error("Out of memory: {pages} pages requested")]
    OutOfMemory { pages: usize },
}

impl AllocError {
    pub fn class(&self) -> FailureClass {
        match self {
            AllocError::OutOfMemory { .. } | AllocError::TooLarge { .. } => {
                FailureClass::OutOfResource
            }
            AllocError::NotInitialized => FailureClass::InvalidReference,
            AllocError::InvalidRange { .. }
            | AllocError::ZeroPages
            | AllocError::InvalidAlignment(_) => FailureClass::Configuration,
        }
    }
}

/// Errors returned by schedulers
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchedError {
    /// `init` has not been called
    #[error("Scheduler not initialized")]
    NotInitialized,

    /// The process is already managed by this scheduler
    #[error("Process already scheduled: {0}")]
    DuplicateProcess(Pid),

    /// The process is not managed by this scheduler
    #[error("Unknown process: {0}")]
    UnknownProcess(Pid),

    /// The process is not in a state that permits the operation
    #[error("Process {pid} is {state}, cannot {op}")]
    InvalidState {
        pid: Pid,
        state: crate::scheduler::ProcessState,
        op: &'static str,
    },

    /// The process record pool is full
    #[error("Process table full ({capacity} entries)")]
    TableFull { capacity: usize },

    /// Priority outside 0..=31
    #[error("Invalid priority: {0}")]
    InvalidPriority(u32),

    /// Quantum outside the accepted range
    #[error("Invalid time quantum: {0}")]
    InvalidQuantum(u32),

    /// The scheduler has no single quantum to adjust
    #[error("{0} does not take a time quantum")]
    FixedQuantum(&'static str),
}

impl SchedError {
    pub fn class(&self) -> FailureClass {
        match self {
            SchedError::TableFull { .. } => FailureClass::OutOfResource,
            SchedError::NotInitialized
            | SchedError::DuplicateProcess(_)
            | SchedError::UnknownProcess(_)
            | SchedError::InvalidState { .. } => FailureClass::InvalidReference,
            SchedError::InvalidPriority(_)
            | SchedError::InvalidQuantum(_)
            | SchedError::FixedQuantum(_) => FailureClass::Configuration,
        }
    }
}

/// Errors returned by IPC transports
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IpcError {
    /// `init` has not been called
    #[error("Transport not initialized")]
    NotInitialized,

    /// Every channel slot is in use
    #[error("Channel limit reached ({max} channels)")]
    ChannelLimit { max: usize },

    /// The channel id was never issued or has been destroyed
    #[error("Unknown channel: {0}")]
    UnknownChannel(ChannelId),

    /// The channel queue is at its depth cap
    #[error("{channel} is full ({depth} messages)")]
    QueueFull { channel: ChannelId, depth: usize },

    /// The shared message entry pool is exhausted
    #[error("Message pool exhausted ({capacity} entries)")]
    PoolExhausted { capacity: usize },

    /// The single payload slot already holds a message
    #[error("{0} already holds a pending message")]
    SlotOccupied(ChannelId),

    /// Nothing to receive
    #[error("{0} has no pending messages")]
    Empty(ChannelId),

    /// The endpoint lacks the required rights on the channel
    #[error("{endpoint} lacks {needed:?} on {channel}")]
    PermissionDenied {
        channel: ChannelId,
        endpoint: EndpointId,
        needed: Rights,
    },

    /// The requested queue depth is outside the accepted range
    #[error("Invalid queue depth: {depth} (max {max})")]
    InvalidQueueDepth { depth: usize, max: usize },
}

impl IpcError {
    pub fn class(&self) -> FailureClass {
        match self {
            IpcError::ChannelLimit { .. }
            | IpcError::QueueFull { .. }
            | IpcError::PoolExhausted { .. }
            | IpcError::SlotOccupied(_)
            | IpcError::Empty(_) => FailureClass::OutOfResource,
            IpcError::NotInitialized | IpcError::UnknownChannel(_) => {
                FailureClass::InvalidReference
            }
            IpcError::PermissionDenied { .. } => FailureClass::PolicyDenied,
            IpcError::InvalidQueueDepth { .. } => FailureClass::Configuration,
        }
    }
}

/// Errors returned by the capability registry
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// No catalog entry starts with the requested name
    #[error("Unknown {category} component: {name}")]
    UnknownComponent { category: Category, name: String },

    /// More than one catalog entry starts with the requested name
    #[error("Ambiguous {category} component '{name}', matches: {}", candidates.join(", "))]
    AmbiguousName {
        category: Category,
        name: String,
        candidates: Vec<&'static str>,
    },

    /// The registration does not belong to the slot it was offered for
    #[error("Component '{component}' cannot fill the {category} slot")]
    CategoryMismatch {
        category: Category,
        component: &'static str,
    },

    /// No implementation is registered for the category
    #[error("No {0} registered")]
    NotRegistered(Category),

    /// The category is declared but no implementation ships
    #[error("No implementations available for {0}")]
    Unsupported(Category),
}

impl RegistryError {
    pub fn class(&self) -> FailureClass {
        match self {
            RegistryError::NotRegistered(_) => FailureClass::InvalidReference,
            RegistryError::UnknownComponent { .. }
            | RegistryError::AmbiguousName { .. }
            | RegistryError::CategoryMismatch { .. }
            | RegistryError::Unsupported(_) => FailureClass::Configuration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_classes() {
        assert_eq!(
            AllocError::OutOfMemory { pages: 4 }.class(),
            FailureClass::OutOfResource
        );
        assert_eq!(AllocError::ZeroPages.class(), FailureClass::Configuration);
    }

    #[test]
    fn test_ipc_permission_is_policy_denied() {
        let err = IpcError::PermissionDenied {
            channel: ChannelId::new(1),
            endpoint: EndpointId::new(42),
            needed: Rights::WRITE,
        };
        assert_eq!(err.class(), FailureClass::PolicyDenied);
        assert!(err.to_string().contains("ep:42"));
    }

    #[test]
    fn test_ambiguous_lists_candidates() {
        let err = RegistryError::AmbiguousName {
            category: Category::Scheduler,
            name: "r".to_string(),
            candidates: vec!["round_robin", "rate_monotonic"],
        };
        assert_eq!(
            err.to_string(),
            "Ambiguous scheduler component 'r', matches: round_robin, rate_monotonic"
        );
        assert_eq!(err.class(), FailureClass::Configuration);
    }

    #[test]
    fn test_sched_invalid_priority() {
        assert_eq!(SchedError::InvalidPriority(40).class(), FailureClass::Configuration);
        assert_eq!(SchedError::InvalidPriority(40).to_string(), "Invalid priority: 40");
    }
}
