//! # Kernel API
//!
//! This crate defines the operation contracts every pluggable kernel
//! component implements.
//!
//! ## Philosophy
//!
//! The kernel binds services to **contracts**, not to algorithms:
//! - Page allocation goes through [`PhysicalAllocator`]
//! - Process scheduling goes through [`Scheduler`]
//! - Message passing goes through [`IpcTransport`]
//!
//! Any implementation of a contract is interchangeable with any other.
//! Callers never name a concrete algorithm; they resolve the active one
//! through the registry and call the contract.
//!
//! ## Declared-only contracts
//!
//! [`VirtualMemory`], [`HeapAllocator`], [`ProcessLoader`] and
//! [`DeviceDriver`] are part of the contract surface but no implementation
//! ships. The registry keeps a slot for each so one can be plugged in later.
//!
//! ## Failure reporting
//!
//! Operations report failure through `Result`/`Option` at the point of
//! failure. Every error maps to one [`FailureClass`]. Nothing here panics,
//! and nothing retries on the caller's behalf.

pub mod allocator;
pub mod component;
pub mod declared;
pub mod error;
pub mod scheduler;
pub mod transport;

pub use allocator::{AllocatorDetail, AllocatorStats, PhysicalAllocator};
pub use component::{Category, KernelComponent};
pub use declared::{DeviceDriver, HeapAllocator, ProcessLoader, ServiceError, VirtualMemory};
pub use error::{AllocError, FailureClass, IpcError, RegistryError, SchedError};
pub use scheduler::{ProcessInfo, ProcessState, Scheduler, SchedulerDetail, SchedulerStats, MAX_PRIORITY};
pub use transport::{ChannelStats, IpcTransport, TransportDetail, TransportStats};
