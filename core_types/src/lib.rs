//! # Core Types
//!
//! This crate defines the fundamental types shared by every kernel component.
//!
//! ## Philosophy
//!
//! - **Identifiers are typed**: a process id cannot be passed where a channel id is expected.
//! - **No raw pointers into pools**: pooled objects are named by generation-checked handles.
//! - **Links are indices**: intrusive lists thread through arena slots, never through addresses.
//!
//! ## Key Types
//!
//! - [`Pid`]: Identity of a schedulable process
//! - [`EndpointId`]: Identity of an IPC participant
//! - [`ChannelId`]: Monotonic channel identifier issued by a transport
//! - [`PhysAddr`]: A physical address handed to or returned by a page allocator
//! - [`Pool`] / [`Handle`]: Fixed-capacity arena with stale-handle detection
//! - [`ListHead`] / [`Link`]: Doubly linked list threaded through a [`Pool`]

pub mod addr;
pub mod ids;
pub mod list;
pub mod pool;

pub use addr::{pages_for_bytes, PhysAddr, PAGE_SIZE};
pub use ids::{ChannelId, EndpointId, Pid};
pub use list::{Link, Linked, ListHead};
pub use pool::{Handle, Pool, PoolError};
