//! # IPC Transports
//!
//! Two interchangeable implementations of [`kernel_api::IpcTransport`]:
//!
//! - [`MessageQueueTransport`]: per-channel FIFO queues whose entries are
//!   loaned from one shared, fixed-size pool. Overflow drops the message
//!   and counts it.
//! - [`SharedMemoryTransport`]: each channel is a 4 KiB region with a
//!   single message slot behind a spin lock, shared by up to eight
//!   participants with individual read/write rights.
//!
//! Channel ids are issued from 1 upward and never reused, so a stale id
//! names nothing rather than someone else's channel.

pub mod message_queue;
pub mod shared_memory;

pub use message_queue::MessageQueueTransport;
pub use shared_memory::{SharedMemoryTransport, SharedRegion};
