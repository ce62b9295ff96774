//! # Inter-Process Communication (IPC)
//!
//! This crate defines the message record shared by every IPC transport.
//!
//! ## Architecture
//!
//! A message is a fixed-shape record:
//! - Routing (sender and receiver endpoint ids)
//! - Message id and type tag chosen by the sender
//! - A payload of at most [`MAX_PAYLOAD`] bytes
//! - Timestamp and flags
//!
//! Both transports accept and return the same [`IpcMessage`], so a caller can
//! switch transports without touching the code that builds messages. The
//! byte layout produced by [`IpcMessage::encode`] is the on-the-wire form.

pub mod message;
pub mod rights;

pub use message::{IpcMessage, MessageError, MAX_PAYLOAD, WIRE_SIZE};
pub use rights::Rights;
