//! The IPC message record and its wire layout

use core_types::EndpointId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Payload capacity of a message in bytes.
pub const MAX_PAYLOAD: usize = 4096;

const HEADER_SIZE: usize = 5 * 4;
const TRAILER_SIZE: usize = 2 * 4;

/// Size of an encoded message.
///
/// Layout (little endian): sender `u32`, receiver `u32`, message id `u32`,
/// type `u32`, payload length `u32`, payload (`MAX_PAYLOAD` bytes, zero
/// padded), timestamp `u32`, flags `u32`.
pub const WIRE_SIZE: usize = HEADER_SIZE + MAX_PAYLOAD + TRAILER_SIZE;

/// Errors building or decoding a message
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("payload of {len} bytes exceeds the {max} byte limit")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("encoded message is {len} bytes, expected {expected}")]
    BadWireSize { len: usize, expected: usize },

    #[error("encoded payload length {0} is out of range")]
    BadPayloadLength(usize),

    #[error("payload serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// A message exchanged over an IPC transport
///
/// The payload never exceeds [`MAX_PAYLOAD`]; deserialising an oversized
/// one fails like [`IpcMessage::with_payload`] does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawIpcMessage")]
pub struct IpcMessage {
    pub sender_id: EndpointId,
    pub receiver_id: EndpointId,
    pub message_id: u32,
    pub msg_type: u32,
    payload: Vec<u8>,
    /// Set by the transport when the message is queued.
    pub timestamp: u32,
    pub flags: u32,
}

/// Unchecked field set accepted by `Deserialize`
#[derive(Deserialize)]
struct RawIpcMessage {
    sender_id: EndpointId,
    receiver_id: EndpointId,
    message_id: u32,
    msg_type: u32,
    payload: Vec<u8>,
    timestamp: u32,
    flags: u32,
}

impl TryFrom<RawIpcMessage> for IpcMessage {
    type Error = MessageError;

    fn try_from(raw: RawIpcMessage) -> Result<Self, Self::Error> {
        let mut msg = IpcMessage::new(raw.sender_id, raw.receiver_id)
            .with_id(raw.message_id)
            .with_type(raw.msg_type)
            .with_flags(raw.flags)
            .with_payload(&raw.payload)?;
        msg.timestamp = raw.timestamp;
        Ok(msg)
    }
}

impl IpcMessage {
    /// Creates an empty message from `sender` to `receiver`.
    pub fn new(sender_id: EndpointId, receiver_id: EndpointId) -> Self {
        Self {
            sender_id,
            receiver_id,
            message_id: 0,
            msg_type: 0,
            payload: Vec::new(),
            timestamp: 0,
            flags: 0,
        }
    }

    pub fn with_id(mut self, message_id: u32) -> Self {
        self.message_id = message_id;
        self
    }

    pub fn with_type(mut self, msg_type: u32) -> Self {
        self.msg_type = msg_type;
        self
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    /// Replaces the payload with `bytes`.
    pub fn with_payload(mut self, bytes: &[u8]) -> Result<Self, MessageError> {
        if bytes.len() > MAX_PAYLOAD {
            return Err(MessageError::PayloadTooLarge {
                len: bytes.len(),
                max: MAX_PAYLOAD,
            });
        }
        self.payload = bytes.to_vec();
        Ok(self)
    }

    /// Replaces the payload with the JSON encoding of `value`.
    pub fn with_json<T: Serialize>(self, value: &T) -> Result<Self, MessageError> {
        let bytes = serde_json::to_vec(value)?;
        self.with_payload(&bytes)
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Decodes a JSON payload.
    pub fn payload_json<T: for<'de> Deserialize<'de>>(&self) -> Result<T, MessageError> {
        Ok(serde_json::from_slice(&self.payload)?)
    }

    /// Cuts the payload down to at most `max` bytes.
    pub fn truncate_payload(&mut self, max: usize) {
        self.payload.truncate(max);
    }

    /// Encodes the message into its fixed-size wire form.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(WIRE_SIZE);
        for word in [
            self.sender_id.as_u32(),
            self.receiver_id.as_u32(),
            self.message_id,
            self.msg_type,
            self.payload.len() as u32,
        ] {
            out.extend_from_slice(&word.to_le_bytes());
        }
        out.extend_from_slice(&self.payload);
        out.resize(HEADER_SIZE + MAX_PAYLOAD, 0);
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.extend_from_slice(&self.flags.to_le_bytes());
        out
    }

    /// Decodes a message from its fixed-size wire form.
    pub fn decode(bytes: &[u8]) -> Result<Self, MessageError> {
        if bytes.len() != WIRE_SIZE {
            return Err(MessageError::BadWireSize {
                len: bytes.len(),
                expected: WIRE_SIZE,
            });
        }
        let word = |offset: usize| {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(&bytes[offset..offset + 4]);
            u32::from_le_bytes(raw)
        };

        let len = word(16) as usize;
        if len > MAX_PAYLOAD {
            return Err(MessageError::BadPayloadLength(len));
        }
        let trailer = HEADER_SIZE + MAX_PAYLOAD;
        Ok(Self {
            sender_id: EndpointId::new(word(0)),
            receiver_id: EndpointId::new(word(4)),
            message_id: word(8),
            msg_type: word(12),
            payload: bytes[HEADER_SIZE..HEADER_SIZE + len].to_vec(),
            timestamp: word(trailer),
            flags: word(trailer + 4),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Ping {
        seq: u32,
    }

    fn sample() -> IpcMessage {
        IpcMessage::new(EndpointId::new(5), EndpointId::new(9))
            .with_id(77)
            .with_type(3)
            .with_flags(0x10)
            .with_payload(b"hello")
            .unwrap()
    }

    #[test]
    fn test_payload_limit() {
        let big = vec![0u8; MAX_PAYLOAD + 1];
        let err = IpcMessage::new(EndpointId::new(1), EndpointId::new(2))
            .with_payload(&big)
            .unwrap_err();
        assert!(matches!(err, MessageError::PayloadTooLarge { len, .. } if len == MAX_PAYLOAD + 1));

        let exact = vec![1u8; MAX_PAYLOAD];
        assert!(IpcMessage::new(EndpointId::new(1), EndpointId::new(2))
            .with_payload(&exact)
            .is_ok());
    }

    #[test]
    fn test_wire_layout_offsets() {
        let mut msg = sample();
        msg.timestamp = 0xAABB;
        let bytes = msg.encode();

        assert_eq!(bytes.len(), WIRE_SIZE);
        assert_eq!(&bytes[0..4], &5u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &9u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &77u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &3u32.to_le_bytes());
        assert_eq!(&bytes[16..20], &5u32.to_le_bytes());
        assert_eq!(&bytes[20..25], b"hello");
        assert!(bytes[25..HEADER_SIZE + MAX_PAYLOAD].iter().all(|b| *b == 0));
        assert_eq!(&bytes[WIRE_SIZE - 8..WIRE_SIZE - 4], &0xAABBu32.to_le_bytes());
        assert_eq!(&bytes[WIRE_SIZE - 4..], &0x10u32.to_le_bytes());

        assert_eq!(IpcMessage::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert!(matches!(
            IpcMessage::decode(&[0u8; 10]),
            Err(MessageError::BadWireSize { len: 10, .. })
        ));

        let mut bytes = sample().encode();
        bytes[16..20].copy_from_slice(&(MAX_PAYLOAD as u32 + 1).to_le_bytes());
        assert!(matches!(
            IpcMessage::decode(&bytes),
            Err(MessageError::BadPayloadLength(_))
        ));
    }

    #[test]
    fn test_json_payload() {
        let msg = IpcMessage::new(EndpointId::new(1), EndpointId::new(2))
            .with_json(&Ping { seq: 4 })
            .unwrap();
        assert_eq!(msg.payload_json::<Ping>().unwrap(), Ping { seq: 4 });
    }

    #[test]
    fn test_deserialize_enforces_payload_limit() {
        let msg = sample();
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(serde_json::from_value::<IpcMessage>(json.clone()).unwrap(), msg);

        let mut oversized = json;
        oversized["payload"] = serde_json::json!(vec![0u8; MAX_PAYLOAD + 1]);
        let err = serde_json::from_value::<IpcMessage>(oversized).unwrap_err();
        assert!(err.to_string().contains("exceeds"), "{err}");
    }

    #[test]
    fn test_encode_output_always_decodes() {
        let full = IpcMessage::new(EndpointId::new(1), EndpointId::new(2))
            .with_payload(&[7u8; MAX_PAYLOAD])
            .unwrap();
        assert_eq!(IpcMessage::decode(&full.encode()).unwrap(), full);
    }

    #[test]
    fn test_truncate_payload() {
        let mut msg = sample();
        msg.truncate_payload(2);
        assert_eq!(msg.payload(), b"he");
    }
}
