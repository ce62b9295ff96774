//! IPC transport contract

use core_types::{ChannelId, EndpointId};
use ipc::IpcMessage;
use kernel_api::{IpcError, IpcTransport};

const A: EndpointId = EndpointId::new(1);
const B: EndpointId = EndpointId::new(2);

/// Runs every transport check against `transport`, which must be uninitialised.
pub fn check_all(transport: &mut dyn IpcTransport) {
    check_requires_init(transport);
    check_channel_reuse(transport);
    check_round_trip(transport);
    check_empty_and_unknown(transport);
    check_destroy(transport);
    check_channel_limit(transport);
    check_stats(transport);
    check_shutdown(transport);
}

fn init(transport: &mut dyn IpcTransport) -> ChannelId {
    transport.init();
    transport
        .create_channel(A, B)
        .unwrap_or_else(|e| panic!("{}: create failed: {e}", transport.name()))
}

fn message(id: u32) -> IpcMessage {
    IpcMessage::new(A, B)
        .with_id(id)
        .with_type(7)
        .with_payload(b"ping")
        .unwrap()
}

pub fn check_requires_init(transport: &mut dyn IpcTransport) {
    let name = transport.name();
    assert_eq!(
        transport.create_channel(A, B),
        Err(IpcError::NotInitialized),
        "{name}"
    );
    assert_eq!(transport.channel_count(), 0, "{name}");
}

pub fn check_channel_reuse(transport: &mut dyn IpcTransport) {
    let ch = init(transport);
    let name = transport.name();
    assert!(ch >= ChannelId::FIRST, "{name}: {ch}");
    assert_eq!(transport.create_channel(A, B), Ok(ch), "{name}");
    assert_eq!(transport.channel_count(), 1, "{name}");
    assert!(transport.check_permission(A, B), "{name}");
    assert!(transport.can_send(ch), "{name}");
}

pub fn check_round_trip(transport: &mut dyn IpcTransport) {
    let ch = init(transport);
    let name = transport.name();
    let sent = message(11);
    transport.send_message(ch, &sent).unwrap();
    assert!(transport.has_messages(ch), "{name}");
    assert_eq!(transport.queue_size(ch), 1, "{name}");

    let got = transport.receive_message(ch).unwrap();
    assert_eq!(got.sender_id, A, "{name}");
    assert_eq!(got.receiver_id, B, "{name}");
    assert_eq!(got.message_id, 11, "{name}");
    assert_eq!(got.msg_type, 7, "{name}");
    assert_eq!(got.payload(), b"ping", "{name}");
    assert!(!transport.has_messages(ch), "{name}");

    transport.send_message(ch, &message(12)).unwrap();
    assert_eq!(transport.try_receive(ch).map(|m| m.message_id), Ok(12), "{name}");
}

pub fn check_empty_and_unknown(transport: &mut dyn IpcTransport) {
    let ch = init(transport);
    let name = transport.name();
    assert_eq!(transport.receive_message(ch), Err(IpcError::Empty(ch)), "{name}");
    assert_eq!(transport.try_receive(ch), Err(IpcError::Empty(ch)), "{name}");

    let ghost = ChannelId::new(999);
    assert_eq!(
        transport.send_message(ghost, &message(1)),
        Err(IpcError::UnknownChannel(ghost)),
        "{name}"
    );
    assert!(
        matches!(
            transport.receive_message(ghost),
            Err(IpcError::UnknownChannel(_))
        ),
        "{name}"
    );
    assert_eq!(transport.queue_size(ghost), 0, "{name}");
    assert!(!transport.has_messages(ghost), "{name}");
    assert!(!transport.can_send(ghost), "{name}");
    assert!(transport.channel_stats(ghost).is_none(), "{name}");
}

pub fn check_destroy(transport: &mut dyn IpcTransport) {
    let ch = init(transport);
    let name = transport.name();
    transport.send_message(ch, &message(1)).unwrap();
    transport.destroy_channel(ch);
    assert_eq!(transport.channel_count(), 0, "{name}");
    assert!(!transport.has_messages(ch), "{name}");
    assert_eq!(
        transport.send_message(ch, &message(2)),
        Err(IpcError::UnknownChannel(ch)),
        "{name}"
    );

    transport.destroy_channel(ChannelId::new(999));
    let fresh = transport.create_channel(A, B).unwrap();
    assert_ne!(fresh, ch, "{name}: destroyed id reissued");
    assert_eq!(transport.channel_count(), 1, "{name}");
}

pub fn check_channel_limit(transport: &mut dyn IpcTransport) {
    transport.init();
    let name = transport.name();
    let mut created = 0u32;
    let err = loop {
        let sender = EndpointId::new(100 + 2 * created);
        let receiver = EndpointId::new(101 + 2 * created);
        match transport.create_channel(sender, receiver) {
            Ok(_) => created += 1,
            Err(e) => break e,
        }
        assert!(created <= 4096, "{name}: channel table never fills");
    };
    assert!(matches!(err, IpcError::ChannelLimit { .. }), "{name}: {err}");
    assert_eq!(transport.channel_count(), created as usize, "{name}");
}

pub fn check_stats(transport: &mut dyn IpcTransport) {
    let ch = init(transport);
    let name = transport.name();
    for id in 0..3 {
        transport.send_message(ch, &message(id)).unwrap();
        transport.receive_message(ch).unwrap();
    }
    let stats = transport.stats();
    assert_eq!(stats.name, name);
    assert_eq!(stats.active_channels, 1, "{name}");
    assert_eq!(stats.messages_sent, 3, "{name}");
    assert_eq!(stats.messages_received, 3, "{name}");
    assert_eq!(stats.messages_dropped, 0, "{name}");
    assert_eq!(stats.delivery_rate(), 100.0, "{name}");

    let channel = transport.channel_stats(ch).unwrap();
    assert_eq!((channel.sender, channel.receiver), (A, B), "{name}");
    assert_eq!((channel.sent, channel.received, channel.pending), (3, 3, 0), "{name}");
}

pub fn check_shutdown(transport: &mut dyn IpcTransport) {
    let ch = init(transport);
    let name = transport.name();
    transport.shutdown();
    assert_eq!(transport.channel_count(), 0, "{name}");
    assert_eq!(
        transport.send_message(ch, &message(1)),
        Err(IpcError::NotInitialized),
        "{name}"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_transport_meets_contract() {
        for mut transport in crate::transports() {
            check_all(transport.as_mut());
        }
    }
}
