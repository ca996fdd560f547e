use bytes::{Bytes, BytesMut};

use crate::*;

/// P2: for every `cmd` and every valid body, `decode(encode(m)) == m`.
fn roundtrip(packet: Packet) {
    let mut buf = BytesMut::new();
    packet.encode(&mut buf).expect("encode");
    let decoded = Packet::decode(packet.cmd(), packet.version(), 0, buf.freeze()).expect("decode");
    assert_eq!(packet, decoded);
}

#[test]
fn roundtrip_session_control() {
    roundtrip(Packet::AuthToken(AuthToken {
        token: "T_A".into(),
        device: "device-1".into(),
        platform: 1,
    }));
    roundtrip(Packet::AuthStatus(AuthStatus {
        status: 0,
        public_ip: None,
    }));
    roundtrip(Packet::AuthStatus(AuthStatus {
        status: 0,
        public_ip: Some(0x7f000001),
    }));
    roundtrip(Packet::Ping);
    roundtrip(Packet::Pong);
    roundtrip(Packet::Ack(Ack { seq: 42 }));
}

#[test]
fn roundtrip_chat() {
    roundtrip(Packet::Im(Im {
        sender: 100,
        receiver: 200,
        timestamp: None,
        flag: flag::TEXT,
        content: Bytes::from_static(b"hi"),
    }));
    roundtrip(Packet::Im(Im {
        sender: 100,
        receiver: 200,
        timestamp: Some(1_700_000_000),
        flag: flag::TEXT,
        content: Bytes::from_static(b"hi"),
    }));
    roundtrip(Packet::GroupIm(GroupIm {
        sender: 100,
        group_id: 555,
        timestamp: Some(1_700_000_000),
        flag: 0,
        content: Bytes::from_static(b"hello group"),
    }));
    roundtrip(Packet::RoomIm(RoomIm {
        sender: 100,
        room_id: 7,
        content: Bytes::from_static(b"room chat"),
    }));
    roundtrip(Packet::EnterRoom(EnterRoom { room_id: 7 }));
    roundtrip(Packet::LeaveRoom(LeaveRoom { room_id: 7 }));
    roundtrip(Packet::Rt(Rt {
        sender: 1,
        receiver: 2,
        content: Bytes::from_static(b"typing"),
    }));
}

#[test]
fn roundtrip_notify() {
    roundtrip(Packet::System(System {
        receiver: 1,
        content: Bytes::from_static(b"maintenance"),
    }));
    roundtrip(Packet::Notification(Notification {
        uid: 1,
        content: Bytes::from_static(b"notice"),
    }));
    roundtrip(Packet::GroupNotification(GroupNotification {
        group_id: 9,
        content: Bytes::from_static(b"group notice"),
    }));
    roundtrip(Packet::UnreadCount(UnreadCount { count: 3 }));
    roundtrip(Packet::VoipControl(VoipControl {
        sender: 1,
        receiver: 2,
        content: Bytes::from_static(b"ringing"),
    }));
}

#[test]
fn roundtrip_sync() {
    roundtrip(Packet::Sync(Sync { last_msgid: 0 }));
    roundtrip(Packet::SyncBegin(SyncBegin { last_msgid: 12345 }));
    roundtrip(Packet::SyncEnd(SyncEnd { sync_key: 12345 }));
    roundtrip(Packet::SyncNotify(SyncNotify { msgid: 99 }));
    roundtrip(Packet::SyncKey(SyncKey { last_msgid: 12345 }));
    roundtrip(Packet::SyncGroup(SyncGroup {
        group_id: 9,
        last_msgid: 0,
    }));
    roundtrip(Packet::SyncGroupBegin(SyncGroupBegin {
        group_id: 9,
        last_msgid: 10,
    }));
    roundtrip(Packet::SyncGroupEnd(SyncGroupEnd {
        group_id: 9,
        sync_key: 10,
    }));
    roundtrip(Packet::SyncGroupNotify(SyncGroupNotify {
        group_id: 9,
        msgid: 10,
    }));
    roundtrip(Packet::SyncGroupKey(SyncGroupKey {
        group_id: 9,
        last_msgid: 10,
    }));
}

#[test]
fn roundtrip_customer_service() {
    roundtrip(Packet::Customer(Customer {
        sender: 1,
        receiver: 2,
        flag: 0,
        content: Bytes::from_static(b"help"),
    }));
    roundtrip(Packet::CustomerSupport(CustomerSupport {
        sender: 2,
        receiver: 1,
        flag: flag::UNPERSISTENT,
        content: Bytes::from_static(b"how can I help"),
    }));
    roundtrip(Packet::Rst);
    roundtrip(Packet::CustomerService);
}

#[test]
fn roundtrip_route_fabric() {
    roundtrip(Packet::Subscribe(Subscribe {
        appid: 1,
        uid: 100,
        online: true,
    }));
    roundtrip(Packet::Unsubscribe(Unsubscribe {
        appid: 1,
        uid: 100,
        online: false,
    }));
    roundtrip(Packet::Publish(Publish {
        appid: 1,
        sender: 100,
        receiver: 200,
        inner_cmd: cmd::IM,
        inner_version: 1,
        inner_flag: flag::TEXT,
        raw: Bytes::from_static(b"hi"),
    }));
    roundtrip(Packet::PublishGroup(PublishGroup {
        appid: 1,
        sender: 100,
        group_id: 9,
        receivers: vec![200, 300, 400],
        inner_cmd: cmd::GROUP_IM,
        inner_version: 1,
        inner_flag: 0,
        raw: Bytes::from_static(b"hello group"),
    }));
    roundtrip(Packet::SubscribeRoom(SubscribeRoom { appid: 1, room_id: 7 }));
    roundtrip(Packet::UnsubscribeRoom(UnsubscribeRoom {
        appid: 1,
        room_id: 7,
    }));
    roundtrip(Packet::PublishRoom(PublishRoom {
        appid: 1,
        room_id: 7,
        sender: 100,
        content: Bytes::from_static(b"room chat"),
    }));
}

#[test]
fn roundtrip_store_protocol() {
    roundtrip(Packet::StorageSyncBegin(StorageSyncBegin { cursor: 0 }));
    roundtrip(Packet::StorageSyncMessage(StorageSyncMessage {
        msgid: 128,
        appid: 1,
        uid: 100,
        inner_cmd: cmd::IM,
        inner_flag: 0,
        raw: Bytes::from_static(b"hi"),
    }));
    roundtrip(Packet::StorageSyncMessageBatch(StorageSyncMessageBatch {
        messages: vec![
            StorageSyncMessage {
                msgid: 128,
                appid: 1,
                uid: 100,
                inner_cmd: cmd::IM,
                inner_flag: 0,
                raw: Bytes::from_static(b"hi"),
            },
            StorageSyncMessage {
                msgid: 256,
                appid: 1,
                uid: 200,
                inner_cmd: cmd::IM,
                inner_flag: 0,
                raw: Bytes::from_static(b"there"),
            },
        ],
    }));
    roundtrip(Packet::StorageSyncMessageBatch(StorageSyncMessageBatch {
        messages: vec![],
    }));
}

#[test]
fn roundtrip_offline_records() {
    roundtrip(Packet::OfflineV2(OfflineV2 {
        appid: 1,
        uid: 100,
        msgid: 128,
        device_id: 5,
        flag: 0,
        prev_msgid: 64,
        prev_peer_msgid: 64,
    }));
    roundtrip(Packet::Offline(Offline {
        appid: 1,
        uid: 100,
        msgid: 128,
        prev_msgid: 64,
    }));
}

#[test]
fn zero_length_body_accepted() {
    let decoded = Packet::decode(cmd::PING, 0, 0, Bytes::new()).unwrap();
    assert_eq!(decoded, Packet::Ping);
}

#[test]
fn unknown_cmd_is_rejected() {
    let err = Packet::decode(200, 0, 0, Bytes::new()).unwrap_err();
    assert!(matches!(err, DecodeError::UnknownCmd(200)));
}

#[test]
fn truncated_body_is_malformed() {
    let err = Ack::decode(Bytes::from_static(&[0, 1])).unwrap_err();
    assert!(matches!(err, DecodeError::MalformedPacket));
}
