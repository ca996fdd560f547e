use bytes::{Bytes, BytesMut};

use crate::chat::{EnterRoom, GroupIm, Im, LeaveRoom, RoomIm, Rt};
use crate::cmd;
use crate::customer::{Customer, CustomerSupport};
use crate::notify::{GroupNotification, Notification, System, UnreadCount, VoipControl};
use crate::offline::{Offline, OfflineV2};
use crate::route::{
    Publish, PublishGroup, PublishRoom, Subscribe, SubscribeRoom, Unsubscribe, UnsubscribeRoom,
};
use crate::session::{Ack, AuthStatus, AuthToken};
use crate::store_proto::{StorageSyncBegin, StorageSyncMessage, StorageSyncMessageBatch};
use crate::sync::{
    Sync, SyncBegin, SyncEnd, SyncGroup, SyncGroupBegin, SyncGroupEnd, SyncGroupKey,
    SyncGroupNotify, SyncKey, SyncNotify,
};
use crate::{DecodeError, EncodeError};

/// The closed tagged-union over `cmd` (spec.md §9's "explicit sum type and
/// array-indexed dispatch table" guidance). One variant per wire `cmd`;
/// `Ping`/`Pong` carry no body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    AuthToken(AuthToken),
    AuthStatus(AuthStatus),
    Ping,
    Pong,
    Ack(Ack),

    Im(Im),
    GroupIm(GroupIm),
    RoomIm(RoomIm),
    EnterRoom(EnterRoom),
    LeaveRoom(LeaveRoom),
    Rt(Rt),

    System(System),
    Notification(Notification),
    GroupNotification(GroupNotification),
    UnreadCount(UnreadCount),
    VoipControl(VoipControl),

    Sync(Sync),
    SyncBegin(SyncBegin),
    SyncEnd(SyncEnd),
    SyncNotify(SyncNotify),
    SyncKey(SyncKey),
    SyncGroup(SyncGroup),
    SyncGroupBegin(SyncGroupBegin),
    SyncGroupEnd(SyncGroupEnd),
    SyncGroupNotify(SyncGroupNotify),
    SyncGroupKey(SyncGroupKey),

    Customer(Customer),
    CustomerSupport(CustomerSupport),

    /// Reserved stub: accepted and discarded (spec.md §9 open question a).
    Rst,
    /// Reserved stub: accepted and discarded (spec.md §9 open question a).
    CustomerService,

    Subscribe(Subscribe),
    Unsubscribe(Unsubscribe),
    Publish(Publish),
    PublishGroup(PublishGroup),
    SubscribeRoom(SubscribeRoom),
    UnsubscribeRoom(UnsubscribeRoom),
    PublishRoom(PublishRoom),

    StorageSyncBegin(StorageSyncBegin),
    StorageSyncMessage(StorageSyncMessage),
    StorageSyncMessageBatch(StorageSyncMessageBatch),

    OfflineV2(OfflineV2),
    Offline(Offline),
}

impl Packet {
    /// The wire `cmd` this packet encodes to.
    pub fn cmd(&self) -> u8 {
        match self {
            Packet::AuthToken(_) => cmd::AUTH_TOKEN,
            Packet::AuthStatus(_) => cmd::AUTH_STATUS,
            Packet::Ping => cmd::PING,
            Packet::Pong => cmd::PONG,
            Packet::Ack(_) => cmd::ACK,

            Packet::Im(_) => cmd::IM,
            Packet::GroupIm(_) => cmd::GROUP_IM,
            Packet::RoomIm(_) => cmd::ROOM_IM,
            Packet::EnterRoom(_) => cmd::ENTER_ROOM,
            Packet::LeaveRoom(_) => cmd::LEAVE_ROOM,
            Packet::Rt(_) => cmd::RT,

            Packet::System(_) => cmd::SYSTEM,
            Packet::Notification(_) => cmd::NOTIFICATION,
            Packet::GroupNotification(_) => cmd::GROUP_NOTIFICATION,
            Packet::UnreadCount(_) => cmd::UNREAD_COUNT,
            Packet::VoipControl(_) => cmd::VOIP_CONTROL,

            Packet::Sync(_) => cmd::SYNC,
            Packet::SyncBegin(_) => cmd::SYNC_BEGIN,
            Packet::SyncEnd(_) => cmd::SYNC_END,
            Packet::SyncNotify(_) => cmd::SYNC_NOTIFY,
            Packet::SyncKey(_) => cmd::SYNC_KEY,
            Packet::SyncGroup(_) => cmd::SYNC_GROUP,
            Packet::SyncGroupBegin(_) => cmd::SYNC_GROUP_BEGIN,
            Packet::SyncGroupEnd(_) => cmd::SYNC_GROUP_END,
            Packet::SyncGroupNotify(_) => cmd::SYNC_GROUP_NOTIFY,
            Packet::SyncGroupKey(_) => cmd::SYNC_GROUP_KEY,

            Packet::Customer(_) => cmd::CUSTOMER,
            Packet::CustomerSupport(_) => cmd::CUSTOMER_SUPPORT,

            Packet::Rst => cmd::MSG_RST,
            Packet::CustomerService => cmd::MSG_CUSTOMER_SERVICE,

            Packet::Subscribe(_) => cmd::SUBSCRIBE,
            Packet::Unsubscribe(_) => cmd::UNSUBSCRIBE,
            Packet::Publish(_) => cmd::PUBLISH,
            Packet::PublishGroup(_) => cmd::PUBLISH_GROUP,
            Packet::SubscribeRoom(_) => cmd::SUBSCRIBE_ROOM,
            Packet::UnsubscribeRoom(_) => cmd::UNSUBSCRIBE_ROOM,
            Packet::PublishRoom(_) => cmd::PUBLISH_ROOM,

            Packet::StorageSyncBegin(_) => cmd::STORAGE_SYNC_BEGIN,
            Packet::StorageSyncMessage(_) => cmd::STORAGE_SYNC_MESSAGE,
            Packet::StorageSyncMessageBatch(_) => cmd::STORAGE_SYNC_MESSAGE_BATCH,

            Packet::OfflineV2(_) => cmd::OFFLINE_V2,
            Packet::Offline(_) => cmd::OFFLINE,
        }
    }

    /// The body layout version this packet was built with. Only `Im`,
    /// `GroupIm`, and `AuthStatus` vary; everything else is 0.
    pub fn version(&self) -> u8 {
        match self {
            Packet::Im(im) => im.timestamp.map_or(0, |_| 1),
            Packet::GroupIm(im) => im.timestamp.map_or(0, |_| 1),
            Packet::AuthStatus(status) => status.public_ip.map_or(0, |_| 1),
            _ => 0,
        }
    }

    pub fn decode(cmd: u8, version: u8, flag: u8, data: Bytes) -> Result<Self, DecodeError> {
        Ok(match cmd {
            cmd::AUTH_TOKEN => Packet::AuthToken(AuthToken::decode(data)?),
            cmd::AUTH_STATUS => Packet::AuthStatus(AuthStatus::decode(data, version)?),
            cmd::PING => Packet::Ping,
            cmd::PONG => Packet::Pong,
            cmd::ACK => Packet::Ack(Ack::decode(data)?),

            cmd::IM => Packet::Im(Im::decode(data, version)?),
            cmd::GROUP_IM => Packet::GroupIm(GroupIm::decode(data, version)?),
            cmd::ROOM_IM => Packet::RoomIm(RoomIm::decode(data)?),
            cmd::ENTER_ROOM => Packet::EnterRoom(EnterRoom::decode(data)?),
            cmd::LEAVE_ROOM => Packet::LeaveRoom(LeaveRoom::decode(data)?),
            cmd::RT => Packet::Rt(Rt::decode(data)?),

            cmd::SYSTEM => Packet::System(System::decode(data)?),
            cmd::NOTIFICATION => Packet::Notification(Notification::decode(data)?),
            cmd::GROUP_NOTIFICATION => Packet::GroupNotification(GroupNotification::decode(data)?),
            cmd::UNREAD_COUNT => Packet::UnreadCount(UnreadCount::decode(data)?),
            cmd::VOIP_CONTROL => Packet::VoipControl(VoipControl::decode(data)?),

            cmd::SYNC => Packet::Sync(Sync::decode(data)?),
            cmd::SYNC_BEGIN => Packet::SyncBegin(SyncBegin::decode(data)?),
            cmd::SYNC_END => Packet::SyncEnd(SyncEnd::decode(data)?),
            cmd::SYNC_NOTIFY => Packet::SyncNotify(SyncNotify::decode(data)?),
            cmd::SYNC_KEY => Packet::SyncKey(SyncKey::decode(data)?),
            cmd::SYNC_GROUP => Packet::SyncGroup(SyncGroup::decode(data)?),
            cmd::SYNC_GROUP_BEGIN => Packet::SyncGroupBegin(SyncGroupBegin::decode(data)?),
            cmd::SYNC_GROUP_END => Packet::SyncGroupEnd(SyncGroupEnd::decode(data)?),
            cmd::SYNC_GROUP_NOTIFY => Packet::SyncGroupNotify(SyncGroupNotify::decode(data)?),
            cmd::SYNC_GROUP_KEY => Packet::SyncGroupKey(SyncGroupKey::decode(data)?),

            cmd::CUSTOMER => Packet::Customer(Customer::decode(data)?),
            cmd::CUSTOMER_SUPPORT => Packet::CustomerSupport(CustomerSupport::decode(data)?),

            cmd::MSG_RST => Packet::Rst,
            cmd::MSG_CUSTOMER_SERVICE => Packet::CustomerService,

            cmd::SUBSCRIBE => Packet::Subscribe(Subscribe::decode(data)?),
            cmd::UNSUBSCRIBE => Packet::Unsubscribe(Unsubscribe::decode(data)?),
            cmd::PUBLISH => Packet::Publish(Publish::decode(data)?),
            cmd::PUBLISH_GROUP => Packet::PublishGroup(PublishGroup::decode(data)?),
            cmd::SUBSCRIBE_ROOM => Packet::SubscribeRoom(SubscribeRoom::decode(data)?),
            cmd::UNSUBSCRIBE_ROOM => Packet::UnsubscribeRoom(UnsubscribeRoom::decode(data)?),
            cmd::PUBLISH_ROOM => Packet::PublishRoom(PublishRoom::decode(data)?),

            cmd::STORAGE_SYNC_BEGIN => Packet::StorageSyncBegin(StorageSyncBegin::decode(data)?),
            cmd::STORAGE_SYNC_MESSAGE => {
                Packet::StorageSyncMessage(StorageSyncMessage::decode(data)?)
            }
            cmd::STORAGE_SYNC_MESSAGE_BATCH => {
                Packet::StorageSyncMessageBatch(StorageSyncMessageBatch::decode(data)?)
            }

            cmd::OFFLINE_V2 => Packet::OfflineV2(OfflineV2::decode(data)?),
            cmd::OFFLINE => Packet::Offline(Offline::decode(data)?),

            n => return Err(DecodeError::UnknownCmd(n)),
        })
    }

    pub fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        match self {
            Packet::AuthToken(p) => p.encode(data),
            Packet::AuthStatus(p) => p.encode(data, self.version()),
            Packet::Ping | Packet::Pong | Packet::Rst | Packet::CustomerService => Ok(()),
            Packet::Ack(p) => p.encode(data),

            Packet::Im(p) => p.encode(data, self.version()),
            Packet::GroupIm(p) => p.encode(data, self.version()),
            Packet::RoomIm(p) => p.encode(data),
            Packet::EnterRoom(p) => p.encode(data),
            Packet::LeaveRoom(p) => p.encode(data),
            Packet::Rt(p) => p.encode(data),

            Packet::System(p) => p.encode(data),
            Packet::Notification(p) => p.encode(data),
            Packet::GroupNotification(p) => p.encode(data),
            Packet::UnreadCount(p) => p.encode(data),
            Packet::VoipControl(p) => p.encode(data),

            Packet::Sync(p) => p.encode(data),
            Packet::SyncBegin(p) => p.encode(data),
            Packet::SyncEnd(p) => p.encode(data),
            Packet::SyncNotify(p) => p.encode(data),
            Packet::SyncKey(p) => p.encode(data),
            Packet::SyncGroup(p) => p.encode(data),
            Packet::SyncGroupBegin(p) => p.encode(data),
            Packet::SyncGroupEnd(p) => p.encode(data),
            Packet::SyncGroupNotify(p) => p.encode(data),
            Packet::SyncGroupKey(p) => p.encode(data),

            Packet::Customer(p) => p.encode(data),
            Packet::CustomerSupport(p) => p.encode(data),

            Packet::Subscribe(p) => p.encode(data),
            Packet::Unsubscribe(p) => p.encode(data),
            Packet::Publish(p) => p.encode(data),
            Packet::PublishGroup(p) => p.encode(data),
            Packet::SubscribeRoom(p) => p.encode(data),
            Packet::UnsubscribeRoom(p) => p.encode(data),
            Packet::PublishRoom(p) => p.encode(data),

            Packet::StorageSyncBegin(p) => p.encode(data),
            Packet::StorageSyncMessage(p) => p.encode(data),
            Packet::StorageSyncMessageBatch(p) => p.encode(data),

            Packet::OfflineV2(p) => p.encode(data),
            Packet::Offline(p) => p.encode(data),
        }
    }
}
