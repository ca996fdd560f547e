#![forbid(unsafe_code)]
#![warn(clippy::default_trait_access)]

#[macro_use]
mod macros;

mod chat;
pub mod cmd;
mod codec;
mod customer;
mod error;
mod frame;
mod notify;
mod offline;
mod packet;
mod reader;
mod route;
mod session;
mod store_proto;
mod sync;
#[cfg(test)]
mod tests;
mod types;
mod writer;

pub use chat::{EnterRoom, GroupIm, Im, LeaveRoom, RoomIm, Rt};
pub use codec::Codec;
pub use customer::{Customer, CustomerSupport};
pub use error::{DecodeError, EncodeError};
pub use frame::{Header, HEADER_LEN};
pub use notify::{GroupNotification, Notification, System, UnreadCount, VoipControl};
pub use offline::{Offline, OfflineV2};
pub use packet::Packet;
pub use route::{
    Publish, PublishGroup, PublishRoom, Subscribe, SubscribeRoom, Unsubscribe, UnsubscribeRoom,
};
pub use session::{Ack, AuthStatus, AuthToken};
pub use store_proto::{StorageSyncBegin, StorageSyncMessage, StorageSyncMessageBatch};
pub use sync::{
    Sync, SyncBegin, SyncEnd, SyncGroup, SyncGroupBegin, SyncGroupEnd, SyncGroupKey,
    SyncGroupNotify, SyncKey, SyncNotify,
};
pub use types::{flag, Platform};

/// 32 KiB max body size for client-facing traffic (spec.md §4.1).
pub const CLIENT_MAX_SIZE: usize = 32 * 1024;
/// 32 MiB max body size for store-to-store sync traffic (spec.md §4.1).
pub const SYNC_MAX_SIZE: usize = 32 * 1024 * 1024;
