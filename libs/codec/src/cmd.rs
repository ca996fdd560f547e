//! Fixed numeric `cmd` codes from the wire taxonomy. An unknown `cmd` from a
//! client closes the connection; an unknown `cmd` from a peer server may be
//! logged and ignored (see `Packet::decode`).

// Session control
pub const AUTH_TOKEN: u8 = 15;
pub const AUTH_STATUS: u8 = 3;
pub const PING: u8 = 13;
pub const PONG: u8 = 14;
pub const ACK: u8 = 5;

// Peer / group / room chat
pub const IM: u8 = 4;
pub const GROUP_IM: u8 = 8;
pub const ROOM_IM: u8 = 20;
pub const ENTER_ROOM: u8 = 18;
pub const LEAVE_ROOM: u8 = 19;
pub const RT: u8 = 17;

// System / notification
pub const SYSTEM: u8 = 21;
pub const NOTIFICATION: u8 = 36;
pub const GROUP_NOTIFICATION: u8 = 7;
pub const UNREAD_COUNT: u8 = 22;
pub const VOIP_CONTROL: u8 = 64;

// Synchronization
pub const SYNC: u8 = 26;
pub const SYNC_BEGIN: u8 = 27;
pub const SYNC_END: u8 = 28;
pub const SYNC_NOTIFY: u8 = 29;
pub const SYNC_KEY: u8 = 34;

// Group-super sync variants, positionally parallel to SYNC..SYNC_KEY.
pub const SYNC_GROUP: u8 = 30;
pub const SYNC_GROUP_BEGIN: u8 = 31;
pub const SYNC_GROUP_END: u8 = 32;
pub const SYNC_GROUP_NOTIFY: u8 = 33;
pub const SYNC_GROUP_KEY: u8 = 35;

// Customer service
pub const CUSTOMER: u8 = 24;
pub const CUSTOMER_SUPPORT: u8 = 25;

// Reserved; accept-and-discard stubs (spec.md §9 open question a).
pub const MSG_RST: u8 = 6;
pub const MSG_CUSTOMER_SERVICE: u8 = 23;

// Route fabric (gateway <-> broker)
pub const SUBSCRIBE: u8 = 130;
pub const UNSUBSCRIBE: u8 = 131;
pub const PUBLISH: u8 = 132;
pub const PUBLISH_GROUP: u8 = 135;
pub const SUBSCRIBE_ROOM: u8 = 136;
pub const UNSUBSCRIBE_ROOM: u8 = 137;
pub const PUBLISH_ROOM: u8 = 138;

// Store protocol / replication (store <-> store)
pub const STORAGE_SYNC_BEGIN: u8 = 220;
pub const STORAGE_SYNC_MESSAGE: u8 = 221;
pub const STORAGE_SYNC_MESSAGE_BATCH: u8 = 222;

// Offline-queue records (on-disk framing reuses the wire codec)
pub const OFFLINE_V2: u8 = 250;
pub const OFFLINE: u8 = 254;
