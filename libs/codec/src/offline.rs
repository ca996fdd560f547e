use bytes::{Bytes, BytesMut};

use crate::reader::PacketReader;
use crate::writer::PacketWriter;
use crate::{DecodeError, EncodeError};

/// `OFFLINE_V2(250)`: a node in the per-user offline recall chain, appended
/// for every persistent message (spec.md §3 `OfflineEntry v2`, §4.4 write
/// path step 4). `flag & GROUP` marks a group-originated entry, which is
/// skipped when walking the peer-only sub-chain via `prev_peer_msgid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfflineV2 {
    pub appid: i32,
    pub uid: i32,
    pub msgid: i64,
    pub device_id: i32,
    pub flag: u8,
    pub prev_msgid: i64,
    pub prev_peer_msgid: i64,
}

impl OfflineV2 {
    pub(crate) fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            appid: data.read_i32()?,
            uid: data.read_i32()?,
            msgid: data.read_i64()?,
            device_id: data.read_i32()?,
            flag: data.read_u8()?,
            prev_msgid: data.read_i64()?,
            prev_peer_msgid: data.read_i64()?,
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        data.write_i32(self.appid);
        data.write_i32(self.uid);
        data.write_i64(self.msgid);
        data.write_i32(self.device_id);
        data.write_u8(self.flag);
        data.write_i64(self.prev_msgid);
        data.write_i64(self.prev_peer_msgid);
        Ok(())
    }
}

/// `OFFLINE(254)`: legacy v1 record, predating the peer/group split. Readers
/// must still accept it; writers never emit it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offline {
    pub appid: i32,
    pub uid: i32,
    pub msgid: i64,
    pub prev_msgid: i64,
}

impl Offline {
    pub(crate) fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            appid: data.read_i32()?,
            uid: data.read_i32()?,
            msgid: data.read_i64()?,
            prev_msgid: data.read_i64()?,
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        data.write_i32(self.appid);
        data.write_i32(self.uid);
        data.write_i64(self.msgid);
        data.write_i64(self.prev_msgid);
        Ok(())
    }
}
