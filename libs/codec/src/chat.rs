use bytes::{Bytes, BytesMut};

use crate::reader::PacketReader;
use crate::writer::PacketWriter;
use crate::{DecodeError, EncodeError};

/// `IM(4)`: a peer-to-peer chat message. Version 0 omits `timestamp`;
/// version >= 1 carries it. All new deployments emit version 1; readers
/// must accept both (spec.md §4.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Im {
    pub sender: i32,
    pub receiver: i32,
    pub timestamp: Option<i64>,
    pub flag: u8,
    pub content: Bytes,
}

impl Im {
    pub(crate) fn decode(mut data: Bytes, version: u8) -> Result<Self, DecodeError> {
        let sender = data.read_i32()?;
        let receiver = data.read_i32()?;
        let timestamp = if version >= 1 { Some(data.read_i64()?) } else { None };
        let flag = data.read_u8()?;
        let content = data.read_rest();
        Ok(Self {
            sender,
            receiver,
            timestamp,
            flag,
            content,
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut, version: u8) -> Result<(), EncodeError> {
        data.write_i32(self.sender);
        data.write_i32(self.receiver);
        if version >= 1 {
            data.write_i64(self.timestamp.unwrap_or(0));
        }
        data.write_u8(self.flag);
        data.write_raw(&self.content);
        Ok(())
    }
}

/// `GROUP_IM(8)`: versioned the same way as `IM`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupIm {
    pub sender: i32,
    pub group_id: i64,
    pub timestamp: Option<i64>,
    pub flag: u8,
    pub content: Bytes,
}

impl GroupIm {
    pub(crate) fn decode(mut data: Bytes, version: u8) -> Result<Self, DecodeError> {
        let sender = data.read_i32()?;
        let group_id = data.read_i64()?;
        let timestamp = if version >= 1 { Some(data.read_i64()?) } else { None };
        let flag = data.read_u8()?;
        let content = data.read_rest();
        Ok(Self {
            sender,
            group_id,
            timestamp,
            flag,
            content,
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut, version: u8) -> Result<(), EncodeError> {
        data.write_i32(self.sender);
        data.write_i64(self.group_id);
        if version >= 1 {
            data.write_i64(self.timestamp.unwrap_or(0));
        }
        data.write_u8(self.flag);
        data.write_raw(&self.content);
        Ok(())
    }
}

/// `ROOM_IM(20)`: never persisted; local fan-out plus `PUBLISH_ROOM`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomIm {
    pub sender: i32,
    pub room_id: i64,
    pub content: Bytes,
}

impl RoomIm {
    pub(crate) fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            sender: data.read_i32()?,
            room_id: data.read_i64()?,
            content: data.read_rest(),
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        data.write_i32(self.sender);
        data.write_i64(self.room_id);
        data.write_raw(&self.content);
        Ok(())
    }
}

/// `ENTER_ROOM(18)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnterRoom {
    pub room_id: i64,
}

impl EnterRoom {
    pub(crate) fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            room_id: data.read_i64()?,
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        data.write_i64(self.room_id);
        Ok(())
    }
}

/// `LEAVE_ROOM(19)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveRoom {
    pub room_id: i64,
}

impl LeaveRoom {
    pub(crate) fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            room_id: data.read_i64()?,
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        data.write_i64(self.room_id);
        Ok(())
    }
}

/// `RT(17)`: realtime, unpersisted peer message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rt {
    pub sender: i32,
    pub receiver: i32,
    pub content: Bytes,
}

impl Rt {
    pub(crate) fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            sender: data.read_i32()?,
            receiver: data.read_i32()?,
            content: data.read_rest(),
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        data.write_i32(self.sender);
        data.write_i32(self.receiver);
        data.write_raw(&self.content);
        Ok(())
    }
}
