use bytes::{Bytes, BytesMut};

use crate::reader::PacketReader;
use crate::writer::PacketWriter;
use crate::{DecodeError, EncodeError};

/// `SYSTEM(21)`: server-originated notice to one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct System {
    pub receiver: i32,
    pub content: Bytes,
}

impl System {
    pub(crate) fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            receiver: data.read_i32()?,
            content: data.read_rest(),
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        data.write_i32(self.receiver);
        data.write_raw(&self.content);
        Ok(())
    }
}

/// `NOTIFICATION(36)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub uid: i32,
    pub content: Bytes,
}

impl Notification {
    pub(crate) fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            uid: data.read_i32()?,
            content: data.read_rest(),
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        data.write_i32(self.uid);
        data.write_raw(&self.content);
        Ok(())
    }
}

/// `GROUP_NOTIFICATION(7)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupNotification {
    pub group_id: i64,
    pub content: Bytes,
}

impl GroupNotification {
    pub(crate) fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            group_id: data.read_i64()?,
            content: data.read_rest(),
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        data.write_i64(self.group_id);
        data.write_raw(&self.content);
        Ok(())
    }
}

/// `UNREAD_COUNT(22)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnreadCount {
    pub count: i32,
}

impl UnreadCount {
    pub(crate) fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            count: data.read_i32()?,
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        data.write_i32(self.count);
        Ok(())
    }
}

/// `VOIP_CONTROL(64)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoipControl {
    pub sender: i32,
    pub receiver: i32,
    pub content: Bytes,
}

impl VoipControl {
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
