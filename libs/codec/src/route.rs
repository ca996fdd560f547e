use bytes::{Bytes, BytesMut};

use crate::reader::PacketReader;
use crate::writer::PacketWriter;
use crate::{DecodeError, EncodeError};

/// `SUBSCRIBE(130)`: gateway -> broker. `online` is the push-eligible flag,
/// independent of `total` login count (spec.md §4.3 packed counter).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscribe {
    pub appid: i32,
    pub uid: i32,
    pub online: bool,
}

impl Subscribe {
    pub(crate) fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            appid: data.read_i32()?,
            uid: data.read_i32()?,
            online: data.read_bool()?,
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        data.write_i32(self.appid);
        data.write_i32(self.uid);
        data.write_bool(self.online);
        Ok(())
    }
}

/// `UNSUBSCRIBE(131)`: symmetric with `Subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unsubscribe {
    pub appid: i32,
    pub uid: i32,
    pub online: bool,
}

impl Unsubscribe {
    pub(crate) fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            appid: data.read_i32()?,
            uid: data.read_i32()?,
            online: data.read_bool()?,
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        data.write_i32(self.appid);
        data.write_i32(self.uid);
        data.write_bool(self.online);
        Ok(())
    }
}

/// `PUBLISH(132)`: broker fans the embedded message out to every gateway
/// with a matching subscription, excluding the origin gateway. `inner_cmd`
/// names the wrapped client-facing cmd (`IM`, `SYSTEM`, `CUSTOMER`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publish {
    pub appid: i32,
    pub sender: i32,
    pub receiver: i32,
    pub inner_cmd: u8,
    pub inner_version: u8,
    pub inner_flag: u8,
    pub raw: Bytes,
}

impl Publish {
    pub(crate) fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            appid: data.read_i32()?,
            sender: data.read_i32()?,
            receiver: data.read_i32()?,
            inner_cmd: data.read_u8()?,
            inner_version: data.read_u8()?,
            inner_flag: data.read_u8()?,
            raw: data.read_rest(),
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        data.write_i32(self.appid);
        data.write_i32(self.sender);
        data.write_i32(self.receiver);
        data.write_u8(self.inner_cmd);
        data.write_u8(self.inner_version);
        data.write_u8(self.inner_flag);
        data.write_raw(&self.raw);
        Ok(())
    }
}

/// `PUBLISH_GROUP(135)`: same shape, fanned out to an explicit receiver set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishGroup {
    pub appid: i32,
    pub sender: i32,
    pub group_id: i64,
    pub receivers: Vec<i32>,
    pub inner_cmd: u8,
    pub inner_version: u8,
    pub inner_flag: u8,
    pub raw: Bytes,
}

impl PublishGroup {
    pub(crate) fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
        let appid = data.read_i32()?;
        let sender = data.read_i32()?;
        let group_id = data.read_i64()?;
        let count = data.read_u16()? as usize;
        let mut receivers = Vec::with_capacity(count);
        for _ in 0..count {
            receivers.push(data.read_i32()?);
        }
        let inner_cmd = data.read_u8()?;
        let inner_version = data.read_u8()?;
        let inner_flag = data.read_u8()?;
        let raw = data.read_rest();
        Ok(Self {
            appid,
            sender,
            group_id,
            receivers,
            inner_cmd,
            inner_version,
            inner_flag,
            raw,
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        ensure!(
            self.receivers.len() <= u16::MAX as usize,
            EncodeError::PayloadTooLarge
        );
        data.write_i32(self.appid);
        data.write_i32(self.sender);
        data.write_i64(self.group_id);
        data.write_u16(self.receivers.len() as u16);
        for receiver in &self.receivers {
            data.write_i32(*receiver);
        }
        data.write_u8(self.inner_cmd);
        data.write_u8(self.inner_version);
        data.write_u8(self.inner_flag);
        data.write_raw(&self.raw);
        Ok(())
    }
}

/// `SUBSCRIBE_ROOM(136)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscribeRoom {
    pub appid: i32,
    pub room_id: i64,
}

impl SubscribeRoom {
    pub(crate) fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            appid: data.read_i32()?,
            room_id: data.read_i64()?,
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        data.write_i32(self.appid);
        data.write_i64(self.room_id);
        Ok(())
    }
}

/// `UNSUBSCRIBE_ROOM(137)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsubscribeRoom {
    pub appid: i32,
    pub room_id: i64,
}

impl UnsubscribeRoom {
    pub(crate) fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            appid: data.read_i32()?,
            room_id: data.read_i64()?,
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        data.write_i32(self.appid);
        data.write_i64(self.room_id);
        Ok(())
    }
}

/// `PUBLISH_ROOM(138)`: forwarded only, never queued for push (room
/// messages are never persisted).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRoom {
    pub appid: i32,
    pub room_id: i64,
    pub sender: i32,
    pub content: Bytes,
}

impl PublishRoom {
    pub(crate) fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            appid: data.read_i32()?,
            room_id: data.read_i64()?,
            sender: data.read_i32()?,
            content: data.read_rest(),
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        data.write_i32(self.appid);
        data.write_i64(self.room_id);
        data.write_i32(self.sender);
        data.write_raw(&self.content);
        Ok(())
    }
}
