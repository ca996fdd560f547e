use bytes::{Bytes, BytesMut};

use crate::reader::PacketReader;
use crate::writer::PacketWriter;
use crate::{DecodeError, EncodeError};

/// `STORAGE_SYNC_BEGIN(220)`: replica opens a replication stream at `cursor`
/// (0 for a fresh replica).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageSyncBegin {
    pub cursor: i64,
}

impl StorageSyncBegin {
    pub(crate) fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            cursor: data.read_i64()?,
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        data.write_i64(self.cursor);
        Ok(())
    }
}

/// `STORAGE_SYNC_MESSAGE(221)`: one replicated record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSyncMessage {
    pub msgid: i64,
    pub appid: i32,
    pub uid: i32,
    pub inner_cmd: u8,
    pub inner_flag: u8,
    pub raw: Bytes,
}

impl StorageSyncMessage {
    pub(crate) fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            msgid: data.read_i64()?,
            appid: data.read_i32()?,
            uid: data.read_i32()?,
            inner_cmd: data.read_u8()?,
            inner_flag: data.read_u8()?,
            raw: data.read_rest(),
        })
    }

    fn decode_framed(data: &mut Bytes) -> Result<Self, DecodeError> {
        let msgid = data.read_i64()?;
        let appid = data.read_i32()?;
        let uid = data.read_i32()?;
        let inner_cmd = data.read_u8()?;
        let inner_flag = data.read_u8()?;
        let raw = data.read_binary16()?;
        Ok(Self {
            msgid,
            appid,
            uid,
            inner_cmd,
            inner_flag,
            raw,
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        data.write_i64(self.msgid);
        data.write_i32(self.appid);
        data.write_i32(self.uid);
        data.write_u8(self.inner_cmd);
        data.write_u8(self.inner_flag);
        data.write_raw(&self.raw);
        Ok(())
    }

    fn encode_framed(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        data.write_i64(self.msgid);
        data.write_i32(self.appid);
        data.write_i32(self.uid);
        data.write_u8(self.inner_cmd);
        data.write_u8(self.inner_flag);
        data.write_binary16(&self.raw)
    }
}

/// `STORAGE_SYNC_MESSAGE_BATCH(222)`: historical batches are up to 5000
/// records; live fan-out batches are up to 1000 records or 1s of
/// accumulation (spec.md §4.4 replication).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageSyncMessageBatch {
    pub messages: Vec<StorageSyncMessage>,
}

impl StorageSyncMessageBatch {
    pub(crate) fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
        let count = data.read_u32()? as usize;
        let mut messages = Vec::with_capacity(count.min(5000));
        for _ in 0..count {
            messages.push(StorageSyncMessage::decode_framed(&mut data)?);
        }
        Ok(Self { messages })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        ensure!(
            self.messages.len() <= u32::MAX as usize,
            EncodeError::PayloadTooLarge
        );
        data.write_u32(self.messages.len() as u32);
        for message in &self.messages {
            message.encode_framed(data)?;
        }
        Ok(())
    }
}
