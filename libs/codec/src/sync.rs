use bytes::{Bytes, BytesMut};

use crate::reader::PacketReader;
use crate::writer::PacketWriter;
use crate::{DecodeError, EncodeError};

/// `SYNC(26)`: `last_msgid == 0` means "substitute the stored sync_key".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sync {
    pub last_msgid: i64,
}

impl Sync {
    pub(crate) fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            last_msgid: data.read_i64()?,
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        data.write_i64(self.last_msgid);
        Ok(())
    }
}

/// `SYNC_BEGIN(27)`: opens a sync batch, carrying the server's `last_msgid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncBegin {
    pub last_msgid: i64,
}

impl SyncBegin {
    pub(crate) fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            last_msgid: data.read_i64()?,
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        data.write_i64(self.last_msgid);
        Ok(())
    }
}

/// `SYNC_END(28)`: closes a sync batch, carrying the advanced `sync_key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncEnd {
    pub sync_key: i64,
}

impl SyncEnd {
    pub(crate) fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            sync_key: data.read_i64()?,
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        data.write_i64(self.sync_key);
        Ok(())
    }
}

/// `SYNC_NOTIFY(29)`: pushed toward a recipient's other sessions after a
/// write lands, so they know to pull via `SYNC`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncNotify {
    pub msgid: i64,
}

impl SyncNotify {
    pub(crate) fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            msgid: data.read_i64()?,
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        data.write_i64(self.msgid);
        Ok(())
    }
}

/// `SYNC_KEY(34)`: client's periodic advancement hint; the server never
/// lets the stored key move backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncKey {
    pub last_msgid: i64,
}

impl SyncKey {
    pub(crate) fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            last_msgid: data.read_i64()?,
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        data.write_i64(self.last_msgid);
        Ok(())
    }
}

/// `SYNC_GROUP(30)`: group-super analog of `SYNC`, scoped to one `group_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncGroup {
    pub group_id: i64,
    pub last_msgid: i64,
}

impl SyncGroup {
    pub(crate) fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            group_id: data.read_i64()?,
            last_msgid: data.read_i64()?,
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        data.write_i64(self.group_id);
        data.write_i64(self.last_msgid);
        Ok(())
    }
}

/// `SYNC_GROUP_BEGIN(31)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncGroupBegin {
    pub group_id: i64,
    pub last_msgid: i64,
}

impl SyncGroupBegin {
    pub(crate) fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            group_id: data.read_i64()?,
            last_msgid: data.read_i64()?,
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        data.write_i64(self.group_id);
        data.write_i64(self.last_msgid);
        Ok(())
    }
}

/// `SYNC_GROUP_END(32)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncGroupEnd {
    pub group_id: i64,
    pub sync_key: i64,
}

impl SyncGroupEnd {
    pub(crate) fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            group_id: data.read_i64()?,
            sync_key: data.read_i64()?,
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        data.write_i64(self.group_id);
        data.write_i64(self.sync_key);
        Ok(())
    }
}

/// `SYNC_GROUP_NOTIFY(33)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncGroupNotify {
    pub group_id: i64,
    pub msgid: i64,
}

impl SyncGroupNotify {
    pub(crate) fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            group_id: data.read_i64()?,
            msgid: data.read_i64()?,
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        data.write_i64(self.group_id);
        data.write_i64(self.msgid);
        Ok(())
    }
}

/// `SYNC_GROUP_KEY(35)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncGroupKey {
    pub group_id: i64,
    pub last_msgid: i64,
}

impl SyncGroupKey {
    pub(crate) fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            group_id: data.read_i64()?,
            last_msgid: data.read_i64()?,
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        data.write_i64(self.group_id);
        data.write_i64(self.last_msgid);
        Ok(())
    }
}
