use bytes::{Bytes, BytesMut};
use bytestring::ByteString;

use crate::reader::PacketReader;
use crate::writer::PacketWriter;
use crate::{DecodeError, EncodeError};

/// `AUTH_TOKEN(15)`: client presents an opaque token resolved against Redis,
/// plus the `(device, platform)` pair a stable `device_ID` gets allocated
/// for (spec.md §4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub token: ByteString,
    pub device: ByteString,
    pub platform: u8,
}

impl AuthToken {
    pub(crate) fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            token: data.read_string()?,
            device: data.read_string()?,
            platform: data.read_u8()?,
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        data.write_string(&self.token)?;
        data.write_string(&self.device)?;
        data.write_u8(self.platform);
        Ok(())
    }
}

/// `AUTH_STATUS(3)`: `status == 0` is success. Version 1 adds `public_ip`;
/// version 0 is the bare status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthStatus {
    pub status: u8,
    pub public_ip: Option<u32>,
}

impl AuthStatus {
    pub(crate) fn decode(mut data: Bytes, version: u8) -> Result<Self, DecodeError> {
        let status = data.read_u8()?;
        let public_ip = if version >= 1 { Some(data.read_u32()?) } else { None };
        Ok(Self { status, public_ip })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut, version: u8) -> Result<(), EncodeError> {
        data.write_u8(self.status);
        if version >= 1 {
            data.write_u32(self.public_ip.unwrap_or(0));
        }
        Ok(())
    }
}

/// `ACK(5)`: acknowledges a previously sent `seq`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub seq: u32,
}

impl Ack {
    pub(crate) fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            seq: data.read_u32()?,
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        data.write_u32(self.seq);
        Ok(())
    }
}
