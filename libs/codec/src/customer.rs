use bytes::{Bytes, BytesMut};

use crate::reader::PacketReader;
use crate::writer::PacketWriter;
use crate::{DecodeError, EncodeError};

/// `CUSTOMER(24)`: customer -> seller. Double-saved onto both the seller's
/// `kefu_appid` queue and the customer's own app queue (spec.md §4.2).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Customer {
    pub sender: i32,
    pub receiver: i32,
    pub flag: u8,
    pub content: Bytes,
}

impl Customer {
    pub(crate) fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            sender: data.read_i32()?,
            receiver: data.read_i32()?,
            flag: data.read_u8()?,
            content: data.read_rest(),
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        data.write_i32(self.sender);
        data.write_i32(self.receiver);
        data.write_u8(self.flag);
        data.write_raw(&self.content);
        Ok(())
    }
}

/// `CUSTOMER_SUPPORT(25)`: seller -> customer, same layout as `Customer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerSupport {
    pub sender: i32,
    pub receiver: i32,
    pub flag: u8,
    pub content: Bytes,
}

impl CustomerSupport {
    pub(crate) fn decode(mut data: Bytes) -> Result<Self, DecodeError> {
        Ok(Self {
            sender: data.read_i32()?,
            receiver: data.read_i32()?,
            flag: data.read_u8()?,
            content: data.read_rest(),
        })
    }

    pub(crate) fn encode(&self, data: &mut BytesMut) -> Result<(), EncodeError> {
        data.write_i32(self.sender);
        data.write_i32(self.receiver);
        data.write_u8(self.flag);
        data.write_raw(&self.content);
        Ok(())
    }
}
