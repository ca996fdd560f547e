use std::convert::TryInto;

use bytes::{Buf, Bytes};
use bytestring::ByteString;

use crate::DecodeError;

pub trait PacketReader {
    fn read_u8(&mut self) -> Result<u8, DecodeError>;

    fn read_u16(&mut self) -> Result<u16, DecodeError>;

    fn read_u32(&mut self) -> Result<u32, DecodeError>;

    fn read_u64(&mut self) -> Result<u64, DecodeError>;

    #[inline]
    fn read_i32(&mut self) -> Result<i32, DecodeError> {
        Ok(self.read_u32()? as i32)
    }

    #[inline]
    fn read_i64(&mut self) -> Result<i64, DecodeError> {
        Ok(self.read_u64()? as i64)
    }

    #[inline]
    fn read_bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.read_u8()? > 0)
    }

    /// `int8`-length-prefixed raw bytes.
    fn read_binary8(&mut self) -> Result<Bytes, DecodeError>;

    /// `int16`-length-prefixed raw bytes.
    fn read_binary16(&mut self) -> Result<Bytes, DecodeError>;

    /// `int16`-length-prefixed UTF-8 string.
    fn read_string(&mut self) -> Result<ByteString, DecodeError>;

    /// Consumes the remainder of the buffer as raw bytes (frame-bounded
    /// fields with no explicit length prefix).
    fn read_rest(&mut self) -> Bytes;
}

impl PacketReader for Bytes {
    #[inline]
    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        ensure!(self.remaining() >= 1, DecodeError::MalformedPacket);
        Ok(self.get_u8())
    }

    #[inline]
    fn read_u16(&mut self) -> Result<u16, DecodeError> {
        ensure!(self.remaining() >= 2, DecodeError::MalformedPacket);
        Ok(self.get_u16())
    }

    #[inline]
    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        ensure!(self.remaining() >= 4, DecodeError::MalformedPacket);
        Ok(self.get_u32())
    }

    #[inline]
    fn read_u64(&mut self) -> Result<u64, DecodeError> {
        ensure!(self.remaining() >= 8, DecodeError::MalformedPacket);
        Ok(self.get_u64())
    }

    #[inline]
    fn read_binary8(&mut self) -> Result<Bytes, DecodeError> {
        let len = self.read_u8()? as usize;
        ensure!(self.remaining() >= len, DecodeError::MalformedPacket);
        Ok(self.split_to(len))
    }

    #[inline]
    fn read_binary16(&mut self) -> Result<Bytes, DecodeError> {
        let len = self.read_u16()? as usize;
        ensure!(self.remaining() >= len, DecodeError::MalformedPacket);
        Ok(self.split_to(len))
    }

    #[inline]
    fn read_string(&mut self) -> Result<ByteString, DecodeError> {
        let len = self.read_u16()? as usize;
        ensure!(self.remaining() >= len, DecodeError::MalformedPacket);
        self.split_to(len)
            .try_into()
            .map_err(|_| DecodeError::MalformedPacket)
    }

    #[inline]
    fn read_rest(&mut self) -> Bytes {
        self.split_to(self.remaining())
    }
}
