use bytes::{BufMut, BytesMut};

use crate::EncodeError;

pub trait PacketWriter {
    fn write_u8(&mut self, value: u8);

    fn write_u16(&mut self, value: u16);

    fn write_u32(&mut self, value: u32);

    fn write_u64(&mut self, value: u64);

    #[inline]
    fn write_i32(&mut self, value: i32) {
        self.write_u32(value as u32);
    }

    #[inline]
    fn write_i64(&mut self, value: i64) {
        self.write_u64(value as u64);
    }

    #[inline]
    fn write_bool(&mut self, value: bool) {
        self.write_u8(value as u8);
    }

    fn write_binary8(&mut self, value: &[u8]) -> Result<(), EncodeError>;

    fn write_binary16(&mut self, value: &[u8]) -> Result<(), EncodeError>;

    fn write_string(&mut self, value: &str) -> Result<(), EncodeError>;

    fn write_raw(&mut self, value: &[u8]);
}

impl PacketWriter for BytesMut {
    #[inline]
    fn write_u8(&mut self, value: u8) {
        self.put_u8(value);
    }

    #[inline]
    fn write_u16(&mut self, value: u16) {
        self.put_u16(value);
    }

    #[inline]
    fn write_u32(&mut self, value: u32) {
        self.put_u32(value);
    }

    #[inline]
    fn write_u64(&mut self, value: u64) {
        self.put_u64(value);
    }

    #[inline]
    fn write_binary8(&mut self, value: &[u8]) -> Result<(), EncodeError> {
        ensure!(value.len() <= u8::MAX as usize, EncodeError::PayloadTooLarge);
        self.put_u8(value.len() as u8);
        self.put_slice(value);
        Ok(())
    }

    #[inline]
    fn write_binary16(&mut self, value: &[u8]) -> Result<(), EncodeError> {
        ensure!(
            value.len() <= u16::MAX as usize,
            EncodeError::PayloadTooLarge
        );
        self.put_u16(value.len() as u16);
        self.put_slice(value);
        Ok(())
    }

    #[inline]
    fn write_string(&mut self, value: &str) -> Result<(), EncodeError> {
        self.write_binary16(value.as_bytes())
    }

    #[inline]
    fn write_raw(&mut self, value: &[u8]) {
        self.put_slice(value);
    }
}
