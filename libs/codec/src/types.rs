use std::convert::TryFrom;

use crate::DecodeError;

/// Client platform, carried in `AUTH_STATUS`/session bookkeeping; mobile
/// platforms are always treated as online regardless of `notification_on`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Ios,
    Android,
    Web,
    Desktop,
}

impl Platform {
    pub fn is_mobile(self) -> bool {
        matches!(self, Platform::Ios | Platform::Android)
    }
}

impl TryFrom<u8> for Platform {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Platform::Ios),
            1 => Ok(Platform::Android),
            2 => Ok(Platform::Web),
            3 => Ok(Platform::Desktop),
            _ => Err(DecodeError::MalformedPacket),
        }
    }
}

impl From<Platform> for u8 {
    fn from(value: Platform) -> Self {
        match value {
            Platform::Ios => 0,
            Platform::Android => 1,
            Platform::Web => 2,
            Platform::Desktop => 3,
        }
    }
}

/// Bits of the header `flag` byte. Not every cmd uses every bit.
pub mod flag {
    pub const TEXT: u8 = 0b0000_0001;
    pub const UNPERSISTENT: u8 = 0b0000_0010;
    pub const GROUP: u8 = 0b0000_0100;
    pub const SELF: u8 = 0b0000_1000;
}
