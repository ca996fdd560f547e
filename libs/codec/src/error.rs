use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed packet")]
    MalformedPacket,

    #[error("unknown packet type: {0}")]
    UnknownCmd(u8),

    #[error("packet too large")]
    PacketTooLarge,

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("payload too large")]
    PayloadTooLarge,

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
