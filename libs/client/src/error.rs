use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("decode: {0}")]
    Decode(#[from] im_codec::DecodeError),

    #[error("encode: {0}")]
    Encode(#[from] im_codec::EncodeError),

    #[error("connection closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, Error>;
