use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("decode: {0}")]
    Decode(#[from] im_codec::DecodeError),

    #[error("encode: {0}")]
    Encode(#[from] im_codec::EncodeError),

    /// The active block's tail-magic check failed on boot; administrative
    /// recovery (truncation to last valid record) is manual (spec.md §7).
    #[error("corrupt log: {0}")]
    CorruptLog(String),

    /// A replica saw a batch outside its expected range; the caller must
    /// disconnect and reconnect with a fresh cursor (spec.md §7).
    #[error("replication divergence: {0}")]
    ReplicationDivergence(String),
}

pub type Result<T> = std::result::Result<T, Error>;
