use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("decode: {0}")]
    Decode(#[from] im_codec::DecodeError),

    #[error("encode: {0}")]
    Encode(#[from] im_codec::EncodeError),

    #[error("store: {0}")]
    Store(#[from] im_store::Error),

    #[error("router: {0}")]
    Router(#[from] im_router::Error),

    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    /// The session sent a frame not valid for its current state (e.g.
    /// anything but `AUTH_TOKEN`/`PING` while unauthenticated).
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    /// Two consecutive `wt` enqueue timeouts: the session is stuck and
    /// must be force-closed (spec.md §4.2).
    #[error("session stuck")]
    SessionStuck,

    #[error("session closed")]
    SessionClosed,
}

pub type Result<T> = std::result::Result<T, Error>;
