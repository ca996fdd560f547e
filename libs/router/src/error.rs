use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("gateway channel closed")]
    GatewayGone,
}

pub type Result<T> = std::result::Result<T, Error>;
