#![forbid(unsafe_code)]

pub mod config;
pub mod ids;
pub mod limits;
pub mod redis_keys;
pub mod tracing_init;

pub use ids::{AppId, DeviceId, MsgId, Uid, BLOCK_SIZE};
