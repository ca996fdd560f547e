#![forbid(unsafe_code)]

mod client;
mod error;
mod frame;

pub use client::{Client, TcpClient};
pub use error::{Error, Result};
pub use frame::{read_frame, write_frame};
pub use im_codec::{Header, Packet};
