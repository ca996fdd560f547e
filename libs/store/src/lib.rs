#![forbid(unsafe_code)]

mod error;
mod index;
mod log;
mod replication;
mod store;
#[cfg(test)]
mod tests;

pub use error::{Error, Result};
pub use index::{PeerCursor, PeerIndex};
pub use log::{LogReader, LogWriter, FILE_HEADER_LEN, FILE_MAGIC, FILE_VERSION};
pub use replication::{ReplicationStream, SyncBatch};
pub use store::{LogStore, ReplicationItem, StoredMessage, SyncResult};
