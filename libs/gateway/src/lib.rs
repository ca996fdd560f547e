#![forbid(unsafe_code)]

mod auth;
mod connection;
mod error;
mod filter;
mod frame_io;
mod hub;
mod queues;
mod route_link;
mod session;
mod writer;

pub use auth::{allocate_device_id, derive_online, resolve_token, TokenIdentity};
pub use connection::run as run_connection;
pub use error::{Error, Result};
pub use filter::{apply_text_filter, NoopFilter, TextFilter};
pub use frame_io::{read_frame, write_frame};
pub use hub::{next_conn_id, GatewayConfig, GatewayHub};
pub use queues::{mailbox, Mailbox, MailboxWriter};
pub use route_link::{BrokerLink, RouteLink, WireRouteLink};
pub use session::{Session, SessionState};
