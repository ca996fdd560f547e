use std::time::Instant;

use im_codec::Platform;
use im_common::{AppId, DeviceId, Uid};

/// `UNAUTH -> AUTHED -> CLOSING -> CLOSED` (spec.md §4.2). `UNAUTH` accepts
/// only `AUTH_TOKEN`/`PING`; everything else is silently dropped until the
/// session authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauth,
    Authed,
    Closing,
    Closed,
}

/// The identity and bookkeeping a session carries once authenticated.
/// Created at `AUTH_TOKEN` success, destroyed on socket close.
#[derive(Debug, Clone)]
pub struct Session {
    pub appid: AppId,
    pub uid: Uid,
    pub device_id: DeviceId,
    pub platform: Platform,
    pub online: bool,
    pub forbidden: bool,
    pub protocol_version: u8,
    pub last_seen: Instant,
    /// Room this session currently occupies, if any (at most one at a
    /// time; entering a new room implicitly leaves the old one).
    pub room: Option<i64>,
    /// Counts `SYNC` calls made this session; the self-filter (suppressing
    /// messages the session's own device sent) only relaxes on the first
    /// sync when `sync_self` is set.
    pub sync_count: u32,
}

impl Session {
    pub fn new(
        appid: AppId,
        uid: Uid,
        device_id: DeviceId,
        platform: Platform,
        online: bool,
        forbidden: bool,
        protocol_version: u8,
    ) -> Self {
        Self {
            appid,
            uid,
            device_id,
            platform,
            online,
            forbidden,
            protocol_version,
            last_seen: Instant::now(),
            room: None,
            sync_count: 0,
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }
}
