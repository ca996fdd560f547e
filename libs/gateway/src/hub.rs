use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use im_codec::Packet;
use im_common::{AppId, DeviceId, Uid};
use im_store::LogStore;
use parking_lot::RwLock;

use crate::queues::Mailbox;
use crate::route_link::RouteLink;

static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_conn_id() -> u64 {
    NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed)
}

/// Tuning knobs that would otherwise be scattered config fields; grouped
/// the way the teacher groups `ServiceState::config`.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Disables the self-filter entirely when `true` (spec.md §9 open
    /// question b). Default `false`: a session's first `SYNC` still shows
    /// its own writes, later syncs in the same session suppress them.
    pub sync_self: bool,
    pub sync_limit: usize,
    pub sync_group_limit: usize,
    /// The tenant id customer-service messages are double-saved under on
    /// the seller's side (spec.md §4.2).
    pub kefu_appid: i32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            sync_self: false,
            sync_limit: 200,
            sync_group_limit: 50,
            kefu_appid: 0,
        }
    }
}

struct RegisteredSession {
    conn_id: u64,
    device_id: DeviceId,
    mailbox: Mailbox,
}

/// Local (appid, uid) -> connections and (appid, room) -> connections
/// registries, the gateway-process-local half of spec.md §4.3's route
/// table (the broker holds the fabric-wide half).
#[derive(Default)]
struct LocalRegistry {
    by_user: RwLock<HashMap<(i32, i32), Vec<RegisteredSession>>>,
    by_room: RwLock<HashMap<(i32, i64), Vec<RegisteredSession>>>,
}

/// Everything one gateway process shares across all client connections:
/// the store client, the route-broker link, and the local delivery
/// registries a `PUBLISH`/`PUBLISH_GROUP`/`PUBLISH_ROOM` frame from the
/// broker fans out against.
pub struct GatewayHub {
    pub store: Arc<LogStore>,
    pub route: Arc<dyn RouteLink>,
    pub config: GatewayConfig,
    registry: LocalRegistry,
}

impl GatewayHub {
    pub fn new(store: Arc<LogStore>, route: Arc<dyn RouteLink>, config: GatewayConfig) -> Self {
        Self {
            store,
            route,
            config,
            registry: LocalRegistry::default(),
        }
    }

    pub fn register_session(
        &self,
        conn_id: u64,
        appid: AppId,
        uid: Uid,
        device_id: DeviceId,
        mailbox: Mailbox,
    ) {
        self.registry
            .by_user
            .write()
            .entry((appid.0, uid.0))
            .or_default()
            .push(RegisteredSession {
                conn_id,
                device_id,
                mailbox,
            });
    }

    pub fn deregister_session(&self, conn_id: u64, appid: AppId, uid: Uid) {
        let mut by_user = self.registry.by_user.write();
        if let Some(sessions) = by_user.get_mut(&(appid.0, uid.0)) {
            sessions.retain(|s| s.conn_id != conn_id);
            if sessions.is_empty() {
                by_user.remove(&(appid.0, uid.0));
            }
        }
    }

    pub fn has_local_session(&self, appid: AppId, uid: Uid) -> bool {
        self.registry
            .by_user
            .read()
            .get(&(appid.0, uid.0))
            .is_some_and(|sessions| !sessions.is_empty())
    }

    pub fn join_room(&self, conn_id: u64, appid: AppId, room_id: i64, mailbox: Mailbox) {
        self.registry
            .by_room
            .write()
            .entry((appid.0, room_id))
            .or_default()
            .push(RegisteredSession {
                conn_id,
                device_id: DeviceId(0),
                mailbox,
            });
    }

    /// Returns whether the room is now empty (the caller should
    /// `unsubscribe_room` at the broker when this is true).
    pub fn leave_room(&self, conn_id: u64, appid: AppId, room_id: i64) -> bool {
        let mut by_room = self.registry.by_room.write();
        if let Some(sessions) = by_room.get_mut(&(appid.0, room_id)) {
            sessions.retain(|s| s.conn_id != conn_id);
            let empty = sessions.is_empty();
            if empty {
                by_room.remove(&(appid.0, room_id));
            }
            empty
        } else {
            true
        }
    }

    /// Fans a frame arriving from the broker out to whichever local
    /// sessions it targets. Driven by the loop consuming the channel
    /// registered via `RouteLink`/`BrokerLink::new`.
    pub async fn deliver_from_broker(&self, packet: Packet) {
        match packet {
            Packet::Publish(publish) => self.deliver_publish(&publish).await,
            Packet::PublishGroup(publish) => self.deliver_publish_group(&publish).await,
            Packet::PublishRoom(publish) => self.deliver_publish_room(&publish).await,
            // Presence announcements relayed by other gateways; nothing in
            // this fabric subscribes to them beyond the broker's own
            // counters, so there is no local session to hand them to.
            Packet::Subscribe(_) | Packet::Unsubscribe(_) => {}
            other => {
                tracing::debug!(cmd = other.cmd(), "ignoring unexpected broker frame");
            }
        }
    }

    async fn deliver_publish(&self, publish: &im_codec::Publish) {
        let Ok(inner) = Packet::decode(
            publish.inner_cmd,
            publish.inner_version,
            publish.inner_flag,
            publish.raw.clone(),
        ) else {
            tracing::warn!(cmd = publish.inner_cmd, "failed to decode published frame");
            return;
        };
        self.fan_out_to_user(AppId(publish.appid), Uid(publish.receiver), inner)
            .await;
    }

    async fn deliver_publish_group(&self, publish: &im_codec::PublishGroup) {
        let Ok(inner) = Packet::decode(
            publish.inner_cmd,
            publish.inner_version,
            publish.inner_flag,
            publish.raw.clone(),
        ) else {
            tracing::warn!(cmd = publish.inner_cmd, "failed to decode published frame");
            return;
        };
        for &receiver in &publish.receivers {
            self.fan_out_to_user(AppId(publish.appid), Uid(receiver), inner.clone())
                .await;
        }
    }

    async fn deliver_publish_room(&self, publish: &im_codec::PublishRoom) {
        let room_im = Packet::RoomIm(im_codec::RoomIm {
            sender: publish.sender,
            room_id: publish.room_id,
            content: publish.content.clone(),
        });
        let targets: Vec<Mailbox> = {
            let by_room = self.registry.by_room.read();
            by_room
                .get(&(publish.appid, publish.room_id))
                .map(|sessions| sessions.iter().map(|s| s.mailbox.clone()).collect())
                .unwrap_or_default()
        };
        for mailbox in targets {
            mailbox.enqueue(room_im.clone()).await;
        }
    }

    async fn fan_out_to_user(&self, appid: AppId, uid: Uid, packet: Packet) {
        let targets: Vec<Mailbox> = {
            let by_user = self.registry.by_user.read();
            by_user
                .get(&(appid.0, uid.0))
                .map(|sessions| sessions.iter().map(|s| s.mailbox.clone()).collect())
                .unwrap_or_default()
        };
        for mailbox in targets {
            mailbox.enqueue(packet.clone()).await;
        }
    }

    /// Notifies a sender's *other* devices of a write via `SYNC_NOTIFY`,
    /// skipping `exclude_conn_id` (the originating connection already has
    /// the message it just sent).
    pub async fn notify_local_other_devices(
        &self,
        appid: AppId,
        uid: Uid,
        exclude_conn_id: u64,
        msgid: im_common::MsgId,
    ) {
        let targets: Vec<Mailbox> = {
            let by_user = self.registry.by_user.read();
            by_user
                .get(&(appid.0, uid.0))
                .map(|sessions| {
                    sessions
                        .iter()
                        .filter(|s| s.conn_id != exclude_conn_id)
                        .map(|s| s.mailbox.clone())
                        .collect()
                })
                .unwrap_or_default()
        };
        let notify = Packet::SyncNotify(im_codec::SyncNotify { msgid: msgid.0 });
        for mailbox in targets {
            mailbox.enqueue(notify.clone()).await;
        }
    }
}
