use std::convert::TryFrom;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use im_codec::{cmd, flag, Ack, AuthStatus, Customer, CustomerSupport, Im, Packet, Platform};
use im_common::{limits, redis_keys, AppId, DeviceId, MsgId, Uid};
use redis::AsyncCommands;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;

use crate::auth;
use crate::error::{Error, Result};
use crate::filter::{apply_text_filter, TextFilter};
use crate::frame_io::read_frame;
use crate::hub::GatewayHub;
use crate::queues::{mailbox, Mailbox};
use crate::session::{Session, SessionState};
use crate::writer::run_writer;

/// Drives one client socket end to end: spawns the write task, then runs
/// the read loop inline until the peer disconnects, the read deadline
/// trips, or a protocol violation closes the session (spec.md §4.2, §5).
pub async fn run<R, W>(
    mut reader: R,
    writer: W,
    conn_id: u64,
    remote_addr: String,
    hub: Arc<GatewayHub>,
    mut redis: redis::aio::ConnectionManager,
    filter: Arc<dyn TextFilter>,
) where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (outbox, mailbox_writer) = mailbox();
    let writer_task = tokio::spawn(run_writer(writer, mailbox_writer));

    let mut conn = Connection {
        conn_id,
        remote_addr,
        hub,
        outbox,
        filter,
        state: SessionState::Unauth,
        session: None,
    };

    loop {
        let frame = match timeout(limits::READ_DEADLINE, read_frame(&mut reader, MAX_FRAME_SIZE)).await {
            Ok(Ok(Some((_header, packet)))) => packet,
            Ok(Ok(None)) => break, // peer closed cleanly
            Ok(Err(err)) => {
                tracing::debug!(conn_id, remote_addr = %conn.remote_addr, %err, "decode error, closing");
                break;
            }
            Err(_elapsed) => {
                tracing::debug!(conn_id, remote_addr = %conn.remote_addr, "read deadline expired");
                break;
            }
        };

        let started = tokio::time::Instant::now();
        let cmd = frame.cmd();
        if let Err(err) = conn.handle_packet(&mut redis, frame).await {
            tracing::debug!(conn_id, %err, "closing connection after handler error");
            break;
        }
        let elapsed = started.elapsed();
        if elapsed > limits::SLOW_HANDLE_THRESHOLD {
            tracing::warn!(conn_id, cmd, ?elapsed, "slow handling");
        }
        if conn.state == SessionState::Closing {
            break;
        }
    }

    conn.cleanup().await;
    drop(conn.outbox);
    tokio::time::sleep(limits::CLOSE_DRAIN_WAIT).await;
    writer_task.abort();
}

/// Accept-side cap on a single frame's body size.
const MAX_FRAME_SIZE: usize = 1 << 20;

struct Connection {
    conn_id: u64,
    remote_addr: String,
    hub: Arc<GatewayHub>,
    outbox: Mailbox,
    filter: Arc<dyn TextFilter>,
    state: SessionState,
    session: Option<Session>,
}

impl Connection {
    async fn handle_packet(
        &mut self,
        redis: &mut redis::aio::ConnectionManager,
        packet: Packet,
    ) -> Result<()> {
        if let Some(session) = self.session.as_mut() {
            session.touch();
        }

        match (self.state, packet) {
            (_, Packet::Ping) => {
                self.outbox.enqueue(Packet::Pong).await;
                Ok(())
            }

            (SessionState::Unauth, Packet::AuthToken(auth_token)) => {
                self.handle_auth(redis, auth_token).await
            }
            (SessionState::Authed, Packet::AuthToken(_)) => Ok(()), // repeat AUTH_TOKEN: ignored

            (SessionState::Unauth, _) => Err(Error::ProtocolViolation(
                "only AUTH_TOKEN/PING accepted before authentication",
            )),

            (SessionState::Authed, Packet::Im(im)) => self.handle_im(im).await,
            (SessionState::Authed, Packet::Customer(customer)) => {
                self.handle_customer(customer).await
            }
            (SessionState::Authed, Packet::CustomerSupport(support)) => {
                self.handle_customer_support(support).await
            }
            (SessionState::Authed, Packet::Sync(sync)) => {
                self.handle_sync(redis, sync.last_msgid).await
            }
            (SessionState::Authed, Packet::SyncKey(key)) => {
                self.handle_sync_key(redis, key.last_msgid).await
            }
            (SessionState::Authed, Packet::EnterRoom(enter)) => {
                self.handle_enter_room(enter.room_id).await
            }
            (SessionState::Authed, Packet::LeaveRoom(leave)) => {
                self.handle_leave_room(leave.room_id).await
            }
            (SessionState::Authed, Packet::RoomIm(room_im)) => self.handle_room_im(room_im).await,
            (SessionState::Authed, Packet::Ack(_)) => Ok(()),

            (SessionState::Authed, other) => {
                tracing::debug!(cmd = other.cmd(), "ignoring unsupported cmd from client");
                Ok(())
            }

            (SessionState::Closing | SessionState::Closed, _) => Err(Error::SessionClosed),
        }
    }

    async fn handle_auth(
        &mut self,
        redis: &mut redis::aio::ConnectionManager,
        auth_token: im_codec::AuthToken,
    ) -> Result<()> {
        let identity = auth::resolve_token(redis, &auth_token.token).await?;
        let Some(identity) = identity else {
            self.outbox
                .enqueue(Packet::AuthStatus(AuthStatus {
                    status: 1,
                    public_ip: None,
                }))
                .await;
            return Ok(());
        };

        let platform = Platform::try_from(auth_token.platform).unwrap_or(Platform::Web);
        let online = auth::derive_online(platform, identity.notification_on);
        let device_id = DeviceId(
            auth::allocate_device_id(redis, &auth_token.device, auth_token.platform).await?,
        );

        let appid = AppId(identity.appid);
        let uid = Uid(identity.uid);

        self.outbox
            .enqueue(Packet::AuthStatus(AuthStatus {
                status: 0,
                public_ip: None,
            }))
            .await;

        self.hub
            .register_session(self.conn_id, appid, uid, device_id, self.outbox.clone());
        self.hub.route.subscribe(appid, uid, online).await;

        self.session = Some(Session::new(
            appid,
            uid,
            device_id,
            platform,
            online,
            identity.forbidden,
            0,
        ));
        self.state = SessionState::Authed;
        Ok(())
    }

    /// The peer-send pipeline from spec.md §4.2: validate, filter, stamp,
    /// double-save, publish for push-eligibility, notify other devices on
    /// both ends, ack.
    async fn handle_im(&mut self, im: Im) -> Result<()> {
        let session = self.require_session()?;
        if im.sender != session.uid.0 {
            return Err(Error::ProtocolViolation("IM sender must match session uid"));
        }
        if session.forbidden {
            return Ok(());
        }

        let content = if im.flag & flag::TEXT != 0 {
            apply_text_filter(self.filter.as_ref(), &im.content).await
        } else {
            im.content.to_vec()
        };

        let timestamped = Im {
            sender: im.sender,
            receiver: im.receiver,
            timestamp: Some(unix_timestamp_millis()),
            flag: im.flag,
            content: Bytes::from(content),
        };
        let mut body = bytes::BytesMut::new();
        Packet::Im(timestamped.clone()).encode(&mut body)?;
        let raw = body.freeze();

        let appid = session.appid;
        let receiver = Uid(im.receiver);
        let sender_uid = session.uid;
        let device_id = session.device_id;
        let conn_id = self.conn_id;

        let msgid_r = self
            .hub
            .store
            .save_peer_message(appid, receiver, device_id, cmd::IM, im.flag, &raw)
            .await?;
        let msgid_s = self
            .hub
            .store
            .save_peer_message(appid, sender_uid, device_id, cmd::IM, im.flag, &raw)
            .await?;

        let unpersistent = im.flag & flag::UNPERSISTENT != 0;
        if !unpersistent || !self.hub.has_local_session(appid, receiver) {
            self.hub
                .route
                .publish(im_codec::Publish {
                    appid: appid.0,
                    sender: im.sender,
                    receiver: im.receiver,
                    inner_cmd: cmd::IM,
                    inner_version: 1,
                    inner_flag: im.flag,
                    raw: raw.clone(),
                })
                .await;
        }

        self.hub
            .notify_local_other_devices(appid, receiver, conn_id, msgid_r)
            .await;
        self.hub
            .notify_local_other_devices(appid, sender_uid, conn_id, msgid_s)
            .await;

        self.outbox.enqueue(Packet::Ack(Ack { seq: 0 })).await;
        Ok(())
    }

    /// Customer-service double-save: the message lands on both the
    /// seller's `kefu_appid` queue and the customer's own app queue
    /// (spec.md §4.2), skipping persistence entirely under `UNPERSISTENT`.
    async fn handle_customer(&mut self, customer: Customer) -> Result<()> {
        let session = self.require_session()?;
        if customer.sender != session.uid.0 {
            return Err(Error::ProtocolViolation(
                "CUSTOMER sender must match session uid",
            ));
        }
        self.double_save_customer(
            session.appid,
            session.device_id,
            self.conn_id,
            cmd::CUSTOMER,
            customer.sender,
            customer.receiver,
            customer.flag,
            &customer.content,
        )
        .await
    }

    async fn handle_customer_support(&mut self, support: CustomerSupport) -> Result<()> {
        let session = self.require_session()?;
        if support.sender != session.uid.0 {
            return Err(Error::ProtocolViolation(
                "CUSTOMER_SUPPORT sender must match session uid",
            ));
        }
        self.double_save_customer(
            session.appid,
            session.device_id,
            self.conn_id,
            cmd::CUSTOMER_SUPPORT,
            support.sender,
            support.receiver,
            support.flag,
            &support.content,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn double_save_customer(
        &mut self,
        appid: AppId,
        device_id: DeviceId,
        conn_id: u64,
        inner_cmd: u8,
        sender: i32,
        receiver: i32,
        inner_flag: u8,
        content: &Bytes,
    ) -> Result<()> {
        let mut body = bytes::BytesMut::new();
        let packet = if inner_cmd == cmd::CUSTOMER {
            Packet::Customer(Customer {
                sender,
                receiver,
                flag: inner_flag,
                content: content.clone(),
            })
        } else {
            Packet::CustomerSupport(CustomerSupport {
                sender,
                receiver,
                flag: inner_flag,
                content: content.clone(),
            })
        };
        packet.encode(&mut body)?;
        let raw = body.freeze();

        let kefu_appid = AppId(self.hub.config.kefu_appid);
        let unpersistent = inner_flag & flag::UNPERSISTENT != 0;

        if !unpersistent {
            let msgid_seller = self
                .hub
                .store
                .save_peer_message(kefu_appid, Uid(receiver), device_id, inner_cmd, inner_flag, &raw)
                .await?;
            let msgid_customer = self
                .hub
                .store
                .save_peer_message(appid, Uid(sender), device_id, inner_cmd, inner_flag, &raw)
                .await?;
            self.hub
                .notify_local_other_devices(kefu_appid, Uid(receiver), conn_id, msgid_seller)
                .await;
            self.hub
                .notify_local_other_devices(appid, Uid(sender), conn_id, msgid_customer)
                .await;
        }

        if !unpersistent || !self.hub.has_local_session(kefu_appid, Uid(receiver)) {
            self.hub
                .route
                .publish(im_codec::Publish {
                    appid: kefu_appid.0,
                    sender,
                    receiver,
                    inner_cmd,
                    inner_version: 0,
                    inner_flag,
                    raw,
                })
                .await;
        }

        Ok(())
    }

    /// `SYNC(last_msgid)`: `0` substitutes the stored `sync_key`. Suppresses
    /// the session's own writes after its first sync unless `sync_self` is
    /// configured (spec.md §4.2, open question b).
    async fn handle_sync(
        &mut self,
        redis: &mut redis::aio::ConnectionManager,
        last_msgid: i64,
    ) -> Result<()> {
        let sync_self = self.hub.config.sync_self;
        let sync_limit = self.hub.config.sync_limit;
        let sync_group_limit = self.hub.config.sync_group_limit;
        let session = self.require_session()?;
        let appid = session.appid;
        let uid = session.uid;
        // Own-account messages (sent by any of this uid's devices) show on
        // the session's first SYNC and are suppressed from the second
        // onward; `sync_self` disables the suppression altogether
        // (spec.md §4.2, §8 scenario 4).
        let suppress_self = !sync_self && session.sync_count > 0;

        let from = if last_msgid == 0 {
            let stored = self.stored_sync_key(redis, appid, uid).await?;
            MsgId(stored)
        } else {
            MsgId(last_msgid)
        };

        let result = self
            .hub
            .store
            .sync_message(appid, uid, from, sync_group_limit, sync_limit)
            .await?;

        self.outbox
            .enqueue(Packet::SyncBegin(im_codec::SyncBegin {
                last_msgid: result.last_msgid.0,
            }))
            .await;

        for stored in result.messages.into_iter().rev() {
            let Ok(mut inner) = Packet::decode(stored.cmd, 1, stored.flag, stored.raw) else {
                continue;
            };
            let is_self = packet_sender(&inner) == Some(uid.0);
            if is_self && suppress_self {
                continue;
            }
            let mut flag = stored.flag;
            if is_self {
                flag |= flag::SELF;
            }
            restamp_self_flag(&mut inner, flag);
            self.outbox.enqueue(inner).await;
        }

        let new_key = result.last_msgid.0.max(from.0);
        self.outbox
            .enqueue(Packet::SyncEnd(im_codec::SyncEnd { sync_key: new_key }))
            .await;
        self.advance_sync_key(redis, appid, uid, new_key).await?;

        if let Some(session) = self.session.as_mut() {
            session.sync_count += 1;
        }
        Ok(())
    }

    /// Client's periodic advancement hint; the stored key only ever moves
    /// forward.
    async fn handle_sync_key(
        &mut self,
        redis: &mut redis::aio::ConnectionManager,
        last_msgid: i64,
    ) -> Result<()> {
        let session = self.require_session()?;
        let appid = session.appid;
        let uid = session.uid;
        self.advance_sync_key(redis, appid, uid, last_msgid).await
    }

    async fn stored_sync_key(
        &self,
        redis: &mut redis::aio::ConnectionManager,
        appid: AppId,
        uid: Uid,
    ) -> Result<i64> {
        let key = redis_keys::user_key(appid.0, uid.0);
        let value: Option<i64> = redis.hget(&key, redis_keys::FIELD_SYNC_KEY).await?;
        Ok(value.unwrap_or(0))
    }

    async fn advance_sync_key(
        &self,
        redis: &mut redis::aio::ConnectionManager,
        appid: AppId,
        uid: Uid,
        candidate: i64,
    ) -> Result<()> {
        let key = redis_keys::user_key(appid.0, uid.0);
        let current = self.stored_sync_key(redis, appid, uid).await?;
        if candidate > current {
            let _: () = redis.hset(&key, redis_keys::FIELD_SYNC_KEY, candidate).await?;
        }
        Ok(())
    }

    async fn handle_enter_room(&mut self, room_id: i64) -> Result<()> {
        let conn_id = self.conn_id;
        let mailbox = self.outbox.clone();
        let (appid, prior_room) = {
            let session = self.require_session()?;
            (session.appid, session.room)
        };
        if let Some(prior) = prior_room {
            if self.hub.leave_room(conn_id, appid, prior) {
                self.hub.route.unsubscribe_room(appid, prior).await;
            }
        }
        if self.hub.route.subscribe_room(appid, room_id).await {
            tracing::debug!(appid = appid.0, room_id, "first local subscriber for room");
        }
        self.hub.join_room(conn_id, appid, room_id, mailbox);
        if let Some(session) = self.session.as_mut() {
            session.room = Some(room_id);
        }
        Ok(())
    }

    async fn handle_leave_room(&mut self, room_id: i64) -> Result<()> {
        let conn_id = self.conn_id;
        let appid = self.require_session()?.appid;
        if self.hub.leave_room(conn_id, appid, room_id) {
            self.hub.route.unsubscribe_room(appid, room_id).await;
        }
        if let Some(session) = self.session.as_mut() {
            if session.room == Some(room_id) {
                session.room = None;
            }
        }
        Ok(())
    }

    async fn handle_room_im(&mut self, room_im: im_codec::RoomIm) -> Result<()> {
        let session = self.require_session()?;
        if session.room != Some(room_im.room_id) {
            return Err(Error::ProtocolViolation("ROOM_IM outside joined room"));
        }
        self.hub
            .route
            .publish_room(im_codec::PublishRoom {
                appid: session.appid.0,
                room_id: room_im.room_id,
                sender: room_im.sender,
                content: room_im.content.clone(),
            })
            .await;
        Ok(())
    }

    fn require_session(&self) -> Result<&Session> {
        self.session
            .as_ref()
            .ok_or(Error::ProtocolViolation("no authenticated session"))
    }

    async fn cleanup(&mut self) {
        self.state = SessionState::Closing;
        self.hub.deregister_session(
            self.conn_id,
            self.session.as_ref().map_or(AppId(0), |s| s.appid),
            self.session.as_ref().map_or(Uid(0), |s| s.uid),
        );
        if let Some(session) = self.session.take() {
            self.hub.route.unsubscribe(session.appid, session.uid, session.online).await;
            if let Some(room) = session.room {
                if self.hub.leave_room(self.conn_id, session.appid, room) {
                    self.hub.route.unsubscribe_room(session.appid, room).await;
                }
            }
        }
        self.state = SessionState::Closed;
    }
}

fn unix_timestamp_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as i64
}

/// The wire-level `sender` a synced entry carries, used to decide whether
/// it was authored by the syncing uid itself (any of that account's
/// devices) rather than by whoever the syncing device happens to be.
fn packet_sender(packet: &Packet) -> Option<i32> {
    match packet {
        Packet::Im(im) => Some(im.sender),
        Packet::GroupIm(im) => Some(im.sender),
        Packet::Customer(c) => Some(c.sender),
        Packet::CustomerSupport(c) => Some(c.sender),
        _ => None,
    }
}

/// Patches a decoded sync payload's own `flag` field to carry the `SELF`
/// bit computed above, mirroring what `Im`/`Customer`/... carried on the
/// wire at save time.
fn restamp_self_flag(packet: &mut Packet, flag: u8) {
    match packet {
        Packet::Im(im) => im.flag = flag,
        Packet::GroupIm(im) => im.flag = flag,
        Packet::Customer(c) => c.flag = flag,
        Packet::CustomerSupport(c) => c.flag = flag,
        _ => {}
    }
}
