use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use im_common::{AppId, Uid};
use parking_lot::Mutex as SyncMutex;
use tokio::io::{AsyncRead, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex};

/// The gateway's view of the route broker (IMR). Separated from `im_router`
/// behind a trait because gateway and broker are independently deployable
/// processes (spec.md §2): a production build talks this over the
/// `SUBSCRIBE`/`PUBLISH`/... wire cmds (130-138) through an inter-server
/// connection, while tests and single-process deployments can embed a
/// `Broker` directly. `BrokerLink` below is the in-process implementation.
#[async_trait::async_trait]
pub trait RouteLink: Send + Sync + 'static {
    async fn subscribe(&self, appid: AppId, uid: Uid, online: bool);
    async fn unsubscribe(&self, appid: AppId, uid: Uid, online: bool);
    async fn publish(&self, publish: im_codec::Publish);
    async fn publish_group(&self, publish: im_codec::PublishGroup);
    async fn subscribe_room(&self, appid: AppId, room_id: i64) -> bool;
    async fn unsubscribe_room(&self, appid: AppId, room_id: i64) -> bool;
    async fn publish_room(&self, publish: im_codec::PublishRoom);
}

/// Embeds an `im_router::Broker` directly in the same process, registering
/// this gateway's inbound channel once at construction. Used by the
/// in-process store+router+gateway trio the integration tests drive
/// (spec.md §8).
pub struct BrokerLink {
    broker: std::sync::Arc<im_router::Broker>,
    gateway_id: im_router::GatewayId,
}

impl BrokerLink {
    /// Registers `gateway_id` with `broker`, routing frames addressed to
    /// it onto `inbound`. The caller is expected to drive `inbound` into
    /// `crate::hub::GatewayHub::deliver_from_broker`.
    pub fn new(
        broker: std::sync::Arc<im_router::Broker>,
        gateway_id: im_router::GatewayId,
        inbound: tokio::sync::mpsc::Sender<im_codec::Packet>,
    ) -> Self {
        broker.register_gateway(gateway_id, inbound);
        Self { broker, gateway_id }
    }
}

impl Drop for BrokerLink {
    fn drop(&mut self) {
        self.broker.deregister_gateway(self.gateway_id);
    }
}

#[async_trait::async_trait]
impl RouteLink for BrokerLink {
    async fn subscribe(&self, appid: AppId, uid: Uid, online: bool) {
        self.broker
            .handle_subscribe(self.gateway_id, appid, uid, online)
            .await;
    }

    async fn unsubscribe(&self, appid: AppId, uid: Uid, online: bool) {
        self.broker
            .handle_unsubscribe(self.gateway_id, appid, uid, online)
            .await;
    }

    async fn publish(&self, publish: im_codec::Publish) {
        self.broker.handle_publish(self.gateway_id, publish).await;
    }

    async fn publish_group(&self, publish: im_codec::PublishGroup) {
        self.broker
            .handle_publish_group(self.gateway_id, publish)
            .await;
    }

    async fn subscribe_room(&self, appid: AppId, room_id: i64) -> bool {
        self.broker.subscribe_room(self.gateway_id, appid, room_id)
    }

    async fn unsubscribe_room(&self, appid: AppId, room_id: i64) -> bool {
        self.broker
            .unsubscribe_room(self.gateway_id, appid, room_id)
    }

    async fn publish_room(&self, publish: im_codec::PublishRoom) {
        self.broker
            .handle_publish_room(self.gateway_id, publish)
            .await;
    }
}

/// One long-lived TCP connection to the route broker process, shared by
/// every session this gateway hosts (spec.md §2 "Process topology"). Most
/// calls are fire-and-forget wire sends; `subscribe_room`/`unsubscribe_room`
/// need the broker's first/last-subscriber answer, which has no dedicated
/// wire packet, so the reply is carried on an `Ack` whose `seq` echoes the
/// request and whose frame `flag` byte doubles as the bool (1/0) — a
/// narrow reuse of an existing wire type rather than a new one.
///
/// Does not replay this gateway's subscription set after a reconnect; see
/// DESIGN.md.
pub struct WireRouteLink {
    writer: Mutex<WriteHalf<TcpStream>>,
    seq: AtomicU32,
    pending_room_acks: SyncMutex<HashMap<u32, oneshot::Sender<bool>>>,
}

impl WireRouteLink {
    /// Dials `addr` and spawns the background task that demultiplexes
    /// inbound frames: `Ack` replies matching a pending room RPC resolve
    /// that call, everything else is forwarded onto `inbound` the same way
    /// `BrokerLink` feeds `GatewayHub::deliver_from_broker`.
    pub async fn connect(
        addr: impl tokio::net::ToSocketAddrs,
        inbound: mpsc::Sender<im_codec::Packet>,
    ) -> std::io::Result<Arc<Self>> {
        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = tokio::io::split(stream);

        let link = Arc::new(Self {
            writer: Mutex::new(writer),
            seq: AtomicU32::new(1),
            pending_room_acks: SyncMutex::new(HashMap::new()),
        });

        tokio::spawn(reader_loop(reader, inbound, link.clone()));
        Ok(link)
    }

    async fn send(&self, packet: im_codec::Packet) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let mut writer = self.writer.lock().await;
        if let Err(err) = im_client::write_frame(&mut *writer, seq, 0, &packet).await {
            tracing::warn!(%err, "route link write failed");
        }
    }

    async fn send_room_rpc(&self, packet: im_codec::Packet) -> bool {
        let (tx, rx) = oneshot::channel();
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        self.pending_room_acks.lock().insert(seq, tx);

        let mut writer = self.writer.lock().await;
        if let Err(err) = im_client::write_frame(&mut *writer, seq, 0, &packet).await {
            tracing::warn!(%err, "route link room rpc write failed");
            self.pending_room_acks.lock().remove(&seq);
            return false;
        }
        drop(writer);

        rx.await.unwrap_or(false)
    }
}

async fn reader_loop<R: AsyncRead + Unpin>(
    mut reader: R,
    inbound: mpsc::Sender<im_codec::Packet>,
    link: Arc<WireRouteLink>,
) {
    loop {
        match im_client::read_frame(&mut reader).await {
            Ok(Some((header, im_codec::Packet::Ack(ack)))) => {
                if let Some(tx) = link.pending_room_acks.lock().remove(&ack.seq) {
                    let _ = tx.send(header.flag != 0);
                } else if inbound.send(im_codec::Packet::Ack(ack)).await.is_err() {
                    return;
                }
            }
            Ok(Some((_header, packet))) => {
                if inbound.send(packet).await.is_err() {
                    return;
                }
            }
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(%err, "route link read loop closing");
                return;
            }
        }
    }
}

#[async_trait::async_trait]
impl RouteLink for WireRouteLink {
    async fn subscribe(&self, appid: AppId, uid: Uid, online: bool) {
        self.send(im_codec::Packet::Subscribe(im_codec::Subscribe {
            appid: appid.0,
            uid: uid.0,
            online,
        }))
        .await;
    }

    async fn unsubscribe(&self, appid: AppId, uid: Uid, online: bool) {
        self.send(im_codec::Packet::Unsubscribe(im_codec::Unsubscribe {
            appid: appid.0,
            uid: uid.0,
            online,
        }))
        .await;
    }

    async fn publish(&self, publish: im_codec::Publish) {
        self.send(im_codec::Packet::Publish(publish)).await;
    }

    async fn publish_group(&self, publish: im_codec::PublishGroup) {
        self.send(im_codec::Packet::PublishGroup(publish)).await;
    }

    async fn subscribe_room(&self, appid: AppId, room_id: i64) -> bool {
        self.send_room_rpc(im_codec::Packet::SubscribeRoom(im_codec::SubscribeRoom {
            appid: appid.0,
            room_id,
        }))
        .await
    }

    async fn unsubscribe_room(&self, appid: AppId, room_id: i64) -> bool {
        self.send_room_rpc(im_codec::Packet::UnsubscribeRoom(
            im_codec::UnsubscribeRoom {
                appid: appid.0,
                room_id,
            },
        ))
        .await
    }

    async fn publish_room(&self, publish: im_codec::PublishRoom) {
        self.send(im_codec::Packet::PublishRoom(publish)).await;
    }
}
