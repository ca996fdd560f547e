use std::collections::HashMap;

use im_codec::{cmd, flag, Packet};
use im_common::AppId;
use parking_lot::RwLock;
use tokio::sync::mpsc;

use crate::push::{PushItem, PushQueue};
use crate::table::{GatewayId, PresenceEvent, RouteTable};

/// A frame the broker hands back to one gateway connection: either a
/// forwarded client message or a presence frame the gateway must relay
/// onward (`SUBSCRIBE`/`UNSUBSCRIBE`).
pub type GatewaySender = mpsc::Sender<Packet>;

/// The route broker (IMR): presence map plus push-queue fan-out, wired to
/// whichever gateway connections are currently registered. Holds no
/// durable state — a gateway reconnecting is expected to replay its
/// subscription set in full (spec.md §4.3 "Reconnect discipline").
pub struct Broker {
    table: RouteTable,
    push: PushQueue,
    gateways: RwLock<HashMap<GatewayId, GatewaySender>>,
}

impl Broker {
    pub fn new(push: PushQueue) -> Self {
        Self {
            table: RouteTable::new(),
            push,
            gateways: RwLock::new(HashMap::new()),
        }
    }

    pub fn register_gateway(&self, id: GatewayId, sender: GatewaySender) {
        self.gateways.write().insert(id, sender);
    }

    /// Disconnect cleanup: drops every subscription the gateway held. Does
    /// NOT emit `UNSUBSCRIBE` frames to other gateways for correctness —
    /// on a clean reconnect the gateway will re-subscribe to the exact
    /// same set, so suppressing the churn here matches the "no durable
    /// state, reconnect replays" design rather than flapping peers.
    pub fn deregister_gateway(&self, id: GatewayId) {
        self.gateways.write().remove(&id);
        self.table.drop_gateway(id);
    }

    pub async fn handle_subscribe(
        &self,
        gateway: GatewayId,
        appid: AppId,
        uid: im_common::Uid,
        online: bool,
    ) {
        let event = self.table.subscribe(gateway, appid, uid, online);
        self.emit_presence(gateway, appid, uid, event).await;
    }

    pub async fn handle_unsubscribe(
        &self,
        gateway: GatewayId,
        appid: AppId,
        uid: im_common::Uid,
        online: bool,
    ) {
        let event = self.table.unsubscribe(gateway, appid, uid, online);
        self.emit_presence(gateway, appid, uid, event).await;
    }

    async fn emit_presence(
        &self,
        origin: GatewayId,
        appid: AppId,
        uid: im_common::Uid,
        event: PresenceEvent,
    ) {
        let packet = match event {
            PresenceEvent::None => return,
            PresenceEvent::EmitSubscribe { online } => Packet::Subscribe(im_codec::Subscribe {
                appid: appid.0,
                uid: uid.0,
                online,
            }),
            PresenceEvent::EmitUnsubscribe => Packet::Unsubscribe(im_codec::Unsubscribe {
                appid: appid.0,
                uid: uid.0,
                online: false,
            }),
        };
        self.forward_to_all_except(origin, packet).await;
    }

    async fn forward_to_all_except(&self, origin: GatewayId, packet: Packet) {
        let targets: Vec<GatewaySender> = self
            .gateways
            .read()
            .iter()
            .filter(|(id, _)| **id != origin)
            .map(|(_, sender)| sender.clone())
            .collect();
        for target in targets {
            let _ = target.send(packet.clone()).await;
        }
    }

    /// `PUBLISH(app_msg)`: enqueue a push payload when the receiver has no
    /// online session, then forward to every other gateway subscribed to
    /// `(appid, receiver)` unless the message is persistent (the store
    /// already has the record, so only the unpersistent, push-only kinds
    /// need the online-forward step too) (spec.md §4.3).
    pub async fn handle_publish(&self, origin: GatewayId, publish: im_codec::Publish) {
        let appid = AppId(publish.appid);
        let receiver = im_common::Uid(publish.receiver);
        let (targets, any_online) = self.table.routes_for(appid, receiver, origin);

        if !any_online {
            if let Some(item) = self.push_item_for(&publish) {
                self.push.enqueue(item).await;
            }
        }

        let unpersistent = publish.inner_flag & flag::UNPERSISTENT != 0;
        if !unpersistent {
            return;
        }

        let gateways = self.gateways.read();
        for target in &targets {
            if let Some(sender) = gateways.get(target) {
                let _ = sender.try_send(Packet::Publish(publish.clone()));
            }
        }
    }

    fn push_item_for(&self, publish: &im_codec::Publish) -> Option<PushItem> {
        match publish.inner_cmd {
            cmd::IM => Some(PushItem::Im {
                appid: publish.appid,
                sender: publish.sender,
                receiver: publish.receiver,
                content: publish.raw.to_vec(),
            }),
            cmd::CUSTOMER | cmd::CUSTOMER_SUPPORT => Some(PushItem::Customer {
                appid: publish.appid,
                receiver: publish.receiver,
                command: publish.inner_cmd,
                customer_appid: publish.appid,
                customer: publish.sender,
                seller: publish.receiver,
                store: publish.appid,
                content: publish.raw.to_vec(),
            }),
            cmd::SYSTEM => Some(PushItem::System {
                appid: publish.appid,
                receiver: publish.receiver,
                content: publish.raw.to_vec(),
            }),
            _ => None,
        }
    }

    /// `PUBLISH_GROUP(app_msg)`: same shape as `handle_publish` but keyed
    /// by a list of recipients rather than one.
    pub async fn handle_publish_group(&self, origin: GatewayId, publish: im_codec::PublishGroup) {
        let appid = AppId(publish.appid);
        let mut any_online_anywhere = false;
        let mut all_targets = std::collections::HashSet::new();

        for &receiver in &publish.receivers {
            let (targets, any_online) = self.table.routes_for(appid, im_common::Uid(receiver), origin);
            any_online_anywhere |= any_online;
            all_targets.extend(targets);
        }

        if !any_online_anywhere {
            self.push
                .enqueue(PushItem::Group {
                    appid: publish.appid,
                    sender: publish.sender,
                    receivers: publish.receivers.clone(),
                    group_id: publish.group_id,
                    content: publish.raw.to_vec(),
                })
                .await;
        }

        if publish.inner_flag & flag::UNPERSISTENT == 0 {
            return;
        }

        let gateways = self.gateways.read();
        for target in &all_targets {
            if let Some(sender) = gateways.get(target) {
                let _ = sender.try_send(Packet::PublishGroup(publish.clone()));
            }
        }
    }

    /// `(total, online)` subscriber counts for the admin `/online`
    /// endpoint.
    pub fn presence(&self, appid: AppId, uid: im_common::Uid) -> (u32, u32) {
        self.table.presence(appid, uid)
    }

    /// Every `(appid, uid)` with an online subscriber, for `/all_online`.
    pub fn all_online(&self) -> Vec<(i32, i32)> {
        self.table.all_online()
    }

    pub fn subscribe_room(&self, gateway: GatewayId, appid: AppId, room_id: i64) -> bool {
        self.table.subscribe_room(gateway, appid, room_id)
    }

    pub fn unsubscribe_room(&self, gateway: GatewayId, appid: AppId, room_id: i64) -> bool {
        self.table.unsubscribe_room(gateway, appid, room_id)
    }

    /// Room publishes are forwarded only, never queued (spec.md §4.3).
    pub async fn handle_publish_room(&self, origin: GatewayId, publish: im_codec::PublishRoom) {
        let appid = AppId(publish.appid);
        let targets = self.table.routes_for_room(appid, publish.room_id, origin);
        let gateways = self.gateways.read();
        for target in &targets {
            if let Some(sender) = gateways.get(target) {
                let _ = sender.try_send(Packet::PublishRoom(publish.clone()));
            }
        }
    }
}
