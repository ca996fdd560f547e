use std::collections::HashMap;

use im_common::{AppId, Uid};
use parking_lot::Mutex;

/// Opaque handle identifying one gateway's connection to the broker. The
/// broker never dials out; gateways register and the broker only ever
/// holds this id plus a callback for forwarding.
pub type GatewayId = u64;

/// `total_count | (online_count << 16)` (spec.md §4.3).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PackedCount(u32);

impl PackedCount {
    pub fn total(self) -> u32 {
        self.0 & 0xFFFF
    }

    pub fn online(self) -> u32 {
        self.0 >> 16
    }

    fn pack(total: u32, online: u32) -> Self {
        PackedCount((online << 16) | total)
    }
}

/// Result of a `Subscribe`/`Unsubscribe` call: which outbound frame (if
/// any) the broker must emit to the peer broker fabric so presence stays
/// visible fabric-wide (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceEvent {
    None,
    EmitSubscribe { online: bool },
    EmitUnsubscribe,
}

#[derive(Default)]
struct TableInner {
    subscribers: HashMap<i32, HashMap<i32, PackedCount>>,
    routes: HashMap<(i32, i32), HashMap<GatewayId, bool>>,
    rooms: HashMap<i32, HashMap<i64, u32>>,
    room_routes: HashMap<(i32, i64), HashMap<GatewayId, ()>>,
}

/// The broker's presence map: a single mutex guarding both the packed
/// counters and the per-gateway route sets used for fan-out, per spec.md
/// §5 ("broker subscriber map: single mutex; counters are 32-bit packed
/// under the same lock").
#[derive(Default)]
pub struct RouteTable {
    inner: Mutex<TableInner>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        gateway: GatewayId,
        appid: AppId,
        uid: Uid,
        online: bool,
    ) -> PresenceEvent {
        let mut inner = self.inner.lock();

        let counts = inner
            .subscribers
            .entry(appid.0)
            .or_default()
            .entry(uid.0)
            .or_default();
        let prior_total = counts.total();
        let prior_online = counts.online();
        let new_total = prior_total + 1;
        let new_online = prior_online + u32::from(online);
        *counts = PackedCount::pack(new_total, new_online);

        inner
            .routes
            .entry((appid.0, uid.0))
            .or_default()
            .insert(gateway, online);

        if prior_total == 0 {
            PresenceEvent::EmitSubscribe { online }
        } else if prior_online == 0 && new_online > 0 {
            PresenceEvent::EmitSubscribe { online: true }
        } else {
            PresenceEvent::None
        }
    }

    pub fn unsubscribe(
        &self,
        gateway: GatewayId,
        appid: AppId,
        uid: Uid,
        online: bool,
    ) -> PresenceEvent {
        let mut inner = self.inner.lock();
        let key = (appid.0, uid.0);

        let emit = {
            let Some(app_map) = inner.subscribers.get_mut(&appid.0) else {
                return PresenceEvent::None;
            };
            let Some(counts) = app_map.get_mut(&uid.0) else {
                return PresenceEvent::None;
            };
            let total = counts.total().saturating_sub(1);
            let online_count = counts.online().saturating_sub(u32::from(online));
            *counts = PackedCount::pack(total, online_count);
            if total == 0 {
                app_map.remove(&uid.0);
                if app_map.is_empty() {
                    inner.subscribers.remove(&appid.0);
                }
                PresenceEvent::EmitUnsubscribe
            } else {
                PresenceEvent::None
            }
        };

        if let Some(gateways) = inner.routes.get_mut(&key) {
            gateways.remove(&gateway);
            if gateways.is_empty() {
                inner.routes.remove(&key);
            }
        }

        emit
    }

    /// Gateway connections subscribed to `(appid, uid)`, for `PUBLISH`
    /// fan-out, excluding `origin` (the gateway the publish came from).
    /// The second return value is whether any subscribed gateway reports
    /// an online session.
    pub fn routes_for(&self, appid: AppId, uid: Uid, origin: GatewayId) -> (Vec<GatewayId>, bool) {
        let inner = self.inner.lock();
        let Some(gateways) = inner.routes.get(&(appid.0, uid.0)) else {
            return (Vec::new(), false);
        };
        let any_online = gateways.values().any(|&online| online);
        let targets = gateways
            .keys()
            .copied()
            .filter(|&g| g != origin)
            .collect();
        (targets, any_online)
    }

    pub fn subscribe_room(&self, gateway: GatewayId, appid: AppId, room_id: i64) -> bool {
        let mut inner = self.inner.lock();
        let refcount = inner.rooms.entry(appid.0).or_default().entry(room_id).or_insert(0);
        *refcount += 1;
        let first = *refcount == 1;
        inner
            .room_routes
            .entry((appid.0, room_id))
            .or_default()
            .insert(gateway, ());
        first
    }

    pub fn unsubscribe_room(&self, gateway: GatewayId, appid: AppId, room_id: i64) -> bool {
        let mut inner = self.inner.lock();
        let key = (appid.0, room_id);
        if let Some(gateways) = inner.room_routes.get_mut(&key) {
            gateways.remove(&gateway);
            if gateways.is_empty() {
                inner.room_routes.remove(&key);
            }
        }
        let Some(app_rooms) = inner.rooms.get_mut(&appid.0) else {
            return false;
        };
        let Some(refcount) = app_rooms.get_mut(&room_id) else {
            return false;
        };
        *refcount = refcount.saturating_sub(1);
        let dropped_to_zero = *refcount == 0;
        if dropped_to_zero {
            app_rooms.remove(&room_id);
            if app_rooms.is_empty() {
                inner.rooms.remove(&appid.0);
            }
        }
        dropped_to_zero
    }

    pub fn routes_for_room(&self, appid: AppId, room_id: i64, origin: GatewayId) -> Vec<GatewayId> {
        let inner = self.inner.lock();
        inner
            .room_routes
            .get(&(appid.0, room_id))
            .map(|gateways| gateways.keys().copied().filter(|&g| g != origin).collect())
            .unwrap_or_default()
    }

    /// Packed subscriber counters for `(appid, uid)`, for the admin
    /// `/online` endpoint. `(0, 0)` when nobody is subscribed.
    pub fn presence(&self, appid: AppId, uid: Uid) -> (u32, u32) {
        let inner = self.inner.lock();
        inner
            .subscribers
            .get(&appid.0)
            .and_then(|app_map| app_map.get(&uid.0))
            .map(|counts| (counts.total(), counts.online()))
            .unwrap_or((0, 0))
    }

    /// Every `(appid, uid)` with at least one online subscriber, for the
    /// admin `/all_online` endpoint.
    pub fn all_online(&self) -> Vec<(i32, i32)> {
        let inner = self.inner.lock();
        inner
            .subscribers
            .iter()
            .flat_map(|(appid, users)| {
                users
                    .iter()
                    .filter(|(_, counts)| counts.online() > 0)
                    .map(move |(uid, _)| (*appid, *uid))
            })
            .collect()
    }

    /// Drops every registration belonging to `gateway`, for disconnect
    /// cleanup. The broker itself holds no durable state across restarts
    /// (reconnects replay via `ReSubscribe`/`ReSubscribeRoom`); this only
    /// handles a gateway going away without reconnecting.
    pub fn drop_gateway(&self, gateway: GatewayId) {
        let mut inner = self.inner.lock();
        inner.routes.retain(|_, gateways| {
            gateways.remove(&gateway);
            !gateways.is_empty()
        });
        inner.room_routes.retain(|_, gateways| {
            gateways.remove(&gateway);
            !gateways.is_empty()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const APP: AppId = AppId(1);
    const UID: Uid = Uid(100);

    #[test]
    fn first_subscribe_emits_subscribe() {
        let table = RouteTable::new();
        let event = table.subscribe(1, APP, UID, true);
        assert_eq!(event, PresenceEvent::EmitSubscribe { online: true });
    }

    #[test]
    fn second_subscribe_from_another_gateway_is_silent_unless_online_flips() {
        let table = RouteTable::new();
        table.subscribe(1, APP, UID, false);
        let event = table.subscribe(2, APP, UID, false);
        assert_eq!(event, PresenceEvent::None);

        let event = table.subscribe(3, APP, UID, true);
        assert_eq!(event, PresenceEvent::EmitSubscribe { online: true });
    }

    #[test]
    fn subscribe_then_unsubscribe_restores_original_state() {
        let table = RouteTable::new();
        table.subscribe(1, APP, UID, true);
        let event = table.unsubscribe(1, APP, UID, true);
        assert_eq!(event, PresenceEvent::EmitUnsubscribe);

        let (routes, any_online) = table.routes_for(APP, UID, 0);
        assert!(routes.is_empty());
        assert!(!any_online);
    }

    #[test]
    fn unsubscribe_only_emits_when_total_reaches_zero() {
        let table = RouteTable::new();
        table.subscribe(1, APP, UID, true);
        table.subscribe(2, APP, UID, true);
        let event = table.unsubscribe(1, APP, UID, true);
        assert_eq!(event, PresenceEvent::None);
        let event = table.unsubscribe(2, APP, UID, true);
        assert_eq!(event, PresenceEvent::EmitUnsubscribe);
    }

    #[test]
    fn routes_for_excludes_the_origin_gateway() {
        let table = RouteTable::new();
        table.subscribe(1, APP, UID, true);
        table.subscribe(2, APP, UID, false);
        let (routes, any_online) = table.routes_for(APP, UID, 1);
        assert_eq!(routes, vec![2]);
        assert!(any_online);
    }

    #[test]
    fn room_refcount_tracks_first_and_last_subscriber() {
        let table = RouteTable::new();
        assert!(table.subscribe_room(1, APP, 9));
        assert!(!table.subscribe_room(2, APP, 9));
        assert!(!table.unsubscribe_room(1, APP, 9));
        assert!(table.unsubscribe_room(2, APP, 9));
    }
}
