use std::sync::Arc;

use im_common::{AppId, Uid};
use im_gateway::GatewayHub;
use serde::Deserialize;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

pub fn routes(hub: Arc<GatewayHub>) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    online(hub).boxed()
}

#[derive(Deserialize)]
struct OnlineQuery {
    appid: i32,
    uid: i32,
}

/// Whether `(appid, uid)` has a session on this gateway process
/// specifically, not fabric-wide presence (that lives on the broker).
fn online(hub: Arc<GatewayHub>) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("online")
        .and(warp::query::<OnlineQuery>())
        .and(warp::any().map(move || hub.clone()))
        .map(|query: OnlineQuery, hub: Arc<GatewayHub>| {
            let online = hub.has_local_session(AppId(query.appid), Uid(query.uid));
            warp::reply::json(&serde_json::json!({ "online": online })).into_response()
        })
}
