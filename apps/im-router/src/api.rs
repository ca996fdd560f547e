use std::sync::Arc;

use im_router::Broker;
use serde::Serialize;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

pub fn routes(
    broker: Arc<Broker>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    summary(broker.clone()).or(online(broker.clone())).unify().boxed()
}

fn summary(broker: Arc<Broker>) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("summary")
        .and(warp::any().map(move || broker.clone()))
        .map(|broker: Arc<Broker>| {
            #[derive(Serialize)]
            struct Presence {
                appid: i32,
                uid: i32,
            }

            let online: Vec<Presence> = broker
                .all_online()
                .into_iter()
                .map(|(appid, uid)| Presence { appid, uid })
                .collect();
            warp::reply::json(&serde_json::json!({ "online_count": online.len() }))
                .into_response()
        })
}

fn online(broker: Arc<Broker>) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    #[derive(serde::Deserialize)]
    struct Query {
        appid: i32,
        uid: i32,
    }

    warp::path!("online")
        .and(warp::query::<Query>())
        .and(warp::any().map(move || broker.clone()))
        .map(|query: Query, broker: Arc<Broker>| {
            let (total, online) =
                broker.presence(im_common::AppId(query.appid), im_common::Uid(query.uid));
            warp::reply::json(&serde_json::json!({ "total": total, "online": online }))
                .into_response()
        })
}
