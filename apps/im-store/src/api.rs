use std::sync::Arc;

use im_common::{AppId, DeviceId, MsgId, Uid};
use im_store::LogStore;
use serde::Deserialize;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// Representative subset of the store's external RPC surface, scoped down
/// per the admin-surface allowance: `/summary`, `/post_im_message`
/// (`SavePeerMessage`) and `/get_offline_count` (`GetNewCount`), not the
/// full set of injection/history endpoints.
pub fn routes(store: Arc<LogStore>) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    summary(store.clone())
        .or(post_im_message(store.clone()))
        .unify()
        .or(get_offline_count(store))
        .unify()
        .boxed()
}

fn summary(store: Arc<LogStore>) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("summary")
        .and(warp::any().map(move || store.clone()))
        .map(|store: Arc<LogStore>| {
            let highest = store.index().highest_msgid();
            warp::reply::json(&serde_json::json!({ "highest_msgid": highest.0 })).into_response()
        })
}

#[derive(Deserialize)]
struct PostImMessageQuery {
    appid: i32,
    uid: i32,
    device_id: i32,
    cmd: u8,
    flag: u8,
}

fn post_im_message(
    store: Arc<LogStore>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("post_im_message")
        .and(warp::post())
        .and(warp::query::<PostImMessageQuery>())
        .and(warp::body::bytes())
        .and(warp::any().map(move || store.clone()))
        .and_then(|req: PostImMessageQuery, body: bytes::Bytes, store: Arc<LogStore>| async move {
            match store
                .save_peer_message(
                    AppId(req.appid),
                    Uid(req.uid),
                    DeviceId(req.device_id),
                    req.cmd,
                    req.flag,
                    &body,
                )
                .await
            {
                Ok(msgid) => Ok::<_, Rejection>(
                    warp::reply::json(&serde_json::json!({ "msgid": msgid.0 })).into_response(),
                ),
                Err(err) => Ok(warp::reply::with_status(
                    warp::reply::json(&serde_json::json!({ "error": err.to_string() })),
                    warp::http::StatusCode::INTERNAL_SERVER_ERROR,
                )
                .into_response()),
            }
        })
}

#[derive(Deserialize)]
struct GetOfflineCountQuery {
    appid: i32,
    uid: i32,
    last_received_msgid: i64,
    device_id: i32,
}

fn get_offline_count(
    store: Arc<LogStore>,
) -> impl Filter<Extract = (Response,), Error = Rejection> + Clone {
    warp::path!("get_offline_count")
        .and(warp::query::<GetOfflineCountQuery>())
        .and(warp::any().map(move || store.clone()))
        .and_then(|query: GetOfflineCountQuery, store: Arc<LogStore>| async move {
            match store
                .get_new_count(
                    AppId(query.appid),
                    Uid(query.uid),
                    MsgId(query.last_received_msgid),
                    DeviceId(query.device_id),
                )
                .await
            {
                Ok(count) => Ok::<_, Rejection>(
                    warp::reply::json(&serde_json::json!({ "count": count })).into_response(),
                ),
                Err(err) => Ok(warp::reply::with_status(
                    warp::reply::json(&serde_json::json!({ "error": err.to_string() })),
                    warp::http::StatusCode::INTERNAL_SERVER_ERROR,
                )
                .into_response()),
            }
        })
}
