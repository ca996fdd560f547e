use im_common::redis_keys;
use redis::AsyncCommands;

use crate::error::Result;

/// What `AUTH_TOKEN` resolves to via the `access_token_<token>` hash
/// (spec.md §4.2).
#[derive(Debug, Clone, Copy)]
pub struct TokenIdentity {
    pub appid: i32,
    pub uid: i32,
    pub forbidden: bool,
    pub notification_on: bool,
}

pub async fn resolve_token(
    conn: &mut redis::aio::ConnectionManager,
    token: &str,
) -> Result<Option<TokenIdentity>> {
    let key = redis_keys::access_token_key(token);
    let fields: Vec<(String, String)> = conn.hgetall(&key).await?;
    if fields.is_empty() {
        return Ok(None);
    }

    let mut appid = None;
    let mut uid = None;
    let mut forbidden = false;
    let mut notification_on = false;
    for (field, value) in fields {
        match field.as_str() {
            "app_id" => appid = value.parse::<i32>().ok(),
            "user_id" => uid = value.parse::<i32>().ok(),
            "forbidden" => forbidden = value == "1",
            "notification_on" => notification_on = value == "1",
            _ => {}
        }
    }

    match (appid, uid) {
        (Some(appid), Some(uid)) => Ok(Some(TokenIdentity {
            appid,
            uid,
            forbidden,
            notification_on,
        })),
        _ => Ok(None),
    }
}

/// Allocates (or looks up) a stable `device_ID` for `(device, platform)`
/// via Redis `INCR`+`SET` (spec.md §4.2).
pub async fn allocate_device_id(
    conn: &mut redis::aio::ConnectionManager,
    device: &str,
    platform: u8,
) -> Result<i32> {
    let key = redis_keys::device_key(device, platform);
    if let Some(existing) = conn.get::<_, Option<i32>>(&key).await? {
        return Ok(existing);
    }

    let allocated: i32 = conn.incr(redis_keys::DEVICES_ID_COUNTER, 1).await?;
    let _: () = conn.set(&key, allocated).await?;
    Ok(allocated)
}

/// `mobile platforms are always online=true; desktop/web are online=false
/// iff notification_on` (spec.md §4.2).
pub fn derive_online(platform: im_codec::Platform, notification_on: bool) -> bool {
    if platform.is_mobile() {
        true
    } else {
        !notification_on
    }
}
