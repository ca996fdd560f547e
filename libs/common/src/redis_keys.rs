//! Centralizes every Redis key/queue/channel name the fabric touches
//! (spec.md §6), the way the teacher centralizes topic/constant logic in one
//! module rather than scattering string literals through call sites.

/// `access_token_<token>` — hash: `user_id`, `app_id`, `notification_on`,
/// `forbidden`.
pub fn access_token_key(token: &str) -> String {
    format!("access_token_{token}")
}

/// `devices_<device>_<platform>` — i64 stable device id.
pub fn device_key(device: &str, platform: u8) -> String {
    format!("devices_{device}_{platform}")
}

/// Atomic counter backing device id allocation.
pub const DEVICES_ID_COUNTER: &str = "devices_id";

/// `users_<appid>_<uid>` — hash: `sync_key`, `group_sync_key_<gid>`,
/// `unread`, `forbidden`.
pub fn user_key(appid: i32, uid: i32) -> String {
    format!("users_{appid}_{uid}")
}

pub fn group_sync_key_field(group_id: i64) -> String {
    format!("group_sync_key_{group_id}")
}

pub const FIELD_SYNC_KEY: &str = "sync_key";
pub const FIELD_UNREAD: &str = "unread";
pub const FIELD_FORBIDDEN: &str = "forbidden";

/// Plain peer-message push queue.
pub const PUSH_QUEUE: &str = "push_queue";

/// Per-appid push queue variant (ROM-style apps).
pub fn push_queue_for_appid(appid: i32) -> String {
    format!("push_queue_{appid}")
}

pub const GROUP_PUSH_QUEUE: &str = "group_push_queue";
pub const CUSTOMER_PUSH_QUEUE: &str = "customer_push_queue";
pub const SYSTEM_PUSH_QUEUE: &str = "system_push_queue";

/// Group-catalog change-feed pub/sub channels. Payloads are CSV
/// `<prev_action_id>:<action_id>:<content>`; a gap between `prev_action_id`
/// and the last seen `action_id` triggers a full catalog reload.
pub const GROUP_CREATE: &str = "group_create";
pub const GROUP_DISBAND: &str = "group_disband";
pub const GROUP_MEMBER_ADD: &str = "group_member_add";
pub const GROUP_MEMBER_REMOVE: &str = "group_member_remove";
pub const GROUP_UPGRADE: &str = "group_upgrade";
pub const GROUP_MEMBER_MUTE: &str = "group_member_mute";

/// Presence-forbid channel: payload `appid,uid,flag`.
pub const SPEAK_FORBIDDEN: &str = "speak_forbidden";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_keys_as_documented() {
        assert_eq!(access_token_key("T_A"), "access_token_T_A");
        assert_eq!(device_key("abc", 1), "devices_abc_1");
        assert_eq!(user_key(1, 100), "users_1_100");
        assert_eq!(push_queue_for_appid(1), "push_queue_1");
        assert_eq!(group_sync_key_field(9), "group_sync_key_9");
    }
}
