use im_codec::flag;
use im_common::{AppId, DeviceId, Uid};

use crate::store::LogStore;

const APP: AppId = AppId(1);
const UID: Uid = Uid(42);
const DEVICE: DeviceId = DeviceId(7);

async fn open_store() -> (tempfile::TempDir, LogStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = LogStore::open(dir.path().to_path_buf()).await.unwrap();
    (dir, store)
}

#[tokio::test(flavor = "multi_thread")]
async fn msgid_is_monotonically_increasing() {
    let (_dir, store) = open_store().await;

    let first = store
        .save_peer_message(APP, UID, DEVICE, im_codec::cmd::IM, flag::TEXT, b"hello")
        .await
        .unwrap();
    let second = store
        .save_peer_message(APP, UID, DEVICE, im_codec::cmd::IM, flag::TEXT, b"world")
        .await
        .unwrap();

    assert!(second.0 > first.0);
}

#[tokio::test(flavor = "multi_thread")]
async fn offline_chain_traversal_returns_messages_newest_first() {
    let (_dir, store) = open_store().await;

    for body in [b"one".as_slice(), b"two".as_slice(), b"three".as_slice()] {
        store
            .save_peer_message(APP, UID, DEVICE, im_codec::cmd::IM, flag::TEXT, body)
            .await
            .unwrap();
    }

    let result = store
        .get_latest_message(APP, UID, 10)
        .await
        .unwrap();

    let bodies: Vec<&[u8]> = result.messages.iter().map(|m| m.raw.as_ref()).collect();
    assert_eq!(bodies, vec![b"three".as_slice(), b"two".as_slice(), b"one".as_slice()]);
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_message_is_idempotent_for_the_same_cursor() {
    let (_dir, store) = open_store().await;

    for body in [b"a".as_slice(), b"b".as_slice()] {
        store
            .save_peer_message(APP, UID, DEVICE, im_codec::cmd::IM, flag::TEXT, body)
            .await
            .unwrap();
    }

    let first = store
        .sync_message(APP, UID, im_common::MsgId::NONE, usize::MAX, 10)
        .await
        .unwrap();
    let second = store
        .sync_message(APP, UID, im_common::MsgId::NONE, usize::MAX, 10)
        .await
        .unwrap();

    assert_eq!(first.messages.len(), second.messages.len());
    assert_eq!(first.last_msgid, second.last_msgid);
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_message_only_returns_records_past_the_cursor() {
    let (_dir, store) = open_store().await;

    store
        .save_peer_message(APP, UID, DEVICE, im_codec::cmd::IM, flag::TEXT, b"old")
        .await
        .unwrap();
    let checkpoint = store
        .get_latest_message(APP, UID, 1)
        .await
        .unwrap()
        .last_msgid;
    store
        .save_peer_message(APP, UID, DEVICE, im_codec::cmd::IM, flag::TEXT, b"new")
        .await
        .unwrap();

    let result = store
        .sync_message(APP, UID, checkpoint, usize::MAX, 10)
        .await
        .unwrap();

    assert_eq!(result.messages.len(), 1);
    assert_eq!(result.messages[0].raw.as_ref(), b"new");
}

#[tokio::test(flavor = "multi_thread")]
async fn boot_recovers_the_index_from_the_log_when_no_index_file_exists() {
    let dir = tempfile::tempdir().unwrap();

    {
        let store = LogStore::open(dir.path().to_path_buf()).await.unwrap();
        store
            .save_peer_message(APP, UID, DEVICE, im_codec::cmd::IM, flag::TEXT, b"before-crash")
            .await
            .unwrap();
        // No explicit flush: simulates a crash before the periodic index
        // flush runs, forcing the next boot through `createPeerIndex`.
    }

    let reopened = LogStore::open(dir.path().to_path_buf()).await.unwrap();
    let result = reopened.get_latest_message(APP, UID, 10).await.unwrap();

    assert_eq!(result.messages.len(), 1);
    assert_eq!(result.messages[0].raw.as_ref(), b"before-crash");
}

#[tokio::test(flavor = "multi_thread")]
async fn replication_broadcasts_every_write() {
    let (_dir, store) = open_store().await;
    let mut rx = store.subscribe_replication();

    store
        .save_peer_message(APP, UID, DEVICE, im_codec::cmd::IM, flag::TEXT, b"ping")
        .await
        .unwrap();

    let item = rx.recv().await.unwrap();
    assert_eq!(item.appid, APP);
    assert_eq!(item.uid, UID);
    assert_eq!(item.raw.as_ref(), b"ping");
}

#[tokio::test(flavor = "multi_thread")]
async fn historical_sync_batch_replays_writes_in_order() {
    let (_dir, store) = open_store().await;

    for body in [b"x".as_slice(), b"y".as_slice(), b"z".as_slice()] {
        store
            .save_peer_message(APP, UID, DEVICE, im_codec::cmd::IM, flag::TEXT, body)
            .await
            .unwrap();
    }

    let batch = store
        .historical_sync_batch(im_common::MsgId::NONE, 100)
        .await
        .unwrap();

    let bodies: Vec<&[u8]> = batch.items.iter().map(|i| i.raw.as_ref()).collect();
    assert_eq!(bodies, vec![b"x".as_slice(), b"y".as_slice(), b"z".as_slice()]);
}

/// A replica backfilling via `historical_sync_batch` in small pages must
/// see every write exactly once, in order, and the final cursor must match
/// what a single unbounded call would have produced. Exercised at a few
/// thousand messages (smaller than a real 128 MiB block, since spanning
/// actual block boundaries at that size is impractical to write in a fast
/// test; see DESIGN.md).
#[tokio::test(flavor = "multi_thread")]
async fn historical_sync_batch_catches_up_across_many_pages() {
    let (_dir, store) = open_store().await;

    const TOTAL: usize = 2_500;
    for i in 0..TOTAL {
        store
            .save_peer_message(
                APP,
                UID,
                DEVICE,
                im_codec::cmd::IM,
                flag::TEXT,
                i.to_string().as_bytes(),
            )
            .await
            .unwrap();
    }

    let mut cursor = im_common::MsgId::NONE;
    let mut replayed = Vec::new();
    loop {
        let batch = store.historical_sync_batch(cursor, 64).await.unwrap();
        if batch.items.is_empty() {
            break;
        }
        for item in &batch.items {
            replayed.push(String::from_utf8(item.raw.to_vec()).unwrap());
        }
        cursor = batch.cursor;
    }

    assert_eq!(replayed.len(), TOTAL);
    let expected: Vec<String> = (0..TOTAL).map(|i| i.to_string()).collect();
    assert_eq!(replayed, expected);

    let single_shot = store
        .historical_sync_batch(im_common::MsgId::NONE, TOTAL + 1)
        .await
        .unwrap();
    assert_eq!(single_shot.cursor, cursor);
}

/// A replica applying a primary's `historical_sync_batch` items through
/// `apply_synced_message` must land each message at the exact same
/// `msgid` the primary wrote it at, so the replica's own write position
/// converges to the primary's and a later `STORAGE_SYNC_BEGIN` from it
/// can resume cleanly.
#[tokio::test(flavor = "multi_thread")]
async fn replica_apply_converges_to_primary_position() {
    let (_primary_dir, primary) = open_store().await;
    let (_replica_dir, replica) = open_store().await;

    for body in [b"one".as_slice(), b"two".as_slice(), b"three".as_slice()] {
        primary
            .save_peer_message(APP, UID, DEVICE, im_codec::cmd::IM, flag::TEXT, body)
            .await
            .unwrap();
    }

    let batch = primary
        .historical_sync_batch(im_common::MsgId::NONE, 100)
        .await
        .unwrap();

    for item in &batch.items {
        let applied = replica
            .apply_synced_message(item.msgid, item.appid, item.uid, item.cmd, item.flag, &item.raw)
            .await
            .unwrap();
        assert!(applied);
    }

    assert_eq!(replica.current_msgid().await, primary.current_msgid().await);

    let replayed = replica.get_latest_message(APP, UID, 10).await.unwrap();
    let bodies: Vec<&[u8]> = replayed.messages.iter().map(|m| m.raw.as_ref()).collect();
    assert_eq!(
        bodies,
        vec![b"three".as_slice(), b"two".as_slice(), b"one".as_slice()]
    );
}

/// Re-applying a message the replica already wrote (a primary resending
/// the tail of a batch after a dropped connection) must be a no-op: the
/// target offset is now behind the replica's current position, so
/// `apply_synced_message` skips it instead of writing a duplicate.
#[tokio::test(flavor = "multi_thread")]
async fn replica_apply_skips_already_applied_message() {
    let (_primary_dir, primary) = open_store().await;
    let (_replica_dir, replica) = open_store().await;

    primary
        .save_peer_message(APP, UID, DEVICE, im_codec::cmd::IM, flag::TEXT, b"hello")
        .await
        .unwrap();
    let batch = primary
        .historical_sync_batch(im_common::MsgId::NONE, 100)
        .await
        .unwrap();
    let item = &batch.items[0];

    let first = replica
        .apply_synced_message(item.msgid, item.appid, item.uid, item.cmd, item.flag, &item.raw)
        .await
        .unwrap();
    assert!(first);

    let replayed_before = replica.current_msgid().await;
    let second = replica
        .apply_synced_message(item.msgid, item.appid, item.uid, item.cmd, item.flag, &item.raw)
        .await
        .unwrap();
    assert!(!second);
    assert_eq!(replica.current_msgid().await, replayed_before);
}
