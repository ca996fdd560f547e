use std::time::Duration;

use im_codec::{flag, AuthToken, Im, Packet};
use im_testutil::{seed_access_token, test_redis, test_redis_url, Harness};
use tokio_stream::StreamExt;

async fn recv(
    stream: &mut (impl tokio_stream::Stream<Item = Packet> + Unpin),
) -> Packet {
    tokio::time::timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("frame within deadline")
        .expect("stream still open")
}

fn auth(token: &str, device: &str) -> Packet {
    Packet::AuthToken(AuthToken {
        token: token.into(),
        device: device.into(),
        platform: 1, // ANDROID: always "online" regardless of notification_on
    })
}

/// Scenario 1: peer deliver online.
#[tokio::test(flavor = "multi_thread")]
async fn peer_deliver_online() {
    let Some(mut redis) = test_redis().await else {
        return;
    };
    seed_access_token(&mut redis, "T_A", 1, 100, true).await;
    seed_access_token(&mut redis, "T_B", 1, 200, true).await;

    let harness = Harness::new(&test_redis_url()).await;
    let (client_a, stream_a) = harness.connect(redis.clone()).await;
    let (client_b, stream_b) = harness.connect(redis.clone()).await;
    tokio::pin!(stream_a);
    tokio::pin!(stream_b);

    client_a.send(auth("T_A", "dev-a")).await.unwrap();
    assert!(matches!(recv(&mut stream_a).await, Packet::AuthStatus(s) if s.status == 0));
    client_b.send(auth("T_B", "dev-b")).await.unwrap();
    assert!(matches!(recv(&mut stream_b).await, Packet::AuthStatus(s) if s.status == 0));

    client_a
        .send(Packet::Im(Im {
            sender: 100,
            receiver: 200,
            timestamp: None,
            flag: flag::TEXT,
            content: b"hi".to_vec().into(),
        }))
        .await
        .unwrap();

    let delivered = recv(&mut stream_b).await;
    let Packet::Im(im) = delivered else {
        panic!("expected IM, got {delivered:?}");
    };
    assert_eq!(im.sender, 100);
    assert_eq!(im.receiver, 200);
    assert_eq!(im.content.as_ref(), b"hi");

    assert!(matches!(recv(&mut stream_a).await, Packet::Ack(_)));

    client_b.send(Packet::Sync(im_codec::Sync { last_msgid: 0 })).await.unwrap();
    assert!(matches!(recv(&mut stream_b).await, Packet::SyncBegin(_)));
    let Packet::Im(synced) = recv(&mut stream_b).await else {
        panic!("expected synced IM");
    };
    assert_eq!(synced.content.as_ref(), b"hi");
    assert!(matches!(recv(&mut stream_b).await, Packet::SyncEnd(_)));
}

/// Scenario 2: peer offline with push. B never connects; the message must
/// land in `push_queue` and still be recoverable by a later SYNC.
#[tokio::test(flavor = "multi_thread")]
async fn peer_offline_with_push() {
    let Some(mut redis) = test_redis().await else {
        return;
    };
    seed_access_token(&mut redis, "T_A2", 1, 101, true).await;

    let harness = Harness::new(&test_redis_url()).await;
    let (client_a, stream_a) = harness.connect(redis.clone()).await;
    tokio::pin!(stream_a);

    client_a.send(auth("T_A2", "dev-a2")).await.unwrap();
    assert!(matches!(recv(&mut stream_a).await, Packet::AuthStatus(_)));

    client_a
        .send(Packet::Im(Im {
            sender: 101,
            receiver: 201,
            timestamp: None,
            flag: flag::TEXT,
            content: b"hi".to_vec().into(),
        }))
        .await
        .unwrap();
    assert!(matches!(recv(&mut stream_a).await, Packet::Ack(_)));

    // Gateway writes are fire-and-forget into the push batcher; give the
    // background task its coalescing window before inspecting the list.
    tokio::time::sleep(Duration::from_millis(700)).await;
    let mut conn = redis;
    let raw: Option<Vec<u8>> = redis::AsyncCommands::lpop(&mut conn, "push_queue", None)
        .await
        .unwrap();
    let payload = raw.expect("push_queue gained an entry");
    let value: serde_json::Value = serde_json::from_slice(&payload).unwrap();
    assert_eq!(value["appid"], 1);
    assert_eq!(value["sender"], 101);
    assert_eq!(value["receiver"], 201);
}

/// Scenario 3: sync after reconnect. Three peer messages land while B is
/// offline; B's first SYNC(0) replays them oldest-first between
/// SYNC_BEGIN/SYNC_END.
#[tokio::test(flavor = "multi_thread")]
async fn sync_after_reconnect() {
    let Some(mut redis) = test_redis().await else {
        return;
    };
    seed_access_token(&mut redis, "T_A3", 1, 102, true).await;
    seed_access_token(&mut redis, "T_B3", 1, 202, true).await;

    let harness = Harness::new(&test_redis_url()).await;
    let (client_a, stream_a) = harness.connect(redis.clone()).await;
    tokio::pin!(stream_a);
    client_a.send(auth("T_A3", "dev-a3")).await.unwrap();
    recv(&mut stream_a).await;

    for body in [b"one".as_slice(), b"two".as_slice(), b"three".as_slice()] {
        client_a
            .send(Packet::Im(Im {
                sender: 102,
                receiver: 202,
                timestamp: None,
                flag: flag::TEXT,
                content: body.to_vec().into(),
            }))
            .await
            .unwrap();
        assert!(matches!(recv(&mut stream_a).await, Packet::Ack(_)));
    }

    let (client_b, stream_b) = harness.connect(redis.clone()).await;
    tokio::pin!(stream_b);
    client_b.send(auth("T_B3", "dev-b3")).await.unwrap();
    recv(&mut stream_b).await;

    client_b.send(Packet::Sync(im_codec::Sync { last_msgid: 0 })).await.unwrap();
    assert!(matches!(recv(&mut stream_b).await, Packet::SyncBegin(_)));

    let mut bodies = Vec::new();
    for _ in 0..3 {
        let Packet::Im(im) = recv(&mut stream_b).await else {
            panic!("expected IM");
        };
        bodies.push(im.content.to_vec());
    }
    assert_eq!(
        bodies,
        vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]
    );
    assert!(matches!(recv(&mut stream_b).await, Packet::SyncEnd(_)));
}

/// Scenario 4: self-filtering across two devices of the same user. The
/// writing device's own first SYNC still sees its write; the second SYNC
/// of that session suppresses it. The other device always sees it,
/// flagged SELF.
#[tokio::test(flavor = "multi_thread")]
async fn self_filtering_across_devices() {
    let Some(mut redis) = test_redis().await else {
        return;
    };
    seed_access_token(&mut redis, "T_A4", 1, 103, true).await;

    let harness = Harness::new(&test_redis_url()).await;
    let (client_d1, stream_d1) = harness.connect(redis.clone()).await;
    let (client_d2, stream_d2) = harness.connect(redis.clone()).await;
    tokio::pin!(stream_d1);
    tokio::pin!(stream_d2);

    client_d1.send(auth("T_A4", "device-1")).await.unwrap();
    recv(&mut stream_d1).await;
    client_d2.send(auth("T_A4", "device-2")).await.unwrap();
    recv(&mut stream_d2).await;

    client_d1
        .send(Packet::Im(Im {
            sender: 103,
            receiver: 999,
            timestamp: None,
            flag: flag::TEXT,
            content: b"note-to-self".to_vec().into(),
        }))
        .await
        .unwrap();
    assert!(matches!(recv(&mut stream_d1).await, Packet::Ack(_)));

    // d2 gets a live SYNC_NOTIFY for the other device's write.
    assert!(matches!(recv(&mut stream_d2).await, Packet::SyncNotify(_)));

    // d2's SYNC sees the write flagged SELF (it is "self" from the
    // receiving user's perspective, written by a different device).
    client_d2.send(Packet::Sync(im_codec::Sync { last_msgid: 0 })).await.unwrap();
    assert!(matches!(recv(&mut stream_d2).await, Packet::SyncBegin(_)));
    let Packet::Im(seen_on_d2) = recv(&mut stream_d2).await else {
        panic!("expected IM");
    };
    assert_ne!(seen_on_d2.flag & flag::SELF, 0);
    assert!(matches!(recv(&mut stream_d2).await, Packet::SyncEnd(_)));

    // d1's first SYNC of this session still shows its own write.
    client_d1.send(Packet::Sync(im_codec::Sync { last_msgid: 0 })).await.unwrap();
    assert!(matches!(recv(&mut stream_d1).await, Packet::SyncBegin(_)));
    assert!(matches!(recv(&mut stream_d1).await, Packet::Im(_)));
    assert!(matches!(recv(&mut stream_d1).await, Packet::SyncEnd(_)));

    // d1's second SYNC of this session suppresses its own write.
    client_d1.send(Packet::Sync(im_codec::Sync { last_msgid: 0 })).await.unwrap();
    assert!(matches!(recv(&mut stream_d1).await, Packet::SyncBegin(_)));
    assert!(matches!(recv(&mut stream_d1).await, Packet::SyncEnd(_)));
}
