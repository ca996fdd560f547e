use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use im_codec::{Packet, StorageSyncMessage, StorageSyncMessageBatch};
use im_common::MsgId;
use im_store::{LogStore, ReplicationItem, ReplicationStream};
use tokio::net::TcpListener;

/// Accepts replica connections and drives each one's
/// `STORAGE_SYNC_BEGIN` → historical backfill → live fan-out handshake.
pub async fn run(store: Arc<LogStore>, listen: &str) -> anyhow::Result<()> {
    let listener = TcpListener::bind(listen).await?;
    tracing::info!(%listen, "store replication listening");

    loop {
        let (stream, addr) = listener.accept().await?;
        let store = store.clone();
        tokio::spawn(async move {
            tracing::debug!(%addr, "replica connected");
            if let Err(err) = handle_replica(store, stream).await {
                tracing::warn!(%addr, %err, "replica connection closed");
            } else {
                tracing::debug!(%addr, "replica disconnected");
            }
        });
    }
}

async fn handle_replica(store: Arc<LogStore>, socket: tokio::net::TcpStream) -> anyhow::Result<()> {
    let (mut reader, mut writer) = tokio::io::split(socket);
    let seq = AtomicU32::new(1);

    let (_header, packet) = match im_client::read_frame(&mut reader).await? {
        Some(frame) => frame,
        None => return Ok(()),
    };

    let begin = match packet {
        Packet::StorageSyncBegin(begin) => begin,
        other => anyhow::bail!("expected STORAGE_SYNC_BEGIN, got cmd {}", other.cmd()),
    };

    let mut sync = ReplicationStream::new(store, MsgId(begin.cursor));

    loop {
        let batch = sync
            .next_batch(
                im_common::limits::REPLICATION_HISTORICAL_BATCH,
                im_common::limits::REPLICATION_LIVE_BATCH_MAX_ITEMS,
                im_common::limits::REPLICATION_LIVE_BATCH_WINDOW,
            )
            .await?;

        if batch.items.is_empty() {
            continue;
        }

        let messages = batch.items.into_iter().map(to_wire).collect();
        let seq = seq.fetch_add(1, Ordering::Relaxed);
        im_client::write_frame(
            &mut writer,
            seq,
            0,
            &Packet::StorageSyncMessageBatch(StorageSyncMessageBatch { messages }),
        )
        .await?;
    }
}

fn to_wire(item: ReplicationItem) -> StorageSyncMessage {
    StorageSyncMessage {
        msgid: item.msgid.0,
        appid: item.appid.0,
        uid: item.uid.0,
        inner_cmd: item.cmd,
        inner_flag: item.flag,
        raw: item.raw,
    }
}
