use std::sync::Arc;

use im_codec::{Packet, StorageSyncBegin};
use im_common::{AppId, MsgId, Uid};
use im_store::LogStore;
use tokio::net::TcpStream;

/// Runs this store as a replica of `primary_addr`: dials in, announces
/// this store's own write position as the `STORAGE_SYNC_BEGIN` cursor,
/// then applies every `STORAGE_SYNC_MESSAGE_BATCH` the primary sends
/// (spec.md §4.4's replication section). Reconnects with the same
/// doubling backoff the broker link reserves for its own reconnects,
/// always resuming from this store's actual log position rather than
/// trusting the dropped connection's last-seen cursor.
pub async fn run(store: Arc<LogStore>, primary_addr: String) {
    let mut backoff = im_common::limits::BROKER_RECONNECT_BACKOFF_MIN;

    loop {
        match sync_once(&store, &primary_addr).await {
            Ok(()) => {
                tracing::warn!(%primary_addr, "replica stream to primary closed");
            }
            Err(err) => {
                tracing::warn!(%primary_addr, %err, "replica sync failed");
            }
        }

        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(im_common::limits::BROKER_RECONNECT_BACKOFF_MAX);
    }
}

async fn sync_once(store: &Arc<LogStore>, primary_addr: &str) -> anyhow::Result<()> {
    let stream = TcpStream::connect(primary_addr).await?;
    let (mut reader, mut writer) = tokio::io::split(stream);

    let cursor = store.current_msgid().await;
    im_client::write_frame(
        &mut writer,
        1,
        0,
        &Packet::StorageSyncBegin(StorageSyncBegin { cursor: cursor.0 }),
    )
    .await?;
    tracing::info!(%primary_addr, %cursor, "replica sync begin");

    loop {
        let Some((_header, packet)) = im_client::read_frame(&mut reader).await? else {
            return Ok(());
        };

        let batch = match packet {
            Packet::StorageSyncMessageBatch(batch) => batch,
            other => anyhow::bail!(
                "expected STORAGE_SYNC_MESSAGE_BATCH, got cmd {}",
                other.cmd()
            ),
        };

        for message in batch.messages {
            store
                .apply_synced_message(
                    MsgId(message.msgid),
                    AppId(message.appid),
                    Uid(message.uid),
                    message.inner_cmd,
                    message.inner_flag,
                    &message.raw,
                )
                .await?;
        }
    }
}
