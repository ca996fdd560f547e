use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use im_codec::{cmd, flag, Packet};
use im_common::{AppId, DeviceId, MsgId, Uid};
use tokio::sync::{broadcast, Mutex};

use crate::error::Result;
use crate::index::{PeerCursor, PeerIndex};
use crate::log::{LogReader, LogWriter};

#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub msgid: MsgId,
    pub device_id: DeviceId,
    pub cmd: u8,
    pub flag: u8,
    pub raw: bytes::Bytes,
}

/// One successful write, broadcast to replication subscribers.
#[derive(Debug, Clone)]
pub struct ReplicationItem {
    pub msgid: MsgId,
    pub appid: AppId,
    pub uid: Uid,
    pub cmd: u8,
    pub flag: u8,
    pub raw: bytes::Bytes,
}

pub struct SyncResult {
    /// Newest-first, per spec.md §4.4; callers reverse before sending to
    /// clients.
    pub messages: Vec<StoredMessage>,
    pub last_msgid: MsgId,
}

/// The append-only log plus its in-memory offline index, serialized behind
/// one writer mutex (spec.md §5's "one writer mutex" requirement; read
/// path walks the read-mostly index under its own lock).
pub struct LogStore {
    writer: Mutex<LogWriter>,
    reader: LogReader,
    index: Arc<PeerIndex>,
    replication_tx: broadcast::Sender<ReplicationItem>,
}

impl LogStore {
    pub async fn open(dir: impl Into<PathBuf> + Clone) -> Result<Self> {
        let index_path = {
            let mut p: PathBuf = dir.clone().into();
            p.push("peer_index");
            p
        };

        let writer = LogWriter::open(dir.clone()).await?;
        let reader = LogReader::new(dir);
        let index = Arc::new(PeerIndex::new(index_path.clone()));

        match PeerIndex::load(&index_path).await? {
            Some((cursors, last_saved_id)) => {
                index.restore(cursors, last_saved_id);
                repair_peer_index(&reader, &index, last_saved_id).await?;
            }
            None => {
                create_peer_index(&reader, &index).await?;
            }
        }

        let (replication_tx, _) = broadcast::channel(4096);

        Ok(Self {
            writer: Mutex::new(writer),
            reader,
            index,
            replication_tx,
        })
    }

    pub fn subscribe_replication(&self) -> broadcast::Receiver<ReplicationItem> {
        self.replication_tx.subscribe()
    }

    pub fn index(&self) -> &Arc<PeerIndex> {
        &self.index
    }

    /// This store's own write position, as a `STORAGE_SYNC_BEGIN` cursor
    /// for a replica dialing a primary, or as the convergence target a
    /// test compares a replica's position against.
    pub async fn current_msgid(&self) -> MsgId {
        self.writer.lock().await.current_msgid()
    }

    /// Background task: flushes the peer index on a timer, or early once
    /// the log has advanced `INDEX_FLUSH_WRITE_AHEAD` bytes past the last
    /// flush, whichever comes first (spec.md §4.4). Runs until the process
    /// exits; callers wire a SIGTERM handler to call `flush_now` once more
    /// before shutdown.
    pub async fn run_index_flush_loop(self: Arc<Self>) {
        let poll = im_common::limits::INDEX_FLUSH_INTERVAL / 10;
        let mut ticker = tokio::time::interval(poll.max(std::time::Duration::from_secs(1)));
        let mut last_flush = tokio::time::Instant::now();

        loop {
            ticker.tick().await;
            let behind = self.index.highest_msgid().0 - self.index.last_saved_id().0;
            let due = last_flush.elapsed() >= im_common::limits::INDEX_FLUSH_INTERVAL;
            let ahead = behind >= im_common::limits::INDEX_FLUSH_WRITE_AHEAD;

            if behind > 0 && (due || ahead) {
                if let Err(err) = self.flush_now().await {
                    tracing::warn!(%err, "periodic peer index flush failed");
                } else {
                    last_flush = tokio::time::Instant::now();
                }
            }
        }
    }

    /// Flushes the peer index to the watermark of its current highest
    /// known message id. Safe to call from a SIGTERM handler.
    pub async fn flush_now(&self) -> Result<()> {
        self.index.flush(self.index.highest_msgid()).await
    }

    /// `SavePeerMessage(appid, uid, device, msg)`: the six-step write path
    /// from spec.md §4.4.
    pub async fn save_peer_message(
        &self,
        appid: AppId,
        uid: Uid,
        device_id: DeviceId,
        inner_cmd: u8,
        inner_flag: u8,
        raw: &[u8],
    ) -> Result<MsgId> {
        let is_group = inner_flag & flag::GROUP != 0;
        let mut writer = self.writer.lock().await;

        // 1-2: append the message frame itself.
        let msgid = writer.append(inner_cmd, 1, inner_flag, raw).await?;

        // 3: look up the recipient's current chain heads.
        let cursor = self.index.get(appid, uid);

        // 4: append the OFFLINE_V2 record chaining this write in.
        let offline = im_codec::OfflineV2 {
            appid: appid.0,
            uid: uid.0,
            msgid: msgid.0,
            device_id: device_id.0,
            flag: inner_flag & flag::GROUP,
            prev_msgid: cursor.last_id.0,
            prev_peer_msgid: cursor.last_peer_id.0,
        };
        let mut body = bytes::BytesMut::new();
        Packet::OfflineV2(offline).encode(&mut body)?;
        let v2_msgid = writer.append(cmd::OFFLINE_V2, 0, 0, &body).await?;

        // 5: advance the index.
        self.index.update(appid, uid, v2_msgid, is_group);

        // 6: push into the replication fan-out channel. A lagging or
        // absent replica subscriber is not an error (best-effort fan-out).
        let _ = self.replication_tx.send(ReplicationItem {
            msgid,
            appid,
            uid,
            cmd: inner_cmd,
            flag: inner_flag,
            raw: bytes::Bytes::copy_from_slice(raw),
        });

        Ok(msgid)
    }

    /// Applies one message relayed over `STORAGE_SYNC_MESSAGE_BATCH` as a
    /// replica: writes the message record at the primary's `msgid`
    /// (padding or rotating this writer's position to match, skipping it
    /// outright if it's already on disk), then chains its own
    /// `OFFLINE_V2` record in immediately after, the same way
    /// `save_peer_message` does for a locally originated write. Because
    /// `OFFLINE_V2` encodes to a fixed size regardless of its field
    /// values, appending it here keeps this writer's offset aligned with
    /// the primary's for the next synced message even though the chain
    /// pointers themselves are only valid within this replica's own
    /// index (the wire batch carries no `device_id` or upstream chain
    /// pointers to replay verbatim). Returns `false` when the message was
    /// stale and skipped.
    pub async fn apply_synced_message(
        &self,
        msgid: MsgId,
        appid: AppId,
        uid: Uid,
        inner_cmd: u8,
        inner_flag: u8,
        raw: &[u8],
    ) -> Result<bool> {
        let is_group = inner_flag & flag::GROUP != 0;
        let mut writer = self.writer.lock().await;

        let Some(written) = writer.append_synced(inner_cmd, 1, inner_flag, raw, msgid).await?
        else {
            return Ok(false);
        };

        let cursor = self.index.get(appid, uid);
        let offline = im_codec::OfflineV2 {
            appid: appid.0,
            uid: uid.0,
            msgid: written.0,
            device_id: 0,
            flag: inner_flag & flag::GROUP,
            prev_msgid: cursor.last_id.0,
            prev_peer_msgid: cursor.last_peer_id.0,
        };
        let mut body = bytes::BytesMut::new();
        Packet::OfflineV2(offline).encode(&mut body)?;
        let v2_msgid = writer.append(cmd::OFFLINE_V2, 0, 0, &body).await?;
        self.index.update(appid, uid, v2_msgid, is_group);

        let _ = self.replication_tx.send(ReplicationItem {
            msgid: written,
            appid,
            uid,
            cmd: inner_cmd,
            flag: inner_flag,
            raw: bytes::Bytes::copy_from_slice(raw),
        });

        Ok(true)
    }

    /// `SyncMessage(appid, uid, last_received_msgid, group_limit, limit)`:
    /// walks the offline chain from the stored head (spec.md §4.4 read
    /// path).
    pub async fn sync_message(
        &self,
        appid: AppId,
        uid: Uid,
        last_received_msgid: MsgId,
        group_limit: usize,
        limit: usize,
    ) -> Result<SyncResult> {
        let cursor = self.index.get(appid, uid);
        self.walk(cursor, Some(last_received_msgid), group_limit, limit)
            .await
    }

    /// `GetLatestMessage(appid, uid, limit)`: the same walk without a
    /// `last_received_msgid` gate.
    pub async fn get_latest_message(
        &self,
        appid: AppId,
        uid: Uid,
        limit: usize,
    ) -> Result<SyncResult> {
        let cursor = self.index.get(appid, uid);
        self.walk(cursor, None, usize::MAX, limit).await
    }

    /// One batch of the full historical log, in write order, for a replica
    /// backfilling from `from` (exclusive). Used by `STORAGE_SYNC_BEGIN`
    /// handling before the caller switches to the live broadcast fan-out.
    pub async fn historical_sync_batch(
        &self,
        from: MsgId,
        max_items: usize,
    ) -> Result<crate::replication::SyncBatch> {
        let highest = self.reader.highest_block().await?.unwrap_or(0);
        let mut items = Vec::new();
        let mut cursor = from;

        'blocks: for block_no in from.block_no().max(0)..=highest {
            let mut collected = Vec::new();
            self.reader
                .scan_block(block_no, |_pos, header, body| {
                    if header.cmd == cmd::OFFLINE_V2 {
                        if let Ok(entry) = decode_offline_entry(body) {
                            if entry.msgid > from.0 {
                                collected.push(entry);
                            }
                        }
                    }
                })
                .await?;

            for entry in collected {
                let (header, raw) = self.reader.read_at(MsgId(entry.msgid)).await?;
                items.push(ReplicationItem {
                    msgid: MsgId(entry.msgid),
                    appid: AppId(entry.appid),
                    uid: Uid(entry.uid),
                    cmd: header.cmd,
                    flag: header.flag,
                    raw,
                });
                cursor = MsgId(entry.msgid);
                if items.len() >= max_items {
                    break 'blocks;
                }
            }
        }

        Ok(crate::replication::SyncBatch { items, cursor })
    }

    /// `GetNewCount(appid, uid, last_received_msgid)`: walks until a
    /// message NOT sent by this user's device is found; returns 0 or 1.
    pub async fn get_new_count(
        &self,
        appid: AppId,
        uid: Uid,
        last_received_msgid: MsgId,
        self_device: DeviceId,
    ) -> Result<i64> {
        let cursor = self.index.get(appid, uid);
        let mut next = cursor.last_id;

        while !next.is_none() && next > last_received_msgid {
            let (_header, body) = self.reader.read_at(next).await?;
            let entry = decode_offline_entry(body)?;
            if entry.device_id != self_device.0 {
                return Ok(1);
            }
            next = MsgId(entry.prev_msgid);
        }
        Ok(0)
    }

    async fn walk(
        &self,
        cursor: PeerCursor,
        stop_at: Option<MsgId>,
        group_limit: usize,
        limit: usize,
    ) -> Result<SyncResult> {
        let mut messages = Vec::new();
        let mut group_count = 0usize;
        let mut next = cursor.last_id;
        let mut last_msgid = MsgId::NONE;

        while !next.is_none() {
            let (_header, body) = self.reader.read_at(next).await?;
            let entry = decode_offline_entry(body)?;

            if let Some(stop_at) = stop_at {
                if entry.msgid <= stop_at.0 {
                    break;
                }
            }
            last_msgid = MsgId(entry.msgid);

            let (_, inner) = self.reader.read_packet_at(MsgId(entry.msgid)).await?;
            if let Some((inner_cmd, inner_flag, raw)) = deliverable_payload(inner) {
                let is_group = entry.flag & flag::GROUP != 0;
                if is_group {
                    group_count += 1;
                }
                messages.push(StoredMessage {
                    msgid: MsgId(entry.msgid),
                    device_id: DeviceId(entry.device_id),
                    cmd: inner_cmd,
                    flag: inner_flag,
                    raw,
                });
                if messages.len() >= limit {
                    break;
                }
            }

            next = if group_count >= group_limit {
                MsgId(entry.prev_peer_msgid)
            } else {
                MsgId(entry.prev_msgid)
            };
        }

        Ok(SyncResult {
            messages,
            last_msgid,
        })
    }
}

/// Re-encodes a decoded packet body alongside its wire `cmd`/`flag`, for
/// deliverable kinds only (spec.md §4.4 read path step 3).
fn deliverable_payload(packet: Packet) -> Option<(u8, u8, bytes::Bytes)> {
    let mut buf = bytes::BytesMut::new();
    let (inner_cmd, inner_flag) = match &packet {
        Packet::Im(im) => (cmd::IM, im.flag),
        Packet::GroupIm(im) => (cmd::GROUP_IM, im.flag),
        Packet::GroupNotification(_) => (cmd::GROUP_NOTIFICATION, 0),
        Packet::Customer(c) => (cmd::CUSTOMER, c.flag),
        Packet::CustomerSupport(c) => (cmd::CUSTOMER_SUPPORT, c.flag),
        Packet::System(_) => (cmd::SYSTEM, 0),
        _ => return None,
    };
    packet.encode(&mut buf).ok()?;
    Some((inner_cmd, inner_flag, buf.freeze()))
}

struct OfflineEntry {
    appid: i32,
    uid: i32,
    msgid: i64,
    device_id: i32,
    flag: u8,
    prev_msgid: i64,
    prev_peer_msgid: i64,
}

fn decode_offline_entry(body: bytes::Bytes) -> Result<OfflineEntry> {
    use im_codec::{Offline, OfflineV2};
    match Packet::decode(cmd::OFFLINE_V2, 0, 0, body.clone()) {
        Ok(Packet::OfflineV2(OfflineV2 {
            appid,
            uid,
            msgid,
            device_id,
            flag,
            prev_msgid,
            prev_peer_msgid,
        })) => Ok(OfflineEntry {
            appid,
            uid,
            msgid,
            device_id,
            flag,
            prev_msgid,
            prev_peer_msgid,
        }),
        _ => match Packet::decode(cmd::OFFLINE, 0, 0, body)? {
            Packet::Offline(Offline {
                appid,
                uid,
                msgid,
                prev_msgid,
            }) => Ok(OfflineEntry {
                appid,
                uid,
                msgid,
                device_id: 0,
                flag: 0,
                prev_msgid,
                prev_peer_msgid: prev_msgid,
            }),
            _ => Err(crate::error::Error::CorruptLog(
                "offline-chain record is neither OFFLINE_V2 nor OFFLINE".into(),
            )),
        },
    }
}

/// `createPeerIndex`: no index file on disk, scan every block from 0.
async fn create_peer_index(reader: &LogReader, index: &PeerIndex) -> Result<()> {
    let highest = reader.highest_block().await?.unwrap_or(0);
    let mut cursors: HashMap<(i32, i32), PeerCursor> = HashMap::new();
    let mut last_saved_id = MsgId::NONE;

    for block_no in 0..=highest {
        reader
            .scan_block(block_no, |_msgid, header, body| {
                if header.cmd == cmd::OFFLINE_V2 {
                    if let Ok(entry) = decode_offline_entry(body) {
                        let is_group = entry.flag & flag::GROUP != 0;
                        let cursor = cursors.entry((entry.appid, entry.uid)).or_default();
                        cursor.last_id = MsgId(entry.msgid);
                        if !is_group {
                            cursor.last_peer_id = MsgId(entry.msgid);
                        }
                        last_saved_id = last_saved_id.max(MsgId(entry.msgid));
                    }
                }
            })
            .await?;
    }

    index.restore(cursors, last_saved_id);
    Ok(())
}

/// `repairPeerIndex`: an index file was loaded; replay only the log tail
/// from `last_saved_id` forward.
async fn repair_peer_index(
    reader: &LogReader,
    index: &Arc<PeerIndex>,
    last_saved_id: MsgId,
) -> Result<()> {
    let highest = reader.highest_block().await?.unwrap_or(0);
    let start_block = last_saved_id.block_no().max(0);

    for block_no in start_block..=highest {
        reader
            .scan_block(block_no, |msgid, header, body| {
                if header.cmd == cmd::OFFLINE_V2 && msgid.0 > last_saved_id.0 {
                    if let Ok(entry) = decode_offline_entry(body) {
                        let is_group = entry.flag & flag::GROUP != 0;
                        index.apply_from_scan(entry.appid, entry.uid, MsgId(entry.msgid), is_group);
                    }
                }
            })
            .await?;
    }
    Ok(())
}
