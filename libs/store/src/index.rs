use std::collections::HashMap;
use std::path::{Path, PathBuf};

use im_common::{AppId, MsgId, Uid};
use parking_lot::RwLock;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::Result;

type Key = (i32, i32);

fn pack_key(appid: AppId, uid: Uid) -> Key {
    (appid.0, uid.0)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PeerCursor {
    pub last_id: MsgId,
    pub last_peer_id: MsgId,
}

/// The in-memory `(appid, uid) -> (last_id, last_peer_id)` index behind a
/// single `RwLock` (spec.md §4.4, §5's "store index: single mutex,
/// snapshots cloned under the lock for background flushes").
#[derive(Default)]
struct IndexInner {
    cursors: HashMap<Key, PeerCursor>,
    last_saved_id: MsgId,
}

pub struct PeerIndex {
    inner: RwLock<IndexInner>,
    path: PathBuf,
}

impl PeerIndex {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: RwLock::new(IndexInner::default()),
            path: path.into(),
        }
    }

    pub fn get(&self, appid: AppId, uid: Uid) -> PeerCursor {
        self.inner
            .read()
            .cursors
            .get(&pack_key(appid, uid))
            .copied()
            .unwrap_or_default()
    }

    pub fn update(&self, appid: AppId, uid: Uid, msgid: MsgId, is_group: bool) {
        let mut inner = self.inner.write();
        let entry = inner.cursors.entry(pack_key(appid, uid)).or_default();
        entry.last_id = msgid;
        if !is_group {
            entry.last_peer_id = msgid;
        }
    }

    pub fn last_saved_id(&self) -> MsgId {
        self.inner.read().last_saved_id
    }

    pub fn highest_msgid(&self) -> MsgId {
        self.inner
            .read()
            .cursors
            .values()
            .map(|c| c.last_id)
            .max()
            .unwrap_or(MsgId::NONE)
    }

    /// Atomically writes the index to disk (`peer_index_t` then rename, per
    /// spec.md §4.4), recording `new_last_saved_id` as the replay watermark.
    pub async fn flush(&self, new_last_saved_id: MsgId) -> Result<()> {
        let snapshot: Vec<(Key, PeerCursor)> = {
            let mut inner = self.inner.write();
            inner.last_saved_id = new_last_saved_id;
            inner.cursors.iter().map(|(k, v)| (*k, *v)).collect()
        };

        let tmp_path = self.path.with_extension("peer_index_t");
        let mut buf = Vec::with_capacity(8 + snapshot.len() * 24);
        buf.extend_from_slice(&new_last_saved_id.0.to_be_bytes());
        for ((appid, uid), cursor) in &snapshot {
            let key = ((*appid as i64) << 32) | (*uid as u32 as i64);
            buf.extend_from_slice(&key.to_be_bytes());
            buf.extend_from_slice(&cursor.last_id.0.to_be_bytes());
            buf.extend_from_slice(&cursor.last_peer_id.0.to_be_bytes());
        }

        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(&buf).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }

    /// Loads a previously flushed index, if present. Returns `None` when no
    /// index file exists yet (boot must fall back to `createPeerIndex`, a
    /// full log scan).
    pub async fn load(path: impl AsRef<Path>) -> Result<Option<(HashMap<Key, PeerCursor>, MsgId)>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(None);
        }

        let mut file = tokio::fs::File::open(path).await?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).await?;

        if buf.len() < 8 {
            return Ok(Some((HashMap::new(), MsgId::NONE)));
        }

        let last_saved_id = MsgId(i64::from_be_bytes(buf[0..8].try_into().unwrap()));
        let mut cursors = HashMap::new();
        let mut offset = 8;
        while offset + 24 <= buf.len() {
            let key = i64::from_be_bytes(buf[offset..offset + 8].try_into().unwrap());
            let last_id = i64::from_be_bytes(buf[offset + 8..offset + 16].try_into().unwrap());
            let last_peer_id =
                i64::from_be_bytes(buf[offset + 16..offset + 24].try_into().unwrap());
            let appid = (key >> 32) as i32;
            let uid = key as i32;
            cursors.insert(
                (appid, uid),
                PeerCursor {
                    last_id: MsgId(last_id),
                    last_peer_id: MsgId(last_peer_id),
                },
            );
            offset += 24;
        }

        Ok(Some((cursors, last_saved_id)))
    }

    /// Replaces the whole in-memory map (used by `createPeerIndex` /
    /// `repairPeerIndex` at boot, after scanning the log).
    pub fn restore(&self, cursors: HashMap<Key, PeerCursor>, last_saved_id: MsgId) {
        let mut inner = self.inner.write();
        inner.cursors = cursors;
        inner.last_saved_id = last_saved_id;
    }

    pub fn apply_from_scan(&self, appid: i32, uid: i32, msgid: MsgId, is_group: bool) {
        let mut inner = self.inner.write();
        let entry = inner.cursors.entry((appid, uid)).or_default();
        entry.last_id = msgid;
        if !is_group {
            entry.last_peer_id = msgid;
        }
    }
}
