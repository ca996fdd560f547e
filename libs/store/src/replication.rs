use std::sync::Arc;

use im_common::MsgId;
use tokio::sync::broadcast;
use tokio::time::{self, Instant};

use crate::error::{Error, Result};
use crate::store::{LogStore, ReplicationItem};

/// One `STORAGE_SYNC_MESSAGE_BATCH` worth of items, either drawn from the
/// historical backfill or coalesced off the live fan-out.
pub struct SyncBatch {
    pub items: Vec<ReplicationItem>,
    pub cursor: MsgId,
}

/// Drives the `STORAGE_SYNC_BEGIN` handshake for one replica connection:
/// historical backfill first, then a live coalescing fan-out, per spec.md
/// §4.4's replication section.
pub struct ReplicationStream {
    store: Arc<LogStore>,
    rx: broadcast::Receiver<ReplicationItem>,
    cursor: MsgId,
    caught_up: bool,
}

impl ReplicationStream {
    pub fn new(store: Arc<LogStore>, from: MsgId) -> Self {
        let rx = store.subscribe_replication();
        Self {
            store,
            rx,
            cursor: from,
            caught_up: false,
        }
    }

    /// Returns the next batch to ship to the replica, or `None` once both
    /// the historical backfill and the live stream have nothing left to
    /// send before the caller's own cancellation.
    pub async fn next_batch(
        &mut self,
        historical_batch_size: usize,
        live_batch_max_items: usize,
        live_batch_window: std::time::Duration,
    ) -> Result<SyncBatch> {
        if !self.caught_up {
            let batch = self
                .store
                .historical_sync_batch(self.cursor, historical_batch_size)
                .await?;
            if batch.items.is_empty() {
                self.caught_up = true;
            } else {
                self.cursor = batch.cursor;
                return Ok(batch);
            }
        }

        self.live_batch(live_batch_max_items, live_batch_window).await
    }

    async fn live_batch(
        &mut self,
        max_items: usize,
        window: std::time::Duration,
    ) -> Result<SyncBatch> {
        let mut items = Vec::new();
        let deadline = Instant::now() + window;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || items.len() >= max_items {
                break;
            }

            match time::timeout(remaining, self.rx.recv()).await {
                Ok(Ok(item)) => {
                    if item.msgid <= self.cursor {
                        // Already covered by the historical backfill.
                        continue;
                    }
                    self.cursor = item.msgid;
                    items.push(item);
                }
                Ok(Err(broadcast::error::RecvError::Lagged(_))) => {
                    // The broadcast buffer overran the replica's read rate;
                    // it must restart from a fresh STORAGE_SYNC_BEGIN.
                    return Err(Error::ReplicationDivergence(format!(
                        "replica fell behind the broadcast buffer past {}",
                        self.cursor
                    )));
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => break,
                Err(_elapsed) => break,
            }
        }

        Ok(SyncBatch {
            items,
            cursor: self.cursor,
        })
    }
}
