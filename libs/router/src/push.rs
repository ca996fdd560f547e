use std::time::Instant;

use im_common::{limits, redis_keys};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time;

/// One push-notification payload awaiting delivery to its Redis list
/// (spec.md §4.3 "Publish handling").
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind")]
pub enum PushItem {
    Im {
        appid: i32,
        sender: i32,
        receiver: i32,
        content: Vec<u8>,
    },
    Group {
        appid: i32,
        sender: i32,
        receivers: Vec<i32>,
        group_id: i64,
        content: Vec<u8>,
    },
    Customer {
        appid: i32,
        receiver: i32,
        command: u8,
        customer_appid: i32,
        customer: i32,
        seller: i32,
        store: i32,
        content: Vec<u8>,
    },
    System {
        appid: i32,
        receiver: i32,
        content: Vec<u8>,
    },
}

impl PushItem {
    fn queue_key(&self) -> String {
        match self {
            PushItem::Im { appid, .. } => {
                if *appid == 0 {
                    redis_keys::PUSH_QUEUE.to_string()
                } else {
                    redis_keys::push_queue_for_appid(*appid)
                }
            }
            PushItem::Group { .. } => redis_keys::GROUP_PUSH_QUEUE.to_string(),
            PushItem::Customer { .. } => redis_keys::CUSTOMER_PUSH_QUEUE.to_string(),
            PushItem::System { .. } => redis_keys::SYSTEM_PUSH_QUEUE.to_string(),
        }
    }
}

/// Hands payloads to a background task that batches them into
/// `MULTI`/`RPUSH` pipelines (spec.md §4.3), coalescing up to
/// `PUSH_BATCH_MAX_ITEMS` items or `PUSH_BATCH_WINDOW`, whichever comes
/// first. A Redis error drops the whole batch: the store already holds
/// the authoritative copy, push is best-effort.
#[derive(Clone)]
pub struct PushQueue {
    tx: mpsc::Sender<PushItem>,
}

impl PushQueue {
    pub async fn connect(redis_url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_url)?;
        let manager = redis::aio::ConnectionManager::new(client).await?;
        let (tx, rx) = mpsc::channel(limits::PUSH_BATCH_MAX_ITEMS * 2);
        tokio::spawn(run_batcher(manager, rx));
        Ok(Self { tx })
    }

    pub async fn enqueue(&self, item: PushItem) {
        if self.tx.send(item).await.is_err() {
            tracing::warn!("push batcher task is gone, dropping payload");
        }
    }
}

async fn run_batcher(manager: redis::aio::ConnectionManager, mut rx: mpsc::Receiver<PushItem>) {
    loop {
        let mut batch = Vec::with_capacity(limits::PUSH_BATCH_MAX_ITEMS);
        let Some(first) = rx.recv().await else {
            return;
        };
        batch.push(first);

        let deadline = time::Instant::now() + limits::PUSH_BATCH_WINDOW;
        while batch.len() < limits::PUSH_BATCH_MAX_ITEMS {
            let remaining = deadline.saturating_duration_since(time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            match time::timeout(remaining, rx.recv()).await {
                Ok(Some(item)) => batch.push(item),
                Ok(None) => break,
                Err(_elapsed) => break,
            }
        }

        if let Err(err) = flush_batch(&manager, &batch).await {
            tracing::warn!(%err, items = batch.len(), "push pipeline failed, dropping batch");
        }
    }
}

async fn flush_batch(
    manager: &redis::aio::ConnectionManager,
    batch: &[PushItem],
) -> Result<(), redis::RedisError> {
    let started = Instant::now();
    let mut conn = manager.clone();

    let mut pipe = redis::pipe();
    pipe.atomic();
    for item in batch {
        let payload = serde_json::to_vec(item).expect("PushItem serializes");
        pipe.cmd("RPUSH").arg(item.queue_key()).arg(payload).ignore();
    }
    pipe.query_async(&mut conn).await?;

    let elapsed = started.elapsed();
    if elapsed > limits::PUSH_PIPELINE_WARN_THRESHOLD {
        tracing::warn!(?elapsed, items = batch.len(), "slow push pipeline");
    }
    Ok(())
}
