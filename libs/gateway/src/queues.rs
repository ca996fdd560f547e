use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use im_codec::Packet;
use im_common::limits;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};

/// The three outbound queues plus the `lwt` trigger a session's write task
/// drains (spec.md §4.2). `wt` carries normal-priority frames and blocks
/// producers; `pwt` carries pre-batched frames (sync pages); `messages`
/// is the unbounded low-priority overflow list, capped in practice at
/// `MESSAGE_QUEUE_LIMIT` with oldest-drop semantics.
#[derive(Clone)]
pub struct Mailbox {
    wt_tx: mpsc::Sender<Packet>,
    pwt_tx: mpsc::Sender<Vec<Packet>>,
    messages: Arc<Mutex<VecDeque<Packet>>>,
    lwt: Arc<Notify>,
    timeout_count: Arc<AtomicU32>,
}

/// The receiving half, owned by the write task.
pub struct MailboxWriter {
    pub wt_rx: mpsc::Receiver<Packet>,
    pub pwt_rx: mpsc::Receiver<Vec<Packet>>,
    messages: Arc<Mutex<VecDeque<Packet>>>,
    lwt: Arc<Notify>,
}

pub fn mailbox() -> (Mailbox, MailboxWriter) {
    let (wt_tx, wt_rx) = mpsc::channel(limits::WT_QUEUE_DEPTH);
    let (pwt_tx, pwt_rx) = mpsc::channel(limits::PWT_QUEUE_DEPTH);
    let messages = Arc::new(Mutex::new(VecDeque::new()));
    let lwt = Arc::new(Notify::new());

    (
        Mailbox {
            wt_tx,
            pwt_tx,
            messages: messages.clone(),
            lwt: lwt.clone(),
            timeout_count: Arc::new(AtomicU32::new(0)),
        },
        MailboxWriter {
            wt_rx,
            pwt_rx,
            messages,
            lwt,
        },
    )
}

impl Mailbox {
    /// `EnqueueMessage(msg) -> bool`: waits up to 60s on `wt`. Returns
    /// `true` if the session should be treated as stuck (a timeout just
    /// occurred, and a prior timeout was already outstanding) and the
    /// caller should command the writer to drain and close.
    pub async fn enqueue(&self, packet: Packet) -> bool {
        match tokio::time::timeout(limits::ENQUEUE_TIMEOUT, self.wt_tx.send(packet)).await {
            Ok(Ok(())) => false,
            Ok(Err(_)) => true, // writer gone, session is already closing
            Err(_elapsed) => {
                let prior = self.timeout_count.fetch_add(1, Ordering::SeqCst);
                prior > 0
            }
        }
    }

    pub async fn enqueue_batch(&self, packets: Vec<Packet>) -> bool {
        self.pwt_tx.send(packets).await.is_err()
    }

    /// `EnqueueNonBlockMessage`: never blocks; drops the oldest entry once
    /// at the 1000-item cap, then signals `lwt`.
    pub fn enqueue_non_block(&self, packet: Packet) {
        let mut messages = self.messages.lock();
        if messages.len() >= limits::MESSAGE_QUEUE_LIMIT {
            messages.pop_front();
        }
        messages.push_back(packet);
        drop(messages);
        self.lwt.notify_one();
    }
}

impl MailboxWriter {
    /// Drains the low-priority `messages` list after an `lwt` wakeup.
    pub fn drain_low_priority(&self) -> Vec<Packet> {
        let mut messages = self.messages.lock();
        messages.drain(..).collect()
    }

    pub async fn notified(&self) {
        self.lwt.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// P6 / spec.md §8 scenario 5: at the 1000-item cap, `enqueue_non_block`
    /// drops the oldest entry and keeps the newest, rather than rejecting
    /// the newest or growing past the cap.
    #[test]
    fn non_block_queue_drops_oldest_at_cap() {
        let (mailbox, writer) = mailbox();

        for _ in 0..limits::MESSAGE_QUEUE_LIMIT {
            mailbox.enqueue_non_block(Packet::Ping);
        }
        let drained = writer.drain_low_priority();
        assert_eq!(drained.len(), limits::MESSAGE_QUEUE_LIMIT);

        for _ in 0..limits::MESSAGE_QUEUE_LIMIT {
            mailbox.enqueue_non_block(Packet::Ping);
        }
        mailbox.enqueue_non_block(Packet::Pong);

        let drained = writer.drain_low_priority();
        assert_eq!(drained.len(), limits::MESSAGE_QUEUE_LIMIT);
        assert_eq!(drained.last(), Some(&Packet::Pong));
    }

    /// `enqueue` times out once `wt` is full and nobody is draining it; a
    /// second consecutive timeout reports the session as stuck.
    #[tokio::test(start_paused = true)]
    async fn enqueue_reports_stuck_after_two_timeouts() {
        let (mailbox, _writer) = mailbox();

        // Fill `wt` to its depth so the next send blocks.
        for _ in 0..limits::WT_QUEUE_DEPTH {
            assert!(!mailbox.enqueue(Packet::Ping).await);
        }

        let first_timeout = tokio::spawn({
            let mailbox = mailbox.clone();
            async move { mailbox.enqueue(Packet::Ping).await }
        });
        tokio::task::yield_now().await;
        tokio::time::advance(limits::ENQUEUE_TIMEOUT + std::time::Duration::from_millis(1)).await;
        assert!(!first_timeout.await.unwrap());

        let second_timeout = tokio::spawn({
            let mailbox = mailbox.clone();
            async move { mailbox.enqueue(Packet::Ping).await }
        });
        tokio::task::yield_now().await;
        tokio::time::advance(limits::ENQUEUE_TIMEOUT + std::time::Duration::from_millis(1)).await;
        assert!(second_timeout.await.unwrap());
    }
}
