use std::time::Duration;

/// I5: a session's outbound in-memory queue holds at most this many items;
/// on overflow the oldest is dropped, never the newest.
pub const MESSAGE_QUEUE_LIMIT: usize = 1000;

/// Depth of the bounded `wt` outbound channel (spec.md §4.2).
pub const WT_QUEUE_DEPTH: usize = 300;

/// Depth of the batched `pwt` outbound channel.
pub const PWT_QUEUE_DEPTH: usize = 10;

/// `EnqueueMessage` blocks up to this long waiting on `wt` before counting
/// a timeout.
pub const ENQUEUE_TIMEOUT: Duration = Duration::from_secs(60);

/// Read-task socket deadline; expiry (or peer EOF) triggers session
/// cleanup.
pub const READ_DEADLINE: Duration = Duration::from_secs(6 * 60);

/// Logged as "slow handling" when a single message takes longer than this.
pub const SLOW_HANDLE_THRESHOLD: Duration = Duration::from_secs(2);

/// Brief drain wait after pushing the `wt` nil terminator during close.
pub const CLOSE_DRAIN_WAIT: Duration = Duration::from_millis(200);

/// Broker push-batcher coalescing window and item cap.
pub const PUSH_BATCH_WINDOW: Duration = Duration::from_millis(500);
pub const PUSH_BATCH_MAX_ITEMS: usize = 1000;

/// Logged as a warning when a push pipeline round-trip exceeds this.
pub const PUSH_PIPELINE_WARN_THRESHOLD: Duration = Duration::from_millis(300);

/// Store replication: historical batch size and live fan-out cap/timer.
pub const REPLICATION_HISTORICAL_BATCH: usize = 5000;
pub const REPLICATION_LIVE_BATCH_MAX_ITEMS: usize = 1000;
pub const REPLICATION_LIVE_BATCH_WINDOW: Duration = Duration::from_secs(1);

/// Store log block cap before fsync + rotate (also `im_common::ids::BLOCK_SIZE`).
pub const LOG_BLOCK_SIZE: i64 = crate::ids::BLOCK_SIZE;

/// Index-flush cadence and write-ahead threshold.
pub const INDEX_FLUSH_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const INDEX_FLUSH_WRITE_AHEAD: i64 = 2 * LOG_BLOCK_SIZE;

/// Broker reconnect backoff bounds (doubles between them).
pub const BROKER_RECONNECT_BACKOFF_MIN: Duration = Duration::from_millis(100);
pub const BROKER_RECONNECT_BACKOFF_MAX: Duration = Duration::from_secs(60);

/// Group-manager subscribe connection read timeout (kept alive by a
/// self-published ping).
pub const GROUP_MANAGER_READ_TIMEOUT: Duration = Duration::from_secs(5 * 60);
