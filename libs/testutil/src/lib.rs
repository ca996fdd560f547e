#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use im_gateway::{BrokerLink, GatewayConfig, GatewayHub, NoopFilter};
use im_router::{Broker, PushQueue};
use im_store::LogStore;
use redis::AsyncCommands;
use tempfile::TempDir;

/// The Redis URL integration tests run against, from `REDIS_URL` or the
/// local default.
pub fn test_redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string())
}

/// Connects to [`test_redis_url`], returning `None` (callers should skip
/// the test) when nothing is listening there.
pub async fn test_redis() -> Option<redis::aio::ConnectionManager> {
    let client = redis::Client::open(test_redis_url()).ok()?;
    match tokio::time::timeout(
        std::time::Duration::from_millis(500),
        redis::aio::ConnectionManager::new(client),
    )
    .await
    {
        Ok(Ok(manager)) => Some(manager),
        _ => {
            tracing::warn!("no Redis reachable, skipping integration test");
            None
        }
    }
}

/// Seeds the hash `resolve_token` reads, so tests can authenticate a known
/// `(token, appid, uid)` triple without a provisioning API in front of it.
pub async fn seed_access_token(
    redis: &mut redis::aio::ConnectionManager,
    token: &str,
    appid: i32,
    uid: i32,
    notification_on: bool,
) {
    let key = im_common::redis_keys::access_token_key(token);
    let _: () = redis
        .hset_multiple(
            &key,
            &[
                ("app_id", appid.to_string()),
                ("user_id", uid.to_string()),
                (
                    "notification_on",
                    if notification_on { "1" } else { "0" }.to_string(),
                ),
                ("forbidden", "0".to_string()),
            ],
        )
        .await
        .expect("seed access token");
}

static NEXT_GATEWAY_ID: AtomicU64 = AtomicU64::new(1);

/// One in-process store + broker + push-queue, ready to host any number of
/// gateway connections registered against the same broker (so presence and
/// publish fan-out between two sessions on the harness behaves like two
/// real gateway processes talking through a shared IMR).
pub struct Harness {
    pub store_dir: TempDir,
    pub store: Arc<LogStore>,
    pub broker: Arc<Broker>,
    pub config: GatewayConfig,
}

impl Harness {
    pub async fn new(redis_url: &str) -> Self {
        let store_dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(LogStore::open(store_dir.path()).await.expect("open store"));
        let push = PushQueue::connect(redis_url).await.expect("connect push queue");
        let broker = Arc::new(Broker::new(push));
        Self {
            store_dir,
            store,
            broker,
            config: GatewayConfig::default(),
        }
    }

    /// Spins up one gateway session over an in-memory duplex, wired to
    /// this harness's shared store and broker, and returns a client
    /// driving the other end plus the frames it receives.
    pub async fn connect(
        &self,
        redis: redis::aio::ConnectionManager,
    ) -> (
        im_client::Client<tokio::io::WriteHalf<tokio::io::DuplexStream>>,
        impl tokio_stream::Stream<Item = im_codec::Packet> + Send + 'static,
    ) {
        let (client_side, server_side) = tokio::io::duplex(64 * 1024);
        let (server_reader, server_writer) = tokio::io::split(server_side);
        let (client_reader, client_writer) = tokio::io::split(client_side);

        let gateway_id = NEXT_GATEWAY_ID.fetch_add(1, Ordering::Relaxed);
        let (inbound_tx, mut inbound_rx) = tokio::sync::mpsc::channel(64);
        let link = BrokerLink::new(self.broker.clone(), gateway_id, inbound_tx);
        let hub = Arc::new(GatewayHub::new(
            self.store.clone(),
            Arc::new(link),
            self.config.clone(),
        ));

        let relay_hub = hub.clone();
        tokio::spawn(async move {
            while let Some(packet) = inbound_rx.recv().await {
                relay_hub.deliver_from_broker(packet).await;
            }
        });

        let conn_id = im_gateway::next_conn_id();
        tokio::spawn(im_gateway::run_connection(
            server_reader,
            server_writer,
            conn_id,
            "test".to_string(),
            hub,
            redis,
            Arc::new(NoopFilter),
        ));

        im_client::Client::from_split(client_reader, client_writer)
    }
}
