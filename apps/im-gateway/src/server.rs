use std::sync::Arc;

use im_gateway::{next_conn_id, GatewayHub, NoopFilter};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Accepts client TCP connections and drives each through
/// `im_gateway::run_connection`, sharing one `hub` (and its store/route
/// link) across every session this process hosts.
pub async fn run(
    hub: Arc<GatewayHub>,
    redis_client: redis::Client,
    listen: &str,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(listen).await?;
    tracing::info!(%listen, "gateway listening");

    loop {
        let (stream, addr) = listener.accept().await?;
        let hub = hub.clone();
        let redis_client = redis_client.clone();
        tokio::spawn(async move {
            let redis = match redis::aio::ConnectionManager::new(redis_client).await {
                Ok(conn) => conn,
                Err(err) => {
                    tracing::warn!(%addr, %err, "failed to open redis connection for session");
                    return;
                }
            };

            tracing::debug!(%addr, "client connected");
            let (reader, writer) = tokio::io::split(stream);
            let conn_id = next_conn_id();
            im_gateway::run_connection(
                reader,
                writer,
                conn_id,
                addr.to_string(),
                hub,
                redis,
                Arc::new(NoopFilter),
            )
            .await;
            tracing::debug!(%addr, "client disconnected");
        });
    }
}

/// Relays frames the route link hands back for this gateway (presence
/// push, group/room fan-out) into the hub's local delivery path.
pub async fn run_broker_relay(hub: Arc<GatewayHub>, mut inbound: mpsc::Receiver<im_codec::Packet>) {
    while let Some(packet) = inbound.recv().await {
        hub.deliver_from_broker(packet).await;
    }
}
