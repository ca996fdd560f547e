use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use im_codec::Packet;
use im_router::Broker;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};

static NEXT_GATEWAY_ID: AtomicU64 = AtomicU64::new(1);

pub async fn run(broker: Arc<Broker>, listen: &str) -> anyhow::Result<()> {
    let listener = TcpListener::bind(listen).await?;
    tracing::info!(%listen, "router listening");

    loop {
        let (stream, addr) = listener.accept().await?;
        let broker = broker.clone();
        tokio::spawn(async move {
            tracing::debug!(%addr, "gateway connected");
            let (reader, writer) = tokio::io::split(stream);
            handle_connection(broker, reader, writer).await;
            tracing::debug!(%addr, "gateway disconnected");
        });
    }
}

async fn handle_connection<R, W>(broker: Arc<Broker>, mut reader: R, writer: W)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let gateway_id = NEXT_GATEWAY_ID.fetch_add(1, Ordering::Relaxed);
    let (inbound_tx, mut inbound_rx) = mpsc::channel(256);
    broker.register_gateway(gateway_id, inbound_tx);

    let writer = Arc::new(Mutex::new(writer));
    let out_seq = Arc::new(AtomicU32::new(1));

    let forward_writer = writer.clone();
    let forward_seq = out_seq.clone();
    let forward_task = tokio::spawn(async move {
        while let Some(packet) = inbound_rx.recv().await {
            let seq = forward_seq.fetch_add(1, Ordering::Relaxed);
            let mut w = forward_writer.lock().await;
            if im_client::write_frame(&mut *w, seq, 0, &packet)
                .await
                .is_err()
            {
                return;
            }
        }
    });

    loop {
        match im_client::read_frame(&mut reader).await {
            Ok(Some((header, packet))) => {
                if let Err(err) = dispatch(&broker, gateway_id, header.seq, packet, &writer).await {
                    tracing::warn!(%err, "router dispatch failed");
                }
            }
            Ok(None) => break,
            Err(err) => {
                tracing::debug!(%err, "router read loop closing");
                break;
            }
        }
    }

    forward_task.abort();
    broker.deregister_gateway(gateway_id);
}

async fn dispatch<W>(
    broker: &Arc<Broker>,
    gateway_id: im_router::GatewayId,
    request_seq: u32,
    packet: Packet,
    writer: &Arc<Mutex<W>>,
) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    match packet {
        Packet::Subscribe(sub) => {
            broker
                .handle_subscribe(
                    gateway_id,
                    im_common::AppId(sub.appid),
                    im_common::Uid(sub.uid),
                    sub.online,
                )
                .await;
        }
        Packet::Unsubscribe(unsub) => {
            broker
                .handle_unsubscribe(
                    gateway_id,
                    im_common::AppId(unsub.appid),
                    im_common::Uid(unsub.uid),
                    unsub.online,
                )
                .await;
        }
        Packet::Publish(publish) => broker.handle_publish(gateway_id, publish).await,
        Packet::PublishGroup(publish) => broker.handle_publish_group(gateway_id, publish).await,
        Packet::PublishRoom(publish) => broker.handle_publish_room(gateway_id, publish).await,
        Packet::SubscribeRoom(sub) => {
            let first = broker.subscribe_room(gateway_id, im_common::AppId(sub.appid), sub.room_id);
            reply_ack(writer, request_seq, first).await?;
        }
        Packet::UnsubscribeRoom(unsub) => {
            let last = broker.unsubscribe_room(
                gateway_id,
                im_common::AppId(unsub.appid),
                unsub.room_id,
            );
            reply_ack(writer, request_seq, last).await?;
        }
        other => {
            tracing::debug!(cmd = other.cmd(), "unexpected frame on router listener");
        }
    }
    Ok(())
}

async fn reply_ack<W>(
    writer: &Arc<Mutex<W>>,
    request_seq: u32,
    flag: bool,
) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut w = writer.lock().await;
    im_client::write_frame(
        &mut *w,
        request_seq,
        flag as u8,
        &Packet::Ack(im_codec::Ack { seq: request_seq }),
    )
    .await?;
    Ok(())
}
