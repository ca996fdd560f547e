use std::sync::atomic::{AtomicU32, Ordering};

use im_codec::Packet;
use tokio::io::{split, AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, Mutex};
use tokio_stream::wrappers::ReceiverStream;

use crate::error::Result;
use crate::frame::{read_frame, write_frame};

/// A thin async client over the wire protocol: one task reads frames off
/// the socket and republishes them as a `Stream`, while `send` writes
/// directly from the caller (mirrors the teacher's split reader-task /
/// inline-writer `Client` shape, without the builder/command-queue layer
/// a full MQTT client needs).
pub struct Client<W> {
    writer: Mutex<W>,
    seq: AtomicU32,
}

impl Client<WriteHalf<TcpStream>> {
    pub async fn connect<A: ToSocketAddrs>(
        addr: A,
    ) -> Result<(Self, impl tokio_stream::Stream<Item = Packet> + Send + 'static)> {
        let stream = TcpStream::connect(addr).await?;
        let (reader, writer) = split(stream);
        Ok(Self::from_split(reader, writer))
    }
}

impl<W> Client<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Builds a client around an already-split reader/writer pair, for
    /// tests driving a `tokio::io::duplex` instead of a real socket.
    pub fn from_split<R>(
        reader: R,
        writer: W,
    ) -> (Self, impl tokio_stream::Stream<Item = Packet> + Send + 'static)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(read_loop(reader, tx));
        (
            Self {
                writer: Mutex::new(writer),
                seq: AtomicU32::new(1),
            },
            ReceiverStream::new(rx),
        )
    }

    pub async fn send(&self, packet: Packet) -> Result<()> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, seq, 0, &packet).await?;
        Ok(())
    }
}

pub type TcpClient = Client<WriteHalf<TcpStream>>;

async fn read_loop<R: AsyncRead + Unpin>(mut reader: R, tx: mpsc::Sender<Packet>) {
    loop {
        match read_frame(&mut reader).await {
            Ok(Some((_header, packet))) => {
                if tx.send(packet).await.is_err() {
                    return;
                }
            }
            Ok(None) => return,
            Err(err) => {
                tracing::debug!(%err, "client read loop closing");
                return;
            }
        }
    }
}
