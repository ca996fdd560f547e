use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ErrorKind};

use crate::frame::{Header, HEADER_LEN};
use crate::{DecodeError, EncodeError, Packet};

/// Wraps an `AsyncRead`/`AsyncWrite` pair with the fixed 12-byte header
/// framing. `input_max_size`/`output_max_size` enforce the 32 KiB
/// client-facing / 32 MiB store-sync body caps from spec.md §4.1; the
/// caller sets whichever applies per listener.
pub struct Codec<R, W> {
    reader: R,
    writer: W,
    input_max_size: usize,
    output_max_size: usize,
    next_seq: u32,
    read_buf: BytesMut,
    write_buf: BytesMut,
}

impl<R, W> Codec<R, W>
where
    R: AsyncRead + Send + Unpin,
    W: AsyncWrite + Send + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader,
            writer,
            input_max_size: usize::MAX,
            output_max_size: usize::MAX,
            next_seq: 1,
            read_buf: BytesMut::new(),
            write_buf: BytesMut::new(),
        }
    }

    pub fn set_input_max_size(&mut self, size: usize) {
        self.input_max_size = size;
    }

    pub fn set_output_max_size(&mut self, size: usize) {
        self.output_max_size = size;
    }

    /// Reads the next frame. `Ok(None)` means the peer closed the socket
    /// cleanly; an oversize `length` returns `DecodeError::PacketTooLarge`
    /// and the caller must close the socket without replying.
    pub async fn decode(&mut self) -> Result<Option<(Header, Packet)>, DecodeError> {
        let mut header_buf = [0u8; HEADER_LEN];
        match self.reader.read_exact(&mut header_buf).await {
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) => return Err(err.into()),
        }

        let header = Header {
            length: u32::from_be_bytes(header_buf[0..4].try_into().unwrap()),
            seq: u32::from_be_bytes(header_buf[4..8].try_into().unwrap()),
            cmd: header_buf[8],
            version: header_buf[9],
            flag: header_buf[10],
            reserved: header_buf[11],
        };

        let length = header.length as usize;
        ensure!(length <= self.input_max_size, DecodeError::PacketTooLarge);

        self.read_buf.resize(length, 0);
        self.reader.read_exact(&mut self.read_buf[..]).await?;

        let packet = Packet::decode(
            header.cmd,
            header.version,
            header.flag,
            self.read_buf.split().freeze(),
        )?;
        Ok(Some((header, packet)))
    }

    /// Encodes `packet` with a server-assigned, monotonically increasing
    /// `seq` and the given `flag` bits, and writes it to the socket.
    pub async fn encode(&mut self, flag: u8, packet: &Packet) -> Result<usize, EncodeError> {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.encode_with_seq(seq, flag, packet).await
    }

    /// As `encode`, but with an explicit `seq` (used to echo a request's
    /// sequence number, e.g. for `ACK`).
    pub async fn encode_with_seq(
        &mut self,
        seq: u32,
        flag: u8,
        packet: &Packet,
    ) -> Result<usize, EncodeError> {
        self.write_buf.clear();
        packet.encode(&mut self.write_buf)?;
        let length = self.write_buf.len();
        ensure!(length <= self.output_max_size, EncodeError::PayloadTooLarge);

        let mut header_buf = BytesMut::with_capacity(HEADER_LEN);
        header_buf.put_u32(length as u32);
        header_buf.put_u32(seq);
        header_buf.put_u8(packet.cmd());
        header_buf.put_u8(packet.version());
        header_buf.put_u8(flag);
        header_buf.put_u8(0);

        self.writer.write_all(&header_buf).await?;
        self.writer.write_all(&self.write_buf).await?;
        Ok(HEADER_LEN + length)
    }
}
