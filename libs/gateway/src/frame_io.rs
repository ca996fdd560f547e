use bytes::{BufMut, BytesMut};
use im_codec::{DecodeError, EncodeError, Header, Packet, HEADER_LEN};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ErrorKind};

/// Mirrors `im_codec::Codec`'s framing, split across the session's
/// dedicated reader and writer tasks (spec.md §5 note: a single `select!`
/// loop can't serialize three distinct outbound queues into one ordered
/// `seq` stream as cleanly as a dedicated writer can).
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_size: usize,
) -> Result<Option<(Header, Packet)>, DecodeError> {
    let mut header_buf = [0u8; HEADER_LEN];
    match reader.read_exact(&mut header_buf).await {
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
    if length > max_size {
        return Err(DecodeError::PacketTooLarge);
    }

    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await?;
    let packet = Packet::decode(header.cmd, header.version, header.flag, body.into())?;
    Ok(Some((header, packet)))
}

pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    seq: u32,
    flag: u8,
    packet: &Packet,
) -> Result<usize, EncodeError> {
    let mut body = BytesMut::new();
    packet.encode(&mut body)?;

    let mut header_buf = BytesMut::with_capacity(HEADER_LEN);
    header_buf.put_u32(body.len() as u32);
    header_buf.put_u32(seq);
    header_buf.put_u8(packet.cmd());
    header_buf.put_u8(packet.version());
    header_buf.put_u8(flag);
    header_buf.put_u8(0);

    writer.write_all(&header_buf).await?;
    writer.write_all(&body).await?;
    Ok(HEADER_LEN + body.len())
}
