use im_codec::Packet;
use tokio::io::AsyncWrite;

use crate::frame_io::write_frame;
use crate::queues::MailboxWriter;

/// The write task: drains `wt`, `pwt`, and (on `lwt`) `messages`, stamping
/// each outgoing frame with a monotonically increasing `seq` (spec.md
/// §4.2). Exits once `wt` closes (the reader side commands a close by
/// dropping its `Mailbox`) or a write fails.
pub async fn run_writer<W>(mut writer: W, mut mailbox: MailboxWriter)
where
    W: AsyncWrite + Unpin + Send,
{
    let mut seq: u32 = 1;

    'outer: loop {
        tokio::select! {
            biased;

            maybe = mailbox.wt_rx.recv() => {
                match maybe {
                    Some(packet) => {
                        if write_one(&mut writer, &mut seq, &packet).await.is_err() {
                            break 'outer;
                        }
                    }
                    None => break 'outer,
                }
            }

            maybe = mailbox.pwt_rx.recv() => {
                match maybe {
                    Some(batch) => {
                        for packet in &batch {
                            if write_one(&mut writer, &mut seq, packet).await.is_err() {
                                break 'outer;
                            }
                        }
                    }
                    None => break 'outer,
                }
            }

            _ = mailbox.notified() => {
                for packet in mailbox.drain_low_priority() {
                    if write_one(&mut writer, &mut seq, &packet).await.is_err() {
                        break 'outer;
                    }
                }
            }
        }
    }

    use tokio::io::AsyncWriteExt;
    let _ = writer.shutdown().await;
}

async fn write_one<W: AsyncWrite + Unpin>(
    writer: &mut W,
    seq: &mut u32,
    packet: &Packet,
) -> Result<(), im_codec::EncodeError> {
    write_frame(writer, *seq, 0, packet).await?;
    *seq = seq.wrapping_add(1);
    Ok(())
}
