use std::path::{Path, PathBuf};

use bytes::{Bytes, BytesMut};
use im_codec::{DecodeError, Header, Packet, HEADER_LEN};
use im_common::{MsgId, BLOCK_SIZE};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt, SeekFrom};

use crate::error::{Error, Result};

/// File header magic `0x494d494d` ("IMIM" read as big-endian bytes).
pub const FILE_MAGIC: u32 = 0x494d_494d;
pub const FILE_VERSION: u32 = 1 << 16;
/// 32-byte file header: magic(4) + version(4) + 24 bytes padding.
pub const FILE_HEADER_LEN: u64 = 32;
/// Per-record torn-write sentinel, written before and after each frame.
const RECORD_MAGIC: u32 = FILE_MAGIC;

fn block_path(dir: &Path, block_no: i64) -> PathBuf {
    dir.join(format!("message_{block_no}"))
}

async fn write_file_header(file: &mut File) -> Result<()> {
    let mut buf = [0u8; FILE_HEADER_LEN as usize];
    buf[0..4].copy_from_slice(&FILE_MAGIC.to_be_bytes());
    buf[4..8].copy_from_slice(&FILE_VERSION.to_be_bytes());
    file.write_all(&buf).await?;
    Ok(())
}

async fn check_file_header(file: &mut File) -> Result<()> {
    let mut buf = [0u8; FILE_HEADER_LEN as usize];
    file.seek(SeekFrom::Start(0)).await?;
    file.read_exact(&mut buf).await?;
    let magic = u32::from_be_bytes(buf[0..4].try_into().unwrap());
    if magic != FILE_MAGIC {
        return Err(Error::CorruptLog(format!(
            "bad file header magic: {magic:#x}"
        )));
    }
    Ok(())
}

/// One encoded record: `magic(4) | header(12) | body | magic(4)`. The inner
/// `header` reuses the wire `Header` layout (`seq` is unused on disk).
fn frame_record(cmd: u8, version: u8, flag: u8, body: &[u8]) -> BytesMut {
    let mut buf = BytesMut::with_capacity(4 + HEADER_LEN + body.len() + 4);
    buf.extend_from_slice(&RECORD_MAGIC.to_be_bytes());
    buf.extend_from_slice(&(body.len() as u32).to_be_bytes());
    buf.extend_from_slice(&0u32.to_be_bytes()); // seq, unused on disk
    buf.extend_from_slice(&[cmd, version, flag, 0]);
    buf.extend_from_slice(body);
    buf.extend_from_slice(&RECORD_MAGIC.to_be_bytes());
    buf
}

fn record_len(body_len: usize) -> i64 {
    (4 + HEADER_LEN + body_len + 4) as i64
}

/// Single-writer append log over a directory of `message_<N>` files.
/// Rotation and fsync on block-cap crossing are the only way the active
/// file changes; files are never rewritten (spec.md §4.4).
pub struct LogWriter {
    dir: PathBuf,
    file: File,
    block_no: i64,
    offset: i64,
}

impl LogWriter {
    /// Opens (or creates) the active block, scanning the directory for the
    /// highest-numbered `message_<N>` file. Does not perform torn-tail
    /// recovery; callers should run `LogReader::recover_tail` first and
    /// resume from its reported offset via `resume_at`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;

        let mut highest = None;
        let mut read_dir = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(n) = name.strip_prefix("message_").and_then(|s| s.parse::<i64>().ok())
                {
                    highest = Some(highest.map_or(n, |h: i64| h.max(n)));
                }
            }
        }

        match highest {
            Some(block_no) => {
                let path = block_path(&dir, block_no);
                let mut file = OpenOptions::new().read(true).append(true).open(&path).await?;
                check_file_header(&mut file).await?;
                let len = file.metadata().await?.len() as i64;
                Ok(Self {
                    dir,
                    file,
                    block_no,
                    offset: len - FILE_HEADER_LEN as i64,
                })
            }
            None => Self::create_block(dir, 0).await,
        }
    }

    async fn create_block(dir: PathBuf, block_no: i64) -> Result<Self> {
        let path = block_path(&dir, block_no);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .await?;
        write_file_header(&mut file).await?;
        file.sync_all().await?;
        Ok(Self {
            dir,
            file,
            block_no,
            offset: 0,
        })
    }

    /// Resets the in-block offset after out-of-band torn-tail truncation.
    pub fn resume_at(&mut self, offset: i64) {
        self.offset = offset;
    }

    pub fn current_msgid(&self) -> MsgId {
        MsgId::encode(self.block_no, self.offset)
    }

    /// Appends one record, rotating to a new block first if it would cross
    /// `BLOCK_SIZE`. Returns the `MsgId` of the record just written.
    pub async fn append(&mut self, cmd: u8, version: u8, flag: u8, body: &[u8]) -> Result<MsgId> {
        let len = record_len(body.len());
        if self.offset + len > BLOCK_SIZE {
            self.rotate().await?;
        }

        let msgid = MsgId::encode(self.block_no, self.offset);
        let record = frame_record(cmd, version, flag, body);
        self.file.write_all(&record).await?;
        self.offset += len;
        Ok(msgid)
    }

    /// Writes one record at a specific target position, realigning the
    /// active block/offset to match a primary's layout first: skip if the
    /// target is already behind what's on disk (or more than one block
    /// ahead), rotate into the next block if the target crossed exactly
    /// one boundary, or pad with zero bytes if this writer's file pointer
    /// is behind the target. Returns `None` when the record was skipped
    /// as stale rather than written. Ports `Storage.SaveSyncMessage`'s
    /// skip/rotate/pad decision for replica-side replication apply.
    pub async fn append_synced(
        &mut self,
        cmd: u8,
        version: u8,
        flag: u8,
        body: &[u8],
        target: MsgId,
    ) -> Result<Option<MsgId>> {
        let n = target.block_no();
        let o = target.file_offset();

        if n < self.block_no || n - self.block_no > 1 {
            return Ok(None);
        }
        if n - self.block_no == 1 {
            self.rotate().await?;
        }

        if o < self.offset {
            return Ok(None);
        }
        if o > self.offset {
            let padding = vec![0u8; (o - self.offset) as usize];
            self.file.write_all(&padding).await?;
            self.offset = o;
        }

        let msgid = MsgId::encode(self.block_no, self.offset);
        let record = frame_record(cmd, version, flag, body);
        self.file.write_all(&record).await?;
        self.offset += record_len(body.len());
        Ok(Some(msgid))
    }

    async fn rotate(&mut self) -> Result<()> {
        self.file.sync_all().await?;
        let next = Self::create_block(self.dir.clone(), self.block_no + 1).await?;
        self.file = next.file;
        self.block_no = next.block_no;
        self.offset = next.offset;
        Ok(())
    }

    pub async fn sync(&mut self) -> Result<()> {
        self.file.sync_all().await?;
        Ok(())
    }
}

/// Random-access reader over the log directory, used for sync/history
/// walks and boot-time recovery. Reopens files per call rather than
/// caching handles — reads are cold-path relative to the write fast path.
pub struct LogReader {
    dir: PathBuf,
}

impl LogReader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub async fn read_at(&self, msgid: MsgId) -> Result<(Header, Bytes)> {
        let block_no = msgid.block_no();
        let offset = msgid.file_offset();
        let path = block_path(&self.dir, block_no);
        let mut file = File::open(&path).await?;
        file.seek(SeekFrom::Start(offset as u64)).await?;

        let mut magic_buf = [0u8; 4];
        file.read_exact(&mut magic_buf).await?;
        if u32::from_be_bytes(magic_buf) != RECORD_MAGIC {
            return Err(Error::CorruptLog(format!(
                "bad leading record magic at {msgid}"
            )));
        }

        let mut header_buf = [0u8; HEADER_LEN];
        file.read_exact(&mut header_buf).await?;
        let header = Header {
            length: u32::from_be_bytes(header_buf[0..4].try_into().unwrap()),
            seq: u32::from_be_bytes(header_buf[4..8].try_into().unwrap()),
            cmd: header_buf[8],
            version: header_buf[9],
            flag: header_buf[10],
            reserved: header_buf[11],
        };

        let mut body = vec![0u8; header.length as usize];
        file.read_exact(&mut body).await?;

        file.read_exact(&mut magic_buf).await?;
        if u32::from_be_bytes(magic_buf) != RECORD_MAGIC {
            return Err(Error::CorruptLog(format!(
                "torn record (trailing magic mismatch) at {msgid}"
            )));
        }

        Ok((header, Bytes::from(body)))
    }

    pub async fn read_packet_at(&self, msgid: MsgId) -> Result<(Header, Packet)> {
        let (header, body) = self.read_at(msgid).await?;
        let packet = Packet::decode(header.cmd, header.version, header.flag, body)
            .map_err(DecodeError::from)?;
        Ok((header, packet))
    }

    /// Highest block number present on disk, or `None` if the directory is
    /// empty.
    pub async fn highest_block(&self) -> Result<Option<i64>> {
        if !self.dir.exists() {
            return Ok(None);
        }
        let mut highest = None;
        let mut read_dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(n) = name.strip_prefix("message_").and_then(|s| s.parse::<i64>().ok())
                {
                    highest = Some(highest.map_or(n, |h: i64| h.max(n)));
                }
            }
        }
        Ok(highest)
    }

    /// Walks every record of block `block_no` from the file header onward,
    /// calling `visit(msgid, header, body)` for each. Used by
    /// `createPeerIndex` (full scan) and `repairPeerIndex` (tail scan).
    pub async fn scan_block(
        &self,
        block_no: i64,
        mut visit: impl FnMut(MsgId, Header, Bytes),
    ) -> Result<i64> {
        let path = block_path(&self.dir, block_no);
        let mut file = match File::open(&path).await {
            Ok(f) => f,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };
        check_file_header(&mut file).await?;

        let mut offset = 0i64;
        loop {
            let mut magic_buf = [0u8; 4];
            match file.read_exact(&mut magic_buf).await {
                Ok(_) => {}
                Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(err) => return Err(err.into()),
            }
            if u32::from_be_bytes(magic_buf) != RECORD_MAGIC {
                // torn tail: stop scanning, this is the last valid offset
                break;
            }

            let mut header_buf = [0u8; HEADER_LEN];
            if file.read_exact(&mut header_buf).await.is_err() {
                break;
            }
            let header = Header {
                length: u32::from_be_bytes(header_buf[0..4].try_into().unwrap()),
                seq: u32::from_be_bytes(header_buf[4..8].try_into().unwrap()),
                cmd: header_buf[8],
                version: header_buf[9],
                flag: header_buf[10],
                reserved: header_buf[11],
            };

            let mut body = vec![0u8; header.length as usize];
            if file.read_exact(&mut body).await.is_err() {
                break;
            }
            if file.read_exact(&mut magic_buf).await.is_err()
                || u32::from_be_bytes(magic_buf) != RECORD_MAGIC
            {
                break;
            }

            let msgid = MsgId::encode(block_no, offset);
            let len = record_len(body.len());
            visit(msgid, header, Bytes::from(body));
            offset += len;
        }

        Ok(offset)
    }
}
