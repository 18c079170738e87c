//! Positional writes to a destination file.

use std::io::{self, SeekFrom};

use tokio::io::{AsyncSeek, AsyncSeekExt, AsyncWrite, AsyncWriteExt};

/// Issues one positional write at a time against a seekable target.
///
/// `write_at` resolves only once the target has accepted every byte and
/// flushed. A target that signals saturation by returning `Poll::Pending`
/// suspends this writer alone until it is woken; other writers keep running.
#[derive(Debug)]
pub struct DiskWriter<W> {
    target: W,
    bytes_written: u64,
}

impl<W> DiskWriter<W>
where
    W: AsyncWrite + AsyncSeek + Unpin,
{
    /// Wrap a write target.
    pub fn new(target: W) -> Self {
        Self {
            target,
            bytes_written: 0,
        }
    }

    /// Write `bytes` at absolute offset `position`.
    pub async fn write_at(&mut self, position: u64, bytes: &[u8]) -> io::Result<()> {
        self.target.seek(SeekFrom::Start(position)).await?;
        self.target.write_all(bytes).await?;
        // tokio::fs::File completes the write on a blocking thread; flush waits for it.
        self.target.flush().await?;
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }

    /// Bytes accepted through this writer so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}
