//! Retained-bytes buffer for rewindable streams.
//!
//! Bytes stay in memory until the threshold would be exceeded; from then on
//! everything lives in an anonymous temporary file that the OS removes when
//! the handle is dropped.

use std::io::SeekFrom;

use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::debug;

use super::error::FetchError;

const SPILL_TARGET: &str = "stream spill file";

/// Append-only byte store that spills to disk past a size threshold.
#[derive(Debug)]
pub(crate) struct SpillBuffer {
    memory: Vec<u8>,
    spill: Option<File>,
    threshold: usize,
    len: u64,
}

impl SpillBuffer {
    pub(crate) fn new(threshold: usize) -> Self {
        Self {
            memory: Vec::new(),
            spill: None,
            threshold,
            len: 0,
        }
    }

    /// Total bytes retained.
    pub(crate) fn len(&self) -> u64 {
        self.len
    }

    pub(crate) fn is_spilled(&self) -> bool {
        self.spill.is_some()
    }

    pub(crate) async fn append(&mut self, data: &[u8]) -> Result<(), FetchError> {
        if data.is_empty() {
            return Ok(());
        }

        if self.spill.is_none() {
            if self.memory.len() + data.len() <= self.threshold {
                self.memory.extend_from_slice(data);
                self.len += data.len() as u64;
                return Ok(());
            }

            let mut file = create_spill_file().await?;
            file.write_all(&self.memory)
                .await
                .map_err(|e| FetchError::io(SPILL_TARGET, e))?;
            debug!(
                retained = self.len,
                threshold = self.threshold,
                "spilling retained stream bytes to disk"
            );
            self.memory = Vec::new();
            self.spill = Some(file);
        }

        if let Some(file) = self.spill.as_mut() {
            file.seek(SeekFrom::End(0))
                .await
                .map_err(|e| FetchError::io(SPILL_TARGET, e))?;
            file.write_all(data)
                .await
                .map_err(|e| FetchError::io(SPILL_TARGET, e))?;
            file.flush()
                .await
                .map_err(|e| FetchError::io(SPILL_TARGET, e))?;
        }
        self.len += data.len() as u64;
        Ok(())
    }

    /// Reads up to `max` retained bytes starting at `pos`.
    pub(crate) async fn read_at(&mut self, pos: u64, max: usize) -> Result<Bytes, FetchError> {
        if pos >= self.len || max == 0 {
            return Ok(Bytes::new());
        }
        let available = usize::try_from(self.len - pos).unwrap_or(usize::MAX);
        let count = max.min(available);

        match self.spill.as_mut() {
            None => {
                let start = usize::try_from(pos).unwrap_or(usize::MAX);
                Ok(Bytes::copy_from_slice(&self.memory[start..start + count]))
            }
            Some(file) => {
                file.seek(SeekFrom::Start(pos))
                    .await
                    .map_err(|e| FetchError::io(SPILL_TARGET, e))?;
                let mut buf = vec![0u8; count];
                file.read_exact(&mut buf)
                    .await
                    .map_err(|e| FetchError::io(SPILL_TARGET, e))?;
                Ok(Bytes::from(buf))
            }
        }
    }
}

async fn create_spill_file() -> Result<File, FetchError> {
    let file = tokio::task::spawn_blocking(tempfile::tempfile)
        .await
        .map_err(|e| FetchError::io(SPILL_TARGET, std::io::Error::other(e)))?
        .map_err(|e| FetchError::io(SPILL_TARGET, e))?;
    Ok(File::from_std(file))
}
