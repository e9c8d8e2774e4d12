//! Demand-driven body chunk producers.
//!
//! A [`ChunkSource`] hands out the body one chunk per call and never reads
//! ahead of its consumer. [`HttpChunkSource`] is the network-backed producer
//! returned by the request driver.

use std::ops::Range;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use super::classify::classify_transport;
use super::error::{FetchError, TransferPhase};

/// Pull-based producer of body chunks.
///
/// Uses `async_trait` because streams hold producers as `Box<dyn ChunkSource>`.
#[async_trait]
pub trait ChunkSource: Send {
    /// Waits for the next chunk; `Ok(None)` signals end of body.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, FetchError>;

    /// Stops reading and releases the underlying connection.
    ///
    /// Must be safe to call repeatedly and after end of body.
    fn release(&mut self);
}

/// An immutable slice of the body and its position in the logical body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    offset: u64,
    data: Bytes,
}

impl Chunk {
    /// Wraps `data` starting at body offset `offset`.
    #[must_use]
    pub fn new(offset: u64, data: Bytes) -> Self {
        Self { offset, data }
    }

    /// Offset of the first byte.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Offset one past the last byte.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.offset + self.data.len() as u64
    }

    /// `[offset, end)` within the body.
    #[must_use]
    pub fn range(&self) -> Range<u64> {
        self.offset..self.end()
    }

    /// Chunk bytes.
    #[must_use]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Up to `max` bytes starting at body position `pos`, without copying.
    ///
    /// Returns an empty slice when `pos` is outside the chunk.
    #[must_use]
    pub fn slice_from(&self, pos: u64, max: usize) -> Bytes {
        if !self.range().contains(&pos) {
            return Bytes::new();
        }
        let start = usize::try_from(pos - self.offset).unwrap_or(usize::MAX);
        let end = start.saturating_add(max).min(self.data.len());
        self.data.slice(start..end)
    }
}

/// Body of a live HTTP response, read one network chunk at a time.
#[derive(Debug)]
pub struct HttpChunkSource {
    url: String,
    response: Option<reqwest::Response>,
    read_timeout: Duration,
}

impl HttpChunkSource {
    pub(crate) fn new(response: reqwest::Response, read_timeout: Duration) -> Self {
        Self {
            url: response.url().to_string(),
            response: Some(response),
            read_timeout,
        }
    }

    /// True while the response body is still attached.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.response.is_some()
    }
}

#[async_trait]
impl ChunkSource for HttpChunkSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, FetchError> {
        let Some(response) = self.response.as_mut() else {
            return Ok(None);
        };

        match tokio::time::timeout(self.read_timeout, response.chunk()).await {
            Ok(Ok(Some(bytes))) => Ok(Some(bytes)),
            Ok(Ok(None)) => {
                self.response = None;
                Ok(None)
            }
            Ok(Err(e)) => {
                self.release();
                Err(classify_transport(&self.url, e, TransferPhase::Read))
            }
            Err(_) => {
                self.release();
                Err(FetchError::timeout(&self.url, TransferPhase::Read))
            }
        }
    }

    fn release(&mut self) {
        if self.response.take().is_some() {
            debug!(url = %self.url, "released connection before end of body");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_range_and_end() {
        let chunk = Chunk::new(10, Bytes::from_static(b"abcdef"));
        assert_eq!(chunk.range(), 10..16);
        assert_eq!(chunk.end(), 16);
        assert_eq!(chunk.offset(), 10);
    }

    #[test]
    fn test_chunk_slice_from_inside_range() {
        let chunk = Chunk::new(10, Bytes::from_static(b"abcdef"));
        assert_eq!(chunk.slice_from(12, 2), Bytes::from_static(b"cd"));
        assert_eq!(chunk.slice_from(12, 100), Bytes::from_static(b"cdef"));
    }

    #[test]
    fn test_chunk_slice_from_outside_range_is_empty() {
        let chunk = Chunk::new(10, Bytes::from_static(b"abcdef"));
        assert!(chunk.slice_from(9, 4).is_empty());
        assert!(chunk.slice_from(16, 4).is_empty());
    }
}
