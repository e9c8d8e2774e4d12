//! Lazily-filled, optionally rewindable byte stream over a response body.
//!
//! [`ChunkedStream`] pulls chunks from its [`ChunkSource`] only when a read
//! needs bytes that have not been fetched yet, so at most one chunk is ever
//! outstanding. With rewinding enabled every fetched byte is retained in a
//! spill buffer (memory first, then an anonymous temporary file) and any
//! earlier position can be re-read without touching the network.
//!
//! # Example
//!
//! ```no_run
//! use lazyfetch::fetch::{FetchConfig, Fetcher};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = Fetcher::new(FetchConfig::default())?;
//! let mut stream = fetcher.open("https://example.com/data.csv").await?;
//! let header = stream.read(64).await?;
//! stream.rewind().await?;
//! let again = stream.read(64).await?;
//! assert_eq!(header, again);
//! stream.close();
//! # Ok(())
//! # }
//! ```

use std::fmt;

use bytes::{Bytes, BytesMut};
use tracing::{debug, warn};

use super::buffer::SpillBuffer;
use super::constants::DEFAULT_SPILL_THRESHOLD;
use super::error::FetchError;
use super::metadata::ResponseMetadata;
use super::source::{Chunk, ChunkSource};

/// Behavior switches for a [`ChunkedStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOptions {
    /// Retain fetched bytes so earlier positions can be revisited.
    pub rewindable: bool,
    /// Retained bytes kept in memory before spilling to disk.
    pub spill_threshold: usize,
    /// Maximum total body size in bytes.
    pub max_size: Option<u64>,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            rewindable: true,
            spill_threshold: DEFAULT_SPILL_THRESHOLD,
            max_size: None,
        }
    }
}

impl StreamOptions {
    /// Enables or disables rewinding.
    #[must_use]
    pub fn with_rewindable(mut self, rewindable: bool) -> Self {
        self.rewindable = rewindable;
        self
    }

    /// Sets the in-memory retention threshold.
    #[must_use]
    pub fn with_spill_threshold(mut self, spill_threshold: usize) -> Self {
        self.spill_threshold = spill_threshold;
        self
    }

    /// Sets the maximum body size.
    #[must_use]
    pub fn with_max_size(mut self, max_size: Option<u64>) -> Self {
        self.max_size = max_size;
        self
    }
}

/// Seekable view over a response body that is fetched on demand.
pub struct ChunkedStream {
    metadata: ResponseMetadata,
    source: Option<Box<dyn ChunkSource>>,
    options: StreamOptions,
    position: u64,
    fetched: u64,
    eof: bool,
    closed: bool,
    retained: Option<SpillBuffer>,
    current: Option<Chunk>,
}

impl fmt::Debug for ChunkedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkedStream")
            .field("url", &self.metadata.url().as_str())
            .field("status", &self.metadata.status())
            .field("position", &self.position)
            .field("fetched", &self.fetched)
            .field("eof", &self.eof)
            .field("closed", &self.closed)
            .field("rewindable", &self.options.rewindable)
            .finish_non_exhaustive()
    }
}

impl ChunkedStream {
    /// Creates a stream over `source`, whose response head is `metadata`.
    #[must_use]
    pub fn new(
        metadata: ResponseMetadata,
        source: Box<dyn ChunkSource>,
        options: StreamOptions,
    ) -> Self {
        let retained = options
            .rewindable
            .then(|| SpillBuffer::new(options.spill_threshold));
        Self {
            metadata,
            source: Some(source),
            options,
            position: 0,
            fetched: 0,
            eof: false,
            closed: false,
            retained,
            current: None,
        }
    }

    /// Response head of the hop that produced this body.
    #[must_use]
    pub fn metadata(&self) -> &ResponseMetadata {
        &self.metadata
    }

    /// HTTP status code.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.metadata.status()
    }

    /// Declared character encoding.
    #[must_use]
    pub fn encoding(&self) -> Option<&str> {
        self.metadata.encoding()
    }

    /// Body size: the declared Content-Length, or the observed total once the
    /// body has been read to the end. `None` while unknown.
    #[must_use]
    pub fn size(&self) -> Option<u64> {
        self.metadata
            .content_length()
            .or_else(|| self.eof.then_some(self.fetched))
    }

    /// Current read position.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Total bytes pulled from the producer so far.
    #[must_use]
    pub fn bytes_fetched(&self) -> u64 {
        self.fetched
    }

    /// Whether earlier positions can be revisited.
    #[must_use]
    pub fn is_rewindable(&self) -> bool {
        self.options.rewindable
    }

    /// Whether the producer reported end of body.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.eof
    }

    /// Whether [`close`](Self::close) has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Reads up to `n` bytes; fewer only at end of body, empty at end of body.
    ///
    /// # Errors
    ///
    /// - [`FetchError::StreamClosed`] after [`close`](Self::close)
    /// - [`FetchError::TooLarge`] when the body crosses the maximum size
    /// - any transport or spill storage error; the stream is closed first
    pub async fn read(&mut self, n: usize) -> Result<Bytes, FetchError> {
        self.ensure_open()?;
        if n == 0 {
            return Ok(Bytes::new());
        }

        let first = self.read_some(n).await?;
        if first.len() == n || first.is_empty() {
            return Ok(first);
        }

        let mut out = BytesMut::with_capacity(n);
        out.extend_from_slice(&first);
        while out.len() < n {
            let piece = self.read_some(n - out.len()).await?;
            if piece.is_empty() {
                break;
            }
            out.extend_from_slice(&piece);
        }
        Ok(out.freeze())
    }

    /// Reads everything from the current position to the end of the body.
    ///
    /// # Errors
    ///
    /// Same as [`read`](Self::read).
    pub async fn read_to_end(&mut self) -> Result<Vec<u8>, FetchError> {
        self.ensure_open()?;
        let mut out = Vec::new();
        loop {
            let piece = self.read_some(usize::MAX).await?;
            if piece.is_empty() {
                return Ok(out);
            }
            out.extend_from_slice(&piece);
        }
    }

    /// Moves the read position to `pos`.
    ///
    /// Positions past the fetched data pull (and retain, when rewindable) the
    /// intervening chunks. Seeking past the end of the body leaves reads empty.
    ///
    /// # Errors
    ///
    /// - [`FetchError::StreamClosed`] after [`close`](Self::close)
    /// - [`FetchError::NotRewindable`] for a backwards seek without rewinding
    /// - errors from pulling intervening chunks
    pub async fn seek(&mut self, pos: u64) -> Result<u64, FetchError> {
        self.ensure_open()?;
        if pos < self.position && !self.options.rewindable {
            return Err(FetchError::NotRewindable {
                requested: pos,
                position: self.position,
            });
        }

        while self.fetched < pos {
            if !self.pull().await? {
                break;
            }
        }
        self.position = pos;
        Ok(pos)
    }

    /// Seeks back to the start of the body.
    ///
    /// # Errors
    ///
    /// Same as [`seek`](Self::seek).
    pub async fn rewind(&mut self) -> Result<(), FetchError> {
        self.seek(0).await.map(|_| ())
    }

    /// Releases the producer and any spilled storage. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.release_source();
        self.retained = None;
        self.current = None;
        debug!(
            url = %self.metadata.url(),
            position = self.position,
            fetched = self.fetched,
            complete = self.eof,
            "stream closed"
        );
    }

    fn ensure_open(&self) -> Result<(), FetchError> {
        if self.closed {
            Err(FetchError::StreamClosed)
        } else {
            Ok(())
        }
    }

    /// Serves up to `max` bytes from one fetched region, pulling when needed.
    async fn read_some(&mut self, max: usize) -> Result<Bytes, FetchError> {
        loop {
            if self.position < self.fetched {
                let piece = match self.retained.as_mut() {
                    Some(buffer) => match buffer.read_at(self.position, max).await {
                        Ok(piece) => piece,
                        Err(e) => return Err(self.fail(e)),
                    },
                    None => self
                        .current
                        .as_ref()
                        .map_or_else(Bytes::new, |chunk| chunk.slice_from(self.position, max)),
                };
                self.position += piece.len() as u64;
                return Ok(piece);
            }
            if !self.pull().await? {
                return Ok(Bytes::new());
            }
        }
    }

    /// Pulls one chunk. Returns false once the body is exhausted.
    async fn pull(&mut self) -> Result<bool, FetchError> {
        if self.eof {
            return Ok(false);
        }
        let Some(source) = self.source.as_mut() else {
            self.eof = true;
            return Ok(false);
        };

        match source.next_chunk().await {
            Ok(None) => {
                self.eof = true;
                self.release_source();
                debug!(url = %self.metadata.url(), bytes = self.fetched, "end of body");
                Ok(false)
            }
            Ok(Some(data)) => {
                let end = self.fetched + data.len() as u64;
                if let Some(limit) = self.options.max_size
                    && end > limit
                {
                    warn!(url = %self.metadata.url(), limit, observed = end, "body exceeds maximum size");
                    let error =
                        FetchError::too_large_observed(self.metadata.url().as_str(), limit, end);
                    return Err(self.fail(error));
                }

                if let Some(buffer) = self.retained.as_mut() {
                    if let Err(e) = buffer.append(&data).await {
                        return Err(self.fail(e));
                    }
                } else {
                    self.current = Some(Chunk::new(self.fetched, data));
                }
                self.fetched = end;
                Ok(true)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn release_source(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.release();
        }
    }

    fn fail(&mut self, error: FetchError) -> FetchError {
        debug!(url = %self.metadata.url(), error = %error, "closing stream after error");
        self.close();
        error
    }
}

impl Drop for ChunkedStream {
    fn drop(&mut self) {
        self.close();
    }
}
