//! Streaming HTTP(S) retrieval.
//!
//! Opens a URL, follows a bounded number of redirects and hands back the body
//! either as a lazily-read, optionally rewindable [`ChunkedStream`] or as a
//! whole file written through [`WholeFileDownloader`].
//!
//! # Features
//!
//! - Body bytes are pulled from the network only when the reader needs them
//! - Rewindable streams spill retained bytes to an anonymous temp file past 1 MiB
//! - Redirects resolve relative `Location`s and forward the last `Set-Cookie`
//! - Declared and observed body size limits
//! - Every failure maps to one [`ErrorKind`] carrying the response head when one exists
//!
//! # Example
//!
//! ```no_run
//! use lazyfetch::fetch::{FetchConfig, Fetcher};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let fetcher = Fetcher::new(FetchConfig::default())?;
//! let outcome = fetcher
//!     .download("https://example.com/paper.pdf", Some(Path::new("paper.pdf")))
//!     .await?;
//! println!("saved {} bytes", outcome.bytes_written());
//! # Ok(())
//! # }
//! ```

mod buffer;
mod classify;
mod config;
pub mod constants;
mod download;
mod driver;
mod error;
mod fetcher;
pub mod filename;
mod metadata;
mod options;
mod redirect;
mod source;
mod stream;
mod url_check;

pub use classify::{classify_status, classify_transport};
pub use config::{ConfigError, FetchConfig};
pub use download::{CompletedDownload, DownloadOutcome, SavedDownload, WholeFileDownloader};
pub use driver::RequestDriver;
pub use error::{ErrorKind, FetchError, TransferPhase};
pub use fetcher::Fetcher;
pub use filename::{suggested_filename, unique_path_in};
pub use metadata::{ResponseMetadata, canonical_header_name};
pub use options::{ProxySettings, RequestSpec, TlsConfig};
pub use redirect::{RedirectContext, RedirectDecision, RedirectPolicy, resolve_location};
pub use source::{Chunk, ChunkSource, HttpChunkSource};
pub use stream::{ChunkedStream, StreamOptions};
pub use url_check::{is_fetchable_scheme, normalize_url, validate_target};
