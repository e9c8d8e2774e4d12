//! Error types for the fetch module.
//!
//! Every failure surfaced by the crate is a [`FetchError`]. Transport and
//! protocol failures map onto the closed [`ErrorKind`] taxonomy; local stream
//! conditions (closed stream, illegal seek, file IO) have their own variants
//! and no kind.

use std::fmt;

use thiserror::Error;

use super::metadata::ResponseMetadata;

/// Closed taxonomy of transfer failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed URL, non-http(s) scheme, unresolvable redirect target.
    InvalidUrl,
    /// Declared or observed body size exceeds the configured maximum.
    TooLarge,
    /// Redirect hop budget exhausted.
    TooManyRedirects,
    /// Connect or read phase exceeded its configured duration.
    TimeoutError,
    /// Socket reset, DNS failure, unexpected EOF.
    ConnectionError,
    /// TLS handshake or certificate validation failure.
    SslError,
    /// Terminal response status 400-499.
    ClientError,
    /// Terminal response status 500-599.
    ServerError,
    /// Any other non-success terminal response, or an invalid redirect response.
    ResponseError,
}

impl ErrorKind {
    /// Returns the stable label for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidUrl => "InvalidUrl",
            Self::TooLarge => "TooLarge",
            Self::TooManyRedirects => "TooManyRedirects",
            Self::TimeoutError => "TimeoutError",
            Self::ConnectionError => "ConnectionError",
            Self::SslError => "SSLError",
            Self::ClientError => "ClientError",
            Self::ServerError => "ServerError",
            Self::ResponseError => "ResponseError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase of an exchange a timeout belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    /// Establishing the TCP/TLS connection.
    Connect,
    /// Waiting for the response head or a body chunk.
    Read,
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => f.write_str("connection"),
            Self::Read => f.write_str("read"),
        }
    }
}

/// Errors that can occur while opening, streaming or downloading a resource.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The URL is malformed or uses a scheme other than http/https.
    #[error("invalid URL: {url} ({reason})")]
    InvalidUrl {
        /// The offending URL text.
        url: String,
        /// Why the URL was rejected.
        reason: String,
    },

    /// The body is larger than the configured maximum.
    #[error("response from {url} exceeds maximum size of {limit} bytes (saw {observed} bytes)")]
    TooLarge {
        /// URL of the response.
        url: String,
        /// Configured maximum in bytes.
        limit: u64,
        /// Declared length, or bytes received when the limit was crossed.
        observed: u64,
        /// Whether `observed` came from the Content-Length header.
        declared: bool,
        /// The triggering response, when the check happened before streaming.
        response: Option<Box<ResponseMetadata>>,
    },

    /// The redirect budget was exhausted while the server kept redirecting.
    #[error("too many redirects fetching {url} (limit {limit})")]
    TooManyRedirects {
        /// URL of the original request.
        url: String,
        /// Configured hop budget.
        limit: u32,
        /// The redirect response that could not be followed.
        response: Box<ResponseMetadata>,
    },

    /// Connect or read phase timed out.
    #[error("{phase} timeout fetching {url}")]
    Timeout {
        /// The URL being fetched.
        url: String,
        /// Which budget expired.
        phase: TransferPhase,
    },

    /// Socket reset, DNS failure, refused connection or truncated body.
    #[error("connection error fetching {url}: {source}")]
    Connection {
        /// The URL being fetched.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// TLS handshake, certificate validation or trust anchor failure.
    #[error("SSL error fetching {url}: {message}")]
    Ssl {
        /// The URL being fetched.
        url: String,
        /// Short description of the failure.
        message: String,
        /// The underlying transport error, when there is one.
        #[source]
        source: Option<reqwest::Error>,
    },

    /// Terminal response with a 4xx status.
    #[error("HTTP {} {} fetching {}", .response.status(), .response.reason(), .response.url())]
    Client {
        /// The response that triggered the error.
        response: Box<ResponseMetadata>,
    },

    /// Terminal response with a 5xx status.
    #[error("HTTP {} {} fetching {}", .response.status(), .response.reason(), .response.url())]
    Server {
        /// The response that triggered the error.
        response: Box<ResponseMetadata>,
    },

    /// Terminal response that is neither a success nor a 4xx/5xx.
    #[error("unexpected HTTP {} {} fetching {}", .response.status(), .response.reason(), .response.url())]
    Response {
        /// The response that triggered the error.
        response: Box<ResponseMetadata>,
    },

    /// A redirect whose Location cannot be followed.
    #[error("invalid redirect from {} to {location}", .response.url())]
    InvalidRedirect {
        /// Raw Location header value.
        location: String,
        /// The redirect response.
        response: Box<ResponseMetadata>,
        /// Why the target was rejected (an `InvalidUrl` error).
        #[source]
        source: Box<FetchError>,
    },

    /// Read or seek on a stream that has been closed.
    #[error("stream is closed")]
    StreamClosed,

    /// Backwards seek on a stream created without rewinding support.
    #[error("cannot seek back to {requested}: stream is not rewindable (position {position})")]
    NotRewindable {
        /// Requested position.
        requested: u64,
        /// Current read position.
        position: u64,
    },

    /// File system error on spill storage, temporary file or destination.
    #[error("IO error on {target}: {source}")]
    Io {
        /// What was being accessed.
        target: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Transport error that none of the classifications apply to.
    #[error("transport error fetching {url}: {source}")]
    Transport {
        /// The URL being fetched.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a size error from a declared Content-Length, before any body byte.
    pub fn too_large_declared(limit: u64, response: ResponseMetadata) -> Self {
        Self::TooLarge {
            url: response.url().to_string(),
            limit,
            observed: response.content_length().unwrap_or(0),
            declared: true,
            response: Some(Box::new(response)),
        }
    }

    /// Creates a size error for a body that crossed the limit while streaming.
    pub fn too_large_observed(url: impl Into<String>, limit: u64, observed: u64) -> Self {
        Self::TooLarge {
            url: url.into(),
            limit,
            observed,
            declared: false,
            response: None,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>, phase: TransferPhase) -> Self {
        Self::Timeout {
            url: url.into(),
            phase,
        }
    }

    /// Creates an IO error.
    pub fn io(target: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            target: target.into(),
            source,
        }
    }

    /// Returns the taxonomy kind, or `None` for local stream/file conditions
    /// and unclassified transport errors.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::InvalidUrl { .. } => Some(ErrorKind::InvalidUrl),
            Self::TooLarge { .. } => Some(ErrorKind::TooLarge),
            Self::TooManyRedirects { .. } => Some(ErrorKind::TooManyRedirects),
            Self::Timeout { .. } => Some(ErrorKind::TimeoutError),
            Self::Connection { .. } => Some(ErrorKind::ConnectionError),
            Self::Ssl { .. } => Some(ErrorKind::SslError),
            Self::Client { .. } => Some(ErrorKind::ClientError),
            Self::Server { .. } => Some(ErrorKind::ServerError),
            Self::Response { .. } | Self::InvalidRedirect { .. } => {
                Some(ErrorKind::ResponseError)
            }
            Self::StreamClosed
            | Self::NotRewindable { .. }
            | Self::Io { .. }
            | Self::Transport { .. } => None,
        }
    }

    /// Returns the response that triggered this error, if any.
    #[must_use]
    pub fn response(&self) -> Option<&ResponseMetadata> {
        match self {
            Self::TooManyRedirects { response, .. }
            | Self::Client { response }
            | Self::Server { response }
            | Self::Response { response }
            | Self::InvalidRedirect { response, .. } => Some(&**response),
            Self::TooLarge { response, .. } => response.as_deref(),
            _ => None,
        }
    }

    /// Returns the HTTP status of the triggering response, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        self.response().map(ResponseMetadata::status)
    }
}
