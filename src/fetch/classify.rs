//! Mapping of terminal statuses and transport failures onto [`FetchError`].
//!
//! # HTTP Status Classification
//!
//! | Status | Kind |
//! |--------|------|
//! | 400-499 | `ClientError` |
//! | 500-599 | `ServerError` |
//! | anything else reaching this layer (1xx, 3xx without Location, ...) | `ResponseError` |
//!
//! # Transport Classification
//!
//! | Failure | Kind |
//! |---------|------|
//! | timeout while connecting | `TimeoutError` (connection) |
//! | timeout waiting for head or body | `TimeoutError` (read) |
//! | TLS handshake, certificate or record failure | `SSLError` |
//! | refused, reset, DNS, truncated body | `ConnectionError` |
//! | anything else | surfaced unchanged as `Transport` |

use std::error::Error as StdError;

use tracing::debug;

use super::error::{FetchError, TransferPhase};
use super::metadata::ResponseMetadata;

/// Classifies a terminal non-success response.
#[must_use]
pub fn classify_status(response: ResponseMetadata) -> FetchError {
    let response = Box::new(response);
    match response.status() {
        400..=499 => FetchError::Client { response },
        500..=599 => FetchError::Server { response },
        _ => FetchError::Response { response },
    }
}

/// Classifies a transport error raised during `phase` of fetching `url`.
#[must_use]
pub fn classify_transport(url: &str, error: reqwest::Error, phase: TransferPhase) -> FetchError {
    if error.is_timeout() {
        let phase = if error.is_connect() {
            TransferPhase::Connect
        } else {
            phase
        };
        return FetchError::timeout(url, phase);
    }

    if is_tls_error(&error) || (error.is_connect() && has_invalid_data(&error)) {
        return FetchError::Ssl {
            url: url.to_string(),
            message: innermost_message(&error),
            source: Some(error),
        };
    }

    if error.is_connect() || error.is_request() || error.is_body() || error.is_decode() {
        return FetchError::Connection {
            url: url.to_string(),
            source: error,
        };
    }

    debug!(url, error = %error, "unclassified transport error");
    FetchError::Transport {
        url: url.to_string(),
        source: error,
    }
}

/// Message fragments of TLS failures as worded by native-tls and rustls.
const TLS_MARKERS: &[&str] = &[
    "certificate",
    "tls",
    "ssl",
    "handshake",
    "corrupt message",
    "alert",
    "peer misbehaved",
    "peer is incompatible",
];

/// Returns true if any error in the chain looks like a TLS failure.
///
/// reqwest does not expose a TLS predicate, so the chain's messages are inspected.
pub(crate) fn is_tls_error(error: &(dyn StdError + 'static)) -> bool {
    chain(error).any(|err| {
        let message = err.to_string().to_lowercase();
        TLS_MARKERS.iter().any(|marker| message.contains(marker))
    })
}

/// Returns true if the chain carries an `InvalidData` I/O error.
///
/// The TLS stream adapters report every rustls failure this way, so while
/// connecting it marks a failed handshake.
fn has_invalid_data(error: &(dyn StdError + 'static)) -> bool {
    chain(error).any(|err| {
        err.downcast_ref::<std::io::Error>()
            .is_some_and(|io| io.kind() == std::io::ErrorKind::InvalidData)
    })
}

fn chain<'a>(
    error: &'a (dyn StdError + 'static),
) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    std::iter::successors(Some(error), |err: &&'a (dyn StdError + 'static)| (*err).source())
}

fn innermost_message(error: &(dyn StdError + 'static)) -> String {
    let mut current = error;
    while let Some(next) = current.source() {
        current = next;
    }
    current.to_string()
}
