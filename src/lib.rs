//! lazyfetch
//!
//! Streaming HTTP(S) transfer engine: lazily-read, rewindable response bodies
//! and whole-file downloads with bounded redirects, size limits and a single
//! error taxonomy.
//!
//! - [`fetch`] - request driver, redirect policy, chunked streams and downloads

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod fetch;
#[cfg(test)]
pub(crate) mod test_support;
mod user_agent;

pub use fetch::{
    ChunkedStream, DownloadOutcome, ErrorKind, FetchConfig, FetchError, Fetcher, RequestSpec,
    StreamOptions,
};
