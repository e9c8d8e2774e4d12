//! Process-wide retrieval defaults.

use std::time::Duration;

use reqwest::header::HeaderMap;

use super::constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_MAX_REDIRECTS, DEFAULT_SPILL_THRESHOLD, MAX_TIMEOUT_SECS,
    READ_TIMEOUT_SECS,
};
use super::error::FetchError;
use super::options::{ProxySettings, RequestSpec, TlsConfig};
use super::stream::StreamOptions;
use super::url_check::normalize_url;

/// Error type for rejected configuration values.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A timeout of zero would fail every request immediately.
    #[error("{name} timeout must be greater than zero")]
    ZeroTimeout {
        /// Which timeout ("connect" or "read").
        name: &'static str,
    },

    /// Timeout above the supported ceiling.
    #[error("{name} timeout of {secs}s exceeds the maximum of {MAX_TIMEOUT_SECS}s")]
    TimeoutTooLong {
        /// Which timeout ("connect" or "read").
        name: &'static str,
        /// Requested value in seconds.
        secs: u64,
    },

    #[error("spill threshold must be greater than zero")]
    ZeroSpillThreshold,
}

/// Defaults applied to every request opened through a [`Fetcher`](super::Fetcher).
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Headers sent on every hop.
    pub headers: HeaderMap,
    pub connect_timeout: Duration,
    /// Maximum silence while waiting for the head or the next body chunk.
    pub read_timeout: Duration,
    pub max_redirects: u32,
    /// Body size ceiling in bytes; `None` means unlimited.
    pub max_size: Option<u64>,
    pub tls: TlsConfig,
    /// Explicit proxy. When unset, the usual proxy environment variables apply.
    pub proxy: Option<ProxySettings>,
    /// Whether opened streams retain bytes for rewinding.
    pub rewindable: bool,
    /// In-memory retention before a rewindable stream spills to disk.
    pub spill_threshold: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            headers: HeaderMap::new(),
            connect_timeout: Duration::from_secs(CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(READ_TIMEOUT_SECS),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            max_size: None,
            tls: TlsConfig::default(),
            proxy: None,
            rewindable: true,
            spill_threshold: DEFAULT_SPILL_THRESHOLD,
        }
    }
}

impl FetchConfig {
    /// Checks that the configuration can be used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for zero or over-long timeouts and a zero
    /// spill threshold.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_timeout("connect", self.connect_timeout)?;
        check_timeout("read", self.read_timeout)?;
        if self.spill_threshold == 0 {
            return Err(ConfigError::ZeroSpillThreshold);
        }
        Ok(())
    }

    /// Builds a [`RequestSpec`] for `url` seeded from these defaults.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidUrl`] when `url` is not a usable http(s) URL.
    pub fn request(&self, url: &str) -> Result<RequestSpec, FetchError> {
        let url = normalize_url(url)?;
        Ok(RequestSpec::new(url)
            .with_headers(&self.headers)
            .with_proxy(self.proxy.clone())
            .with_tls(self.tls.clone())
            .with_connect_timeout(self.connect_timeout)
            .with_read_timeout(self.read_timeout)
            .with_max_redirects(self.max_redirects)
            .with_max_size(self.max_size))
    }

    #[must_use]
    pub fn stream_options(&self) -> StreamOptions {
        StreamOptions::default()
            .with_rewindable(self.rewindable)
            .with_spill_threshold(self.spill_threshold)
            .with_max_size(self.max_size)
    }
}

fn check_timeout(name: &'static str, timeout: Duration) -> Result<(), ConfigError> {
    if timeout.is_zero() {
        return Err(ConfigError::ZeroTimeout { name });
    }
    if timeout > Duration::from_secs(MAX_TIMEOUT_SECS) {
        return Err(ConfigError::TimeoutTooLong {
            name,
            secs: timeout.as_secs(),
        });
    }
    Ok(())
}
