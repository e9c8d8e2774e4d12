//! Convenience entry point bundling configuration, driver and downloader.

use std::path::Path;

use tracing::instrument;

use super::config::{ConfigError, FetchConfig};
use super::download::{DownloadOutcome, SavedDownload, WholeFileDownloader};
use super::driver::RequestDriver;
use super::error::FetchError;
use super::options::RequestSpec;
use super::stream::ChunkedStream;

/// Opens streams and downloads using one validated [`FetchConfig`].
///
/// Cheap to clone; holds no connections between calls.
#[derive(Debug, Clone)]
pub struct Fetcher {
    config: FetchConfig,
    driver: RequestDriver,
    downloader: WholeFileDownloader,
}

impl Fetcher {
    /// Validates `config` and builds a fetcher around it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration is rejected by
    /// [`FetchConfig::validate`].
    pub fn new(config: FetchConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let driver = RequestDriver::new();
        Ok(Self {
            config,
            driver,
            downloader: WholeFileDownloader::new(driver),
        })
    }

    #[must_use]
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Opens `url` as a lazily-read [`ChunkedStream`].
    ///
    /// # Errors
    ///
    /// Any [`FetchError`] raised before the first body byte: invalid URL,
    /// transport failure, redirect failure, non-success status or declared
    /// size above the limit.
    pub async fn open(&self, url: &str) -> Result<ChunkedStream, FetchError> {
        let spec = self.config.request(url)?;
        self.open_spec(&spec).await
    }

    /// Opens a prepared request as a [`ChunkedStream`].
    ///
    /// The stream enforces `spec.max_size()` rather than the configured default.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open).
    #[instrument(skip(self, spec), fields(url = %spec.url()))]
    pub async fn open_spec(&self, spec: &RequestSpec) -> Result<ChunkedStream, FetchError> {
        let (metadata, body) = self.driver.open(spec).await?;
        let options = self.config.stream_options().with_max_size(spec.max_size());
        Ok(ChunkedStream::new(metadata, Box::new(body), options))
    }

    /// Downloads `url` in full, saving it to `destination` when given.
    ///
    /// # Errors
    ///
    /// See [`WholeFileDownloader::download`].
    pub async fn download(
        &self,
        url: &str,
        destination: Option<&Path>,
    ) -> Result<DownloadOutcome, FetchError> {
        let spec = self.config.request(url)?;
        self.download_spec(&spec, destination).await
    }

    /// Downloads a prepared request in full.
    ///
    /// # Errors
    ///
    /// See [`WholeFileDownloader::download`].
    pub async fn download_spec(
        &self,
        spec: &RequestSpec,
        destination: Option<&Path>,
    ) -> Result<DownloadOutcome, FetchError> {
        self.downloader.download(spec, destination).await
    }

    /// Downloads `url` into `dir` under a name inferred from the response.
    ///
    /// # Errors
    ///
    /// See [`WholeFileDownloader::download_to_dir`].
    pub async fn download_to_dir(&self, url: &str, dir: &Path) -> Result<SavedDownload, FetchError> {
        let spec = self.config.request(url)?;
        self.downloader.download_to_dir(&spec, dir).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::fetch::ErrorKind;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = FetchConfig {
            connect_timeout: Duration::ZERO,
            ..FetchConfig::default()
        };
        assert!(Fetcher::new(config).is_err());
    }

    #[test]
    fn test_open_invalid_url_fails_before_network() {
        let fetcher = Fetcher::new(FetchConfig::default()).unwrap();
        let result = tokio_test::block_on(fetcher.open("ftp://example.com/file.txt"));
        assert_eq!(result.unwrap_err().kind(), Some(ErrorKind::InvalidUrl));
    }

    #[tokio::test]
    async fn test_open_applies_configured_stream_options() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/text"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"abcdef".to_vec()))
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new(FetchConfig {
            rewindable: false,
            ..FetchConfig::default()
        })
        .unwrap();
        let mut stream = fetcher
            .open(&format!("{}/text", mock_server.uri()))
            .await
            .unwrap();

        assert!(!stream.is_rewindable());
        assert_eq!(stream.read(3).await.unwrap().as_ref(), b"abc");
        assert!(stream.rewind().await.is_err());
        stream.close();
    }
}
