//! Whole-file retrieval into a temporary file or a final destination.
//!
//! The body is spooled into a named temporary file created next to the
//! destination, so saving is a same-filesystem rename. If anything fails the
//! temporary file is dropped, which removes it, and nothing appears at the
//! destination.

use std::fs::File as StdFile;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};

use super::driver::RequestDriver;
use super::error::FetchError;
use super::filename::{suggested_filename, unique_path_in};
use super::metadata::ResponseMetadata;
use super::options::RequestSpec;
use super::source::{ChunkSource, HttpChunkSource};

const TEMP_PREFIX: &str = ".lazyfetch-";
const TEMP_SUFFIX: &str = ".part";

/// Body fully written to a temporary file that the caller now owns.
///
/// The file is deleted when this value is dropped unless it is kept via
/// [`into_file`](Self::into_file).
#[derive(Debug)]
pub struct CompletedDownload {
    file: NamedTempFile,
    metadata: ResponseMetadata,
    bytes_written: u64,
}

impl CompletedDownload {
    /// Location of the temporary file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    #[must_use]
    pub fn metadata(&self) -> &ResponseMetadata {
        &self.metadata
    }

    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Hands over the temporary file handle.
    #[must_use]
    pub fn into_file(self) -> NamedTempFile {
        self.file
    }
}

/// Body saved at its final destination.
#[derive(Debug, Clone)]
pub struct SavedDownload {
    path: PathBuf,
    metadata: ResponseMetadata,
    bytes_written: u64,
}

impl SavedDownload {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn metadata(&self) -> &ResponseMetadata {
        &self.metadata
    }

    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

/// Result of [`WholeFileDownloader::download`].
#[derive(Debug)]
pub enum DownloadOutcome {
    /// No destination was given.
    Temporary(CompletedDownload),
    /// The body was moved to the requested destination.
    Saved(SavedDownload),
}

impl DownloadOutcome {
    /// Where the body lives now.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Temporary(download) => download.path(),
            Self::Saved(download) => download.path(),
        }
    }

    #[must_use]
    pub fn metadata(&self) -> &ResponseMetadata {
        match self {
            Self::Temporary(download) => download.metadata(),
            Self::Saved(download) => download.metadata(),
        }
    }

    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        match self {
            Self::Temporary(download) => download.bytes_written(),
            Self::Saved(download) => download.bytes_written(),
        }
    }
}

/// Retrieves an entire body in one call.
#[derive(Debug, Clone, Copy, Default)]
pub struct WholeFileDownloader {
    driver: RequestDriver,
}

impl WholeFileDownloader {
    #[must_use]
    pub fn new(driver: RequestDriver) -> Self {
        Self { driver }
    }

    /// Downloads `spec`, saving to `destination` when given.
    ///
    /// # Errors
    ///
    /// Any [`FetchError`] from opening or reading the body, including
    /// [`FetchError::TooLarge`] once more than `spec.max_size()` bytes arrive,
    /// and [`FetchError::Io`] when the temporary file cannot be written or moved.
    #[instrument(skip(self, spec), fields(url = %spec.url()))]
    pub async fn download(
        &self,
        spec: &RequestSpec,
        destination: Option<&Path>,
    ) -> Result<DownloadOutcome, FetchError> {
        let (metadata, file, bytes_written) =
            self.fetch_to_temp(spec, destination.map(parent_dir)).await?;

        let Some(destination) = destination else {
            info!(
                url = %metadata.url(),
                bytes = bytes_written,
                path = %file.path().display(),
                "download complete"
            );
            return Ok(DownloadOutcome::Temporary(CompletedDownload {
                file,
                metadata,
                bytes_written,
            }));
        };

        persist(file, destination, metadata, bytes_written).map(DownloadOutcome::Saved)
    }

    /// Downloads `spec` into `dir` under a name inferred from the response.
    ///
    /// Existing files are never overwritten; a numeric suffix is added instead.
    ///
    /// # Errors
    ///
    /// Same as [`download`](Self::download).
    #[instrument(skip(self, spec, dir), fields(url = %spec.url(), dir = %dir.display()))]
    pub async fn download_to_dir(
        &self,
        spec: &RequestSpec,
        dir: &Path,
    ) -> Result<SavedDownload, FetchError> {
        let (metadata, file, bytes_written) =
            self.fetch_to_temp(spec, Some(dir.to_path_buf())).await?;
        let destination = unique_path_in(dir, &suggested_filename(&metadata));
        persist(file, &destination, metadata, bytes_written)
    }

    /// Opens `spec` and spools the whole body into a temp file in `temp_dir`.
    async fn fetch_to_temp(
        &self,
        spec: &RequestSpec,
        temp_dir: Option<PathBuf>,
    ) -> Result<(ResponseMetadata, NamedTempFile, u64), FetchError> {
        let (metadata, mut body) = self.driver.open(spec).await?;

        let file = match create_temp_file(temp_dir).await {
            Ok(file) => file,
            Err(e) => {
                body.release();
                return Err(e);
            }
        };
        debug!(temp = %file.path().display(), "spooling body");

        let url = metadata.url().to_string();
        match spool(&file, &mut body, &url, spec.max_size()).await {
            Ok(bytes_written) => Ok((metadata, file, bytes_written)),
            Err(e) => {
                body.release();
                debug!(temp = %file.path().display(), error = %e, "discarding partial download");
                Err(e)
            }
        }
    }
}

fn persist(
    file: NamedTempFile,
    destination: &Path,
    metadata: ResponseMetadata,
    bytes_written: u64,
) -> Result<SavedDownload, FetchError> {
    file.persist(destination)
        .map_err(|e| FetchError::io(destination.display().to_string(), e.error))?;
    info!(
        url = %metadata.url(),
        bytes = bytes_written,
        path = %destination.display(),
        "download saved"
    );
    Ok(SavedDownload {
        path: destination.to_path_buf(),
        metadata,
        bytes_written,
    })
}

fn parent_dir(destination: &Path) -> PathBuf {
    match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

async fn create_temp_file(dir: Option<PathBuf>) -> Result<NamedTempFile, FetchError> {
    let target = dir
        .as_ref()
        .map_or_else(|| "temporary directory".to_string(), |d| d.display().to_string());
    let created = tokio::task::spawn_blocking(move || {
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_PREFIX).suffix(TEMP_SUFFIX);
        match dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
    })
    .await
    .map_err(|e| FetchError::io(target.clone(), std::io::Error::other(e)))?;
    created.map_err(|e| FetchError::io(target, e))
}

/// Writes the body into `file`, returning the byte count.
async fn spool(
    file: &NamedTempFile,
    body: &mut HttpChunkSource,
    url: &str,
    max_size: Option<u64>,
) -> Result<u64, FetchError> {
    let path = file.path().display().to_string();
    let handle: StdFile = file
        .as_file()
        .try_clone()
        .map_err(|e| FetchError::io(path.clone(), e))?;
    let mut writer = BufWriter::new(File::from_std(handle));
    let mut bytes_written: u64 = 0;

    while let Some(chunk) = body.next_chunk().await? {
        bytes_written += chunk.len() as u64;
        if let Some(limit) = max_size
            && bytes_written > limit
        {
            return Err(FetchError::too_large_observed(url, limit, bytes_written));
        }
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| FetchError::io(path.clone(), e))?;
    }

    writer
        .flush()
        .await
        .map_err(|e| FetchError::io(path.clone(), e))?;
    let mut handle = writer.into_inner();
    handle
        .sync_all()
        .await
        .map_err(|e| FetchError::io(path.clone(), e))?;
    // The cloned handle shares its offset with the temp file.
    handle
        .seek(SeekFrom::Start(0))
        .await
        .map_err(|e| FetchError::io(path, e))?;
    Ok(bytes_written)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::fetch::ErrorKind;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use tempfile::TempDir;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    fn spec_for(url: &str) -> RequestSpec {
        RequestSpec::new(Url::parse(url).unwrap()).with_read_timeout(Duration::from_secs(5))
    }

    fn leftover_parts(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(TEMP_PREFIX))
            })
            .collect()
    }

    #[test]
    fn test_parent_dir_of_bare_filename_is_current_dir() {
        assert_eq!(parent_dir(Path::new("file.bin")), PathBuf::from("."));
        assert_eq!(parent_dir(Path::new("/tmp/x/file.bin")), PathBuf::from("/tmp/x"));
    }

    #[tokio::test]
    async fn test_download_to_destination_leaves_no_temp_file() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/data.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"line one\nline two\n".to_vec()))
            .mount(&mock_server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("data.txt");
        let outcome = WholeFileDownloader::default()
            .download(
                &spec_for(&format!("{}/data.txt", mock_server.uri())),
                Some(&destination),
            )
            .await
            .unwrap();

        assert!(matches!(outcome, DownloadOutcome::Saved(_)));
        assert_eq!(outcome.bytes_written(), 18);
        assert_eq!(std::fs::read(&destination).unwrap(), b"line one\nline two\n");
        assert!(leftover_parts(temp_dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_download_without_destination_keeps_temp_until_dropped() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/blob"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![9u8; 2048]))
            .mount(&mock_server)
            .await;

        let outcome = WholeFileDownloader::default()
            .download(&spec_for(&format!("{}/blob", mock_server.uri())), None)
            .await
            .unwrap();

        let DownloadOutcome::Temporary(download) = outcome else {
            panic!("expected a temporary download");
        };
        let path = download.path().to_path_buf();
        assert_eq!(std::fs::read(&path).unwrap(), vec![9u8; 2048]);
        assert_eq!(download.metadata().status(), 200);

        drop(download);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_temporary_download_reads_from_start_through_handle() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/notes.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"first\nsecond\n".to_vec()))
            .mount(&mock_server)
            .await;

        let outcome = WholeFileDownloader::default()
            .download(&spec_for(&format!("{}/notes.txt", mock_server.uri())), None)
            .await
            .unwrap();
        let DownloadOutcome::Temporary(download) = outcome else {
            panic!("expected a temporary download");
        };

        let mut file = download.into_file();
        let mut contents = Vec::new();
        std::io::Read::read_to_end(file.as_file_mut(), &mut contents).unwrap();
        assert_eq!(contents, b"first\nsecond\n");
    }

    #[tokio::test]
    async fn test_download_to_dir_uses_inferred_name_without_overwriting() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/export"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Content-Disposition", r#"attachment; filename="report.csv""#)
                    .set_body_bytes(b"a,b\n1,2\n".to_vec()),
            )
            .mount(&mock_server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("report.csv"), b"old").unwrap();

        let saved = WholeFileDownloader::default()
            .download_to_dir(
                &spec_for(&format!("{}/export", mock_server.uri())),
                temp_dir.path(),
            )
            .await
            .unwrap();

        assert_eq!(saved.path(), temp_dir.path().join("report_1.csv"));
        assert_eq!(std::fs::read(saved.path()).unwrap(), b"a,b\n1,2\n");
        assert_eq!(std::fs::read(temp_dir.path().join("report.csv")).unwrap(), b"old");
        assert!(leftover_parts(temp_dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_download_error_status_creates_nothing() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("out.bin");
        let error = WholeFileDownloader::default()
            .download(
                &spec_for(&format!("{}/fail", mock_server.uri())),
                Some(&destination),
            )
            .await
            .unwrap_err();

        assert_eq!(error.kind(), Some(ErrorKind::ServerError));
        assert!(!destination.exists());
        assert!(leftover_parts(temp_dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_download_into_missing_directory_is_io_error() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"x".to_vec()))
            .mount(&mock_server)
            .await;

        let temp_dir = TempDir::new().unwrap();
        let destination = temp_dir.path().join("missing").join("out.bin");
        let error = WholeFileDownloader::default()
            .download(
                &spec_for(&format!("{}/x", mock_server.uri())),
                Some(&destination),
            )
            .await
            .unwrap_err();

        assert!(matches!(error, FetchError::Io { .. }), "got: {error:?}");
        assert_eq!(error.kind(), None);
    }
}
