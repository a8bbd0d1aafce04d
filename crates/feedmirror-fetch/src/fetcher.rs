use std::path::{Path, PathBuf};

use feedmirror_fs::StagedFile;
use futures_util::TryStreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

use crate::data::{FetchPhase, Progress, ProgressCallback};
use crate::transport::Transport;
use crate::{FetchError, Result};

/// Outcome of a successful fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub path:  PathBuf,
    pub bytes: u64,
}

/// File name a URL is stored under: its last non-empty path segment.
///
/// ```
/// use feedmirror_fetch::file_name_for;
/// use url::Url;
///
/// let url = Url::parse("https://nvd.nist.gov/feeds/json/cve/1.1/nvdcve-1.1-2020.meta").unwrap();
/// assert_eq!(file_name_for(&url).unwrap(), "nvdcve-1.1-2020.meta");
/// ```
pub fn file_name_for(url: &Url) -> Result<String> {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| FetchError::NoFileName(url.to_string()))
}

/// Streams URLs into an output directory.
pub struct Fetcher<T: Transport> {
    transport:   T,
    on_progress: Option<ProgressCallback>,
}

impl<T: Transport> Fetcher<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            on_progress: None,
        }
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub fn transport(&self) -> &T { &self.transport }

    /// Fetch `url` into `output_dir`, replacing any file of the same name.
    ///
    /// Bytes land in a staging file first; on any transport or I/O error the
    /// staging file is discarded and the previous copy stays untouched.
    pub async fn fetch(&self, url: &Url, output_dir: &Path) -> Result<FetchResult> {
        let result = self.stream_into(url, output_dir).await;
        if result.is_err() {
            self.notify(url, FetchPhase::Failed, 0, None);
        }
        result
    }

    async fn stream_into(&self, url: &Url, output_dir: &Path) -> Result<FetchResult> {
        let name = file_name_for(url)?;
        let destination = output_dir.join(&name);

        info!(url = %url, "downloading");
        self.notify(url, FetchPhase::Connecting, 0, None);

        let response = self.transport.open(url).await.map_err(|e| transport_error(url, e))?;
        let total_bytes = response.content_length;
        let mut body = response.body;

        let staged = StagedFile::new(&destination)?;
        let mut file = tokio::fs::File::create(staged.path())
            .await
            .map_err(|source| write_error(staged.path(), source))?;

        let mut bytes = 0u64;
        while let Some(chunk) = body.try_next().await.map_err(|e| transport_error(url, e))? {
            file.write_all(&chunk)
                .await
                .map_err(|source| write_error(staged.path(), source))?;
            bytes += chunk.len() as u64;
            self.notify(url, FetchPhase::Downloading, bytes, total_bytes);
        }

        file.sync_all()
            .await
            .map_err(|source| write_error(staged.path(), source))?;
        drop(file);

        self.notify(url, FetchPhase::Committing, bytes, total_bytes);
        let path = staged.commit()?;
        self.notify(url, FetchPhase::Completed, bytes, total_bytes);

        debug!(path = %path.display(), bytes, "stored");
        info!(file = %name, "download succeeded");
        Ok(FetchResult { path, bytes })
    }

    fn notify(&self, url: &Url, phase: FetchPhase, bytes_downloaded: u64, total_bytes: Option<u64>) {
        if let Some(callback) = &self.on_progress {
            callback(&Progress {
                url: url.to_string(),
                phase,
                bytes_downloaded,
                total_bytes,
            });
        }
    }
}

fn transport_error<E: std::error::Error>(url: &Url, e: E) -> FetchError {
    FetchError::Transport {
        url:     url.to_string(),
        message: e.to_string(),
    }
}

fn write_error(path: &Path, source: std::io::Error) -> FetchError {
    FetchError::Write {
        path: path.to_path_buf(),
        source,
    }
}
