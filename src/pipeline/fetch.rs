//! Archive fetching: download one revision's e-print into the working root.
//!
//! arXiv serves every submission's source at
//! `https://arxiv.org/e-print/{identifier}v{revision}`. The payload is opaque
//! here: usually a gzipped tarball, sometimes a single gzipped `.tex`, and
//! occasionally a bare file. [`crate::pipeline::extract`] decides what it is.
//!
//! The network side sits behind [`ArchiveSource`] so callers (and tests) can
//! substitute a mirror, a cache, or canned bytes without touching the rest of
//! the pipeline.

use crate::config::DiffConfig;
use crate::error::ArxivDiffError;
use crate::pipeline::workspace::Workspace;
use async_trait::async_trait;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Name of the raw payload inside a revision directory before extraction.
pub const DOWNLOAD_FILE_NAME: &str = ".e-print";

/// Where e-print payloads come from.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// Write the raw payload of `identifier` at `revision` to `dest`.
    ///
    /// Returns the number of bytes written. Implementations make a single
    /// attempt; the pipeline does not retry.
    async fn fetch(
        &self,
        identifier: &str,
        revision: &str,
        dest: &Path,
    ) -> Result<u64, ArxivDiffError>;
}

/// Downloads e-prints over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpArchiveSource {
    client: reqwest::Client,
    base_url: String,
    timeout_secs: u64,
}

impl HttpArchiveSource {
    /// Build a source from the URL, User-Agent, and timeout in `config`.
    pub fn from_config(config: &DiffConfig) -> Result<Self, ArxivDiffError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.download_timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| ArxivDiffError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            timeout_secs: config.download_timeout_secs,
        })
    }

    /// `{base_url}/e-print/{identifier}v{revision}`
    pub fn url_for(&self, identifier: &str, revision: &str) -> String {
        eprint_url(&self.base_url, identifier, revision)
    }

    fn map_transport_error(&self, url: &str, e: reqwest::Error) -> ArxivDiffError {
        if e.is_timeout() {
            ArxivDiffError::DownloadTimeout {
                url: url.to_string(),
                secs: self.timeout_secs,
            }
        } else {
            ArxivDiffError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl ArchiveSource for HttpArchiveSource {
    async fn fetch(
        &self,
        identifier: &str,
        revision: &str,
        dest: &Path,
    ) -> Result<u64, ArxivDiffError> {
        let url = self.url_for(identifier, revision);
        info!("Downloading e-print: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_transport_error(&url, e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ArxivDiffError::RevisionNotFound {
                identifier: identifier.to_string(),
                revision: revision.to_string(),
            });
        }
        if !status.is_success() {
            return Err(ArxivDiffError::DownloadFailed {
                url,
                reason: format!("HTTP {status}"),
            });
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| ArxivDiffError::io("creating download file", dest, e))?;

        let mut written: u64 = 0;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| self.map_transport_error(&url, e))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| ArxivDiffError::io("writing download file", dest, e))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| ArxivDiffError::io("writing download file", dest, e))?;

        debug!("Downloaded {} bytes to {}", written, dest.display());
        Ok(written)
    }
}

/// Build the e-print URL for one revision.
pub fn eprint_url(base_url: &str, identifier: &str, revision: &str) -> String {
    format!(
        "{}/e-print/{}v{}",
        base_url.trim_end_matches('/'),
        identifier,
        revision
    )
}

/// Create the revision's directory and download its payload into it.
///
/// Returns the path of the downloaded file and its size. The directory is
/// only created once the request for it is about to be made, so a failure
/// on an earlier revision never leaves a directory for a later one.
pub async fn fetch_revision(
    source: &dyn ArchiveSource,
    workspace: &Workspace,
    identifier: &str,
    revision: &str,
) -> Result<(PathBuf, u64), ArxivDiffError> {
    let dir = workspace.create_revision_dir(revision)?;
    let dest = dir.join(DOWNLOAD_FILE_NAME);
    let bytes = source.fetch(identifier, revision, &dest).await?;
    Ok((dest, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CannedSource {
        payload: Vec<u8>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ArchiveSource for CannedSource {
        async fn fetch(
            &self,
            identifier: &str,
            revision: &str,
            dest: &Path,
        ) -> Result<u64, ArxivDiffError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{identifier}v{revision}"));
            tokio::fs::write(dest, &self.payload).await.unwrap();
            Ok(self.payload.len() as u64)
        }
    }

    #[test]
    fn eprint_url_format() {
        assert_eq!(
            eprint_url("https://arxiv.org", "2303.00096", "2"),
            "https://arxiv.org/e-print/2303.00096v2"
        );
        assert_eq!(
            eprint_url("http://localhost:9000/", "hep-th/9901001", "1"),
            "http://localhost:9000/e-print/hep-th/9901001v1"
        );
    }

    #[test]
    fn http_source_uses_config_base_url() {
        let config = DiffConfig::builder()
            .base_url("http://127.0.0.1:1")
            .build()
            .unwrap();
        let source = HttpArchiveSource::from_config(&config).unwrap();
        assert_eq!(
            source.url_for("2303.00096", "1"),
            "http://127.0.0.1:1/e-print/2303.00096v1"
        );
    }

    #[tokio::test]
    async fn fetch_revision_writes_into_fresh_revision_dir() {
        let ws = Workspace::create(None).unwrap();
        let source = CannedSource {
            payload: b"\\documentclass{article}".to_vec(),
            calls: Mutex::new(Vec::new()),
        };

        let (path, n) = fetch_revision(&source, &ws, "2303.00096", "1")
            .await
            .unwrap();

        assert_eq!(n, 23);
        assert_eq!(path, ws.path().join("v1").join(DOWNLOAD_FILE_NAME));
        assert_eq!(std::fs::read(&path).unwrap(), source.payload);
        assert_eq!(*source.calls.lock().unwrap(), vec!["2303.00096v1"]);
    }

    #[tokio::test]
    async fn connection_refused_is_a_download_failure() {
        // Port 1 on loopback is essentially never listening.
        let config = DiffConfig::builder()
            .base_url("http://127.0.0.1:1")
            .download_timeout_secs(5)
            .build()
            .unwrap();
        let source = HttpArchiveSource::from_config(&config).unwrap();
        let dir = tempfile::TempDir::new().unwrap();

        let err = source
            .fetch("2303.00096", "1", &dir.path().join("x"))
            .await
            .unwrap_err();
        assert!(
            matches!(err, ArxivDiffError::DownloadFailed { .. }),
            "got: {err:?}"
        );
        assert!(!dir.path().join("x").exists());
    }
}
