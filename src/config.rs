//! Configuration types for a diff request.
//!
//! Everything that is not part of the user's request (which paper, which
//! revisions) lives in [`DiffConfig`]: where e-prints are downloaded from,
//! which external programs to run, and how long each step may take.
//! It is built via [`DiffConfigBuilder`] so callers only set what they care
//! about.

use crate::error::ArxivDiffError;
use crate::pipeline::fetch::ArchiveSource;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default e-print host.
pub const DEFAULT_BASE_URL: &str = "https://arxiv.org";

/// Client tag sent with every download; arXiv asks automated clients to
/// identify themselves.
pub const DEFAULT_USER_AGENT: &str = concat!("arxiv-diff/", env!("CARGO_PKG_VERSION"));

/// Configuration for a diff request.
///
/// # Example
/// ```rust
/// use arxiv_diff::DiffConfig;
///
/// let config = DiffConfig::builder()
///     .latexdiff_program("/usr/local/texlive/bin/latexdiff")
///     .tool_timeout_secs(300)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct DiffConfig {
    /// Scheme and host e-prints are fetched from. Default: `https://arxiv.org`.
    ///
    /// The download URL is `{base_url}/e-print/{identifier}v{revision}`.
    pub base_url: String,

    /// `User-Agent` header sent with each download.
    pub user_agent: String,

    /// latexdiff executable (name on PATH or absolute path). Default: `latexdiff`.
    pub latexdiff_program: String,

    /// latexmk executable (name on PATH or absolute path). Default: `latexmk`.
    pub latexmk_program: String,

    /// Per-download timeout in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Upper bound for each external tool run in seconds. Default: 600.
    ///
    /// latexmk on a large paper with many reruns routinely needs a minute or
    /// two; the bound exists so a tool stuck on a prompt or an infinite
    /// rerun loop cannot hold the request forever.
    pub tool_timeout_secs: u64,

    /// Directory the per-request working root is created in.
    /// Default: `None` (the system temp directory).
    pub work_dir_parent: Option<PathBuf>,

    /// Pre-constructed archive source. Takes precedence over the HTTP source
    /// built from `base_url`/`user_agent`.
    pub source: Option<Arc<dyn ArchiveSource>>,

    /// Optional per-stage progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            latexdiff_program: "latexdiff".to_string(),
            latexmk_program: "latexmk".to_string(),
            download_timeout_secs: 120,
            tool_timeout_secs: 600,
            work_dir_parent: None,
            source: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for DiffConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiffConfig")
            .field("base_url", &self.base_url)
            .field("user_agent", &self.user_agent)
            .field("latexdiff_program", &self.latexdiff_program)
            .field("latexmk_program", &self.latexmk_program)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("tool_timeout_secs", &self.tool_timeout_secs)
            .field("work_dir_parent", &self.work_dir_parent)
            .field("source", &self.source.as_ref().map(|_| "<dyn ArchiveSource>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn DiffProgressCallback>"),
            )
            .finish()
    }
}

impl DiffConfig {
    /// Create a new builder for `DiffConfig`.
    pub fn builder() -> DiffConfigBuilder {
        DiffConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`DiffConfig`].
#[derive(Debug)]
pub struct DiffConfigBuilder {
    config: DiffConfig,
}

impl DiffConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn latexdiff_program(mut self, program: impl Into<String>) -> Self {
        self.config.latexdiff_program = program.into();
        self
    }

    pub fn latexmk_program(mut self, program: impl Into<String>) -> Self {
        self.config.latexmk_program = program.into();
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn tool_timeout_secs(mut self, secs: u64) -> Self {
        self.config.tool_timeout_secs = secs;
        self
    }

    pub fn work_dir_parent(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.work_dir_parent = Some(dir.into());
        self
    }

    pub fn source(mut self, source: Arc<dyn ArchiveSource>) -> Self {
        self.config.source = Some(source);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<DiffConfig, ArxivDiffError> {
        let c = &self.config;
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(ArxivDiffError::InvalidConfig(format!(
                "base URL must be http(s), got '{}'",
                c.base_url
            )));
        }
        if c.user_agent.trim().is_empty() {
            return Err(ArxivDiffError::InvalidConfig(
                "User-Agent must not be empty".into(),
            ));
        }
        if c.latexdiff_program.trim().is_empty() || c.latexmk_program.trim().is_empty() {
            return Err(ArxivDiffError::InvalidConfig(
                "tool program names must not be empty".into(),
            ));
        }
        if c.download_timeout_secs == 0 || c.tool_timeout_secs == 0 {
            return Err(ArxivDiffError::InvalidConfig("timeouts must be ≥ 1s".into()));
        }
        Ok(self.config)
    }
}
