//! Error types for the arxiv-diff library.
//!
//! [`ArxivDiffError`] covers every condition that stops a request before a
//! result can be presented: the pipeline broke (download failed, no entry
//! point, latexdiff crashed) and there is nothing useful to hand back.
//!
//! Two conditions are deliberately *not* errors:
//!
//! * a payload that is not a tar archive: it is materialised as a single
//!   `main.tex` (see [`crate::pipeline::extract`]);
//! * latexmk finishing without a PDF: the request still succeeds, with a
//!   [`crate::output::DiffOutcome::Fallback`] bundle and the build log.
//!
//! Callers that need to map failures to UI messages should match on
//! [`ArxivDiffError::kind`] rather than on individual variants.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the arxiv-diff library.
#[derive(Debug, Error)]
pub enum ArxivDiffError {
    // ── Request errors ────────────────────────────────────────────────────
    /// One of the three user inputs is empty or malformed.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // ── Network errors ────────────────────────────────────────────────────
    /// The e-print download failed (connection error or non-success status).
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// The e-print download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// arXiv answered 404: the identifier or revision does not exist.
    #[error("arXiv has no e-print for {identifier}v{revision}\nCheck the identifier and revision numbers.")]
    RevisionNotFound { identifier: String, revision: String },

    // ── Source tree errors ────────────────────────────────────────────────
    /// No `.tex` file containing `\begin{document}` was found.
    #[error("Could not find a .tex file with \\begin{{document}} in '{dir}'")]
    EntryPointNotFound { dir: PathBuf },

    // ── External tool errors ──────────────────────────────────────────────
    /// The external program could not be started because it is not installed.
    #[error("'{program}' was not found on PATH.\nInstall a TeX distribution that ships it, or pass its path explicitly.")]
    ToolNotFound { program: String },

    /// The external program ran longer than the configured limit and was killed.
    #[error("'{program}' timed out after {secs}s and was killed\nIncrease --tool-timeout.")]
    ToolTimeout { program: String, secs: u64 },

    /// latexdiff exited with a non-zero status.
    #[error("latexdiff failed to run (exit code {exit}). Check the file structures.\n{stderr}", exit = display_code(*.code))]
    DiffToolFailed { code: Option<i32>, stderr: String },

    /// latexdiff exited cleanly but its output cannot be a compilable document.
    #[error("latexdiff produced an unusable document '{path}': {reason}")]
    InvalidDiffOutput { path: PathBuf, reason: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not write a result file to the output directory.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file-system operation inside the working root failed.
    #[error("I/O error while {action} '{path}': {source}")]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of [`ArxivDiffError`] for presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    Network,
    EntryPointNotFound,
    DiffTool,
    TimedOut,
    Unexpected,
}

impl ArxivDiffError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_) | Self::InvalidConfig(_) => ErrorKind::InvalidInput,
            Self::DownloadFailed { .. } | Self::RevisionNotFound { .. } => ErrorKind::Network,
            Self::DownloadTimeout { .. } | Self::ToolTimeout { .. } => ErrorKind::TimedOut,
            Self::EntryPointNotFound { .. } => ErrorKind::EntryPointNotFound,
            Self::DiffToolFailed { .. } | Self::InvalidDiffOutput { .. } => ErrorKind::DiffTool,
            Self::ToolNotFound { .. }
            | Self::OutputWriteFailed { .. }
            | Self::Io { .. }
            | Self::Internal(_) => ErrorKind::Unexpected,
        }
    }

    /// Short headline for a status line, e.g. "latexdiff error."
    pub fn headline(&self) -> &'static str {
        match self.kind() {
            ErrorKind::InvalidInput => "Invalid input.",
            ErrorKind::Network => "Download failed.",
            ErrorKind::EntryPointNotFound => "Error locating files.",
            ErrorKind::DiffTool => "latexdiff error.",
            ErrorKind::TimedOut => "Timed out.",
            ErrorKind::Unexpected => "Unexpected error.",
        }
    }

    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

fn display_code(code: Option<i32>) -> String {
    code.map(|c| c.to_string())
        .unwrap_or_else(|| "none, killed by signal".to_string())
}
