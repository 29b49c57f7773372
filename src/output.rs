//! What a finished request hands back to its caller.

use serde::Serialize;
use std::path::PathBuf;

/// A downloadable unit: file name, MIME type, and its complete bytes.
///
/// The bytes are owned in memory so they outlive the working root, which is
/// removed before [`crate::generate_diff`] returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffArtifact {
    pub file_name: String,
    pub mime_type: &'static str,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl DiffArtifact {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// The two defined results of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DiffOutcome {
    /// latexmk produced `diff.pdf`; `artifact` is its exact bytes.
    Rendered { artifact: DiffArtifact },

    /// latexmk did not produce a PDF. `bundle` is a `.tar.gz` of the new
    /// revision's directory (sources plus `diff.tex`) so the user can finish
    /// the build locally; `build_log` is latexmk's captured output.
    Fallback {
        bundle: DiffArtifact,
        build_log: String,
    },
}

impl DiffOutcome {
    /// The artifact to offer for download, whichever branch was taken.
    pub fn artifact(&self) -> &DiffArtifact {
        match self {
            DiffOutcome::Rendered { artifact } => artifact,
            DiffOutcome::Fallback { bundle, .. } => bundle,
        }
    }

    pub fn is_rendered(&self) -> bool {
        matches!(self, DiffOutcome::Rendered { .. })
    }

    /// latexmk's output when the render failed.
    pub fn build_log(&self) -> Option<&str> {
        match self {
            DiffOutcome::Rendered { .. } => None,
            DiffOutcome::Fallback { build_log, .. } => Some(build_log),
        }
    }
}

/// Timings and facts collected while a request ran.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffStats {
    /// Payload sizes downloaded for the old and new revision.
    pub old_download_bytes: u64,
    pub new_download_bytes: u64,
    /// Whether each payload was a real archive (`false`: single-file fallback).
    pub old_was_archive: bool,
    pub new_was_archive: bool,
    /// Entry points relative to their revision directory.
    pub old_entry_point: PathBuf,
    pub new_entry_point: PathBuf,
    /// latexmk's exit code (`None` when killed by signal or timeout).
    pub latexmk_exit_code: Option<i32>,
    /// Whether latexmk hit the tool timeout.
    pub latexmk_timed_out: bool,
    /// Fetch, extract, and locate for both revisions.
    pub prepare_duration_ms: u64,
    pub diff_duration_ms: u64,
    pub compile_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Result of [`crate::generate_diff`]: the outcome plus run statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffReport {
    pub outcome: DiffOutcome,
    pub stats: DiffStats,
}

/// Result of [`crate::generate_to_dir`]: the report plus where it was saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedDiff {
    pub report: DiffReport,
    /// The PDF or the source bundle.
    pub artifact_path: PathBuf,
    /// latexmk's log, written only for the fallback outcome.
    pub build_log_path: Option<PathBuf>,
}

/// Availability of one external program, from [`crate::check_tools`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolReport {
    pub program: String,
    pub available: bool,
    /// First non-empty line of `--version` output, when available.
    pub version: Option<String>,
    /// Why the program is unavailable, when it is not.
    pub problem: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(name: &str, bytes: &[u8]) -> DiffArtifact {
        DiffArtifact {
            file_name: name.into(),
            mime_type: "application/pdf",
            bytes: bytes.to_vec(),
        }
    }

    #[test]
    fn rendered_outcome_accessors() {
        let o = DiffOutcome::Rendered {
            artifact: artifact("a_diff.pdf", b"%PDF-1.5"),
        };
        assert!(o.is_rendered());
        assert_eq!(o.artifact().file_name, "a_diff.pdf");
        assert!(o.build_log().is_none());
    }

    #[test]
    fn fallback_outcome_accessors() {
        let o = DiffOutcome::Fallback {
            bundle: artifact("a_source.tar.gz", b"\x1f\x8b"),
            build_log: "! LaTeX Error".into(),
        };
        assert!(!o.is_rendered());
        assert_eq!(o.artifact().len(), 2);
        assert_eq!(o.build_log(), Some("! LaTeX Error"));
    }

    #[test]
    fn outcome_serialises_without_bytes() {
        let o = DiffOutcome::Rendered {
            artifact: artifact("a_diff.pdf", b"%PDF-1.5"),
        };
        let json = serde_json::to_string(&o).unwrap();
        assert!(json.contains("\"outcome\":\"rendered\""), "got: {json}");
        assert!(json.contains("a_diff.pdf"));
        assert!(!json.contains("bytes"));
    }
}
