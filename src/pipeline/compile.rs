//! Rendering: compile `diff.tex` to PDF with latexmk.
//!
//! latexmk is run in force mode, so it keeps going past recoverable LaTeX
//! errors and its exit status says little about whether a usable PDF came
//! out. Only the presence of `diff.pdf` afterwards counts as success; a
//! missing PDF is a [`RenderReport`] with `pdf: None`, never an error.

use crate::config::DiffConfig;
use crate::error::ArxivDiffError;
use crate::pipeline::tool::{run_tool, StdoutTarget, ToolInvocation};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};

const LATEXMK_ARGS: [&str; 3] = ["-pdf", "-f", "-interaction=nonstopmode"];

/// Outcome of one latexmk run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderReport {
    /// `diff.pdf`, when latexmk produced it.
    pub pdf: Option<PathBuf>,
    /// latexmk's stdout and stderr, plus a note when it was killed.
    pub log: String,
    /// `None` when killed by a signal or the timeout.
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub duration: Duration,
}

impl RenderReport {
    pub fn rendered(&self) -> bool {
        self.pdf.is_some()
    }
}

/// Compile `diff_path` inside `new_dir`.
///
/// # Errors
/// Only when latexmk cannot be run at all ([`ArxivDiffError::ToolNotFound`],
/// [`ArxivDiffError::Io`]). Compilation failures and timeouts come back as a
/// report without a PDF.
pub async fn run_latexmk(
    config: &DiffConfig,
    diff_path: &Path,
    new_dir: &Path,
) -> Result<RenderReport, ArxivDiffError> {
    let file_name = diff_path
        .file_name()
        .ok_or_else(|| ArxivDiffError::Internal(format!("no file name in {}", diff_path.display())))?;
    let pdf_path = new_dir.join(Path::new(file_name).with_extension("pdf"));

    let mut args: Vec<String> = LATEXMK_ARGS.iter().map(|a| a.to_string()).collect();
    args.push(file_name.to_string_lossy().into_owned());

    let start = Instant::now();
    let result = run_tool(ToolInvocation {
        program: &config.latexmk_program,
        args,
        cwd: new_dir,
        stdout: StdoutTarget::Capture,
        timeout: Duration::from_secs(config.tool_timeout_secs),
    })
    .await;

    let report = match result {
        Ok(run) => {
            let pdf = pdf_path.is_file().then(|| pdf_path.clone());
            RenderReport {
                pdf,
                log: run.combined_output(),
                exit_code: run.status.code(),
                timed_out: false,
                duration: run.duration,
            }
        }
        // A killed run may leave a half-written PDF; it is not trusted.
        Err(err @ ArxivDiffError::ToolTimeout { .. }) => RenderReport {
            pdf: None,
            log: err.to_string(),
            exit_code: None,
            timed_out: true,
            duration: start.elapsed(),
        },
        Err(e) => return Err(e),
    };

    match &report.pdf {
        Some(pdf) => info!("latexmk produced {}", pdf.display()),
        None if report.timed_out => warn!("latexmk timed out; falling back to source bundle"),
        None => warn!(
            "latexmk produced no PDF (exit {:?}); falling back to source bundle",
            report.exit_code
        ),
    }
    Ok(report)
}
