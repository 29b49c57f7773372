//! Request entry points: run the whole pipeline for one [`DiffRequest`].
//!
//! Control flow is a straight line:
//!
//! ```text
//! fetch(old) → extract(old) → locate(old)
//!   → fetch(new) → extract(new) → locate(new)
//!   → latexdiff → latexmk → present
//! ```
//!
//! Any stage error ends the request immediately. The old revision is fully
//! processed before the new revision's directory is created, so a bad old
//! revision never triggers a download of the new one. Whatever happens, the
//! working root is removed before the function returns.

use crate::config::DiffConfig;
use crate::error::ArxivDiffError;
use crate::output::{DiffReport, DiffStats, SavedDiff, ToolReport};
use crate::pipeline::fetch::{fetch_revision, ArchiveSource, HttpArchiveSource};
use crate::pipeline::workspace::Workspace;
use crate::pipeline::{compile, extract, latexdiff, locate, present, tool};
use crate::progress::Stage;
use crate::request::DiffRequest;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Build the diff between two revisions of an arXiv paper.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(DiffReport)` whenever latexdiff succeeded, whether or not latexmk
/// produced a PDF (check [`crate::DiffOutcome::is_rendered`]).
///
/// # Errors
/// Returns `Err(ArxivDiffError)` only when the pipeline broke before there
/// was anything to present:
/// - a download failed or the revision does not exist
/// - a revision has no `.tex` file with `\begin{document}`
/// - latexdiff failed, produced an unusable document, or timed out
/// - latexdiff or latexmk is not installed
pub async fn generate_diff(
    request: &DiffRequest,
    config: &DiffConfig,
) -> Result<DiffReport, ArxivDiffError> {
    info!(
        "Starting diff: {} v{} → v{}",
        request.identifier(),
        request.old_revision(),
        request.new_revision()
    );

    let source: Arc<dyn ArchiveSource> = match &config.source {
        Some(s) => Arc::clone(s),
        None => Arc::new(HttpArchiveSource::from_config(config)?),
    };

    let workspace = Workspace::create(config.work_dir_parent.as_deref())?;
    let result = run_pipeline(request, config, source.as_ref(), &workspace).await;

    // The outcome is already decided; a cleanup failure is only reported.
    if let Err(e) = workspace.close() {
        warn!("Working root cleanup failed: {}", e);
    }

    if let (Ok(report), Some(cb)) = (&result, &config.progress_callback) {
        cb.on_pipeline_complete(report.outcome.is_rendered());
    }
    result
}

/// Synchronous wrapper around [`generate_diff`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_diff_sync(
    request: &DiffRequest,
    config: &DiffConfig,
) -> Result<DiffReport, ArxivDiffError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ArxivDiffError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate_diff(request, config))
}

/// Build the diff and save the result into `out_dir`.
///
/// Writes the PDF, or the source bundle plus `<stem>_build.log`. Each file
/// is written to a temporary name and renamed into place, so an interrupted
/// run never leaves a truncated artifact behind.
pub async fn generate_to_dir(
    request: &DiffRequest,
    out_dir: impl AsRef<Path>,
    config: &DiffConfig,
) -> Result<SavedDiff, ArxivDiffError> {
    let report = generate_diff(request, config).await?;
    let out_dir = out_dir.as_ref();

    tokio::fs::create_dir_all(out_dir)
        .await
        .map_err(|e| ArxivDiffError::OutputWriteFailed {
            path: out_dir.to_path_buf(),
            source: e,
        })?;

    let artifact = report.outcome.artifact();
    let artifact_path = out_dir.join(&artifact.file_name);
    write_atomic(&artifact_path, &artifact.bytes).await?;

    let build_log_path = match report.outcome.build_log() {
        Some(log) => {
            let path = out_dir.join(request.build_log_file_name());
            write_atomic(&path, log.as_bytes()).await?;
            Some(path)
        }
        None => None,
    };

    Ok(SavedDiff {
        report,
        artifact_path,
        build_log_path,
    })
}

/// Check that latexdiff and latexmk can be started.
///
/// Runs `<program> --version` for both configured programs. Never fails:
/// problems are reported per tool.
pub async fn check_tools(config: &DiffConfig) -> Vec<ToolReport> {
    let timeout = Duration::from_secs(config.tool_timeout_secs);
    let mut reports = Vec::with_capacity(2);

    for program in [&config.latexdiff_program, &config.latexmk_program] {
        let report = match tool::probe_version(program, timeout).await {
            Ok(version) => ToolReport {
                program: program.clone(),
                available: true,
                version: Some(version).filter(|v| !v.is_empty()),
                problem: None,
            },
            Err(e) => ToolReport {
                program: program.clone(),
                available: false,
                version: None,
                problem: Some(e.to_string()),
            },
        };
        reports.push(report);
    }
    reports
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// A revision after fetch, extract, and locate.
struct PreparedRevision {
    dir: PathBuf,
    entry_point: PathBuf,
    download_bytes: u64,
    was_archive: bool,
}

async fn run_pipeline(
    request: &DiffRequest,
    config: &DiffConfig,
    source: &dyn ArchiveSource,
    workspace: &Workspace,
) -> Result<DiffReport, ArxivDiffError> {
    let total_start = Instant::now();

    // ── Steps 1–3: old revision ──────────────────────────────────────────
    let prepare_start = Instant::now();
    let old = prepare_revision(request, request.old_revision(), config, source, workspace).await?;

    // ── Steps 4–6: new revision ──────────────────────────────────────────
    let new = prepare_revision(request, request.new_revision(), config, source, workspace).await?;
    let prepare_duration_ms = prepare_start.elapsed().as_millis() as u64;

    // ── Step 7: latexdiff ────────────────────────────────────────────────
    let diff_start = Instant::now();
    let diff_path = run_stage(config, Stage::Diff, async {
        latexdiff::run_latexdiff(config, &old.entry_point, &new.entry_point, &new.dir).await
    })
    .await?;
    let diff_duration_ms = diff_start.elapsed().as_millis() as u64;

    // ── Step 8: latexmk ──────────────────────────────────────────────────
    let render = run_stage(config, Stage::Compile, async {
        compile::run_latexmk(config, &diff_path, &new.dir).await
    })
    .await?;

    // ── Step 9: present ──────────────────────────────────────────────────
    let outcome = run_stage(config, Stage::Present, async {
        present::present(request, &render, &new.dir, workspace.path()).await
    })
    .await?;

    let stats = DiffStats {
        old_download_bytes: old.download_bytes,
        new_download_bytes: new.download_bytes,
        old_was_archive: old.was_archive,
        new_was_archive: new.was_archive,
        old_entry_point: relative_to(&old.entry_point, &old.dir),
        new_entry_point: relative_to(&new.entry_point, &new.dir),
        latexmk_exit_code: render.exit_code,
        latexmk_timed_out: render.timed_out,
        prepare_duration_ms,
        diff_duration_ms,
        compile_duration_ms: render.duration.as_millis() as u64,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };

    info!(
        "Diff complete: {} in {}ms",
        if outcome.is_rendered() { "PDF" } else { "source bundle" },
        stats.total_duration_ms
    );

    Ok(DiffReport { outcome, stats })
}

async fn prepare_revision(
    request: &DiffRequest,
    revision: &str,
    config: &DiffConfig,
    source: &dyn ArchiveSource,
    workspace: &Workspace,
) -> Result<PreparedRevision, ArxivDiffError> {
    let (download, download_bytes) = run_stage(config, Stage::Fetch(revision.to_string()), async {
        fetch_revision(source, workspace, request.identifier(), revision).await
    })
    .await?;

    let dir = workspace.revision_dir(revision);
    let materialized = run_stage(config, Stage::Extract(revision.to_string()), async {
        extract::materialize(&download, &dir).await
    })
    .await?;

    let entry_point = run_stage(config, Stage::Locate(revision.to_string()), async {
        locate::locate_entry_point(&dir).await
    })
    .await?;

    Ok(PreparedRevision {
        dir,
        entry_point,
        download_bytes,
        was_archive: materialized.is_archive(),
    })
}

/// Await one stage, reporting start, completion, or failure to the callback.
async fn run_stage<T, F>(config: &DiffConfig, stage: Stage, fut: F) -> Result<T, ArxivDiffError>
where
    F: Future<Output = Result<T, ArxivDiffError>>,
{
    let cb = config.progress_callback.as_ref();
    if let Some(cb) = cb {
        cb.on_stage_start(&stage);
    }
    let start = Instant::now();
    let result = fut.await;

    if let Some(cb) = cb {
        match &result {
            Ok(_) => cb.on_stage_complete(&stage, start.elapsed().as_millis() as u64),
            Err(e) => cb.on_stage_error(&stage, &e.to_string()),
        }
    }
    if let Err(ref e) = result {
        warn!("Stage {} failed: {}", stage, e);
    }
    result
}

fn relative_to(path: &Path, base: &Path) -> PathBuf {
    path.strip_prefix(base)
        .map(Path::to_path_buf)
        .unwrap_or_else(|_| path.to_path_buf())
}

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ArxivDiffError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));

    tokio::fs::write(&tmp_path, bytes)
        .await
        .map_err(|e| ArxivDiffError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| ArxivDiffError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
}
