//! Presentation: turn the render result into something downloadable.
//!
//! * PDF present: its bytes, untouched.
//! * PDF absent: a `.tar.gz` of the whole new revision directory (sources,
//!   `diff.tex`, and whatever latexmk left behind) so the user can finish the
//!   build locally, together with latexmk's log.
//!
//! Everything is read into memory here because the working root is removed
//! as soon as the request returns.

use crate::error::ArxivDiffError;
use crate::output::{DiffArtifact, DiffOutcome};
use crate::pipeline::compile::RenderReport;
use crate::request::DiffRequest;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

pub const PDF_MIME_TYPE: &str = "application/pdf";
pub const BUNDLE_MIME_TYPE: &str = "application/gzip";

/// Build the request's [`DiffOutcome`].
///
/// `bundle_dir` is where the fallback archive is written; it must not be
/// inside `new_dir`, or the archive would try to contain itself.
pub async fn present(
    request: &DiffRequest,
    render: &RenderReport,
    new_dir: &Path,
    bundle_dir: &Path,
) -> Result<DiffOutcome, ArxivDiffError> {
    if let Some(pdf) = &render.pdf {
        let bytes = tokio::fs::read(pdf)
            .await
            .map_err(|e| ArxivDiffError::io("reading rendered PDF", pdf, e))?;
        info!("Presenting PDF ({} bytes)", bytes.len());
        return Ok(DiffOutcome::Rendered {
            artifact: DiffArtifact {
                file_name: request.pdf_file_name(),
                mime_type: PDF_MIME_TYPE,
                bytes,
            },
        });
    }

    let bundle_path = bundle_dir.join(request.bundle_file_name());
    let source = new_dir.to_path_buf();
    let dest = bundle_path.clone();
    tokio::task::spawn_blocking(move || write_bundle(&source, &dest))
        .await
        .map_err(|e| ArxivDiffError::Internal(format!("Bundle task panicked: {e}")))??;

    let bytes = tokio::fs::read(&bundle_path)
        .await
        .map_err(|e| ArxivDiffError::io("reading source bundle", &bundle_path, e))?;
    info!("Presenting source bundle ({} bytes)", bytes.len());

    Ok(DiffOutcome::Fallback {
        bundle: DiffArtifact {
            file_name: request.bundle_file_name(),
            mime_type: BUNDLE_MIME_TYPE,
            bytes,
        },
        build_log: render.log.clone(),
    })
}

/// Write `dir` as a gzip-compressed tar to `dest`.
///
/// Members are stored under the directory's own name (`v2/diff.tex`, ...),
/// so unpacking does not spill files into the current directory.
pub fn write_bundle(dir: &Path, dest: &Path) -> Result<PathBuf, ArxivDiffError> {
    let prefix = dir
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("source"));

    let file = File::create(dest).map_err(|e| ArxivDiffError::io("creating bundle", dest, e))?;
    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);

    builder
        .append_dir_all(&prefix, dir)
        .map_err(|e| ArxivDiffError::io("archiving", dir, e))?;

    let mut writer = builder
        .into_inner()
        .and_then(|enc| enc.finish())
        .map_err(|e| ArxivDiffError::io("finishing bundle", dest, e))?;
    writer
        .flush()
        .map_err(|e| ArxivDiffError::io("finishing bundle", dest, e))?;

    Ok(dest.to_path_buf())
}
