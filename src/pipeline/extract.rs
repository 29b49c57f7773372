//! Archive materialisation: turn a downloaded payload into a source tree.
//!
//! arXiv e-prints come in three shapes:
//!
//! | Payload                    | Result                                 |
//! |----------------------------|----------------------------------------|
//! | gzipped tarball (common)   | all members unpacked into the revision dir |
//! | gzipped single `.tex`      | decompressed to `main.tex`             |
//! | bare file                  | copied verbatim to `main.tex`          |
//!
//! A payload that cannot be read as a tar archive is not an error: the
//! single-file branch guarantees the revision directory is never left empty.

use crate::error::ArxivDiffError;
use flate2::read::MultiGzDecoder;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::{debug, info, warn};

/// Fixed name given to a single-file submission.
pub const FALLBACK_FILE_NAME: &str = "main.tex";

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// What [`materialize`] found in the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Materialized {
    /// A tar archive was unpacked; `entries` members were read.
    Archive { entries: usize },
    /// The payload was a single source file, now at `path`.
    SingleFile { path: PathBuf },
}

impl Materialized {
    pub fn is_archive(&self) -> bool {
        matches!(self, Materialized::Archive { .. })
    }
}

/// Unpack the payload at `archive_path` into `revision_dir`.
///
/// Runs on the blocking pool: decompression and unpacking are synchronous.
pub async fn materialize(
    archive_path: &Path,
    revision_dir: &Path,
) -> Result<Materialized, ArxivDiffError> {
    let archive = archive_path.to_path_buf();
    let dir = revision_dir.to_path_buf();

    tokio::task::spawn_blocking(move || materialize_blocking(&archive, &dir))
        .await
        .map_err(|e| ArxivDiffError::Internal(format!("Extract task panicked: {e}")))?
}

/// Blocking implementation of [`materialize`].
pub fn materialize_blocking(
    archive_path: &Path,
    revision_dir: &Path,
) -> Result<Materialized, ArxivDiffError> {
    let raw = std::fs::read(archive_path)
        .map_err(|e| ArxivDiffError::io("reading download", archive_path, e))?;

    let payload = if raw.starts_with(&GZIP_MAGIC) {
        match gunzip(&raw) {
            Ok(bytes) => bytes,
            Err(e) => {
                // Truncated or corrupt gzip: keep the raw bytes and let the
                // single-file branch take them.
                warn!("Payload has a gzip header but does not inflate: {}", e);
                raw
            }
        }
    } else {
        raw
    };

    match unpack_tar(&payload, revision_dir) {
        Ok(entries) if entries > 0 => {
            std::fs::remove_file(archive_path)
                .map_err(|e| ArxivDiffError::io("removing download", archive_path, e))?;
            info!(
                "Extracted {} archive members into {}",
                entries,
                revision_dir.display()
            );
            Ok(Materialized::Archive { entries })
        }
        outcome => {
            match outcome {
                Ok(_) => debug!("Payload is an empty tar stream; treating as a single file"),
                Err(e) => debug!("Payload is not a tar archive ({}); treating as a single file", e),
            }
            clear_partial_unpack(revision_dir, archive_path)?;

            let path = revision_dir.join(FALLBACK_FILE_NAME);
            std::fs::write(&path, &payload)
                .map_err(|e| ArxivDiffError::io("writing single-file source", &path, e))?;
            std::fs::remove_file(archive_path)
                .map_err(|e| ArxivDiffError::io("removing download", archive_path, e))?;
            info!("Single-file submission saved as {}", path.display());
            Ok(Materialized::SingleFile { path })
        }
    }
}

fn gunzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(bytes.len() * 4);
    MultiGzDecoder::new(bytes).read_to_end(&mut out)?;
    Ok(out)
}

/// Unpack every member of a tar stream into `dest`, returning the member count.
///
/// `tar::Entry::unpack_in` skips members whose paths would escape `dest`.
fn unpack_tar(bytes: &[u8], dest: &Path) -> std::io::Result<usize> {
    let mut archive = Archive::new(Cursor::new(bytes));
    archive.set_preserve_permissions(false);
    archive.set_overwrite(true);

    let mut count = 0;
    for entry in archive.entries()? {
        let mut entry = entry?;
        if !entry.unpack_in(dest)? {
            warn!(
                "Skipped archive member outside the revision directory: {}",
                entry.path()?.display()
            );
        }
        count += 1;
    }
    Ok(count)
}

/// Remove everything a failed tar read may have written, except the download.
fn clear_partial_unpack(dir: &Path, keep: &Path) -> Result<(), ArxivDiffError> {
    let entries =
        std::fs::read_dir(dir).map_err(|e| ArxivDiffError::io("listing revision directory", dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| ArxivDiffError::io("listing revision directory", dir, e))?;
        let path = entry.path();
        if path == keep {
            continue;
        }
        let removed = if path.is_dir() {
            std::fs::remove_dir_all(&path)
        } else {
            std::fs::remove_file(&path)
        };
        removed.map_err(|e| ArxivDiffError::io("clearing partial unpack", &path, e))?;
    }
    Ok(())
}
