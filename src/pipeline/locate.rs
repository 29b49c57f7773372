//! Entry-point location: find the `.tex` file latexdiff should start from.
//!
//! A submission's compilation root is the file containing
//! `\begin{document}`. Papers split into `\input` fragments have exactly
//! one such file; the rare tree with several (supplementary material,
//! response letters) is resolved deterministically: shallower paths win,
//! then lexical order of the relative path. Re-running the locator on an
//! unmodified directory always returns the same file.

use crate::error::ArxivDiffError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Literal marking a document's compilation root.
pub const DOCUMENT_START_MARKER: &str = "\\begin{document}";

/// Extension of LaTeX source files.
pub const SOURCE_EXTENSION: &str = "tex";

/// Find the entry point of the tree under `revision_dir`.
///
/// Runs on the blocking pool.
pub async fn locate_entry_point(revision_dir: &Path) -> Result<PathBuf, ArxivDiffError> {
    let dir = revision_dir.to_path_buf();
    tokio::task::spawn_blocking(move || locate_entry_point_blocking(&dir))
        .await
        .map_err(|e| ArxivDiffError::Internal(format!("Locate task panicked: {e}")))?
}

/// Blocking implementation of [`locate_entry_point`].
pub fn locate_entry_point_blocking(revision_dir: &Path) -> Result<PathBuf, ArxivDiffError> {
    for candidate in source_files(revision_dir) {
        // Decoding errors are not fatal: many arXiv sources are Latin-1.
        let bytes = match std::fs::read(&candidate) {
            Ok(b) => b,
            Err(e) => {
                debug!("Skipping unreadable {}: {}", candidate.display(), e);
                continue;
            }
        };
        if String::from_utf8_lossy(&bytes).contains(DOCUMENT_START_MARKER) {
            info!("Entry point: {}", candidate.display());
            return Ok(candidate);
        }
    }

    Err(ArxivDiffError::EntryPointNotFound {
        dir: revision_dir.to_path_buf(),
    })
}

/// All `.tex` files under `root`, ordered by depth then relative path.
///
/// Symlinked files count when their target is a file inside `root`;
/// directory links are not followed.
fn source_files(root: &Path) -> Vec<PathBuf> {
    let canonical_root = root.canonicalize().ok();
    let mut files: Vec<(usize, PathBuf)> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| has_source_extension(e.path()))
        .filter(|e| {
            let ft = e.file_type();
            ft.is_file() || (ft.is_symlink() && link_stays_inside(e.path(), canonical_root.as_deref()))
        })
        .filter_map(|e| {
            let rel = e.path().strip_prefix(root).ok()?.to_path_buf();
            Some((rel.components().count(), rel))
        })
        .collect();

    files.sort();
    files.into_iter().map(|(_, rel)| root.join(rel)).collect()
}

fn link_stays_inside(link: &Path, canonical_root: Option<&Path>) -> bool {
    let Some(root) = canonical_root else {
        return false;
    };
    match link.canonicalize() {
        Ok(target) => target.starts_with(root) && target.is_file(),
        Err(e) => {
            debug!("Skipping dangling link {}: {}", link.display(), e);
            false
        }
    }
}

fn has_source_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case(SOURCE_EXTENSION))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let p = root.join(rel);
        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
        std::fs::write(p, content).unwrap();
    }

    #[test]
    fn finds_the_file_with_the_marker() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "intro.tex", b"\\section{Intro}");
        write(tmp.path(), "paper.tex", b"\\documentclass{article}\n\\begin{document}\n\\input{intro}\n\\end{document}");
        write(tmp.path(), "figure.pdf", b"%PDF \\begin{document}");

        let found = locate_entry_point_blocking(tmp.path()).unwrap();
        assert_eq!(found, tmp.path().join("paper.tex"));
    }

    #[test]
    fn searches_subdirectories() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "src/deep/ms.TEX", b"\\begin{document}");

        let found = locate_entry_point_blocking(tmp.path()).unwrap();
        assert_eq!(found, tmp.path().join("src/deep/ms.TEX"));
    }

    #[test]
    fn fails_when_no_file_has_the_marker() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a.tex", b"\\section{A}");
        write(tmp.path(), "readme.txt", b"\\begin{document}");

        let err = locate_entry_point_blocking(tmp.path()).unwrap_err();
        assert!(matches!(err, ArxivDiffError::EntryPointNotFound { .. }));
    }

    #[test]
    fn fails_on_empty_directory() {
        let tmp = TempDir::new().unwrap();
        assert!(locate_entry_point_blocking(tmp.path()).is_err());
    }

    #[test]
    fn tolerates_non_utf8_content() {
        let tmp = TempDir::new().unwrap();
        let mut content = b"\\begin{document}\n caf".to_vec();
        content.push(0xE9); // Latin-1 'é'
        write(tmp.path(), "latin1.tex", &content);

        let found = locate_entry_point_blocking(tmp.path()).unwrap();
        assert_eq!(found, tmp.path().join("latin1.tex"));
    }

    #[test]
    fn shallower_then_lexical_order_wins() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "a/supplement.tex", b"\\begin{document}");
        write(tmp.path(), "zz_main.tex", b"\\begin{document}");
        write(tmp.path(), "response.tex", b"\\begin{document}");

        let found = locate_entry_point_blocking(tmp.path()).unwrap();
        assert_eq!(found, tmp.path().join("response.tex"));
    }

    #[test]
    fn is_idempotent() {
        let tmp = TempDir::new().unwrap();
        for name in ["c.tex", "b.tex", "d/a.tex"] {
            write(tmp.path(), name, b"\\begin{document}");
        }

        let first = locate_entry_point_blocking(tmp.path()).unwrap();
        for _ in 0..5 {
            assert_eq!(locate_entry_point_blocking(tmp.path()).unwrap(), first);
        }
    }

    #[cfg(unix)]
    #[test]
    fn follows_file_links_that_stay_inside_the_tree() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "src/paper.tex", b"\\begin{document}");
        std::os::unix::fs::symlink("src/paper.tex", tmp.path().join("main.tex")).unwrap();

        let found = locate_entry_point_blocking(tmp.path()).unwrap();
        assert_eq!(found, tmp.path().join("main.tex"));
    }

    #[cfg(unix)]
    #[test]
    fn ignores_links_pointing_outside_the_tree() {
        let tmp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        write(outside.path(), "stolen.tex", b"\\begin{document}");
        let tree = tmp.path().join("v1");
        write(&tree, "notes.tex", b"\\section{Notes}");
        std::os::unix::fs::symlink(outside.path().join("stolen.tex"), tree.join("main.tex")).unwrap();

        let err = locate_entry_point_blocking(&tree).unwrap_err();
        assert!(matches!(err, ArxivDiffError::EntryPointNotFound { .. }));
    }

    #[tokio::test]
    async fn async_wrapper_delegates() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "main.tex", b"\\begin{document}");
        assert_eq!(
            locate_entry_point(tmp.path()).await.unwrap(),
            tmp.path().join("main.tex")
        );
    }
}
