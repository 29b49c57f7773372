//! The per-request working root.
//!
//! Every file a request touches (downloads, unpacked sources, `diff.tex`,
//! the PDF, the fallback bundle) lives under one [`Workspace`]. The
//! generator releases it explicitly with [`Workspace::close`] on every exit
//! path; the wrapped [`TempDir`] still removes the tree if the task panics or
//! is cancelled before `close` runs.

use crate::error::ArxivDiffError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// A uniquely named temporary directory owned by exactly one request.
#[derive(Debug)]
pub struct Workspace {
    root: TempDir,
}

impl Workspace {
    /// Allocate a fresh working root under `parent` (system temp dir if `None`).
    pub fn create(parent: Option<&Path>) -> Result<Self, ArxivDiffError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("arxiv-diff-");
        let root = match parent {
            Some(dir) => builder.tempdir_in(dir),
            None => builder.tempdir(),
        }
        .map_err(|e| {
            ArxivDiffError::io(
                "creating working root in",
                parent.map(Path::to_path_buf).unwrap_or_else(std::env::temp_dir),
                e,
            )
        })?;
        debug!("Working root: {}", root.path().display());
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    /// `<root>/v{revision}`; does not create it.
    pub fn revision_dir(&self, revision: &str) -> PathBuf {
        self.root.path().join(format!("v{revision}"))
    }

    /// Create `<root>/v{revision}` and return its path.
    pub fn create_revision_dir(&self, revision: &str) -> Result<PathBuf, ArxivDiffError> {
        let dir = self.revision_dir(revision);
        std::fs::create_dir_all(&dir)
            .map_err(|e| ArxivDiffError::io("creating revision directory", &dir, e))?;
        Ok(dir)
    }

    /// Recursively remove the working root.
    ///
    /// A removal failure is logged and returned, but the request outcome is
    /// already decided by then, so callers usually only log it.
    pub fn close(self) -> Result<(), ArxivDiffError> {
        let path = self.root.path().to_path_buf();
        match self.root.close() {
            Ok(()) => {
                debug!("Removed working root {}", path.display());
                Ok(())
            }
            Err(e) => {
                warn!("Failed to remove working root {}: {}", path.display(), e);
                Err(ArxivDiffError::io("removing working root", path, e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_removes_the_tree() {
        let parent = TempDir::new().unwrap();
        let ws = Workspace::create(Some(parent.path())).unwrap();
        let root = ws.path().to_path_buf();
        let v1 = ws.create_revision_dir("1").unwrap();
        std::fs::write(v1.join("main.tex"), "x").unwrap();

        assert!(root.exists());
        ws.close().unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn drop_also_removes_the_tree() {
        let parent = TempDir::new().unwrap();
        let root = {
            let ws = Workspace::create(Some(parent.path())).unwrap();
            ws.create_revision_dir("2").unwrap();
            ws.path().to_path_buf()
        };
        assert!(!root.exists());
    }

    #[test]
    fn roots_are_unique_per_request() {
        let parent = TempDir::new().unwrap();
        let a = Workspace::create(Some(parent.path())).unwrap();
        let b = Workspace::create(Some(parent.path())).unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("arxiv-diff-"));
    }

    #[test]
    fn revision_dir_layout() {
        let ws = Workspace::create(None).unwrap();
        assert_eq!(ws.revision_dir("3"), ws.path().join("v3"));
        assert!(!ws.revision_dir("3").exists());
    }
}
