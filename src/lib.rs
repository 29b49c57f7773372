//! # arxiv-diff
//!
//! Show what changed between two revisions of an arXiv paper, as a PDF with
//! additions and deletions marked up.
//!
//! ## Why this crate?
//!
//! arXiv keeps every revision's LaTeX source, and latexdiff can mark up the
//! differences between two LaTeX documents. Getting from an identifier to a
//! compiled diff still means downloading two e-prints, guessing their
//! formats, hunting for the main `.tex` file in each, and babysitting two
//! external tools. This crate does that plumbing and nothing else: it does
//! not parse LaTeX, compute diffs, or typeset anything itself.
//!
//! ## Pipeline Overview
//!
//! ```text
//! (identifier, old, new)
//!  │
//!  ├─ 1. Fetch     download /e-print/{id}v{rev} for both revisions
//!  ├─ 2. Extract   gzip/tar unpack; single files become main.tex
//!  ├─ 3. Locate    the .tex file containing \begin{document}
//!  ├─ 4. Diff      latexdiff --math-markup=0 old new > diff.tex
//!  ├─ 5. Compile   latexmk -pdf -f -interaction=nonstopmode diff.tex
//!  └─ 6. Present   diff PDF, or a .tar.gz of the sources plus build log
//! ```
//!
//! Every request gets its own temporary working root, removed on return.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use arxiv_diff::{generate_diff, DiffConfig, DiffOutcome, DiffRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let request = DiffRequest::new("2303.00096", "1", "2")?;
//!     let config = DiffConfig::default();
//!     let report = generate_diff(&request, &config).await?;
//!     match &report.outcome {
//!         DiffOutcome::Rendered { artifact } => {
//!             std::fs::write(&artifact.file_name, &artifact.bytes)?;
//!         }
//!         DiffOutcome::Fallback { bundle, build_log } => {
//!             std::fs::write(&bundle.file_name, &bundle.bytes)?;
//!             eprintln!("latexmk failed:\n{build_log}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## External Tools
//!
//! `latexdiff` and `latexmk` (plus a TeX engine for latexmk) must be
//! installed; both ship with TeX Live and MiKTeX. Use [`check_tools`] to
//! verify them up front.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `arxiv-diff` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! arxiv-diff = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod generate;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod request;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{DiffConfig, DiffConfigBuilder};
pub use error::{ArxivDiffError, ErrorKind};
pub use generate::{check_tools, generate_diff, generate_diff_sync, generate_to_dir};
pub use output::{DiffArtifact, DiffOutcome, DiffReport, DiffStats, SavedDiff, ToolReport};
pub use pipeline::fetch::{ArchiveSource, HttpArchiveSource};
pub use progress::{DiffProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
pub use request::DiffRequest;
