//! Pipeline stages for building a revision diff.
//!
//! Each submodule implements one step. The stages run strictly in sequence
//! inside a single [`workspace::Workspace`]; nothing here retries or runs in
//! parallel.
//!
//! ## Data Flow
//!
//! ```text
//! fetch ──▶ extract ──▶ locate      (old revision, then new revision)
//!                         │
//!                         ▼
//!                     latexdiff ──▶ compile ──▶ present
//!                     (diff.tex)    (diff.pdf)   (PDF or .tar.gz + log)
//! ```
//!
//! 1. [`fetch`]: download `{id}v{rev}` from `/e-print/`; the only stage
//!    with network I/O
//! 2. [`extract`]: unpack the payload; non-archives become `main.tex`
//! 3. [`locate`]: find the `.tex` file containing `\begin{document}`
//! 4. [`latexdiff`]: run latexdiff into `diff.tex` and sanity-check it
//! 5. [`compile`]: run latexmk; a missing PDF is a result, not an error
//! 6. [`present`]: PDF bytes, or a bundle of the new revision plus the log
//!
//! [`tool`] is the shared subprocess runner behind stages 4 and 5.

pub mod compile;
pub mod extract;
pub mod fetch;
pub mod latexdiff;
pub mod locate;
pub mod present;
pub mod tool;
pub mod workspace;
