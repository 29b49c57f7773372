//! Progress-callback trait for pipeline stage events.
//!
//! Inject an [`Arc<dyn DiffProgressCallback>`] via
//! [`crate::config::DiffConfigBuilder::progress_callback`] to receive an
//! event as each stage of a request starts, finishes, or fails.
//!
//! The library never prints; a terminal spinner, a web status line, or a log
//! sink are all just implementations of this trait.
//!
//! # Example
//!
//! ```rust
//! use arxiv_diff::{DiffConfig, DiffProgressCallback, Stage};
//! use std::sync::Arc;
//!
//! struct PrintingCallback;
//!
//! impl DiffProgressCallback for PrintingCallback {
//!     fn on_stage_start(&self, stage: &Stage) {
//!         eprintln!("{}", stage.describe());
//!     }
//! }
//!
//! let config = DiffConfig::builder()
//!     .progress_callback(Arc::new(PrintingCallback) as Arc<dyn DiffProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// One step of the request pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", content = "revision", rename_all = "snake_case")]
pub enum Stage {
    /// Downloading the e-print of a revision.
    Fetch(String),
    /// Unpacking a downloaded payload.
    Extract(String),
    /// Searching a revision's tree for its entry `.tex` file.
    Locate(String),
    /// Running latexdiff.
    Diff,
    /// Running latexmk on the diff document.
    Compile,
    /// Reading the PDF or packing the fallback bundle.
    Present,
}

impl Stage {
    /// Human-readable status line for this stage.
    pub fn describe(&self) -> String {
        match self {
            Stage::Fetch(rev) => format!("Downloading v{rev}…"),
            Stage::Extract(rev) => format!("Unpacking v{rev}…"),
            Stage::Locate(rev) => format!("Locating main .tex file of v{rev}…"),
            Stage::Diff => "Running latexdiff…".to_string(),
            Stage::Compile => "Compiling PDF…".to_string(),
            Stage::Present => "Preparing download…".to_string(),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Fetch(rev) => write!(f, "fetch v{rev}"),
            Stage::Extract(rev) => write!(f, "extract v{rev}"),
            Stage::Locate(rev) => write!(f, "locate v{rev}"),
            Stage::Diff => f.write_str("latexdiff"),
            Stage::Compile => f.write_str("latexmk"),
            Stage::Present => f.write_str("present"),
        }
    }
}

/// Called by the pipeline as it moves through each [`Stage`].
///
/// Stages run strictly one after another, but implementations must still be
/// `Send + Sync` because blocking stages execute on the tokio blocking pool.
/// All methods default to no-ops.
pub trait DiffProgressCallback: Send + Sync {
    /// Called when a stage begins.
    fn on_stage_start(&self, stage: &Stage) {
        let _ = stage;
    }

    /// Called when a stage finishes without a fatal error.
    fn on_stage_complete(&self, stage: &Stage, elapsed_ms: u64) {
        let _ = (stage, elapsed_ms);
    }

    /// Called when a stage fails; no further stages will run.
    fn on_stage_error(&self, stage: &Stage, error: &str) {
        let _ = (stage, error);
    }

    /// Called once after presentation.
    ///
    /// `rendered` is `false` when latexmk produced no PDF and the caller is
    /// about to receive the fallback bundle instead.
    fn on_pipeline_complete(&self, rendered: bool) {
        let _ = rendered;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl DiffProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::DiffConfig`].
pub type ProgressCallback = Arc<dyn DiffProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingCallback {
        events: Mutex<Vec<String>>,
    }

    impl DiffProgressCallback for RecordingCallback {
        fn on_stage_start(&self, stage: &Stage) {
            self.events.lock().unwrap().push(format!("start {stage}"));
        }

        fn on_stage_complete(&self, stage: &Stage, _elapsed_ms: u64) {
            self.events.lock().unwrap().push(format!("done {stage}"));
        }

        fn on_stage_error(&self, stage: &Stage, error: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("error {stage}: {error}"));
        }

        fn on_pipeline_complete(&self, rendered: bool) {
            self.events
                .lock()
                .unwrap()
                .push(format!("complete rendered={rendered}"));
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage_start(&Stage::Diff);
        cb.on_stage_complete(&Stage::Diff, 12);
        cb.on_stage_error(&Stage::Compile, "boom");
        cb.on_pipeline_complete(false);
    }

    #[test]
    fn recording_callback_receives_events_in_order() {
        let cb = RecordingCallback::default();
        cb.on_stage_start(&Stage::Fetch("1".into()));
        cb.on_stage_complete(&Stage::Fetch("1".into()), 5);
        cb.on_stage_start(&Stage::Diff);
        cb.on_stage_error(&Stage::Diff, "exit 2");

        let events = cb.events.lock().unwrap();
        assert_eq!(
            *events,
            vec![
                "start fetch v1",
                "done fetch v1",
                "start latexdiff",
                "error latexdiff: exit 2",
            ]
        );
    }

    #[test]
    fn stage_descriptions_mention_revision() {
        assert_eq!(Stage::Fetch("2".into()).describe(), "Downloading v2…");
        assert!(Stage::Locate("1".into()).describe().contains("v1"));
        assert_eq!(Stage::Compile.describe(), "Compiling PDF…");
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_stage_start(&Stage::Present);
        cb.on_pipeline_complete(true);
    }
}
