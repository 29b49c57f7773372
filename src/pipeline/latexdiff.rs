//! Diff invocation: run latexdiff on the two entry points.
//!
//! latexdiff writes the marked-up document to stdout; it is redirected into
//! `diff.tex` inside the new revision's directory so the diff compiles
//! against the new revision's figures, styles, and `\input` fragments.

use crate::config::DiffConfig;
use crate::error::ArxivDiffError;
use crate::pipeline::tool::{run_tool, StdoutTarget, ToolInvocation};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Name of the generated diff document inside the new revision's directory.
pub const DIFF_FILE_NAME: &str = "diff.tex";

/// Math is left unmarked: latexdiff's math markup frequently breaks
/// compilation of display environments.
const MATH_MARKUP_FLAG: &str = "--math-markup=0";

const DOCUMENT_END_MARKER: &str = "\\end{document}";

/// Run latexdiff and return the path of the validated `diff.tex`.
///
/// # Errors
/// * [`ArxivDiffError::DiffToolFailed`]: latexdiff exited non-zero.
/// * [`ArxivDiffError::InvalidDiffOutput`]: it exited zero but the output
///   is empty or has no `\end{document}`.
/// * [`ArxivDiffError::ToolNotFound`] / [`ArxivDiffError::ToolTimeout`].
pub async fn run_latexdiff(
    config: &DiffConfig,
    old_entry: &Path,
    new_entry: &Path,
    new_dir: &Path,
) -> Result<PathBuf, ArxivDiffError> {
    // The child runs in `new_dir`, so relative entry points would resolve
    // against the wrong directory.
    let old_abs = absolute(old_entry)?;
    let new_abs = absolute(new_entry)?;
    let diff_path = new_dir.join(DIFF_FILE_NAME);

    info!(
        "latexdiff {} → {}",
        old_abs.display(),
        new_abs.display()
    );

    let run = run_tool(ToolInvocation {
        program: &config.latexdiff_program,
        args: vec![
            MATH_MARKUP_FLAG.to_string(),
            old_abs.to_string_lossy().into_owned(),
            new_abs.to_string_lossy().into_owned(),
        ],
        cwd: new_dir,
        stdout: StdoutTarget::File(diff_path.clone()),
        timeout: Duration::from_secs(config.tool_timeout_secs),
    })
    .await?;

    if !run.status.success() {
        warn!("latexdiff exited with {}", run.status);
        return Err(ArxivDiffError::DiffToolFailed {
            code: run.status.code(),
            stderr: run.stderr.trim_end().to_string(),
        });
    }

    validate_diff_output(&diff_path)?;
    info!("Diff document written to {}", diff_path.display());
    Ok(diff_path)
}

/// Reject a `diff.tex` that cannot be a complete LaTeX document.
pub fn validate_diff_output(path: &Path) -> Result<(), ArxivDiffError> {
    let bytes =
        std::fs::read(path).map_err(|e| ArxivDiffError::io("reading diff output", path, e))?;

    let reason = if bytes.iter().all(u8::is_ascii_whitespace) {
        "output is empty"
    } else if !String::from_utf8_lossy(&bytes).contains(DOCUMENT_END_MARKER) {
        "output has no \\end{document}"
    } else {
        return Ok(());
    };

    Err(ArxivDiffError::InvalidDiffOutput {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    })
}

fn absolute(path: &Path) -> Result<PathBuf, ArxivDiffError> {
    path.canonicalize()
        .map_err(|e| ArxivDiffError::io("resolving entry point", path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn validate_accepts_complete_document() {
        let tmp = TempDir::new().unwrap();
        let p = tmp.path().join(DIFF_FILE_NAME);
        std::fs::write(&p, "\\begin{document}\\DIFadd{x}\\end{document}\n").unwrap();
        assert!(validate_diff_output(&p).is_ok());
    }

    #[test]
    fn validate_rejects_empty_output() {
        let tmp = TempDir::new().unwrap();
        let p = tmp.path().join(DIFF_FILE_NAME);
        std::fs::write(&p, "\n  \n").unwrap();
        let err = validate_diff_output(&p).unwrap_err();
        assert!(
            matches!(&err, ArxivDiffError::InvalidDiffOutput { reason, .. } if reason.contains("empty")),
            "got: {err:?}"
        );
    }

    #[test]
    fn validate_rejects_truncated_output() {
        let tmp = TempDir::new().unwrap();
        let p = tmp.path().join(DIFF_FILE_NAME);
        std::fs::write(&p, "\\begin{document}\nhalf a paper").unwrap();
        let err = validate_diff_output(&p).unwrap_err();
        assert!(matches!(err, ArxivDiffError::InvalidDiffOutput { .. }));
    }

    #[cfg(unix)]
    mod with_fake_tool {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn script(dir: &Path, body: &str) -> String {
            let p = dir.join("fake-latexdiff");
            std::fs::write(&p, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&p, std::fs::Permissions::from_mode(0o755)).unwrap();
            p.to_string_lossy().into_owned()
        }

        fn entries(root: &Path) -> (PathBuf, PathBuf, PathBuf) {
            let old_dir = root.join("v1");
            let new_dir = root.join("v2");
            std::fs::create_dir_all(&old_dir).unwrap();
            std::fs::create_dir_all(&new_dir).unwrap();
            std::fs::write(old_dir.join("main.tex"), "\\begin{document}old\\end{document}").unwrap();
            std::fs::write(new_dir.join("main.tex"), "\\begin{document}new\\end{document}").unwrap();
            (old_dir.join("main.tex"), new_dir.join("main.tex"), new_dir)
        }

        #[tokio::test]
        async fn passes_flag_and_absolute_paths_and_captures_stdout() {
            let tmp = TempDir::new().unwrap();
            let tools = TempDir::new().unwrap();
            let (old, new, new_dir) = entries(tmp.path());
            // Echo the argv back inside a valid document.
            let program = script(
                tools.path(),
                "printf '%s\\n' '\\begin{document}'; for a in \"$@\"; do printf 'ARG %s\\n' \"$a\"; done; printf '%s\\n' '\\end{document}'",
            );
            let config = DiffConfig::builder()
                .latexdiff_program(program)
                .build()
                .unwrap();

            let diff = run_latexdiff(&config, &old, &new, &new_dir).await.unwrap();

            assert_eq!(diff, new_dir.join(DIFF_FILE_NAME));
            let out = std::fs::read_to_string(&diff).unwrap();
            assert!(out.contains("ARG --math-markup=0"), "got: {out}");
            assert!(out.contains(&format!("ARG {}", old.canonicalize().unwrap().display())));
            assert!(out.contains(&format!("ARG {}", new.canonicalize().unwrap().display())));
        }

        #[tokio::test]
        async fn nonzero_exit_is_diff_tool_failed_with_stderr() {
            let tmp = TempDir::new().unwrap();
            let tools = TempDir::new().unwrap();
            let (old, new, new_dir) = entries(tmp.path());
            let program = script(tools.path(), "echo 'Missing \\begin{document}' >&2; exit 2");
            let config = DiffConfig::builder()
                .latexdiff_program(program)
                .build()
                .unwrap();

            let err = run_latexdiff(&config, &old, &new, &new_dir).await.unwrap_err();
            match err {
                ArxivDiffError::DiffToolFailed { code, stderr } => {
                    assert_eq!(code, Some(2));
                    assert!(stderr.contains("Missing"));
                }
                other => panic!("expected DiffToolFailed, got {other:?}"),
            }
        }

        #[tokio::test]
        async fn clean_exit_with_empty_output_is_rejected() {
            let tmp = TempDir::new().unwrap();
            let tools = TempDir::new().unwrap();
            let (old, new, new_dir) = entries(tmp.path());
            let program = script(tools.path(), "exit 0");
            let config = DiffConfig::builder()
                .latexdiff_program(program)
                .build()
                .unwrap();

            let err = run_latexdiff(&config, &old, &new, &new_dir).await.unwrap_err();
            assert!(matches!(err, ArxivDiffError::InvalidDiffOutput { .. }));
        }
    }
}
