//! Running external programs with a hard time limit.
//!
//! latexdiff and latexmk are opaque collaborators: this module only knows how
//! to start them, feed them nothing on stdin, collect what they print, and
//! kill them, along with everything they spawned, when they exceed
//! `tool_timeout_secs` or the caller abandons the run. Interpreting the exit
//! status is left to the caller, because the two tools are judged
//! differently (latexdiff by exit code, latexmk by the files it leaves).

use crate::error::ArxivDiffError;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::{debug, warn};

/// Where a tool's standard output goes.
#[derive(Debug)]
pub enum StdoutTarget {
    /// Captured into [`ToolRun::stdout`].
    Capture,
    /// Written straight into this file (created or truncated).
    File(PathBuf),
}

/// One external program invocation.
#[derive(Debug)]
pub struct ToolInvocation<'a> {
    pub program: &'a str,
    pub args: Vec<String>,
    pub cwd: &'a Path,
    pub stdout: StdoutTarget,
    pub timeout: Duration,
}

/// A completed (not timed out) run.
#[derive(Debug)]
pub struct ToolRun {
    pub status: ExitStatus,
    /// Empty when stdout was redirected to a file.
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl ToolRun {
    /// stdout followed by stderr, for diagnostics.
    pub fn combined_output(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }
}

/// How long to keep reading a tool's output after it has exited. Anything
/// still holding its pipes past this is a leftover child and gets killed.
const PIPE_DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Run a program to completion or until its time limit.
///
/// On unix the program leads its own process group, so a timeout kills
/// everything it started (latexmk's TeX engine included), not only the
/// direct child. Completion is the program's own exit; output still held
/// open by helpers it left running is collected for at most
/// [`PIPE_DRAIN_GRACE`].
///
/// # Errors
/// * [`ArxivDiffError::ToolNotFound`]: the program does not exist.
/// * [`ArxivDiffError::ToolTimeout`]: the limit elapsed; the process group
///   has been killed.
/// * [`ArxivDiffError::Io`]: any other spawn or wait failure.
pub async fn run_tool(invocation: ToolInvocation<'_>) -> Result<ToolRun, ArxivDiffError> {
    let ToolInvocation {
        program,
        args,
        cwd,
        stdout,
        timeout,
    } = invocation;

    let stdout_stdio = match &stdout {
        StdoutTarget::Capture => Stdio::piped(),
        StdoutTarget::File(path) => {
            let file = File::create(path)
                .map_err(|e| ArxivDiffError::io("creating tool output file", path, e))?;
            Stdio::from(file)
        }
    };

    let mut cmd = Command::new(program);
    cmd.args(&args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(stdout_stdio)
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    debug!("Running {} {:?} in {}", program, args, cwd.display());
    let start = Instant::now();

    let mut child = cmd.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ArxivDiffError::ToolNotFound {
                program: program.to_string(),
            }
        } else {
            ArxivDiffError::io("starting", program, e)
        }
    })?;
    // The group id equals the leader's pid; keep it, `id()` is gone once
    // the child has been reaped.
    let group = child.id();
    let guard = GroupGuard(group);
    let mut output = tokio::spawn(read_pipes(child.stdout.take(), child.stderr.take()));

    let status = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => status,
        Ok(Err(e)) => {
            guard.disarm();
            kill_tree(&mut child, group);
            output.abort();
            return Err(ArxivDiffError::io("waiting for", program, e));
        }
        Err(_) => {
            guard.disarm();
            kill_tree(&mut child, group);
            if let Err(e) = child.wait().await {
                debug!("reaping {} after kill: {}", program, e);
            }
            output.abort();
            warn!("{} timed out after {:?}; killed", program, timeout);
            return Err(ArxivDiffError::ToolTimeout {
                program: program.to_string(),
                secs: timeout.as_secs(),
            });
        }
    };
    guard.disarm();
    let duration = start.elapsed();
    debug!("{} exited with {} after {:?}", program, status, duration);

    let drained = tokio::time::timeout(PIPE_DRAIN_GRACE, &mut output).await;
    let (stdout, stderr) = match drained {
        Ok(joined) => joined.unwrap_or_default(),
        Err(_) => {
            debug!("{} exited but left processes holding its output; killing them", program);
            if let Some(group) = group {
                kill_group(group);
            }
            let retried = tokio::time::timeout(PIPE_DRAIN_GRACE, &mut output).await;
            match retried {
                Ok(joined) => joined.unwrap_or_default(),
                Err(_) => {
                    output.abort();
                    Default::default()
                }
            }
        }
    };

    Ok(ToolRun {
        status,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        duration,
    })
}

/// Kills the tool's process group when a run is dropped before the tool
/// exits. `kill_on_drop` alone would only reach the group leader.
struct GroupGuard(Option<u32>);

impl GroupGuard {
    fn disarm(mut self) {
        self.0 = None;
    }
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        if let Some(group) = self.0 {
            kill_group(group);
        }
    }
}

async fn read_pipes(stdout: Option<ChildStdout>, stderr: Option<ChildStderr>) -> (Vec<u8>, Vec<u8>) {
    tokio::join!(read_all(stdout), read_all(stderr))
}

async fn read_all<R: AsyncRead + Unpin>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        if let Err(e) = pipe.read_to_end(&mut buf).await {
            debug!("reading tool output: {}", e);
        }
    }
    buf
}

/// SIGKILL the whole process group led by the tool.
#[cfg(unix)]
fn kill_group(group: u32) {
    // SAFETY: killpg only sends a signal; the group was created for this tool.
    let rc = unsafe { libc::killpg(group as libc::pid_t, libc::SIGKILL) };
    if rc != 0 {
        debug!(
            "killpg({}) failed: {}",
            group,
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn kill_group(_group: u32) {}

fn kill_tree(child: &mut Child, group: Option<u32>) {
    match group {
        Some(group) if cfg!(unix) => kill_group(group),
        _ => {
            if let Err(e) = child.start_kill() {
                debug!("killing tool: {}", e);
            }
        }
    }
}

/// Run `program --version` and return the first non-empty output line.
pub async fn probe_version(program: &str, timeout: Duration) -> Result<String, ArxivDiffError> {
    let cwd = std::env::temp_dir();
    let run = run_tool(ToolInvocation {
        program,
        args: vec!["--version".to_string()],
        cwd: &cwd,
        stdout: StdoutTarget::Capture,
        timeout,
    })
    .await?;

    let version = run
        .combined_output()
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("")
        .to_string();
    Ok(version)
}
