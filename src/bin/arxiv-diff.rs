//! CLI binary for arxiv-diff.
//!
//! A thin shim over the library crate that maps CLI flags to `DiffConfig`,
//! saves the result, and prints a summary.

use anyhow::{Context, Result};
use arxiv_diff::{
    check_tools, generate_to_dir, DiffConfig, DiffProgressCallback, DiffRequest,
    ProgressCallback, Stage,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one spinner whose message tracks the current stage,
/// with a log line printed above it as each stage finishes.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("arxiv-diff");
        bar.set_message("Starting…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl DiffProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: &Stage) {
        self.bar.set_message(stage.describe());
    }

    fn on_stage_complete(&self, stage: &Stage, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} {:<14} {}",
            green("✓"),
            stage.to_string(),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_stage_error(&self, stage: &Stage, error: &str) {
        let first_line = error.lines().next().unwrap_or(error);
        self.bar.println(format!(
            "  {} {:<14} {}",
            red("✗"),
            stage.to_string(),
            red(first_line)
        ));
        self.bar.finish_and_clear();
    }

    fn on_pipeline_complete(&self, rendered: bool) {
        self.bar.finish_and_clear();
        if rendered {
            eprintln!("{} Diff PDF compiled", green("✔"));
        } else {
            eprintln!(
                "{} latexmk produced no PDF; saving the source bundle instead",
                yellow("⚠")
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Diff v1 against v2, writing the PDF into the current directory
  arxiv-diff 2303.00096 1 2

  # Old-style identifier, results into ./diffs
  arxiv-diff hep-th/9901001 1 3 -o diffs

  # Machine-readable summary
  arxiv-diff --json 2303.00096 v1 v2

  # Check that latexdiff and latexmk are installed
  arxiv-diff --check-tools

OUTPUT:
  On success:  <id>_v<old>_to_v<new>_diff.pdf
  If latexmk produced no PDF:
               <id>_v<old>_to_v<new>_source.tar.gz  (sources + diff.tex)
               <id>_v<old>_to_v<new>_build.log      (latexmk output)

ENVIRONMENT VARIABLES:
  ARXIV_DIFF_BASE_URL          E-print host (default https://arxiv.org)
  ARXIV_DIFF_USER_AGENT        User-Agent for downloads
  ARXIV_DIFF_LATEXDIFF         latexdiff executable
  ARXIV_DIFF_LATEXMK           latexmk executable
  ARXIV_DIFF_DOWNLOAD_TIMEOUT  Per-download timeout in seconds
  ARXIV_DIFF_TOOL_TIMEOUT      Per-tool timeout in seconds
  ARXIV_DIFF_WORK_DIR          Where temporary working roots are created
  RUST_LOG                     Overrides the log filter

REQUIREMENTS:
  latexdiff, latexmk and a pdflatex engine, e.g. from TeX Live or MiKTeX.
"#;

/// Render the changes between two revisions of an arXiv paper as a PDF.
#[derive(Parser, Debug)]
#[command(
    name = "arxiv-diff",
    version,
    about = "Render the changes between two revisions of an arXiv paper as a PDF",
    long_about = "Download the LaTeX sources of two revisions of an arXiv paper, run latexdiff \
on their main files, and compile the result with latexmk. When compilation produces no PDF, \
the new revision's sources (including diff.tex) are saved as a .tar.gz together with the \
build log so the diff can be finished locally.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// arXiv identifier, e.g. 2303.00096 or hep-th/9901001 (no version suffix).
    #[arg(required_unless_present = "check_tools")]
    identifier: Option<String>,

    /// Old revision number (e.g. 1 or v1).
    #[arg(required_unless_present = "check_tools")]
    old: Option<String>,

    /// New revision number (e.g. 2 or v2).
    #[arg(required_unless_present = "check_tools")]
    new: Option<String>,

    /// Directory to write the PDF (or bundle and build log) into.
    #[arg(short, long, env = "ARXIV_DIFF_OUTPUT_DIR", default_value = ".")]
    output_dir: PathBuf,

    /// E-print host.
    #[arg(long, env = "ARXIV_DIFF_BASE_URL", default_value = arxiv_diff::config::DEFAULT_BASE_URL)]
    base_url: String,

    /// User-Agent header sent with downloads.
    #[arg(long, env = "ARXIV_DIFF_USER_AGENT")]
    user_agent: Option<String>,

    /// latexdiff executable.
    #[arg(long, env = "ARXIV_DIFF_LATEXDIFF", default_value = "latexdiff")]
    latexdiff: String,

    /// latexmk executable.
    #[arg(long, env = "ARXIV_DIFF_LATEXMK", default_value = "latexmk")]
    latexmk: String,

    /// Per-download timeout in seconds.
    #[arg(long, env = "ARXIV_DIFF_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Upper bound for each latexdiff / latexmk run, in seconds.
    #[arg(long, env = "ARXIV_DIFF_TOOL_TIMEOUT", default_value_t = 600)]
    tool_timeout: u64,

    /// Create temporary working roots here instead of the system temp dir.
    #[arg(long, env = "ARXIV_DIFF_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Print a JSON summary (report and saved paths) on stdout.
    #[arg(long, env = "ARXIV_DIFF_JSON")]
    json: bool,

    /// Only check that latexdiff and latexmk can be run.
    #[arg(long)]
    check_tools: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "ARXIV_DIFF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "ARXIV_DIFF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "ARXIV_DIFF_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner already reports each stage, so INFO logs would only
    // interleave with it.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.check_tools;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // Reject bad input before the spinner starts.
    let request = request_from_cli(&cli)?;

    let spinner = show_progress.then(CliProgressCallback::new);
    let progress_cb: Option<ProgressCallback> = spinner
        .clone()
        .map(|s| s as Arc<dyn DiffProgressCallback>);
    let config = match build_config(&cli, progress_cb) {
        Ok(config) => config,
        Err(e) => {
            clear_spinner(&spinner);
            return Err(e);
        }
    };

    // ── Tool check mode ──────────────────────────────────────────────────
    let Some(request) = request else {
        return run_check_tools(&cli, &config).await;
    };

    // ── Run diff ─────────────────────────────────────────────────────────
    // Tools run in their own process groups, so Ctrl-C does not reach them
    // directly; dropping the run kills them and removes the working root.
    let outcome = tokio::select! {
        outcome = generate_to_dir(&request, &cli.output_dir, &config) => outcome,
        _ = tokio::signal::ctrl_c() => {
            clear_spinner(&spinner);
            anyhow::bail!("Interrupted");
        }
    };
    let saved = match outcome {
        Ok(saved) => saved,
        Err(e) => {
            // Failures before the first stage never reach `on_stage_error`.
            clear_spinner(&spinner);
            if !cli.quiet {
                eprintln!("{} {}", red("✘"), bold(e.headline()));
            }
            return Err(anyhow::Error::new(e).context(failure_context(&request)));
        }
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&saved).context("Failed to serialise report")?;
        println!("{json}");
        return Ok(());
    }

    if !cli.quiet {
        let stats = &saved.report.stats;
        eprintln!(
            "{}  {}  →  {}",
            if saved.report.outcome.is_rendered() {
                green("✔")
            } else {
                yellow("⚠")
            },
            dim(&format!("{}ms", stats.total_duration_ms)),
            bold(&saved.artifact_path.display().to_string()),
        );
        eprintln!(
            "   {} {} → {}",
            dim("entry points:"),
            stats.old_entry_point.display(),
            stats.new_entry_point.display()
        );
        if let Some(ref log_path) = saved.build_log_path {
            eprintln!("   {} {}", dim("build log:"), log_path.display());
            if let Some(log) = saved.report.outcome.build_log() {
                for line in log_tail(log, 15) {
                    eprintln!("   {}", dim(line));
                }
            }
        }
    }

    Ok(())
}

/// The validated request, or `None` in `--check-tools` mode.
fn request_from_cli(cli: &Cli) -> Result<Option<DiffRequest>> {
    if cli.check_tools {
        return Ok(None);
    }
    match (&cli.identifier, &cli.old, &cli.new) {
        (Some(i), Some(o), Some(n)) => DiffRequest::new(i, o, n)
            .map(Some)
            .context("Invalid input"),
        _ => anyhow::bail!("identifier, old and new revision are required"),
    }
}

fn clear_spinner(spinner: &Option<Arc<CliProgressCallback>>) {
    if let Some(s) = spinner {
        s.bar.finish_and_clear();
    }
}

/// Map CLI args to `DiffConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<DiffConfig> {
    let mut builder = DiffConfig::builder()
        .base_url(cli.base_url.clone())
        .latexdiff_program(cli.latexdiff.clone())
        .latexmk_program(cli.latexmk.clone())
        .download_timeout_secs(cli.download_timeout)
        .tool_timeout_secs(cli.tool_timeout);

    if let Some(ref ua) = cli.user_agent {
        builder = builder.user_agent(ua.clone());
    }
    if let Some(ref dir) = cli.work_dir {
        builder = builder.work_dir_parent(dir.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

async fn run_check_tools(cli: &Cli, config: &DiffConfig) -> Result<()> {
    let reports = check_tools(config).await;

    if cli.json {
        let json = serde_json::to_string_pretty(&reports).context("Failed to serialise report")?;
        println!("{json}");
    } else {
        for r in &reports {
            if r.available {
                println!(
                    "{} {:<12} {}",
                    green("✓"),
                    r.program,
                    dim(r.version.as_deref().unwrap_or("(no version output)"))
                );
            } else {
                println!(
                    "{} {:<12} {}",
                    red("✗"),
                    r.program,
                    red(r.problem.as_deref().unwrap_or("unavailable"))
                );
            }
        }
    }

    if reports.iter().all(|r| r.available) {
        Ok(())
    } else {
        anyhow::bail!("required tools are missing")
    }
}

fn failure_context(request: &DiffRequest) -> String {
    format!(
        "Diff of {} v{} → v{} failed",
        request.identifier(),
        request.old_revision(),
        request.new_revision()
    )
}

/// Last `n` non-empty lines of a build log.
fn log_tail(log: &str, n: usize) -> Vec<&str> {
    let lines: Vec<&str> = log.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].to_vec()
}
