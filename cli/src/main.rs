//! sniff CLI - drives the analyzer from the terminal.
//!
//! Stands in for an editor integration: `check` runs one live analysis,
//! `report` renders the full HTML report, and `watch` keeps documents open and
//! re-analyzes them as they change on disk.

mod watch;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::{
    env,
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{self, Path, PathBuf},
    process::ExitCode,
    sync::Mutex,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use sniff_analyzer::{
    AnalysisManager, AnalysisNotice, AnalyzerConfig, DocumentId, Locator, ReportSession,
    ReportSurface, ReportView, SmellDiagnostic,
};
use sniff_config::SniffConfig;

#[derive(Parser, Debug)]
#[command(name = "sniff")]
#[command(about = "Live code-smell diagnostics from an external analyzer")]
#[command(version)]
struct Cli {
    /// Config file to use instead of ~/.sniff/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Mirror logs to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a file once and print its diagnostics
    Check { file: PathBuf },
    /// Render the full report for a file
    Report {
        file: PathBuf,
        /// Write the HTML here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Re-analyze files whenever they change (Ctrl-C to stop)
    Watch {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

/// File logging always; `--verbose` mirrors to stderr. Stdout carries
/// diagnostics and reports only.
fn init_tracing(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, opened) = match open_log_file(&log_file_candidates()) {
        Ok((path, file)) => (
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file))),
            Ok(path),
        ),
        Err(failures) => (None, Err(failures)),
    };

    tracing_subscriber::registry()
        .with(file_layer)
        .with(verbose.then(|| fmt::layer().with_writer(io::stderr)))
        .with(env_filter)
        .init();

    match opened {
        Ok(path) => tracing::info!(path = %path.display(), "Logging initialized"),
        Err(failures) => {
            for failure in failures {
                tracing::warn!("Log file unavailable: {failure}");
            }
        }
    }
}

/// `~/.sniff/logs/sniff.log`, then `./.sniff/logs/sniff.log`.
fn log_file_candidates() -> Vec<PathBuf> {
    SniffConfig::path()
        .and_then(|config| config.parent().map(Path::to_path_buf))
        .into_iter()
        .chain([PathBuf::from(".sniff")])
        .map(|dir| dir.join("logs").join("sniff.log"))
        .collect()
}

/// Open the first usable candidate for appending, or report why none was.
fn open_log_file(candidates: &[PathBuf]) -> Result<(PathBuf, fs::File), Vec<String>> {
    let mut failures = Vec::new();
    for path in candidates {
        let opened = path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|()| OpenOptions::new().create(true).append(true).open(path));
        match opened {
            Ok(file) => return Ok((path.clone(), file)),
            Err(e) => failures.push(format!("{}: {e}", path.display())),
        }
    }
    Err(failures)
}

fn load_config(explicit: Option<&Path>) -> Result<AnalyzerConfig> {
    let config = match explicit {
        Some(path) => SniffConfig::load_from(path)?,
        None => SniffConfig::load().unwrap_or_default(),
    };
    Ok(config.analyzer())
}

/// Directory holding the `sniff` binary; relative search entries hang off it.
fn install_root() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Absolute path of a supported document given on the command line.
fn document_path(config: &AnalyzerConfig, file: &Path) -> Result<PathBuf> {
    let path = path::absolute(file)
        .with_context(|| format!("failed to resolve {}", file.display()))?;
    if !config.handles(&DocumentId::from(path.as_path())) {
        bail!(
            "{} is not a supported document (expected one of: {})",
            path.display(),
            config.file_extensions().join(", ")
        );
    }
    Ok(path)
}

fn print_diagnostics(path: &Path, diagnostics: &[SmellDiagnostic]) {
    let mut out = io::stdout().lock();
    for diag in diagnostics {
        let _ = writeln!(out, "{}", diag.display_with_path(path));
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("sniff: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(cli.config.as_deref())?;
    let root = install_root();

    match cli.command {
        Command::Check { file } => check(config, root, &file).await,
        Command::Report { file, output } => report(config, root, &file, output.as_deref()).await,
        Command::Watch { files } => watch::run(config, root, &files).await,
    }
}

async fn check(config: AnalyzerConfig, root: PathBuf, file: &Path) -> Result<ExitCode> {
    let path = document_path(&config, file)?;
    let text = fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    // The manager only logs a missing analyzer; surface it here instead.
    Locator::new(&config, &root).resolve()?;

    let mut manager = AnalysisManager::new(config, root);
    manager.on_document_opened(&path, &text);

    while manager.next_event().await {
        for notice in manager.take_notices() {
            match notice {
                AnalysisNotice::DiagnosticsChanged { .. } => {
                    let diagnostics = manager.diagnostics_for(&path);
                    print_diagnostics(&path, diagnostics);
                    if diagnostics.is_empty() {
                        eprintln!("{}: no issues", path.display());
                    }
                    return Ok(ExitCode::SUCCESS);
                }
                AnalysisNotice::Failed { error, .. } => {
                    eprintln!("sniff: analysis of {} failed: {error}", path.display());
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
    }
    bail!("analysis ended without a result")
}

/// Keeps the last rendered page; progress goes to stderr.
#[derive(Default)]
struct HtmlCapture {
    html: String,
}

impl ReportSurface for HtmlCapture {
    fn show(&mut self, title: &str, view: &ReportView) {
        if matches!(view, ReportView::Loading) {
            eprintln!("{title}: running analysis...");
        }
        self.html = view.to_html(title);
    }
}

async fn report(
    config: AnalyzerConfig,
    root: PathBuf,
    file: &Path,
    output: Option<&Path>,
) -> Result<ExitCode> {
    let path = path::absolute(file)
        .with_context(|| format!("failed to resolve {}", file.display()))?;
    let session = ReportSession::new(config, root);
    let mut capture = HtmlCapture::default();
    let view = session.start(&path, &mut capture).await?;

    match output {
        Some(out) => fs::write(out, &capture.html)
            .with_context(|| format!("failed to write report to {}", out.display()))?,
        None => io::stdout()
            .lock()
            .write_all(capture.html.as_bytes())
            .context("failed to write report")?,
    }

    if let ReportView::Failed(text) = &view {
        eprintln!("sniff: report failed:\n{text}");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
