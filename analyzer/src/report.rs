//! Report session - the user-initiated full report.
//!
//! A session is a one-shot future: it shows a loading view, runs the analyzer
//! in `FullReport` mode against the file as saved on disk, then shows either
//! the rendered report or a failure page. Report sessions never touch the live
//! diagnostic set.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::codec::{self, ProtocolError};
use crate::invoker::{Invoke, ProcessInvoker};
use crate::locator::Locator;
use crate::types::{AnalysisMode, AnalysisRequest, AnalyzerConfig, DocumentId};

const NO_OUTPUT: &str = "Analyzer finished but returned no output. \
     Check the sniff log for anything the analyzer wrote before exiting.";

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("{} is not a supported document", .0.display())]
    UnsupportedDocument(PathBuf),
}

/// What the report surface should currently display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportView {
    Loading,
    /// Analyzer output, displayed verbatim.
    Rendered(String),
    /// Human-readable failure text (not yet escaped).
    Failed(String),
}

impl ReportView {
    /// Full HTML page for this view.
    #[must_use]
    pub fn to_html(&self, title: &str) -> String {
        match self {
            Self::Rendered(html) => html.clone(),
            Self::Loading => page(
                title,
                "<p class=\"loading\">Running analysis&hellip;</p>",
            ),
            Self::Failed(text) => page(
                title,
                &format!(
                    "<h2>Analysis failed</h2>\n<pre class=\"error\">{}</pre>",
                    escape_html(text)
                ),
            ),
        }
    }
}

fn page(title: &str, body: &str) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n\
         <style>body {{ font-family: sans-serif; padding: 1em; }} \
         pre.error {{ white-space: pre-wrap; color: #c33; }}</style>\n\
         </head>\n<body>\n<h1>{title}</h1>\n{body}\n</body>\n</html>\n",
        title = escape_html(title),
    );
    out
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Where report views are displayed (a webview, a file, stdout).
pub trait ReportSurface {
    fn show(&mut self, title: &str, view: &ReportView);
}

/// Runs full reports with a shared locator and invoker.
#[derive(Clone)]
pub struct ReportSession {
    config: AnalyzerConfig,
    locator: Locator,
    invoker: Arc<dyn Invoke>,
}

impl ReportSession {
    /// Build a session that spawns real analyzer processes.
    #[must_use]
    pub fn new(config: AnalyzerConfig, install_root: impl Into<PathBuf>) -> Self {
        let locator = Locator::new(&config, install_root);
        let invoker = Arc::new(ProcessInvoker::new(config.timeout()));
        Self::with_invoker(config, locator, invoker)
    }

    #[must_use]
    pub fn with_invoker(config: AnalyzerConfig, locator: Locator, invoker: Arc<dyn Invoke>) -> Self {
        Self {
            config,
            locator,
            invoker,
        }
    }

    /// Report title for a document: `Smell Report: <file name>`.
    #[must_use]
    pub fn title(document: &Path) -> String {
        format!("Smell Report: {}", DocumentId::from(document).file_name())
    }

    /// Generate a report for `document`, driving `surface` through
    /// loading and then the final view, which is also returned.
    pub async fn start(
        &self,
        document: &Path,
        surface: &mut dyn ReportSurface,
    ) -> Result<ReportView, ReportError> {
        let document = DocumentId::from(document);
        if !self.config.handles(&document) {
            return Err(ReportError::UnsupportedDocument(document.path().to_path_buf()));
        }

        let title = Self::title(document.path());
        surface.show(&title, &ReportView::Loading);
        let view = self.run(document).await;
        surface.show(&title, &view);
        Ok(view)
    }

    async fn run(&self, document: DocumentId) -> ReportView {
        let target = match self.locator.resolve() {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!("Report aborted: {e}");
                return ReportView::Failed(format!(
                    "Could not locate the analyzer.\n\n{e}\n\n\
                     Add a `search` entry under [analyzer] in the sniff config."
                ));
            }
        };

        tracing::info!(
            document = %document,
            program = %target.program().display(),
            "Generating report"
        );
        let request = AnalysisRequest {
            document,
            text: String::new(),
            mode: AnalysisMode::FullReport,
            sequence: 0,
        };
        let outcome = self.invoker.invoke(&target, codec::encode(&request)).await;

        match codec::decode_report(outcome) {
            Ok(html) if html.trim().is_empty() => ReportView::Failed(NO_OUTPUT.to_string()),
            Ok(html) => ReportView::Rendered(html),
            Err(e @ ProtocolError::Process { .. }) => {
                tracing::warn!(document = %request.document, "Report failed: {e}");
                ReportView::Failed(format!(
                    "Failed to start the analyzer `{}`.\n\nError: {}",
                    target.program().display(),
                    e.detail()
                ))
            }
            Err(e) => {
                tracing::warn!(document = %request.document, "Report failed: {e}");
                ReportView::Failed(e.detail())
            }
        }
    }
}
