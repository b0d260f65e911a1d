//! Public types consumed by hosts.
//!
//! These types define the interface between `sniff-analyzer` and whatever
//! drives it (an editor integration, the `sniff` CLI). The host constructs an
//! [`AnalyzerConfig`], feeds document events into the
//! [`AnalysisManager`](crate::AnalysisManager), and reads
//! [`DiagnosticsSnapshot`]s for display.

use std::fmt;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::codec::ProtocolError;

const DEFAULT_DEBOUNCE_MS: u64 = 500;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

const DEFAULT_SOURCE_LABEL: &str = "Smelly Python";

const DEFAULT_SCRIPT: &str = "../smelly_python/main.py";

/// Identity of an open document: its absolute file path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId(PathBuf);

impl DocumentId {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.0
    }

    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        self.0.extension().and_then(|e| e.to_str())
    }

    /// Final path component, for titles and log lines.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.0.file_name().map_or_else(
            || self.0.display().to_string(),
            |name| name.to_string_lossy().into_owned(),
        )
    }
}

impl From<&Path> for DocumentId {
    fn from(path: &Path) -> Self {
        Self(path.to_path_buf())
    }
}

impl From<PathBuf> for DocumentId {
    fn from(path: PathBuf) -> Self {
        Self(path)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Severity level for an issue or diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Error,
    Warning,
    Information,
}

impl Severity {
    /// Parse the analyzer's wire spelling (`"Error"`, `"Warning"`, `"Information"`).
    ///
    /// Returns `None` for anything else. Callers (boundary code) decide the
    /// fallback policy.
    #[must_use]
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "Error" => Some(Self::Error),
            "Warning" => Some(Self::Warning),
            "Information" => Some(Self::Information),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_error(self) -> bool {
        self == Self::Error
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Information => "info",
        }
    }
}

/// One analyzer finding, before it is projected onto a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    /// 1-based line number.
    line: NonZeroU32,
    message: String,
    severity: Severity,
}

impl Issue {
    #[must_use]
    pub fn new(line: NonZeroU32, message: String, severity: Severity) -> Self {
        Self {
            line,
            message,
            severity,
        }
    }

    /// 1-based line number.
    #[must_use]
    pub fn line(&self) -> NonZeroU32 {
        self.line
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }
}

/// A diagnostic attached to a document.
///
/// Always spans a whole logical line: it starts at column 0 and has no end
/// column. Fields are private; construction goes through the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmellDiagnostic {
    severity: Severity,
    message: String,
    /// 0-indexed line number.
    line: u32,
    source: String,
}

impl SmellDiagnostic {
    #[must_use]
    pub fn new(severity: Severity, message: String, line: u32, source: String) -> Self {
        Self {
            severity,
            message,
            line,
            source,
        }
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        self.severity
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 0-indexed line number.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }

    /// 0-indexed start column. Always 0.
    #[must_use]
    pub fn col(&self) -> u32 {
        0
    }

    /// End column; `None` means "to the end of the line".
    #[must_use]
    pub fn end_col(&self) -> Option<u32> {
        None
    }

    /// Tool label (e.g. "Smelly Python").
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Format as `path:line:col: severity: [source] message` (1-indexed for display).
    #[must_use]
    pub fn display_with_path(&self, path: &Path) -> String {
        format!(
            "{}:{}:{}: {}: [{}] {}",
            path.display(),
            self.line + 1,
            self.col() + 1,
            self.severity.label(),
            self.source,
            self.message,
        )
    }
}

/// How the analyzer is asked to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisMode {
    /// Structured JSON findings for the in-memory text, sent over stdin.
    LiveStdin,
    /// Rendered HTML report of the file as saved on disk.
    FullReport,
}

/// One request to the analyzer.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub document: DocumentId,
    /// Document text at scheduling time. Not transmitted in `FullReport` mode.
    pub text: String,
    pub mode: AnalysisMode,
    /// Correlation token, strictly increasing per document.
    pub sequence: u64,
}

/// Terminal result of one analyzer invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalyzerOutcome {
    /// Exit code 0; raw stdout.
    Success(Vec<u8>),
    /// The process could not be started, fed, or finished in time.
    ProcessError(String),
    /// The process ran and reported failure. `code` is `None` when it was
    /// terminated by a signal.
    NonZeroExit { code: Option<i32>, stderr: String },
}

/// Event flowing from timer and invocation tasks back to the manager.
#[derive(Debug)]
pub(crate) enum AnalyzerEvent {
    TimerFired {
        document: DocumentId,
        token: u64,
    },
    Completed {
        document: DocumentId,
        sequence: u64,
        result: Result<Vec<Issue>, ProtocolError>,
    },
}

/// Something the host may want to react to, queued by the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisNotice {
    /// A document's diagnostic set was replaced (or cleared, `count == 0`).
    DiagnosticsChanged { document: DocumentId, count: usize },
    /// A live analysis failed; the previous diagnostics were left in place.
    Failed {
        document: DocumentId,
        error: ProtocolError,
    },
}

/// Immutable snapshot of all diagnostics, suitable for rendering.
///
/// Counts are computed from `files`, never cached.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticsSnapshot {
    /// Per-document diagnostics, error-containing documents first.
    files: Vec<(DocumentId, Vec<SmellDiagnostic>)>,
}

impl DiagnosticsSnapshot {
    pub(crate) fn new(files: Vec<(DocumentId, Vec<SmellDiagnostic>)>) -> Self {
        Self { files }
    }

    #[must_use]
    pub fn files(&self) -> &[(DocumentId, Vec<SmellDiagnostic>)] {
        &self.files
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn count_by_severity(&self, severity: Severity) -> usize {
        self.files
            .iter()
            .flat_map(|(_, items)| items)
            .filter(|d| d.severity() == severity)
            .count()
    }

    #[must_use]
    pub fn error_count(&self) -> usize {
        self.count_by_severity(Severity::Error)
    }

    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.count_by_severity(Severity::Warning)
    }

    #[must_use]
    pub fn info_count(&self) -> usize {
        self.count_by_severity(Severity::Information)
    }

    #[must_use]
    pub fn total_count(&self) -> usize {
        self.files.iter().map(|(_, items)| items.len()).sum()
    }

    /// Compact status string like "E:3 W:5 I:1".
    #[must_use]
    pub fn status_string(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        format!(
            "E:{} W:{} I:{}",
            self.error_count(),
            self.warning_count(),
            self.info_count()
        )
    }
}

/// Where to look for the analyzer script, tried in order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStrategy {
    /// Joined onto the install root (the directory holding the host binary).
    RelativeToInstall(PathBuf),
    /// An explicitly configured path.
    Path(PathBuf),
}

/// Interpreter used to run the analyzer script (e.g. `python -u`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launcher {
    command: String,
    args: Vec<String>,
}

impl Launcher {
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum AnalyzerConfigError {
    #[error("analyzer search list must not be empty")]
    EmptySearch,
    #[error("launcher command must not be empty")]
    EmptyLauncher,
    #[error("file_extensions must name at least one extension")]
    NoFileExtensions,
    #[error("source_label must not be empty")]
    EmptySourceLabel,
}

fn default_search() -> Vec<SearchStrategy> {
    vec![SearchStrategy::RelativeToInstall(PathBuf::from(
        DEFAULT_SCRIPT,
    ))]
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_file_extensions() -> Vec<String> {
    vec![String::from("py")]
}

fn default_source_label() -> String {
    String::from(DEFAULT_SOURCE_LABEL)
}

#[derive(Deserialize)]
struct RawAnalyzerConfig {
    launcher: Option<String>,
    #[serde(default)]
    launcher_args: Vec<String>,
    #[serde(default = "default_search")]
    search: Vec<SearchStrategy>,
    #[serde(default = "default_debounce_ms")]
    debounce_ms: u64,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
    #[serde(default = "default_file_extensions")]
    file_extensions: Vec<String>,
    #[serde(default = "default_source_label")]
    source_label: String,
}

/// Validated analyzer configuration.
///
/// Invariant: `search` and `file_extensions` are non-empty, and the launcher
/// (when present) names a command. Enforced via `#[serde(try_from)]` at the
/// deserialization boundary.
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawAnalyzerConfig")]
pub struct AnalyzerConfig {
    launcher: Option<Launcher>,
    search: Vec<SearchStrategy>,
    debounce: Duration,
    /// `None` disables the invocation timeout.
    timeout: Option<Duration>,
    /// Lowercase, without a leading dot.
    file_extensions: Vec<String>,
    source_label: String,
}

impl TryFrom<RawAnalyzerConfig> for AnalyzerConfig {
    type Error = AnalyzerConfigError;

    fn try_from(raw: RawAnalyzerConfig) -> Result<Self, Self::Error> {
        if raw.search.is_empty() {
            return Err(AnalyzerConfigError::EmptySearch);
        }
        let launcher = match raw.launcher {
            Some(command) if command.trim().is_empty() => {
                return Err(AnalyzerConfigError::EmptyLauncher);
            }
            Some(command) => Some(Launcher {
                command,
                args: raw.launcher_args,
            }),
            None => None,
        };
        let file_extensions: Vec<String> = raw
            .file_extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        if file_extensions.is_empty() {
            return Err(AnalyzerConfigError::NoFileExtensions);
        }
        if raw.source_label.trim().is_empty() {
            return Err(AnalyzerConfigError::EmptySourceLabel);
        }
        Ok(Self {
            launcher,
            search: raw.search,
            debounce: Duration::from_millis(raw.debounce_ms),
            timeout: (raw.timeout_secs > 0).then(|| Duration::from_secs(raw.timeout_secs)),
            file_extensions,
            source_label: raw.source_label,
        })
    }
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            launcher: None,
            search: default_search(),
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            timeout: Some(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            file_extensions: default_file_extensions(),
            source_label: default_source_label(),
        }
    }
}

impl AnalyzerConfig {
    #[must_use]
    pub fn launcher(&self) -> Option<&Launcher> {
        self.launcher.as_ref()
    }

    #[must_use]
    pub fn search(&self) -> &[SearchStrategy] {
        &self.search
    }

    #[must_use]
    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    #[must_use]
    pub fn file_extensions(&self) -> &[String] {
        &self.file_extensions
    }

    #[must_use]
    pub fn source_label(&self) -> &str {
        &self.source_label
    }

    /// Whether documents with this path are routed to the analyzer.
    #[must_use]
    pub fn handles(&self, document: &DocumentId) -> bool {
        document.extension().is_some_and(|ext| {
            self.file_extensions
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
    }

    /// Rewrite configured search paths (used for `${VAR}` expansion at load time).
    #[must_use]
    pub fn with_search_paths_mapped(mut self, map: impl Fn(&str) -> String) -> Self {
        for strategy in &mut self.search {
            let (SearchStrategy::RelativeToInstall(path) | SearchStrategy::Path(path)) = strategy;
            *path = PathBuf::from(map(&path.to_string_lossy()));
        }
        self
    }
}
