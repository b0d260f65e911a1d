//! Live code-smell analysis for open documents.
//!
//! Drives an external analyzer process on document open, save and (debounced)
//! edit, and reconciles its findings into per-document diagnostics. A separate
//! one-shot flow renders the analyzer's full report.

pub mod codec;
pub mod invoker;
pub mod locator;
pub mod report;
pub mod types;

pub(crate) mod reconciler;
pub(crate) mod scheduler;
pub(crate) mod session;

mod manager;

pub use codec::{DecodedResult, EncodedRequest, ProtocolError};
pub use invoker::{Invoke, InvokeFut, ProcessInvoker};
pub use locator::{AnalyzerTarget, Locator, LocatorError};
pub use manager::AnalysisManager;
pub use report::{ReportError, ReportSession, ReportSurface, ReportView};
pub use types::{
    AnalysisMode, AnalysisNotice, AnalysisRequest, AnalyzerConfig, AnalyzerConfigError,
    AnalyzerOutcome, DiagnosticsSnapshot, DocumentId, Issue, Launcher, SearchStrategy, Severity,
    SmellDiagnostic,
};
