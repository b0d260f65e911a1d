//! Protocol codec for the analyzer's command-line/stdio contract.
//!
//! Requests become an argument list plus optional stdin:
//!
//! - `FullReport`: `--html <path>`, no stdin (the analyzer reads the saved file).
//! - `LiveStdin`: `--json --stdin <path>`, stdin carries the in-memory text.
//!
//! Live responses are a JSON array of `{ "line", "message", "severity" }`
//! objects. Anything else is a [`ProtocolError::Malformed`], never an empty
//! result, so "no issues" stays distinguishable from "garbage".

use std::num::NonZeroU32;

use serde::Deserialize;

use crate::types::{AnalysisMode, AnalysisRequest, AnalyzerOutcome, Issue, Severity};

/// Maximum number of raw payload bytes kept in a [`ProtocolError::Malformed`].
const MAX_RAW_BYTES: usize = 4 * 1024;

/// Process arguments and stdin for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedRequest {
    pub args: Vec<String>,
    pub stdin: Option<String>,
}

/// Decoded analyzer response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedResult {
    Issues(Vec<Issue>),
    /// Rendered report, passed through untouched.
    Report(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("analyzer could not run: {message}")]
    Process { message: String },
    #[error("analyzer exited with {}: {}", exit_label(.code), non_empty_or(.stderr, "<no stderr>"))]
    NonZeroExit { code: Option<i32>, stderr: String },
    #[error("unparseable analyzer output ({reason}): {raw}")]
    Malformed { raw: String, reason: String },
}

fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| String::from("a signal"), |c| format!("code {c}"))
}

fn non_empty_or<'a>(text: &'a str, fallback: &'a str) -> &'a str {
    if text.trim().is_empty() { fallback } else { text.trim_end() }
}

impl ProtocolError {
    /// The raw text a user needs to diagnose the failure.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Process { message } => message.clone(),
            Self::NonZeroExit { code, stderr } if stderr.trim().is_empty() => format!(
                "Process exited with {}. Unknown error.",
                exit_label(code)
            ),
            Self::NonZeroExit { stderr, .. } => stderr.clone(),
            Self::Malformed { raw, .. } => raw.clone(),
        }
    }
}

/// One element of the live JSON array, as the analyzer writes it.
#[derive(Debug, Deserialize)]
struct WireIssue {
    line: u64,
    message: String,
    #[serde(default)]
    severity: Option<serde_json::Value>,
}

impl WireIssue {
    fn into_issue(self) -> Result<Issue, String> {
        let line = u32::try_from(self.line)
            .ok()
            .and_then(NonZeroU32::new)
            .ok_or_else(|| format!("line {} is not a positive 32-bit line number", self.line))?;
        let severity = self
            .severity
            .as_ref()
            .and_then(serde_json::Value::as_str)
            .and_then(Severity::from_wire)
            .unwrap_or(Severity::Warning);
        Ok(Issue::new(line, self.message, severity))
    }
}

/// Encode a request as process arguments and stdin.
#[must_use]
pub fn encode(request: &AnalysisRequest) -> EncodedRequest {
    let path = request.document.path().to_string_lossy().into_owned();
    match request.mode {
        AnalysisMode::FullReport => EncodedRequest {
            args: vec![String::from("--html"), path],
            stdin: None,
        },
        AnalysisMode::LiveStdin => EncodedRequest {
            args: vec![String::from("--json"), String::from("--stdin"), path],
            stdin: Some(request.text.clone()),
        },
    }
}

fn success_payload(outcome: AnalyzerOutcome) -> Result<Vec<u8>, ProtocolError> {
    match outcome {
        AnalyzerOutcome::Success(payload) => Ok(payload),
        AnalyzerOutcome::ProcessError(message) => Err(ProtocolError::Process { message }),
        AnalyzerOutcome::NonZeroExit { code, stderr } => {
            Err(ProtocolError::NonZeroExit { code, stderr })
        }
    }
}

/// Interpret an invocation outcome for the given mode.
pub fn decode(outcome: AnalyzerOutcome, mode: AnalysisMode) -> Result<DecodedResult, ProtocolError> {
    let payload = success_payload(outcome)?;
    match mode {
        AnalysisMode::FullReport => Ok(DecodedResult::Report(
            String::from_utf8_lossy(&payload).into_owned(),
        )),
        AnalysisMode::LiveStdin => parse_issues(&payload).map(DecodedResult::Issues),
    }
}

/// [`decode`] for live requests, unwrapped to the issue list.
pub fn decode_live(outcome: AnalyzerOutcome) -> Result<Vec<Issue>, ProtocolError> {
    parse_issues(&success_payload(outcome)?)
}

/// [`decode`] for full reports, unwrapped to the rendered text.
pub fn decode_report(outcome: AnalyzerOutcome) -> Result<String, ProtocolError> {
    let payload = success_payload(outcome)?;
    Ok(String::from_utf8_lossy(&payload).into_owned())
}

fn parse_issues(payload: &[u8]) -> Result<Vec<Issue>, ProtocolError> {
    let malformed = |reason: String| ProtocolError::Malformed {
        raw: truncated_raw(payload),
        reason,
    };
    let wire: Vec<WireIssue> =
        serde_json::from_slice(payload).map_err(|e| malformed(e.to_string()))?;
    wire.into_iter()
        .map(WireIssue::into_issue)
        .collect::<Result<Vec<_>, _>>()
        .map_err(malformed)
}

fn truncated_raw(payload: &[u8]) -> String {
    let text = String::from_utf8_lossy(payload);
    if text.len() <= MAX_RAW_BYTES {
        return text.into_owned();
    }
    let mut end = MAX_RAW_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &text[..end])
}
