//! Diagnostic reconciler - the only writer of the per-document diagnostic set.
//!
//! A decoded result replaces a document's diagnostics wholesale, and only if
//! its sequence is not older than the last one applied to that document.

use std::collections::HashMap;

use crate::session::SessionTracker;
use crate::types::{DiagnosticsSnapshot, DocumentId, Issue, SmellDiagnostic};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ApplyOutcome {
    /// Diagnostics replaced; carries the new count.
    Applied(usize),
    /// A newer result was already applied, or the document is gone.
    Stale,
}

pub(crate) struct Reconciler {
    data: HashMap<DocumentId, Vec<SmellDiagnostic>>,
    source_label: String,
}

impl Reconciler {
    pub fn new(source_label: impl Into<String>) -> Self {
        Self {
            data: HashMap::new(),
            source_label: source_label.into(),
        }
    }

    pub fn to_diagnostic(&self, issue: &Issue) -> SmellDiagnostic {
        SmellDiagnostic::new(
            issue.severity(),
            issue.message().to_string(),
            issue.line().get() - 1,
            self.source_label.clone(),
        )
    }

    pub fn apply(
        &mut self,
        tracker: &mut SessionTracker,
        document: &DocumentId,
        sequence: u64,
        issues: &[Issue],
    ) -> ApplyOutcome {
        if !tracker.accept_result(document, sequence) {
            return ApplyOutcome::Stale;
        }

        let items: Vec<SmellDiagnostic> = issues.iter().map(|i| self.to_diagnostic(i)).collect();
        let count = items.len();
        if items.is_empty() {
            self.data.remove(document);
        } else {
            self.data.insert(document.clone(), items);
        }
        ApplyOutcome::Applied(count)
    }

    pub fn clear(&mut self, document: &DocumentId) {
        self.data.remove(document);
    }

    pub fn diagnostics_for(&self, document: &DocumentId) -> &[SmellDiagnostic] {
        self.data.get(document).map_or(&[], Vec::as_slice)
    }

    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        let mut files: Vec<(DocumentId, Vec<SmellDiagnostic>)> = self
            .data
            .iter()
            .map(|(doc, items)| (doc.clone(), items.clone()))
            .collect();

        // Documents with errors first, then by path
        files.sort_by(|a, b| {
            let a_has_errors = a.1.iter().any(|d| d.severity().is_error());
            let b_has_errors = b.1.iter().any(|d| d.severity().is_error());
            b_has_errors.cmp(&a_has_errors).then_with(|| a.0.cmp(&b.0))
        });

        DiagnosticsSnapshot::new(files)
    }
}
