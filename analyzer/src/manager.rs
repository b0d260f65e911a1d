//! `AnalysisManager` facade - public API consumed by hosts.
//!
//! The host reports document lifecycle events through the `on_document_*`
//! entry points and drives completions with [`AnalysisManager::poll_events`]
//! (or awaits them with [`AnalysisManager::next_event`]). Entry points never
//! block: timers and analyzer invocations run as spawned tasks and report back
//! over a channel, so all state is mutated on the host's task only.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::codec;
use crate::invoker::{Invoke, ProcessInvoker};
use crate::locator::Locator;
use crate::reconciler::{ApplyOutcome, Reconciler};
use crate::report::ReportSession;
use crate::scheduler::DebounceScheduler;
use crate::session::SessionTracker;
use crate::types::{
    AnalysisMode, AnalysisNotice, AnalysisRequest, AnalyzerConfig, AnalyzerEvent,
    DiagnosticsSnapshot, DocumentId, SmellDiagnostic,
};

/// Channel capacity for the event channel between spawned tasks and the manager.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Public facade for live analysis.
///
/// Documents whose extension is not in the configured `file_extensions` are
/// ignored entirely.
pub struct AnalysisManager {
    config: AnalyzerConfig,
    locator: Locator,
    invoker: Arc<dyn Invoke>,
    tracker: SessionTracker,
    scheduler: DebounceScheduler,
    reconciler: Reconciler,
    event_rx: mpsc::Receiver<AnalyzerEvent>,
    event_tx: mpsc::Sender<AnalyzerEvent>,
    notices: Vec<AnalysisNotice>,
}

impl AnalysisManager {
    /// Manager that spawns real analyzer processes, locating the script
    /// relative to `install_root`.
    #[must_use]
    pub fn new(config: AnalyzerConfig, install_root: impl Into<PathBuf>) -> Self {
        let locator = Locator::new(&config, install_root);
        let invoker = Arc::new(ProcessInvoker::new(config.timeout()));
        Self::with_invoker(config, locator, invoker)
    }

    #[must_use]
    pub fn with_invoker(config: AnalyzerConfig, locator: Locator, invoker: Arc<dyn Invoke>) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            scheduler: DebounceScheduler::new(config.debounce(), event_tx.clone()),
            reconciler: Reconciler::new(config.source_label()),
            tracker: SessionTracker::new(),
            config,
            locator,
            invoker,
            event_rx,
            event_tx,
            notices: Vec::new(),
        }
    }

    /// A report session sharing this manager's locator and invoker.
    #[must_use]
    pub fn report_session(&self) -> ReportSession {
        ReportSession::with_invoker(
            self.config.clone(),
            self.locator.clone(),
            Arc::clone(&self.invoker),
        )
    }

    fn route(&self, path: &Path) -> Option<DocumentId> {
        let document = DocumentId::from(path);
        self.config.handles(&document).then_some(document)
    }

    /// A document was opened: analyze immediately.
    pub fn on_document_opened(&mut self, path: &Path, text: &str) {
        if let Some(document) = self.route(path) {
            tracing::debug!(document = %document, "Document opened");
            self.schedule_live(document, text.to_string());
        }
    }

    /// A document was saved: cancel any pending debounce and analyze now.
    pub fn on_document_saved(&mut self, path: &Path, text: &str) {
        if let Some(document) = self.route(path) {
            tracing::debug!(document = %document, "Document saved");
            self.schedule_live(document, text.to_string());
        }
    }

    /// The in-memory text changed: analyze once edits settle.
    pub fn on_document_changed(&mut self, path: &Path, text: &str) {
        if let Some(document) = self.route(path) {
            self.scheduler
                .on_document_changed(&mut self.tracker, &document, text.to_string());
        }
    }

    /// Drop the document's session, its pending work and its diagnostics.
    pub fn on_document_closed(&mut self, path: &Path) {
        let document = DocumentId::from(path);
        if !self.tracker.close(&document) {
            return;
        }
        tracing::debug!(document = %document, "Document closed");
        if !self.reconciler.diagnostics_for(&document).is_empty() {
            self.reconciler.clear(&document);
            self.notices.push(AnalysisNotice::DiagnosticsChanged { document, count: 0 });
        }
    }

    fn schedule_live(&mut self, document: DocumentId, text: String) {
        self.tracker.record_text(&document, text.clone());
        let sequence = self.tracker.begin_request(&document);

        let target = match self.locator.resolve() {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!(document = %document, "Live analysis skipped: {e}");
                return;
            }
        };

        let request = AnalysisRequest {
            document,
            text,
            mode: AnalysisMode::LiveStdin,
            sequence,
        };
        let invocation = self.invoker.invoke(&target, codec::encode(&request));
        let tx = self.event_tx.clone();
        let document = request.document;
        let completed = document.clone();

        tracing::debug!(document = %document, sequence, "Live analysis scheduled");
        let handle = tokio::spawn(async move {
            let result = codec::decode_live(invocation.await);
            let _ = tx
                .send(AnalyzerEvent::Completed {
                    document: completed,
                    sequence,
                    result,
                })
                .await;
        });
        self.tracker
            .attach_live(&document, sequence, handle.abort_handle());
    }

    /// Drain pending events from timer and invocation tasks, up to `budget`.
    ///
    /// Non-blocking: returns immediately if no events are available.
    pub fn poll_events(&mut self, budget: usize) -> usize {
        let mut count = 0;
        while count < budget {
            match self.event_rx.try_recv() {
                Ok(event) => {
                    self.handle_event(event);
                    count += 1;
                }
                Err(mpsc::error::TryRecvError::Empty | mpsc::error::TryRecvError::Disconnected) => {
                    break;
                }
            }
        }
        count
    }

    /// Wait for the next event and handle it.
    ///
    /// Returns `false` only if the channel closed, which cannot happen while
    /// the manager holds its own sender.
    pub async fn next_event(&mut self) -> bool {
        match self.event_rx.recv().await {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => false,
        }
    }

    fn handle_event(&mut self, event: AnalyzerEvent) {
        match event {
            AnalyzerEvent::TimerFired { document, token } => {
                if !self
                    .scheduler
                    .claim_fired(&mut self.tracker, &document, token)
                {
                    tracing::trace!(document = %document, token, "Ignoring cancelled timer");
                    return;
                }
                let Some(text) = self.tracker.latest_text(&document).map(str::to_string) else {
                    return;
                };
                self.schedule_live(document, text);
            }
            AnalyzerEvent::Completed {
                document,
                sequence,
                result,
            } => {
                self.tracker.finish_live(&document, sequence);
                match result {
                    Ok(issues) => {
                        match self
                            .reconciler
                            .apply(&mut self.tracker, &document, sequence, &issues)
                        {
                            ApplyOutcome::Applied(count) => {
                                tracing::debug!(
                                    document = %document,
                                    sequence,
                                    count,
                                    "Diagnostics updated"
                                );
                                self.notices
                                    .push(AnalysisNotice::DiagnosticsChanged { document, count });
                            }
                            ApplyOutcome::Stale => {
                                tracing::debug!(
                                    document = %document,
                                    sequence,
                                    "Discarding stale analysis result"
                                );
                            }
                        }
                    }
                    Err(error) => {
                        tracing::warn!(
                            document = %document,
                            sequence,
                            "Live analysis failed: {error}"
                        );
                        if self.tracker.last_scheduled(&document) == Some(sequence) {
                            self.notices.push(AnalysisNotice::Failed { document, error });
                        }
                    }
                }
            }
        }
    }

    /// Take the notices queued since the last call.
    pub fn take_notices(&mut self) -> Vec<AnalysisNotice> {
        std::mem::take(&mut self.notices)
    }

    /// Get an immutable snapshot of all diagnostics.
    #[must_use]
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        self.reconciler.snapshot()
    }

    #[must_use]
    pub fn diagnostics_for(&self, path: &Path) -> &[SmellDiagnostic] {
        self.reconciler.diagnostics_for(&DocumentId::from(path))
    }

    #[must_use]
    pub fn last_scheduled_sequence(&self, path: &Path) -> Option<u64> {
        self.tracker.last_scheduled(&DocumentId::from(path))
    }

    #[must_use]
    pub fn last_applied_sequence(&self, path: &Path) -> Option<u64> {
        self.tracker.last_applied(&DocumentId::from(path))
    }

    #[must_use]
    pub fn is_tracking(&self, path: &Path) -> bool {
        self.tracker.contains(&DocumentId::from(path))
    }

    #[must_use]
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Abort every pending timer and live analysis.
    pub fn shutdown(&mut self) {
        tracing::info!("Shutting down analysis manager");
        self.tracker.close_all();
    }

    /// Get a reference to the event sender (for testing).
    #[cfg(test)]
    pub(crate) fn event_tx(&self) -> &mpsc::Sender<AnalyzerEvent> {
        &self.event_tx
    }
}
