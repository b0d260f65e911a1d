//! Debounce scheduler - coalesces bursts of edits per document.
//!
//! Every change (re)arms a one-shot timer task for the document. When the
//! quantum elapses without another change, the task posts
//! [`AnalyzerEvent::TimerFired`] back to the manager, which schedules exactly
//! one live request.

use std::time::Duration;

use tokio::sync::mpsc;

use crate::session::SessionTracker;
use crate::types::{AnalyzerEvent, DocumentId};

pub(crate) struct DebounceScheduler {
    quantum: Duration,
    event_tx: mpsc::Sender<AnalyzerEvent>,
}

impl DebounceScheduler {
    pub fn new(quantum: Duration, event_tx: mpsc::Sender<AnalyzerEvent>) -> Self {
        Self { quantum, event_tx }
    }

    /// Record the new text and restart the document's timer.
    pub fn on_document_changed(
        &self,
        tracker: &mut SessionTracker,
        document: &DocumentId,
        text: String,
    ) {
        tracker.record_text(document, text);
        let token = tracker.allocate_timer_token();

        let tx = self.event_tx.clone();
        let quantum = self.quantum;
        let fired_document = document.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(quantum).await;
            let _ = tx
                .send(AnalyzerEvent::TimerFired {
                    document: fired_document,
                    token,
                })
                .await;
        });

        tracker.arm_timer(document, token, handle.abort_handle());
    }

    /// Whether a fired timer still owns the document's pending slot.
    pub fn claim_fired(
        &self,
        tracker: &mut SessionTracker,
        document: &DocumentId,
        token: u64,
    ) -> bool {
        tracker.take_fired_timer(document, token)
    }
}
