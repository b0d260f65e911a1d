//! Session tracker - per-document scheduling state.
//!
//! Each open document gets a [`DocumentSession`] on its first relevant event;
//! it is dropped again when the document closes. Only this module mutates
//! sessions. Sequences come from one tracker-wide counter, so they are strictly
//! increasing per document even across a close and reopen of the same path.

use std::collections::HashMap;

use tokio::task::AbortHandle;

use crate::types::DocumentId;

/// A debounce timer that has been armed but not yet fired.
#[derive(Debug)]
struct PendingTimer {
    token: u64,
    handle: AbortHandle,
}

/// The live-mode invocation currently considered "current" for a document.
#[derive(Debug)]
struct LiveProcess {
    sequence: u64,
    handle: AbortHandle,
}

#[derive(Debug, Default)]
pub(crate) struct DocumentSession {
    pending_timer: Option<PendingTimer>,
    last_scheduled: u64,
    last_applied: u64,
    live: Option<LiveProcess>,
    /// Most recent text reported by the host.
    latest_text: Option<String>,
}

impl DocumentSession {
    fn cancel_timer(&mut self) -> bool {
        match self.pending_timer.take() {
            Some(timer) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }

    fn terminate_live(&mut self) -> Option<u64> {
        let live = self.live.take()?;
        live.handle.abort();
        Some(live.sequence)
    }
}

#[derive(Debug, Default)]
pub(crate) struct SessionTracker {
    sessions: HashMap<DocumentId, DocumentSession>,
    next_sequence: u64,
    next_timer_token: u64,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn session_mut(&mut self, document: &DocumentId) -> &mut DocumentSession {
        self.sessions.entry(document.clone()).or_default()
    }

    pub fn record_text(&mut self, document: &DocumentId, text: String) {
        self.session_mut(document).latest_text = Some(text);
    }

    pub fn latest_text(&self, document: &DocumentId) -> Option<&str> {
        self.sessions.get(document)?.latest_text.as_deref()
    }

    pub fn allocate_timer_token(&mut self) -> u64 {
        self.next_timer_token += 1;
        self.next_timer_token
    }

    /// Install a freshly started timer, aborting any timer it replaces.
    pub fn arm_timer(&mut self, document: &DocumentId, token: u64, handle: AbortHandle) {
        let session = self.session_mut(document);
        if session.cancel_timer() {
            tracing::trace!(document = %document, "Debounce timer restarted");
        }
        session.pending_timer = Some(PendingTimer { token, handle });
    }

    /// Claim a fired timer. False when the timer was cancelled or replaced
    /// after it fired but before its event was handled.
    pub fn take_fired_timer(&mut self, document: &DocumentId, token: u64) -> bool {
        let Some(session) = self.sessions.get_mut(document) else {
            return false;
        };
        match &session.pending_timer {
            Some(timer) if timer.token == token => {
                session.pending_timer = None;
                true
            }
            _ => false,
        }
    }

    /// Start a new request: cancel any pending timer, terminate the live
    /// process it supersedes, and allocate the next sequence.
    pub fn begin_request(&mut self, document: &DocumentId) -> u64 {
        self.next_sequence += 1;
        let sequence = self.next_sequence;
        let session = self.session_mut(document);
        if session.cancel_timer() {
            tracing::debug!(document = %document, "Pending debounce cancelled by immediate trigger");
        }
        if let Some(superseded) = session.terminate_live() {
            tracing::debug!(
                document = %document,
                superseded,
                sequence,
                "Terminated superseded live analysis"
            );
        }
        session.last_scheduled = sequence;
        sequence
    }

    pub fn attach_live(&mut self, document: &DocumentId, sequence: u64, handle: AbortHandle) {
        let session = self.session_mut(document);
        if session.last_scheduled == sequence {
            session.live = Some(LiveProcess { sequence, handle });
        } else {
            handle.abort();
        }
    }

    /// Forget the live handle once its invocation has reported back.
    pub fn finish_live(&mut self, document: &DocumentId, sequence: u64) {
        if let Some(session) = self.sessions.get_mut(document)
            && session.live.as_ref().is_some_and(|live| live.sequence == sequence)
        {
            session.live = None;
        }
    }

    /// Gate for the reconciler: accept `sequence` only if it is the latest
    /// scheduled request and not older than the last applied one, and record it
    /// as applied.
    pub fn accept_result(&mut self, document: &DocumentId, sequence: u64) -> bool {
        let Some(session) = self.sessions.get_mut(document) else {
            return false;
        };
        // A result queued before its request was superseded must not land.
        if sequence < session.last_scheduled || sequence < session.last_applied {
            return false;
        }
        session.last_applied = sequence;
        true
    }

    /// Drop a document's session, cancelling its timer and live process.
    pub fn close(&mut self, document: &DocumentId) -> bool {
        let Some(mut session) = self.sessions.remove(document) else {
            return false;
        };
        session.cancel_timer();
        session.terminate_live();
        true
    }

    pub fn close_all(&mut self) {
        for (_, mut session) in self.sessions.drain() {
            session.cancel_timer();
            session.terminate_live();
        }
    }

    pub fn last_scheduled(&self, document: &DocumentId) -> Option<u64> {
        self.sessions
            .get(document)
            .map(|s| s.last_scheduled)
            .filter(|&seq| seq > 0)
    }

    pub fn last_applied(&self, document: &DocumentId) -> Option<u64> {
        self.sessions
            .get(document)
            .map(|s| s.last_applied)
            .filter(|&seq| seq > 0)
    }

    #[cfg(test)]
    pub fn has_pending_timer(&self, document: &DocumentId) -> bool {
        self.sessions
            .get(document)
            .is_some_and(|s| s.pending_timer.is_some())
    }

    #[cfg(test)]
    pub fn has_live(&self, document: &DocumentId) -> bool {
        self.sessions.get(document).is_some_and(|s| s.live.is_some())
    }

    pub fn contains(&self, document: &DocumentId) -> bool {
        self.sessions.contains_key(document)
    }
}
