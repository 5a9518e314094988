//! # Sync Session
//!
//! Handle and shared state for one synchronization run.
//!
//! ## Overview
//!
//! [`crate::SyncOrchestrator::synchronize`] hands back a [`SyncSession`]
//! immediately; the run itself proceeds on background tasks. The session
//! exposes cooperative cancellation, live counters, and an awaitable
//! terminal [`SyncOutcome`]. Cancellation is one-way: once requested it
//! cannot be revoked, and every asset not yet processed resolves as failed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

// ============================================================================
// Identifiers and Outcomes
// ============================================================================

/// Unique identifier of a sync session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terminal state of a sync session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Every asset was processed.
    Completed { downloaded: usize, failed: usize },

    /// The session was cancelled; unprocessed assets count as failed.
    Cancelled { downloaded: usize, failed: usize },

    /// No library is configured, or the configured root is not the
    /// expected library directory.
    LibraryUnrecognized,

    /// The configured library root does not exist on disk.
    LibraryPathMissing,

    /// The asset list could not be fetched or parsed.
    ListUnavailable,
}

impl SyncOutcome {
    /// Stable numeric result code for hosts.
    pub fn code(&self) -> i32 {
        match self {
            SyncOutcome::Completed { .. } => 0,
            SyncOutcome::Cancelled { .. } => 1,
            SyncOutcome::LibraryUnrecognized => -1,
            SyncOutcome::LibraryPathMissing => -2,
            SyncOutcome::ListUnavailable => -3,
        }
    }
}

// ============================================================================
// Per-Asset Results
// ============================================================================

/// Result of processing one asset, reported to the aggregator.
#[derive(Debug, Clone)]
pub(crate) struct DownloadResult {
    pub slug: String,
    /// `None` on success.
    pub error: Option<String>,
    /// The asset was already synchronized; nothing was transferred.
    pub existed: bool,
}

impl DownloadResult {
    pub fn succeeded(slug: impl Into<String>, existed: bool) -> Self {
        Self {
            slug: slug.into(),
            error: None,
            existed,
        }
    }

    pub fn failed(slug: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            error: Some(error.into()),
            existed: false,
        }
    }
}

// ============================================================================
// Session State
// ============================================================================

/// Live counters shared between the dispatcher, aggregator, and session
/// handle. `remaining` is set to the full total before the first task is
/// dispatched, so an observer never sees a partially-built session.
#[derive(Debug)]
pub(crate) struct SessionState {
    pub total: usize,
    pub remaining: AtomicUsize,
    pub downloaded: AtomicUsize,
    pub failed: AtomicUsize,
}

impl SessionState {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            remaining: AtomicUsize::new(total),
            downloaded: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }
}

/// Snapshot of a session's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub remaining: usize,
    pub downloaded: usize,
    pub failed: usize,
}

// ============================================================================
// Session Handle
// ============================================================================

/// Handle to a running (or finished) synchronization session.
#[derive(Debug, Clone)]
pub struct SyncSession {
    id: SessionId,
    cancel: CancellationToken,
    state: Arc<SessionState>,
    outcome_rx: watch::Receiver<Option<SyncOutcome>>,
}

impl SyncSession {
    pub(crate) fn new(
        id: SessionId,
        cancel: CancellationToken,
        state: Arc<SessionState>,
        outcome_rx: watch::Receiver<Option<SyncOutcome>>,
    ) -> Self {
        Self {
            id,
            cancel,
            state,
            outcome_rx,
        }
    }

    /// Build a session that is terminal from the start, for runs refused
    /// before any dispatch.
    pub(crate) fn terminal(id: SessionId, outcome: SyncOutcome) -> Self {
        let (_tx, rx) = watch::channel(Some(outcome));
        Self::new(id, CancellationToken::new(), Arc::new(SessionState::new(0)), rx)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Request cancellation. Irrevocable; already-completed work stands.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Current counters.
    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            total: self.state.total,
            remaining: self.state.remaining.load(Ordering::SeqCst),
            downloaded: self.state.downloaded.load(Ordering::SeqCst),
            failed: self.state.failed.load(Ordering::SeqCst),
        }
    }

    /// Terminal outcome if the session has already finished.
    pub fn outcome(&self) -> Option<SyncOutcome> {
        self.outcome_rx.borrow().clone()
    }

    /// Wait for the session to finish.
    pub async fn wait(&self) -> SyncOutcome {
        let mut rx = self.outcome_rx.clone();
        // The borrowed ref must drop before `rx` does, so bind the result
        // instead of matching on the await directly.
        let waited = rx.wait_for(|outcome| outcome.is_some()).await;
        match waited {
            Ok(value) => value.clone().unwrap_or(SyncOutcome::Cancelled {
                downloaded: 0,
                failed: 0,
            }),
            // The aggregator dropped without reporting; only reachable if
            // its task was aborted externally.
            Err(_) => {
                tracing::warn!(session_id = %self.id, "session aggregator dropped without outcome");
                SyncOutcome::Cancelled {
                    downloaded: self.state.downloaded.load(Ordering::SeqCst),
                    failed: self.state.failed.load(Ordering::SeqCst),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_codes() {
        assert_eq!(SyncOutcome::Completed { downloaded: 3, failed: 0 }.code(), 0);
        assert_eq!(SyncOutcome::Cancelled { downloaded: 1, failed: 2 }.code(), 1);
        assert_eq!(SyncOutcome::LibraryUnrecognized.code(), -1);
        assert_eq!(SyncOutcome::LibraryPathMissing.code(), -2);
        assert_eq!(SyncOutcome::ListUnavailable.code(), -3);
    }

    #[tokio::test]
    async fn terminal_session_resolves_immediately() {
        let session = SyncSession::terminal(SessionId::new(), SyncOutcome::LibraryPathMissing);
        assert_eq!(session.outcome(), Some(SyncOutcome::LibraryPathMissing));
        assert_eq!(session.wait().await, SyncOutcome::LibraryPathMissing);
        assert_eq!(session.progress().total, 0);
    }

    #[test]
    fn cancellation_is_one_way() {
        let session = SyncSession::terminal(SessionId::new(), SyncOutcome::LibraryUnrecognized);
        assert!(!session.is_cancelled());
        session.cancel();
        assert!(session.is_cancelled());
    }
}
