//! # Event Bus System
//!
//! Broadcast channel carrying sync progress, report lines, and terminal
//! outcomes from the core to any number of host-side subscribers.
//!
//! ## Overview
//!
//! The core never calls back into host code directly. Instead every
//! observable state change is published as a [`CoreEvent`] on the bus and
//! hosts subscribe with [`EventBus::subscribe`]. Subscribers that fall
//! behind lose the oldest events (broadcast semantics); the terminal
//! [`SyncEvent::Finished`] is emitted exactly once per session, after the
//! summary, so a subscriber that keeps up sees a well-ordered stream:
//!
//! ```text
//! Started -> (Report | Progress)* -> Summary? -> Finished
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Default capacity of the broadcast channel.
const DEFAULT_CAPACITY: usize = 256;

// ============================================================================
// Event Types
// ============================================================================

/// Severity attached to report lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    Info,
    Warning,
    Error,
}

/// Events emitted over the lifetime of a sync session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    /// A session has been accepted and dispatch is starting.
    Started {
        session_id: String,
        total: usize,
    },

    /// One more asset has been resolved (downloaded, skipped, or failed).
    Progress {
        session_id: String,
        current: usize,
        total: usize,
        message: String,
    },

    /// Human-readable report line for the session log.
    Report {
        session_id: String,
        severity: EventSeverity,
        message: String,
    },

    /// Final download/failure tally, emitted before `Finished` on the
    /// paths that ran to completion or were cancelled mid-flight.
    Summary {
        session_id: String,
        downloaded: usize,
        failed: usize,
    },

    /// Terminal event, emitted exactly once per session.
    ///
    /// Codes: `0` success, `1` cancelled, `-1` library missing or
    /// unrecognized, `-2` library path does not exist, `-3` asset list
    /// unavailable.
    Finished {
        session_id: String,
        code: i32,
    },
}

/// Events from the catalog layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CatalogEvent {
    /// The asset list was served from the on-disk cache.
    ListCacheHit { path: String, entries: usize },

    /// The asset list was fetched from the remote service.
    ListRefreshed { entries: usize },
}

/// Top-level event type carried on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum CoreEvent {
    Sync(SyncEvent),
    Catalog(CatalogEvent),
}

impl From<SyncEvent> for CoreEvent {
    fn from(event: SyncEvent) -> Self {
        CoreEvent::Sync(event)
    }
}

impl From<CatalogEvent> for CoreEvent {
    fn from(event: CatalogEvent) -> Self {
        CoreEvent::Catalog(event)
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Clonable handle to the broadcast channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Create a bus with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a bus with an explicit channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Events published with no live subscribers are
    /// dropped silently; the core does not require anyone to listen.
    pub fn publish(&self, event: impl Into<CoreEvent>) {
        let event = event.into();
        trace!(?event, "publishing core event");
        let _ = self.sender.send(event);
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
