//! # Core Sync Module
//!
//! Synchronization engine for the asset library:
//! - [`SyncOrchestrator`] accepts runs, checks preconditions, and dispatches
//!   bounded-concurrency download tasks
//! - [`SyncSession`] is the caller's handle: cancellation, live counters,
//!   and the awaitable terminal outcome
//!
//! ## Overview
//!
//! A run walks the remote asset list and brings every listed asset to its
//! synchronized state on disk: asset directory, payload file at the
//! configured quality and format, thumbnail, and a marker file written
//! last. Progress and results stream over the `core-runtime` event bus;
//! the terminal event carries a stable numeric code so hosts can react
//! without parsing messages.

pub mod error;
pub mod orchestrator;
pub mod session;

pub use error::{Result, SyncError};
pub use orchestrator::SyncOrchestrator;
pub use session::{SessionId, SessionProgress, SyncOutcome, SyncSession};
