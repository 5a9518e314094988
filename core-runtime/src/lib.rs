//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the asset library core:
//! - Library configuration with fail-fast validation
//! - Event bus system for sync progress and terminal outcomes
//! - Logging and tracing bootstrap
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the other modules depend on.
//! It establishes the event broadcasting mechanism, the configuration object
//! that replaces any process-wide mutable state, and the logging conventions
//! used throughout the system.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{AssetTypeFilter, LibraryConfig, LibraryConfigBuilder};
pub use error::{Error, Result};
pub use events::{CatalogEvent, CoreEvent, EventBus, EventSeverity, SyncEvent};
