//! Presentation Refresh Seam
//!
//! Background thumbnail loads never touch UI state. When a bitmap lands in
//! the cache, the cache calls [`RefreshSink::invalidate`] with the path that
//! changed and the presentation layer repaints whatever region maps to it.

use std::path::Path;

/// Changed-region notification implemented by the presentation layer.
///
/// Called from short-lived background threads; implementations must marshal
/// to their own rendering context if one exists.
pub trait RefreshSink: Send + Sync {
    /// The thumbnail backing `path` changed; repaint anything that shows it.
    fn invalidate(&self, path: &Path);
}

/// Sink that drops every notification. Useful in headless tests and batch
/// tooling where nothing renders.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRefreshSink;

impl RefreshSink for NullRefreshSink {
    fn invalidate(&self, _path: &Path) {}
}
