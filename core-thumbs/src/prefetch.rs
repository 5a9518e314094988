//! # Viewport Prefetch
//!
//! Warms the thumbnail cache around the rows a browser currently shows.
//!
//! ## Overview
//!
//! Scrolling fires viewport updates far faster than thumbnails decode, so
//! updates are debounced: each one arms a short timer and supersedes any
//! earlier pending update. When the timer fires, the visible row range is
//! widened by a margin on both sides, clamped to the model, and every row
//! whose thumbnail is neither cached nor loading gets a load scheduled.

use crate::cache::ThumbnailCache;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

/// Rows ahead of and behind the viewport to warm.
const DEFAULT_MARGIN: usize = 15;

/// How long the viewport must hold still before prefetching starts.
const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

/// Row-to-thumbnail mapping provided by the host's list model.
pub trait ThumbnailIndex: Send + Sync {
    /// Number of rows in the model.
    fn len(&self) -> usize;

    /// Thumbnail file path for a row, if the row has one.
    fn thumbnail_path(&self, row: usize) -> Option<PathBuf>;
}

/// Debounced cache warmer driven by viewport updates.
pub struct ViewportPrefetcher {
    cache: ThumbnailCache,
    index: Arc<dyn ThumbnailIndex>,
    margin: usize,
    debounce: Duration,
    state: Arc<DebounceState>,
}

struct DebounceState {
    generation: AtomicU64,
    window: Mutex<Option<(usize, usize)>>,
}

impl ViewportPrefetcher {
    pub fn new(cache: ThumbnailCache, index: Arc<dyn ThumbnailIndex>) -> Self {
        Self::with_tuning(cache, index, DEFAULT_MARGIN, DEFAULT_DEBOUNCE)
    }

    pub fn with_tuning(
        cache: ThumbnailCache,
        index: Arc<dyn ThumbnailIndex>,
        margin: usize,
        debounce: Duration,
    ) -> Self {
        Self {
            cache,
            index,
            margin,
            debounce,
            state: Arc::new(DebounceState {
                generation: AtomicU64::new(0),
                window: Mutex::new(None),
            }),
        }
    }

    /// Report the currently visible row range. Prefetching starts once no
    /// further update arrives within the debounce interval; a newer update
    /// supersedes this one entirely.
    pub fn viewport_changed(&self, first_visible: usize, last_visible: usize) {
        let generation = self.state.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.lock_window() = Some((first_visible, last_visible));

        let state = self.state.clone();
        let cache = self.cache.clone();
        let index = self.index.clone();
        let margin = self.margin;
        let debounce = self.debounce;
        std::thread::spawn(move || {
            std::thread::sleep(debounce);
            if state.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            let window = state
                .window
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .take();
            if let Some((first, last)) = window {
                prefetch_range(&cache, index.as_ref(), first, last, margin);
            }
        });
    }

    /// Prefetch around a row range immediately, skipping the debounce.
    /// Returns how many loads were scheduled.
    pub fn prefetch_now(&self, first_visible: usize, last_visible: usize) -> usize {
        prefetch_range(
            &self.cache,
            self.index.as_ref(),
            first_visible,
            last_visible,
            self.margin,
        )
    }

    fn lock_window(&self) -> std::sync::MutexGuard<'_, Option<(usize, usize)>> {
        self.state.window.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn prefetch_range(
    cache: &ThumbnailCache,
    index: &dyn ThumbnailIndex,
    first: usize,
    last: usize,
    margin: usize,
) -> usize {
    let Some((start, end)) = prefetch_window(first, last, margin, index.len()) else {
        return 0;
    };
    debug!(start, end, "prefetching thumbnail rows");

    let mut scheduled = 0;
    for row in start..=end {
        let Some(path) = index.thumbnail_path(row) else {
            continue;
        };
        if cache.request(&path) {
            scheduled += 1;
        }
    }
    scheduled
}

/// Widen a visible row range by the margin and clamp it to the model.
fn prefetch_window(
    first: usize,
    last: usize,
    margin: usize,
    len: usize,
) -> Option<(usize, usize)> {
    if len == 0 || first > last {
        return None;
    }
    let start = first.saturating_sub(margin).min(len - 1);
    let end = last.saturating_add(margin).min(len - 1);
    Some((start, end))
}
