//! # Thumbnail Cache
//!
//! Bounded in-memory cache of decoded, pre-scaled thumbnails keyed by
//! file path.
//!
//! ## Overview
//!
//! Lookups are non-blocking: a miss schedules decode work on a throwaway
//! background thread and returns `None` right away. One load per path is
//! in flight at a time; concurrent requests for the same path coalesce.
//! Files that are empty or missing their format trailer are treated as
//! still-downloading and left alone. Completed inserts notify the host's
//! `RefreshSink` so the row can repaint.
//!
//! Capacity is bounded twice: an entry-count LRU limit and a byte budget
//! over the decoded pixel data. Whichever bound is hit first evicts from
//! the least-recently-used end.

use bridge_traits::RefreshSink;
use image::imageops::FilterType;
use image::RgbaImage;
use lru::LruCache;
use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Tuning knobs for the cache.
#[derive(Debug, Clone)]
pub struct ThumbnailCacheConfig {
    /// Maximum number of cached thumbnails.
    pub capacity: usize,
    /// Byte budget over decoded RGBA pixel data.
    pub max_bytes: usize,
    /// Bounding box width thumbnails are scaled into.
    pub target_width: u32,
    /// Bounding box height thumbnails are scaled into.
    pub target_height: u32,
}

impl Default for ThumbnailCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 300,
            max_bytes: 16 * 1024 * 1024,
            target_width: 84,
            target_height: 60,
        }
    }
}

/// Cache occupancy snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub bytes: usize,
}

/// Shared handle to the thumbnail cache. Clones refer to the same cache.
#[derive(Clone)]
pub struct ThumbnailCache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    config: ThumbnailCacheConfig,
    sink: Arc<dyn RefreshSink>,
    state: Mutex<CacheState>,
}

struct CacheState {
    entries: LruCache<PathBuf, Arc<RgbaImage>>,
    bytes: usize,
    in_flight: HashSet<PathBuf>,
}

impl ThumbnailCache {
    pub fn new(config: ThumbnailCacheConfig, sink: Arc<dyn RefreshSink>) -> Self {
        let capacity = NonZeroUsize::new(config.capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Arc::new(CacheInner {
                config,
                sink,
                state: Mutex::new(CacheState {
                    entries: LruCache::new(capacity),
                    bytes: 0,
                    in_flight: HashSet::new(),
                }),
            }),
        }
    }

    /// Look up a thumbnail, scheduling a background load on a miss.
    pub fn get(&self, path: &Path) -> Option<Arc<RgbaImage>> {
        {
            let mut state = self.inner.lock_state();
            if let Some(image) = state.entries.get(path) {
                return Some(image.clone());
            }
        }
        self.request(path);
        None
    }

    /// Whether the thumbnail is cached, without touching LRU order.
    pub fn contains(&self, path: &Path) -> bool {
        self.inner.lock_state().entries.peek(path).is_some()
    }

    /// Schedule a background load unless the path is cached or already
    /// loading. Returns whether a load was scheduled.
    pub fn request(&self, path: &Path) -> bool {
        let path = path.to_path_buf();
        {
            let mut state = self.inner.lock_state();
            if state.entries.peek(&path).is_some() || !state.in_flight.insert(path.clone()) {
                return false;
            }
        }

        let inner = self.inner.clone();
        let load_path = path.clone();
        let spawned = std::thread::Builder::new()
            .name("thumb-load".to_string())
            .spawn(move || {
                let _guard = InFlightGuard {
                    inner: inner.clone(),
                    path: load_path.clone(),
                };
                inner.load_and_insert(&load_path);
            });
        if let Err(e) = spawned {
            warn!(error = %e, "failed to spawn thumbnail loader thread");
            // The guard lives inside the closure that never ran; unblock
            // the path here or no later request could ever load it.
            self.inner.lock_state().in_flight.remove(&path);
            return false;
        }
        true
    }

    /// Drop every cached entry. In-flight loads are unaffected.
    pub fn clear(&self) {
        let mut state = self.inner.lock_state();
        state.entries.clear();
        state.bytes = 0;
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.inner.lock_state();
        CacheStats {
            entries: state.entries.len(),
            bytes: state.bytes,
        }
    }

    #[cfg(test)]
    pub(crate) fn populate_blocking(&self, path: &Path) {
        self.inner.load_and_insert(path);
    }

    #[cfg(test)]
    pub(crate) fn mark_in_flight(&self, path: &Path) {
        self.inner.lock_state().in_flight.insert(path.to_path_buf());
    }
}

/// Removes the in-flight marker even when decoding panics.
struct InFlightGuard {
    inner: Arc<CacheInner>,
    path: PathBuf,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner.lock_state().in_flight.remove(&self.path);
    }
}

impl CacheInner {
    fn lock_state(&self) -> std::sync::MutexGuard<'_, CacheState> {
        // Lock holders never panic while holding the lock; recover from a
        // poisoned mutex rather than cascading.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Read, validate, decode, scale, and insert one thumbnail file.
    /// Incomplete or undecodable files are skipped without caching
    /// anything, so a later request retries from disk.
    fn load_and_insert(&self, path: &Path) {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "thumbnail not readable");
                return;
            }
        };
        if bytes.is_empty() {
            debug!(path = %path.display(), "thumbnail file is empty, skipping");
            return;
        }
        if !file_looks_complete(&bytes, path) {
            debug!(path = %path.display(), "thumbnail file looks truncated, skipping");
            return;
        }

        let decoded = match image::load_from_memory(&bytes) {
            Ok(decoded) => decoded,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "thumbnail decode failed");
                return;
            }
        };
        let scaled = decoded
            .resize(
                self.config.target_width,
                self.config.target_height,
                FilterType::Triangle,
            )
            .to_rgba8();

        self.insert(path.to_path_buf(), Arc::new(scaled));
        self.sink.invalidate(path);
    }

    fn insert(&self, path: PathBuf, image: Arc<RgbaImage>) {
        let cost = image_bytes(&image);
        let mut state = self.lock_state();

        if let Some((_, old)) = state.entries.push(path, image) {
            state.bytes = state.bytes.saturating_sub(image_bytes(&old));
        }
        state.bytes += cost;

        while state.bytes > self.config.max_bytes {
            let Some((_, evicted)) = state.entries.pop_lru() else {
                break;
            };
            state.bytes = state.bytes.saturating_sub(image_bytes(&evicted));
        }
    }
}

fn image_bytes(image: &RgbaImage) -> usize {
    image.as_raw().len()
}

/// Trailer check for the formats thumbnails arrive in. A file still being
/// written has its header long before its trailer, so the trailer is the
/// cheap completeness signal. Unknown extensions pass; decode failures
/// catch whatever this misses.
fn file_looks_complete(bytes: &[u8], path: &Path) -> bool {
    const PNG_TRAILER: &[u8] = &[0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82];

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => bytes.len() >= 8 && bytes.ends_with(PNG_TRAILER),
        Some("jpg") | Some("jpeg") => bytes.len() >= 2 && bytes.ends_with(&[0xFF, 0xD9]),
        Some("webp") => {
            bytes.len() >= 12
                && &bytes[0..4] == b"RIFF"
                && &bytes[8..12] == b"WEBP"
                && u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize
                    == bytes.len() - 8
        }
        _ => true,
    }
}
