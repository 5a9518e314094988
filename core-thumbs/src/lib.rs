//! # Core Thumbs Module
//!
//! On-demand thumbnail cache for the library browser:
//! - [`ThumbnailCache`] decodes and rescales thumbnail files on background
//!   threads into a bounded in-memory LRU
//! - [`ViewportPrefetcher`] warms the cache around the visible rows with a
//!   debounce, so fast scrolling does not queue redundant work
//!
//! ## Overview
//!
//! Thumbnail files land on disk while a sync run is still writing them, so
//! the cache refuses zero-length and truncated files instead of rendering
//! garbage; an incomplete file is simply retried on a later request. Cache
//! misses never block the caller: `get` returns immediately and a
//! `RefreshSink` notification arrives once the decoded image is in.

pub mod cache;
pub mod prefetch;

pub use cache::{CacheStats, ThumbnailCache, ThumbnailCacheConfig};
pub use prefetch::{ThumbnailIndex, ViewportPrefetcher};
