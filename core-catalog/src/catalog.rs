//! # Asset Catalog
//!
//! Retrieval of the remote asset list with an on-disk cache.
//!
//! ## Overview
//!
//! The list endpoint is slow and changes rarely, so the raw response is
//! cached as pretty-printed JSON inside the library root. A cached list is
//! served without touching the network while it is younger than the
//! configured freshness window; callers can force a refresh to bypass it.
//! Cache write failures are logged and otherwise ignored, a sync must not
//! fail because the cache file could not be written.

use crate::error::{CatalogError, Result};
use crate::models::AssetRecord;
use bridge_traits::AssetFetcher;
use core_runtime::{AssetTypeFilter, CatalogEvent, EventBus, LibraryConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// File name of the on-disk list cache, stored in the library root.
pub const LIST_CACHE_FILE: &str = "asset_list_cache.json";

/// Asset list retrieval with caching.
pub struct AssetCatalog {
    config: Arc<LibraryConfig>,
    fetcher: Arc<dyn AssetFetcher>,
    event_bus: Arc<EventBus>,
}

impl AssetCatalog {
    pub fn new(
        config: Arc<LibraryConfig>,
        fetcher: Arc<dyn AssetFetcher>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            config,
            fetcher,
            event_bus,
        }
    }

    /// Path of the list cache file under the given library root.
    pub fn cache_path(root: &Path) -> PathBuf {
        root.join(LIST_CACHE_FILE)
    }

    /// Fetch the asset list, serving a fresh cache when possible.
    ///
    /// `force_refresh` bypasses the cache entirely. The cache is rewritten
    /// after every successful remote fetch.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Fetch` when the remote list cannot be
    /// retrieved or parsed and no usable cache exists.
    pub async fn asset_list(
        &self,
        root: &Path,
        filter: AssetTypeFilter,
        force_refresh: bool,
    ) -> Result<Vec<AssetRecord>> {
        let cache_path = Self::cache_path(root);

        if !force_refresh && self.cache_is_fresh(&cache_path).await {
            match self.read_cache(&cache_path).await {
                Ok(records) => {
                    debug!(path = %cache_path.display(), entries = records.len(), "asset list cache hit");
                    self.event_bus.publish(CatalogEvent::ListCacheHit {
                        path: cache_path.display().to_string(),
                        entries: records.len(),
                    });
                    return Ok(records);
                }
                Err(e) => {
                    warn!(path = %cache_path.display(), error = %e, "unreadable asset list cache, refetching");
                }
            }
        }

        let url = self.config.list_url(filter);
        info!(%url, "fetching asset list");
        let body = self
            .fetcher
            .get_bytes(&url)
            .await
            .map_err(|e| CatalogError::Fetch(e.to_string()))?;

        let raw: serde_json::Value =
            serde_json::from_slice(&body).map_err(|e| CatalogError::Fetch(e.to_string()))?;
        let records = parse_list(&raw)?;

        if let Err(e) = self.write_cache(&cache_path, &raw).await {
            warn!(path = %cache_path.display(), error = %e, "failed to write asset list cache");
        }

        self.event_bus.publish(CatalogEvent::ListRefreshed {
            entries: records.len(),
        });
        Ok(records)
    }

    async fn cache_is_fresh(&self, path: &Path) -> bool {
        let Ok(meta) = tokio::fs::metadata(path).await else {
            return false;
        };
        let Ok(modified) = meta.modified() else {
            return false;
        };
        match SystemTime::now().duration_since(modified) {
            Ok(age) => age < self.config.list_cache_ttl,
            // Clock skew put the mtime in the future; treat as fresh.
            Err(_) => true,
        }
    }

    async fn read_cache(&self, path: &Path) -> Result<Vec<AssetRecord>> {
        let body = tokio::fs::read(path).await?;
        let raw: serde_json::Value = serde_json::from_slice(&body)?;
        parse_list(&raw)
    }

    async fn write_cache(&self, path: &Path, raw: &serde_json::Value) -> Result<()> {
        let body = serde_json::to_vec_pretty(raw)?;
        tokio::fs::write(path, body).await?;
        Ok(())
    }
}

/// Parse the list response object into records, keyed by slug.
///
/// Entries that are not objects or fail to parse are skipped with a log
/// line; one malformed asset must not take down the whole list.
fn parse_list(raw: &serde_json::Value) -> Result<Vec<AssetRecord>> {
    let map = raw.as_object().ok_or(CatalogError::MalformedList)?;
    let mut records = Vec::with_capacity(map.len());
    for (slug, value) in map {
        if !value.is_object() {
            debug!(%slug, "skipping non-object list entry");
            continue;
        }
        match serde_json::from_value::<AssetRecord>(value.clone()) {
            Ok(record) => records.push(record.with_slug(slug.as_str())),
            Err(e) => debug!(%slug, error = %e, "skipping malformed list entry"),
        }
    }
    Ok(records)
}
