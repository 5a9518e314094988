//! # Library Configuration
//!
//! One explicit configuration object, constructed once at startup and handed
//! by `Arc` to every component that needs it. There is no process-wide
//! last-used-path state or hidden global lookup anywhere in the core.
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::LibraryConfig;
//!
//! let config = LibraryConfig::builder()
//!     .library_root("/assets/Poly Haven")
//!     .quality("2k")
//!     .format("exr")
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.quality, "2k");
//! ```
//!
//! The library root is optional at build time: a host may construct the core
//! before the user has picked a folder. The orchestrator fails fast with a
//! distinct result code when a sync is requested without one.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Remote asset-type selector for list requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetTypeFilter {
    /// Every asset type the service knows about.
    All,
    /// Environment lighting images.
    Hdris,
    /// Surface textures.
    Textures,
    /// Geometry assets.
    Models,
}

impl AssetTypeFilter {
    /// Query-string value for the remote list endpoint.
    pub fn as_query(&self) -> &'static str {
        match self {
            AssetTypeFilter::All => "all",
            AssetTypeFilter::Hdris => "hdris",
            AssetTypeFilter::Textures => "textures",
            AssetTypeFilter::Models => "models",
        }
    }
}

impl std::fmt::Display for AssetTypeFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_query())
    }
}

/// Immutable configuration shared by the catalog, orchestrator, and cache.
#[derive(Debug, Clone)]
pub struct LibraryConfig {
    /// Root directory of the local asset library, if one is configured.
    pub library_root: Option<PathBuf>,

    /// Expected directory name of the library root. Syncing into an
    /// arbitrary folder is refused; the root must be recognizably the
    /// library the host set up.
    pub library_dir_name: String,

    /// Base URL of the catalog API (list and per-asset file index).
    pub api_base_url: String,

    /// Base URL of the CDN serving thumbnails.
    pub cdn_base_url: String,

    /// User-Agent sent with every request.
    pub user_agent: String,

    /// Manifest quality level to download (e.g. "1k", "4k").
    pub quality: String,

    /// Manifest file format to download (e.g. "hdr", "exr").
    pub format: String,

    /// Manifest content key selecting the payload family (e.g. "hdri").
    pub content_key: String,

    /// Include not-yet-released assets in list requests.
    pub early_access: bool,

    /// Freshness window for the on-disk asset list cache.
    pub list_cache_ttl: Duration,

    /// Upper bound on concurrent download workers. The effective pool size
    /// is `min(worker_cap, 2 x available parallelism)`.
    pub worker_cap: usize,
}

impl LibraryConfig {
    /// Start building a configuration.
    pub fn builder() -> LibraryConfigBuilder {
        LibraryConfigBuilder::default()
    }

    /// Effective download worker pool size for this machine.
    pub fn worker_pool_size(&self) -> usize {
        let parallelism = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        self.worker_cap.min(parallelism * 2).max(1)
    }

    /// Remote list endpoint for the given type selector.
    pub fn list_url(&self, filter: AssetTypeFilter) -> String {
        let mut url = format!("{}/assets?t={}", self.api_base_url, filter.as_query());
        if self.early_access {
            url.push_str("&future=true");
        }
        url
    }

    /// Remote per-asset file index endpoint.
    pub fn file_index_url(&self, slug: &str) -> String {
        format!("{}/files/{}", self.api_base_url, slug)
    }

    /// Remote thumbnail endpoint, pre-sized for the library browser.
    pub fn thumbnail_url(&self, slug: &str) -> String {
        format!(
            "{}/asset_img/thumbs/{}.png?width=256&height=256",
            self.cdn_base_url, slug
        )
    }
}

/// Builder for [`LibraryConfig`] with fail-fast validation.
#[derive(Debug, Clone)]
pub struct LibraryConfigBuilder {
    library_root: Option<PathBuf>,
    library_dir_name: String,
    api_base_url: String,
    cdn_base_url: String,
    user_agent: String,
    quality: String,
    format: String,
    content_key: String,
    early_access: bool,
    list_cache_ttl: Duration,
    worker_cap: usize,
}

impl Default for LibraryConfigBuilder {
    fn default() -> Self {
        Self {
            library_root: None,
            library_dir_name: "Poly Haven".to_string(),
            api_base_url: "https://api.polyhaven.com".to_string(),
            cdn_base_url: "https://cdn.polyhaven.com".to_string(),
            user_agent: "asset-library-core/0.1".to_string(),
            quality: "1k".to_string(),
            format: "hdr".to_string(),
            content_key: "hdri".to_string(),
            early_access: false,
            list_cache_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            worker_cap: 4,
        }
    }
}

impl LibraryConfigBuilder {
    /// Set the local library root directory.
    pub fn library_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.library_root = Some(root.into());
        self
    }

    /// Override the expected library directory name.
    pub fn library_dir_name(mut self, name: impl Into<String>) -> Self {
        self.library_dir_name = name.into();
        self
    }

    /// Override the catalog API base URL (no trailing slash).
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Override the CDN base URL (no trailing slash).
    pub fn cdn_base_url(mut self, url: impl Into<String>) -> Self {
        self.cdn_base_url = url.into();
        self
    }

    /// Override the User-Agent string.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = ua.into();
        self
    }

    /// Manifest quality level to download.
    pub fn quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = quality.into();
        self
    }

    /// Manifest file format to download.
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    /// Manifest content key selecting the payload family.
    pub fn content_key(mut self, key: impl Into<String>) -> Self {
        self.content_key = key.into();
        self
    }

    /// Include not-yet-released assets in list requests.
    pub fn early_access(mut self, enabled: bool) -> Self {
        self.early_access = enabled;
        self
    }

    /// Override the asset list cache freshness window.
    pub fn list_cache_ttl(mut self, ttl: Duration) -> Self {
        self.list_cache_ttl = ttl;
        self
    }

    /// Cap the download worker pool.
    pub fn worker_cap(mut self, cap: usize) -> Self {
        self.worker_cap = cap;
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when a required field is empty or obviously
    /// malformed, so a bad host setup surfaces at startup rather than in the
    /// middle of a sync.
    pub fn build(self) -> Result<LibraryConfig> {
        if self.library_dir_name.trim().is_empty() {
            return Err(Error::Config("library_dir_name must not be empty".into()));
        }
        for (field, value) in [
            ("api_base_url", &self.api_base_url),
            ("cdn_base_url", &self.cdn_base_url),
        ] {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err(Error::Config(format!("{field} must be an http(s) URL")));
            }
            if value.ends_with('/') {
                return Err(Error::Config(format!("{field} must not end with a slash")));
            }
        }
        if self.quality.trim().is_empty() {
            return Err(Error::Config("quality must not be empty".into()));
        }
        if self.format.trim().is_empty() {
            return Err(Error::Config("format must not be empty".into()));
        }
        if self.content_key.trim().is_empty() {
            return Err(Error::Config("content_key must not be empty".into()));
        }
        if self.worker_cap == 0 {
            return Err(Error::Config("worker_cap must be at least 1".into()));
        }

        Ok(LibraryConfig {
            library_root: self.library_root,
            library_dir_name: self.library_dir_name,
            api_base_url: self.api_base_url,
            cdn_base_url: self.cdn_base_url,
            user_agent: self.user_agent,
            quality: self.quality,
            format: self.format,
            content_key: self.content_key,
            early_access: self.early_access,
            list_cache_ttl: self.list_cache_ttl,
            worker_cap: self.worker_cap,
        })
    }
}
