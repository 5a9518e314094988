//! # Asset Data Model
//!
//! Typed records for the remote service's JSON. The service evolves its
//! payloads over time, so every struct carries a flattened `extra` map:
//! fields this crate does not model are preserved byte-for-byte through a
//! parse/serialize round trip. The marker file written next to a payload is
//! the service's own entry plus the merged file index, so nothing the
//! service said about an asset is lost locally.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Asset Kind
// ============================================================================

/// Asset category, encoded by the service as a small integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum AssetKind {
    Hdri,
    Texture,
    Model,
}

impl TryFrom<u8> for AssetKind {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(AssetKind::Hdri),
            1 => Ok(AssetKind::Texture),
            2 => Ok(AssetKind::Model),
            other => Err(format!("unknown asset type {other}")),
        }
    }
}

impl From<AssetKind> for u8 {
    fn from(kind: AssetKind) -> u8 {
        match kind {
            AssetKind::Hdri => 0,
            AssetKind::Texture => 1,
            AssetKind::Model => 2,
        }
    }
}

// ============================================================================
// Asset Record
// ============================================================================

/// One asset as described by the list endpoint, optionally extended with
/// its download manifest under the `files` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Identifier of the asset, taken from the list object's key. Not part
    /// of the record's own JSON.
    #[serde(skip)]
    pub slug: String,

    /// Display name.
    pub name: String,

    /// Asset category.
    #[serde(rename = "type")]
    pub kind: AssetKind,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub categories: Vec<String>,

    /// Author name to contribution role.
    #[serde(default)]
    pub authors: BTreeMap<String, String>,

    /// Download manifest, merged in after a file index fetch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<DownloadManifest>,

    /// Everything else the service sent, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AssetRecord {
    /// Attach the slug from the enclosing list key.
    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = slug.into();
        self
    }
}

// ============================================================================
// Download Manifest
// ============================================================================

/// Per-asset file index as returned by the file index endpoint.
///
/// The tree is nominally content key, then quality level, then format, with
/// a [`FileEntry`] leaf, but several branches do not follow that shape
/// (single-file entries sit directly under the content key). The raw tree
/// is kept intact and [`DownloadManifest::entry`] does a typed lookup at
/// the conventional depth.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DownloadManifest(pub serde_json::Map<String, serde_json::Value>);

impl DownloadManifest {
    /// Look up the file entry at `content -> quality -> format`.
    ///
    /// Returns `None` when any level of the path is absent or the leaf is
    /// not a well-formed file entry.
    pub fn entry(&self, content: &str, quality: &str, format: &str) -> Option<FileEntry> {
        let leaf = self.0.get(content)?.get(quality)?.get(format)?;
        serde_json::from_value(leaf.clone()).ok()
    }
}

/// One downloadable file in a manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl FileEntry {
    /// Local file name for this entry.
    ///
    /// The last path segment of the URL when it has one. URLs with no path
    /// past the authority (and empty final segments) get a synthesized
    /// `{slug}_{quality}.{format}` name instead.
    pub fn file_name(&self, slug: &str, quality: &str, format: &str) -> String {
        let trimmed = self.url.split(['#', '?']).next().unwrap_or(&self.url);
        let after_scheme = trimmed
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(trimmed);
        let name = after_scheme
            .split_once('/')
            .and_then(|(_, path)| path.rsplit('/').next())
            .unwrap_or("");
        if name.is_empty() {
            format!("{slug}_{quality}.{format}")
        } else {
            name.to_string()
        }
    }
}
