//! # Content Store
//!
//! Layout and inspection of the on-disk library.
//!
//! ## Overview
//!
//! Every asset owns one directory named after its slug, directly under the
//! library root. The directory holds a marker file (`info.json`, the
//! service's record for the asset), the downloaded payload, and a cached
//! thumbnail. Presence of a non-empty marker file is the synchronization
//! criterion; a zero-length file counts as absent everywhere, since an
//! interrupted run can leave empty files behind.

use crate::error::Result;
use crate::models::AssetRecord;
use md5::{Digest, Md5};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::debug;

/// Marker file name inside each asset directory.
pub const INFO_FILE: &str = "info.json";

/// Read chunk size for payload hashing.
const HASH_CHUNK_SIZE: usize = 8192;

/// File system view of one library root.
#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory owned by the given asset.
    pub fn asset_dir(&self, slug: &str) -> PathBuf {
        self.root.join(slug)
    }

    /// Create the asset directory if needed and return it.
    pub async fn ensure_asset_dir(&self, slug: &str) -> Result<PathBuf> {
        let dir = self.asset_dir(slug);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Path of the asset's marker file.
    pub fn info_path(&self, slug: &str) -> PathBuf {
        self.asset_dir(slug).join(INFO_FILE)
    }

    /// Path of a payload file inside the asset directory.
    pub fn file_path(&self, slug: &str, file_name: &str) -> PathBuf {
        self.asset_dir(slug).join(file_name)
    }

    /// Path of the asset's cached thumbnail.
    pub fn thumbnail_path(&self, slug: &str) -> PathBuf {
        self.asset_dir(slug).join("thumbnail.png")
    }

    /// Whether the asset has a non-empty marker file.
    pub async fn is_synchronized(&self, slug: &str) -> bool {
        non_empty_file(&self.info_path(slug)).await
    }

    /// Whether a payload file exists with actual content.
    pub async fn is_file_present(&self, slug: &str, file_name: &str) -> bool {
        non_empty_file(&self.file_path(slug, file_name)).await
    }

    /// Read and parse the marker file.
    ///
    /// Returns `Ok(None)` when the file is missing or empty. A present but
    /// unparseable marker is an error; callers decide whether that means
    /// the asset needs to be re-synchronized.
    pub async fn read_info(&self, slug: &str) -> Result<Option<AssetRecord>> {
        let path = self.info_path(slug);
        let body = match tokio::fs::read(&path).await {
            Ok(body) if body.is_empty() => return Ok(None),
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: AssetRecord = serde_json::from_slice(&body)?;
        Ok(Some(record.with_slug(slug)))
    }

    /// Write the marker file as pretty-printed JSON.
    pub async fn write_info(&self, slug: &str, record: &AssetRecord) -> Result<()> {
        self.ensure_asset_dir(slug).await?;
        let body = serde_json::to_vec_pretty(record)?;
        tokio::fs::write(self.info_path(slug), body).await?;
        debug!(%slug, "wrote marker file");
        Ok(())
    }

    /// MD5 digest of a file, as a lowercase hex string.
    ///
    /// Reads in fixed-size chunks so large payloads never sit in memory
    /// whole.
    pub async fn file_md5(&self, path: &Path) -> Result<String> {
        let mut file = tokio::fs::File::open(path).await?;
        let mut hasher = Md5::new();
        let mut buf = vec![0u8; HASH_CHUNK_SIZE];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(format!("{:x}", hasher.finalize()))
    }
}

async fn non_empty_file(path: &Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.is_file() && meta.len() > 0,
        Err(_) => false,
    }
}
