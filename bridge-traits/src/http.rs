//! HTTP Fetch Abstraction
//!
//! The sync engine needs exactly two network primitives: a small GET that
//! buffers the response in memory (catalog lists, file indexes) and a
//! streaming download that writes straight to disk (thumbnails, payloads).
//! There is no retry at this layer; the orchestrator decides what a failed
//! call means for the owning task.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::Path;

use crate::error::Result;

/// Network seam used by the catalog and the download orchestrator.
///
/// Implementations must be cheap to share (`Arc<dyn AssetFetcher>`) and safe
/// to call from any number of concurrent tasks.
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Perform one GET and return the full response body.
    ///
    /// Non-2xx statuses are errors; the body is never partially returned.
    async fn get_bytes(&self, url: &str) -> Result<Bytes>;

    /// Stream one GET response into `dest`, creating or truncating it.
    ///
    /// On any failure (transport, non-2xx status, write error) the partially
    /// written file must be removed so a zero/partial file never masquerades
    /// as a completed download.
    async fn download_to_file(&self, url: &str, dest: &Path) -> Result<()>;
}
