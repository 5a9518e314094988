//! Reqwest-backed [`AssetFetcher`] implementation.

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::AssetFetcher,
};
use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Default User-Agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = "asset-library-core/0.1";

/// Reqwest-based fetcher
///
/// Provides the two network primitives the core needs:
/// - buffered GET with `Accept: application/json` for list/index endpoints
/// - streamed GET-to-disk for thumbnails and payloads, with partial-file
///   cleanup on failure
///
/// Connection pooling and TLS come from reqwest. Each call carries its own
/// timeout; there is no retry at this layer.
pub struct ReqwestFetcher {
    client: Client,
    request_timeout: Duration,
}

impl ReqwestFetcher {
    /// Create a fetcher with the default User-Agent and a 30 second timeout.
    pub fn new() -> Self {
        Self::with_user_agent(DEFAULT_USER_AGENT, Duration::from_secs(30))
    }

    /// Create a fetcher with a custom User-Agent and request timeout.
    ///
    /// The timeout applies to buffered GETs only; streamed downloads are
    /// bounded per-chunk by the connect timeout rather than in total, since
    /// payload sizes vary by orders of magnitude.
    pub fn with_user_agent(user_agent: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .user_agent(user_agent)
            .build()
            .expect("Failed to build HTTP client");
        Self {
            client,
            request_timeout: timeout,
        }
    }

    /// Wrap an externally configured reqwest client.
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for ReqwestFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssetFetcher for ReqwestFetcher {
    async fn get_bytes(&self, url: &str) -> Result<Bytes> {
        debug!(url, "GET");
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| BridgeError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response
            .bytes()
            .await
            .map_err(|e| BridgeError::Transport(e.to_string()))
    }

    async fn download_to_file(&self, url: &str, dest: &Path) -> Result<()> {
        debug!(url, dest = %dest.display(), "download");

        let result = self.stream_to_file(url, dest).await;
        if result.is_err() {
            // Never leave a partial file behind; a zero/truncated file would
            // read as "already downloaded" on the next sync.
            if let Err(e) = fs::remove_file(dest).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(dest = %dest.display(), error = %e, "failed to remove partial file");
                }
            }
        }
        result
    }
}

impl ReqwestFetcher {
    async fn stream_to_file(&self, url: &str, dest: &Path) -> Result<()> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BridgeError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let mut file = fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| BridgeError::Transport(e.to_string()))?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
}
