//! # Sync Orchestrator
//!
//! Drives one synchronization run: precondition checks, asset list
//! retrieval, bounded-concurrency dispatch, and result aggregation.
//!
//! ## Overview
//!
//! A run is accepted only when no other run is in flight. Preconditions
//! that fail before dispatch produce an already-terminal session with a
//! distinct result code rather than an error; the caller observes them the
//! same way as any other outcome, through events and [`SyncSession::wait`].
//!
//! Once dispatch starts, every asset in the list is handed to its own task
//! gated by a semaphore sized for the machine. Tasks report per-asset
//! results over a channel to a single aggregator, which owns all counter
//! updates and event emission. The aggregator emits `Summary` and then the
//! terminal `Finished` exactly once, whether the run completed or was
//! cancelled mid-flight.

use crate::error::{Result, SyncError};
use crate::session::{
    DownloadResult, SessionId, SessionState, SyncOutcome, SyncSession,
};
use bridge_traits::AssetFetcher;
use core_catalog::{AssetCatalog, AssetRecord, ContentStore, DownloadManifest};
use core_runtime::{AssetTypeFilter, EventBus, EventSeverity, LibraryConfig, SyncEvent};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// ============================================================================
// Orchestrator
// ============================================================================

/// Entry point for synchronization runs. One orchestrator serves the whole
/// process; at most one session runs at a time.
pub struct SyncOrchestrator {
    config: Arc<LibraryConfig>,
    fetcher: Arc<dyn AssetFetcher>,
    event_bus: Arc<EventBus>,
    in_progress: Arc<AtomicBool>,
}

/// Releases the single-run slot when the session ends, on any path.
struct RunSlot(Arc<AtomicBool>);

impl Drop for RunSlot {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SyncOrchestrator {
    pub fn new(
        config: Arc<LibraryConfig>,
        fetcher: Arc<dyn AssetFetcher>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            config,
            fetcher,
            event_bus,
            in_progress: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a session is currently running.
    pub fn is_running(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Start a synchronization run.
    ///
    /// `revalidate` bypasses the on-disk asset list cache and re-fetches
    /// metadata for assets that already look synchronized. The returned
    /// session may already be terminal when a precondition failed.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::SyncInProgress`] when another session is still
    /// running.
    pub async fn synchronize(
        &self,
        filter: AssetTypeFilter,
        revalidate: bool,
    ) -> Result<SyncSession> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SyncError::SyncInProgress);
        }
        let slot = RunSlot(self.in_progress.clone());

        let id = SessionId::new();
        info!(session_id = %id, ?filter, revalidate, "synchronization requested");

        let Some(root) = self.library_root() else {
            return Ok(self.refuse(
                id,
                "No asset library is configured",
                SyncOutcome::LibraryUnrecognized,
            ));
        };
        if tokio::fs::metadata(&root).await.is_err() {
            return Ok(self.refuse(
                id,
                "The configured library path does not exist",
                SyncOutcome::LibraryPathMissing,
            ));
        }
        if root.file_name().and_then(|n| n.to_str()) != Some(self.config.library_dir_name.as_str())
        {
            return Ok(self.refuse(
                id,
                "The configured path is not an asset library",
                SyncOutcome::LibraryUnrecognized,
            ));
        }

        let catalog = AssetCatalog::new(
            self.config.clone(),
            self.fetcher.clone(),
            self.event_bus.clone(),
        );
        let records = match catalog.asset_list(&root, filter, revalidate).await {
            Ok(records) => records,
            Err(e) => {
                return Ok(self.refuse(
                    id,
                    &format!("Failed to retrieve the asset list: {e}"),
                    SyncOutcome::ListUnavailable,
                ));
            }
        };

        if records.is_empty() {
            self.report(id, EventSeverity::Info, "Asset list is empty, nothing to do");
            self.event_bus.publish(SyncEvent::Summary {
                session_id: id.to_string(),
                downloaded: 0,
                failed: 0,
            });
            self.event_bus.publish(SyncEvent::Finished {
                session_id: id.to_string(),
                code: 0,
            });
            return Ok(SyncSession::terminal(
                id,
                SyncOutcome::Completed {
                    downloaded: 0,
                    failed: 0,
                },
            ));
        }

        Ok(self.dispatch(id, root, records, revalidate, slot))
    }

    /// Spawn the worker tasks and the aggregator, returning the live
    /// session handle.
    fn dispatch(
        &self,
        id: SessionId,
        root: PathBuf,
        records: Vec<AssetRecord>,
        revalidate: bool,
        slot: RunSlot,
    ) -> SyncSession {
        let total = records.len();
        let state = Arc::new(SessionState::new(total));
        let cancel = CancellationToken::new();
        let (outcome_tx, outcome_rx) = watch::channel(None);
        let (result_tx, result_rx) = mpsc::channel(total);

        self.event_bus.publish(SyncEvent::Started {
            session_id: id.to_string(),
            total,
        });

        let pool_size = self.config.worker_pool_size();
        debug!(session_id = %id, total, pool_size, "dispatching download tasks");
        let semaphore = Arc::new(Semaphore::new(pool_size));

        let ctx = Arc::new(TaskContext {
            config: self.config.clone(),
            fetcher: self.fetcher.clone(),
            store: ContentStore::new(root),
            cancel: cancel.clone(),
            revalidate,
        });

        for record in records {
            let ctx = ctx.clone();
            let semaphore = semaphore.clone();
            let result_tx = result_tx.clone();
            tokio::spawn(async move {
                let slug = record.slug.clone();
                // A closed semaphore is unreachable here; count it as a
                // failure so the tally stays conserved regardless.
                let result = match semaphore.acquire().await {
                    Ok(_permit) => process_asset(&ctx, record).await,
                    Err(_) => DownloadResult::failed(slug, "worker pool closed"),
                };
                let _ = result_tx.send(result).await;
            });
        }
        drop(result_tx);

        tokio::spawn(aggregate(
            id,
            state.clone(),
            cancel.clone(),
            self.event_bus.clone(),
            result_rx,
            outcome_tx,
            slot,
        ));

        SyncSession::new(id, cancel, state, outcome_rx)
    }

    fn library_root(&self) -> Option<PathBuf> {
        self.config.library_root.clone()
    }

    fn report(&self, id: SessionId, severity: EventSeverity, message: &str) {
        self.event_bus.publish(SyncEvent::Report {
            session_id: id.to_string(),
            severity,
            message: message.to_string(),
        });
    }

    /// Refuse the run before dispatch: report, emit the terminal event, and
    /// hand back an already-finished session.
    fn refuse(&self, id: SessionId, message: &str, outcome: SyncOutcome) -> SyncSession {
        warn!(session_id = %id, code = outcome.code(), "{message}");
        self.report(id, EventSeverity::Error, message);
        self.event_bus.publish(SyncEvent::Finished {
            session_id: id.to_string(),
            code: outcome.code(),
        });
        SyncSession::terminal(id, outcome)
    }
}

// ============================================================================
// Per-Asset Task
// ============================================================================

struct TaskContext {
    config: Arc<LibraryConfig>,
    fetcher: Arc<dyn AssetFetcher>,
    store: ContentStore,
    cancel: CancellationToken,
    /// Refresh metadata and thumbnails even for assets whose marker file
    /// is already present. Existing non-empty payloads are still kept.
    revalidate: bool,
}

/// Process one asset end to end. Never panics; every exit is a
/// [`DownloadResult`] for the aggregator.
async fn process_asset(ctx: &TaskContext, mut record: AssetRecord) -> DownloadResult {
    let slug = record.slug.clone();

    if ctx.cancel.is_cancelled() {
        return DownloadResult::failed(slug, "cancelled");
    }

    if !ctx.revalidate && ctx.store.is_synchronized(&slug).await {
        debug!(%slug, "already synchronized");
        return DownloadResult::succeeded(slug, true);
    }

    if let Err(e) = ctx.store.ensure_asset_dir(&slug).await {
        return DownloadResult::failed(slug, format!("create directory: {e}"));
    }

    let index_url = ctx.config.file_index_url(&slug);
    let manifest: DownloadManifest = match ctx.fetcher.get_bytes(&index_url).await {
        Ok(body) => match serde_json::from_slice(&body) {
            Ok(manifest) => manifest,
            Err(e) => return DownloadResult::failed(slug, format!("file index: {e}")),
        },
        Err(e) => return DownloadResult::failed(slug, format!("file index: {e}")),
    };

    if ctx.cancel.is_cancelled() {
        return DownloadResult::failed(slug, "cancelled");
    }

    // Thumbnail failures are not fatal; the browser falls back to a
    // placeholder until the next run.
    if !ctx.store.is_file_present(&slug, "thumbnail.png").await {
        let thumb_url = ctx.config.thumbnail_url(&slug);
        if let Err(e) = ctx
            .fetcher
            .download_to_file(&thumb_url, &ctx.store.thumbnail_path(&slug))
            .await
        {
            warn!(%slug, error = %e, "thumbnail download failed");
        }
    }

    let (content, quality, format) = (
        ctx.config.content_key.as_str(),
        ctx.config.quality.as_str(),
        ctx.config.format.as_str(),
    );
    let Some(entry) = manifest.entry(content, quality, format) else {
        return DownloadResult::failed(
            slug,
            format!("no {quality} {format} file listed under {content}"),
        );
    };
    if entry.url.is_empty() {
        return DownloadResult::failed(slug, "file entry has an empty download URL");
    }

    let file_name = entry.file_name(&slug, quality, format);
    let dest = ctx.store.file_path(&slug, &file_name);

    if !ctx.store.is_file_present(&slug, &file_name).await {
        if ctx.cancel.is_cancelled() {
            return DownloadResult::failed(slug, "cancelled");
        }
        if let Err(e) = ctx.fetcher.download_to_file(&entry.url, &dest).await {
            return DownloadResult::failed(slug, format!("download: {e}"));
        }
        if let Some(expected) = entry.md5.as_deref() {
            match ctx.store.file_md5(&dest).await {
                Ok(actual) if actual.eq_ignore_ascii_case(expected) => {}
                Ok(actual) => {
                    if let Err(e) = tokio::fs::remove_file(&dest).await {
                        warn!(%slug, error = %e, "failed to remove corrupt payload");
                    }
                    return DownloadResult::failed(
                        slug,
                        format!("checksum mismatch: expected {expected}, got {actual}"),
                    );
                }
                Err(e) => return DownloadResult::failed(slug, format!("checksum: {e}")),
            }
        }
    }

    record.files = Some(manifest);
    if let Err(e) = ctx.store.write_info(&slug, &record).await {
        return DownloadResult::failed(slug, format!("marker file: {e}"));
    }

    DownloadResult::succeeded(slug, false)
}

// ============================================================================
// Aggregator
// ============================================================================

/// Single consumer of per-asset results. Owns every counter update and all
/// post-dispatch event emission, so event ordering needs no further
/// synchronization.
async fn aggregate(
    id: SessionId,
    state: Arc<SessionState>,
    cancel: CancellationToken,
    event_bus: Arc<EventBus>,
    mut results: mpsc::Receiver<DownloadResult>,
    outcome_tx: watch::Sender<Option<SyncOutcome>>,
    slot: RunSlot,
) {
    let session_id = id.to_string();
    let total = state.total;

    while let Some(result) = results.recv().await {
        state.remaining.fetch_sub(1, Ordering::SeqCst);
        let current = total - state.remaining.load(Ordering::SeqCst);

        let (severity, message) = match (&result.error, result.existed) {
            (Some(error), _) => {
                state.failed.fetch_add(1, Ordering::SeqCst);
                (EventSeverity::Error, format!("{}: {error}", result.slug))
            }
            (None, true) => {
                state.downloaded.fetch_add(1, Ordering::SeqCst);
                (EventSeverity::Info, format!("{}: already up to date", result.slug))
            }
            (None, false) => {
                state.downloaded.fetch_add(1, Ordering::SeqCst);
                (EventSeverity::Info, format!("{}: downloaded", result.slug))
            }
        };

        event_bus.publish(SyncEvent::Report {
            session_id: session_id.clone(),
            severity,
            message,
        });
        event_bus.publish(SyncEvent::Progress {
            session_id: session_id.clone(),
            current,
            total,
            message: result.slug,
        });
    }

    let downloaded = state.downloaded.load(Ordering::SeqCst);
    let failed = state.failed.load(Ordering::SeqCst);
    let outcome = if cancel.is_cancelled() {
        SyncOutcome::Cancelled { downloaded, failed }
    } else {
        SyncOutcome::Completed { downloaded, failed }
    };

    info!(session_id = %id, downloaded, failed, code = outcome.code(), "session finished");
    event_bus.publish(SyncEvent::Summary {
        session_id: session_id.clone(),
        downloaded,
        failed,
    });
    event_bus.publish(SyncEvent::Finished {
        session_id,
        code: outcome.code(),
    });

    drop(slot);
    let _ = outcome_tx.send(Some(outcome));
}
