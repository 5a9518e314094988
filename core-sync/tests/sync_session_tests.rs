//! End-to-end tests for synchronization sessions against a scripted
//! fetcher and a temporary library on disk.

use async_trait::async_trait;
use bridge_traits::{AssetFetcher, BridgeError};
use bytes::Bytes;
use core_runtime::{AssetTypeFilter, CoreEvent, EventBus, LibraryConfig, SyncEvent};
use core_sync::{SyncError, SyncOrchestrator, SyncOutcome};
use md5::{Digest, Md5};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

// ============================================================================
// Scripted Fetcher
// ============================================================================

/// Serves canned bodies by URL and records call counts. URLs with no
/// scripted body come back as HTTP 404 so tests never hit the network.
struct ScriptedFetcher {
    bodies: HashMap<String, Vec<u8>>,
    get_calls: AtomicUsize,
    download_calls: AtomicUsize,
    /// When set, file index requests wait for a permit before responding.
    index_gate: Option<Arc<Semaphore>>,
}

impl ScriptedFetcher {
    fn new(bodies: HashMap<String, Vec<u8>>) -> Arc<Self> {
        Arc::new(Self {
            bodies,
            get_calls: AtomicUsize::new(0),
            download_calls: AtomicUsize::new(0),
            index_gate: None,
        })
    }

    fn gated(bodies: HashMap<String, Vec<u8>>, gate: Arc<Semaphore>) -> Arc<Self> {
        Arc::new(Self {
            bodies,
            get_calls: AtomicUsize::new(0),
            download_calls: AtomicUsize::new(0),
            index_gate: Some(gate),
        })
    }

    fn lookup(&self, url: &str) -> bridge_traits::Result<Vec<u8>> {
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| BridgeError::HttpStatus {
                status: 404,
                url: url.to_string(),
            })
    }
}

#[async_trait]
impl AssetFetcher for ScriptedFetcher {
    async fn get_bytes(&self, url: &str) -> bridge_traits::Result<Bytes> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.index_gate {
            if url.contains("/files/") {
                gate.acquire().await.map_err(|_| BridgeError::Transport("gate closed".into()))?.forget();
            }
        }
        self.lookup(url).map(Bytes::from)
    }

    async fn download_to_file(&self, url: &str, dest: &Path) -> bridge_traits::Result<()> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        let body = self.lookup(url)?;
        tokio::fs::write(dest, body).await?;
        Ok(())
    }
}

// ============================================================================
// Fixtures
// ============================================================================

const LIST_URL: &str = "https://api.polyhaven.com/assets?t=hdris";
const MEADOW_PAYLOAD: &[u8] = b"meadow hdr payload bytes";
const CELLAR_PAYLOAD: &[u8] = b"cellar hdr payload bytes";

fn md5_hex(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

fn list_body() -> Vec<u8> {
    br#"{
        "meadow": {"name": "Meadow", "type": 0, "tags": ["outdoor"]},
        "cellar": {"name": "Cellar", "type": 0}
    }"#
    .to_vec()
}

fn manifest_body(url: &str, md5: Option<&str>) -> Vec<u8> {
    let md5_field = md5
        .map(|m| format!(", \"md5\": \"{m}\""))
        .unwrap_or_default();
    format!(r#"{{"hdri": {{"1k": {{"hdr": {{"url": "{url}"{md5_field}}}}}}}}}"#).into_bytes()
}

/// Standard two-asset script: list, file indexes, thumbnails, payloads.
/// The meadow entry carries a correct checksum, the cellar entry none.
fn standard_bodies() -> HashMap<String, Vec<u8>> {
    let mut bodies = HashMap::new();
    bodies.insert(LIST_URL.to_string(), list_body());
    bodies.insert(
        "https://api.polyhaven.com/files/meadow".to_string(),
        manifest_body(
            "https://dl.example.com/meadow_1k.hdr",
            Some(&md5_hex(MEADOW_PAYLOAD)),
        ),
    );
    bodies.insert(
        "https://api.polyhaven.com/files/cellar".to_string(),
        manifest_body("https://dl.example.com/cellar_1k.hdr", None),
    );
    bodies.insert(
        "https://dl.example.com/meadow_1k.hdr".to_string(),
        MEADOW_PAYLOAD.to_vec(),
    );
    bodies.insert(
        "https://dl.example.com/cellar_1k.hdr".to_string(),
        CELLAR_PAYLOAD.to_vec(),
    );
    for slug in ["meadow", "cellar"] {
        bodies.insert(
            format!("https://cdn.polyhaven.com/asset_img/thumbs/{slug}.png?width=256&height=256"),
            b"png-bytes".to_vec(),
        );
    }
    bodies
}

struct TestEnv {
    _tmp: tempfile::TempDir,
    root: PathBuf,
    bus: Arc<EventBus>,
}

impl TestEnv {
    fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("Poly Haven");
        std::fs::create_dir_all(&root).unwrap();
        Self {
            _tmp: tmp,
            root,
            bus: Arc::new(EventBus::new()),
        }
    }

    fn config(&self) -> Arc<LibraryConfig> {
        Arc::new(
            LibraryConfig::builder()
                .library_root(&self.root)
                .build()
                .unwrap(),
        )
    }

    fn orchestrator(&self, fetcher: Arc<ScriptedFetcher>) -> SyncOrchestrator {
        SyncOrchestrator::new(self.config(), fetcher, self.bus.clone())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn downloads_missing_assets_and_writes_markers() {
    let env = TestEnv::new();
    let fetcher = ScriptedFetcher::new(standard_bodies());
    let orchestrator = env.orchestrator(fetcher.clone());

    let session = orchestrator
        .synchronize(AssetTypeFilter::Hdris, false)
        .await
        .unwrap();
    let outcome = session.wait().await;

    assert_eq!(
        outcome,
        SyncOutcome::Completed {
            downloaded: 2,
            failed: 0
        }
    );
    assert_eq!(outcome.code(), 0);

    let progress = session.progress();
    assert_eq!(progress.remaining, 0);
    assert_eq!(progress.downloaded, 2);

    for (slug, payload) in [("meadow", MEADOW_PAYLOAD), ("cellar", CELLAR_PAYLOAD)] {
        let dir = env.root.join(slug);
        assert_eq!(
            std::fs::read(dir.join(format!("{slug}_1k.hdr"))).unwrap(),
            payload
        );
        assert!(dir.join("thumbnail.png").exists());

        let info: serde_json::Value =
            serde_json::from_slice(&std::fs::read(dir.join("info.json")).unwrap()).unwrap();
        assert!(info["files"]["hdri"]["1k"]["hdr"]["url"]
            .as_str()
            .unwrap()
            .contains(slug));
    }
}

#[tokio::test]
async fn event_stream_ends_with_summary_then_a_single_finished() {
    let env = TestEnv::new();
    let fetcher = ScriptedFetcher::new(standard_bodies());
    let orchestrator = env.orchestrator(fetcher);

    let mut rx = env.bus.subscribe();
    let session = orchestrator
        .synchronize(AssetTypeFilter::Hdris, false)
        .await
        .unwrap();
    session.wait().await;

    let mut sync_events = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("event stream stalled")
            .unwrap();
        if let CoreEvent::Sync(event) = event {
            let finished = matches!(event, SyncEvent::Finished { .. });
            sync_events.push(event);
            if finished {
                break;
            }
        }
    }

    assert!(matches!(
        sync_events.first(),
        Some(SyncEvent::Started { total: 2, .. })
    ));
    let finished_count = sync_events
        .iter()
        .filter(|e| matches!(e, SyncEvent::Finished { .. }))
        .count();
    assert_eq!(finished_count, 1);

    let len = sync_events.len();
    assert!(matches!(
        sync_events[len - 2],
        SyncEvent::Summary {
            downloaded: 2,
            failed: 0,
            ..
        }
    ));
    assert!(matches!(
        sync_events[len - 1],
        SyncEvent::Finished { code: 0, .. }
    ));

    let progress_count = sync_events
        .iter()
        .filter(|e| matches!(e, SyncEvent::Progress { .. }))
        .count();
    assert_eq!(progress_count, 2);
}

#[tokio::test]
async fn second_run_serves_cache_and_skips_synchronized_assets() {
    let env = TestEnv::new();
    let fetcher = ScriptedFetcher::new(standard_bodies());
    let orchestrator = env.orchestrator(fetcher.clone());

    orchestrator
        .synchronize(AssetTypeFilter::Hdris, false)
        .await
        .unwrap()
        .wait()
        .await;

    let gets_after_first = fetcher.get_calls.load(Ordering::SeqCst);
    let downloads_after_first = fetcher.download_calls.load(Ordering::SeqCst);

    let outcome = orchestrator
        .synchronize(AssetTypeFilter::Hdris, false)
        .await
        .unwrap()
        .wait()
        .await;

    // List came from the on-disk cache and both assets short-circuited on
    // their marker files, so the second run made no requests at all.
    assert_eq!(
        outcome,
        SyncOutcome::Completed {
            downloaded: 2,
            failed: 0
        }
    );
    assert_eq!(fetcher.get_calls.load(Ordering::SeqCst), gets_after_first);
    assert_eq!(
        fetcher.download_calls.load(Ordering::SeqCst),
        downloads_after_first
    );
}

#[tokio::test]
async fn revalidate_refreshes_metadata_but_keeps_existing_payloads() {
    let env = TestEnv::new();
    let fetcher = ScriptedFetcher::new(standard_bodies());
    let orchestrator = env.orchestrator(fetcher.clone());

    orchestrator
        .synchronize(AssetTypeFilter::Hdris, false)
        .await
        .unwrap()
        .wait()
        .await;

    let downloads_after_first = fetcher.download_calls.load(Ordering::SeqCst);
    let gets_after_first = fetcher.get_calls.load(Ordering::SeqCst);

    let outcome = orchestrator
        .synchronize(AssetTypeFilter::Hdris, true)
        .await
        .unwrap()
        .wait()
        .await;

    assert_eq!(
        outcome,
        SyncOutcome::Completed {
            downloaded: 2,
            failed: 0
        }
    );
    // List and both file indexes were refetched, but payloads and
    // thumbnails on disk were left alone.
    assert_eq!(
        fetcher.get_calls.load(Ordering::SeqCst),
        gets_after_first + 3
    );
    assert_eq!(
        fetcher.download_calls.load(Ordering::SeqCst),
        downloads_after_first
    );
}

#[tokio::test]
async fn unconfigured_library_is_refused_without_network() {
    let env = TestEnv::new();
    let fetcher = ScriptedFetcher::new(standard_bodies());
    let config = Arc::new(LibraryConfig::builder().build().unwrap());
    let orchestrator = SyncOrchestrator::new(config, fetcher.clone(), env.bus.clone());

    let session = orchestrator
        .synchronize(AssetTypeFilter::Hdris, false)
        .await
        .unwrap();

    assert_eq!(session.wait().await, SyncOutcome::LibraryUnrecognized);
    assert_eq!(session.outcome().unwrap().code(), -1);
    assert_eq!(fetcher.get_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_library_path_is_refused() {
    let env = TestEnv::new();
    let fetcher = ScriptedFetcher::new(standard_bodies());
    let config = Arc::new(
        LibraryConfig::builder()
            .library_root(env.root.join("does-not-exist"))
            .build()
            .unwrap(),
    );
    let orchestrator = SyncOrchestrator::new(config, fetcher, env.bus.clone());

    let outcome = orchestrator
        .synchronize(AssetTypeFilter::Hdris, false)
        .await
        .unwrap()
        .wait()
        .await;
    assert_eq!(outcome, SyncOutcome::LibraryPathMissing);
    assert_eq!(outcome.code(), -2);
}

#[tokio::test]
async fn wrong_directory_name_is_refused() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("Downloads");
    std::fs::create_dir_all(&root).unwrap();
    let fetcher = ScriptedFetcher::new(standard_bodies());
    let config = Arc::new(LibraryConfig::builder().library_root(&root).build().unwrap());
    let orchestrator = SyncOrchestrator::new(config, fetcher, Arc::new(EventBus::new()));

    let outcome = orchestrator
        .synchronize(AssetTypeFilter::Hdris, false)
        .await
        .unwrap()
        .wait()
        .await;
    assert_eq!(outcome, SyncOutcome::LibraryUnrecognized);
}

#[tokio::test]
async fn unreachable_list_endpoint_yields_list_unavailable() {
    let env = TestEnv::new();
    let fetcher = ScriptedFetcher::new(HashMap::new());
    let orchestrator = env.orchestrator(fetcher);

    let outcome = orchestrator
        .synchronize(AssetTypeFilter::Hdris, false)
        .await
        .unwrap()
        .wait()
        .await;
    assert_eq!(outcome, SyncOutcome::ListUnavailable);
    assert_eq!(outcome.code(), -3);
}

#[tokio::test]
async fn cancelled_session_counts_unprocessed_assets_as_failed() {
    let env = TestEnv::new();
    let gate = Arc::new(Semaphore::new(0));
    let fetcher = ScriptedFetcher::gated(standard_bodies(), gate.clone());
    let orchestrator = env.orchestrator(fetcher.clone());

    let session = orchestrator
        .synchronize(AssetTypeFilter::Hdris, false)
        .await
        .unwrap();

    // Both tasks are parked on their file index requests; cancel, then let
    // them proceed to their cancellation checkpoints.
    session.cancel();
    gate.add_permits(2);

    let outcome = session.wait().await;
    assert_eq!(
        outcome,
        SyncOutcome::Cancelled {
            downloaded: 0,
            failed: 2
        }
    );
    assert_eq!(outcome.code(), 1);
    assert_eq!(fetcher.download_calls.load(Ordering::SeqCst), 0);

    let progress = session.progress();
    assert_eq!(progress.downloaded + progress.failed, progress.total);
}

#[tokio::test]
async fn task_starting_after_cancel_makes_no_network_calls() {
    let env = TestEnv::new();
    let gate = Arc::new(Semaphore::new(0));
    let fetcher = ScriptedFetcher::gated(standard_bodies(), gate.clone());
    let config = Arc::new(
        LibraryConfig::builder()
            .library_root(&env.root)
            .worker_cap(1)
            .build()
            .unwrap(),
    );
    let orchestrator = SyncOrchestrator::new(config, fetcher.clone(), env.bus.clone());

    let session = orchestrator
        .synchronize(AssetTypeFilter::Hdris, false)
        .await
        .unwrap();

    // With a single worker, wait until the first task is parked inside its
    // index fetch (one list request plus one index request); the second
    // task has not started yet.
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while fetcher.get_calls.load(Ordering::SeqCst) < 2 {
        assert!(
            std::time::Instant::now() < deadline,
            "first task never reached its index fetch"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    session.cancel();
    gate.add_permits(2);

    let outcome = session.wait().await;
    assert_eq!(
        outcome,
        SyncOutcome::Cancelled {
            downloaded: 0,
            failed: 2
        }
    );

    // The task that started after cancellation short-circuited before any
    // request: the only GETs are the list and the first task's index.
    assert_eq!(fetcher.get_calls.load(Ordering::SeqCst), 2);
    assert_eq!(fetcher.download_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn only_one_session_runs_at_a_time() {
    let env = TestEnv::new();
    let gate = Arc::new(Semaphore::new(0));
    let fetcher = ScriptedFetcher::gated(standard_bodies(), gate.clone());
    let orchestrator = env.orchestrator(fetcher);

    let session = orchestrator
        .synchronize(AssetTypeFilter::Hdris, false)
        .await
        .unwrap();
    assert!(orchestrator.is_running());

    let second = orchestrator.synchronize(AssetTypeFilter::Hdris, false).await;
    assert!(matches!(second, Err(SyncError::SyncInProgress)));

    gate.add_permits(2);
    session.wait().await;
    assert!(!orchestrator.is_running());

    // The slot is free again once the first session is terminal.
    gate.add_permits(2);
    let third = orchestrator
        .synchronize(AssetTypeFilter::Hdris, false)
        .await
        .unwrap();
    assert_eq!(third.wait().await.code(), 0);
}

#[tokio::test]
async fn checksum_mismatch_fails_the_asset_and_removes_the_payload() {
    let env = TestEnv::new();
    let mut bodies = standard_bodies();
    bodies.insert(
        "https://api.polyhaven.com/files/meadow".to_string(),
        manifest_body(
            "https://dl.example.com/meadow_1k.hdr",
            Some("00000000000000000000000000000000"),
        ),
    );
    let fetcher = ScriptedFetcher::new(bodies);
    let orchestrator = env.orchestrator(fetcher);

    let outcome = orchestrator
        .synchronize(AssetTypeFilter::Hdris, false)
        .await
        .unwrap()
        .wait()
        .await;

    assert_eq!(
        outcome,
        SyncOutcome::Completed {
            downloaded: 1,
            failed: 1
        }
    );
    assert!(!env.root.join("meadow/meadow_1k.hdr").exists());
    assert!(!env.root.join("meadow/info.json").exists());
    assert!(env.root.join("cellar/info.json").exists());
}

#[tokio::test]
async fn asset_without_requested_quality_fails_but_run_completes() {
    let env = TestEnv::new();
    let mut bodies = standard_bodies();
    bodies.insert(
        "https://api.polyhaven.com/files/meadow".to_string(),
        br#"{"hdri": {"2k": {"hdr": {"url": "https://dl.example.com/meadow_2k.hdr"}}}}"#.to_vec(),
    );
    let fetcher = ScriptedFetcher::new(bodies);
    let orchestrator = env.orchestrator(fetcher);

    let mut rx = env.bus.subscribe();
    let outcome = orchestrator
        .synchronize(AssetTypeFilter::Hdris, false)
        .await
        .unwrap()
        .wait()
        .await;

    assert_eq!(
        outcome,
        SyncOutcome::Completed {
            downloaded: 1,
            failed: 1
        }
    );

    // The failure surfaces as an error report naming the asset.
    let mut saw_failure_report = false;
    while let Ok(event) = rx.try_recv() {
        if let CoreEvent::Sync(SyncEvent::Report { message, .. }) = event {
            if message.starts_with("meadow:") && message.contains("no 1k hdr") {
                saw_failure_report = true;
            }
        }
    }
    assert!(saw_failure_report);
}
