//! End-to-end flows over a scripted remote: download, diverge, diff,
//! reconcile, verify.

use chrono::{DateTime, Duration, Utc};
use mirror_core::mapping::MappingStore;
use mirror_core::remote::RemoteFileService;
use mirror_core::{
    CancelToken, ChangeDetector, ChangeStatus, ProjectRegistry, RemoteDiffCollector,
    SyncExecutor, SyncOptions, TieredVerifier, VerifyStatus,
};
use mirror_test_utils::{StaticRemote, TestProject};
use std::sync::Arc;

const ROOT: &str = "data/proj";

fn t0() -> DateTime<Utc> {
    Utc::now() - Duration::hours(1)
}

fn seeded_remote() -> Arc<StaticRemote> {
    let remote = StaticRemote::new();
    remote.add_file("data/proj/a.txt", b"alpha", t0());
    remote.add_file("data/proj/b.txt", b"beta", t0());
    remote.add_file("data/proj/sub/c.txt", b"gamma", t0());
    Arc::new(remote)
}

async fn download(remote: &Arc<StaticRemote>, work: &TestProject) -> std::path::PathBuf {
    let service: Arc<dyn RemoteFileService> = remote.clone();
    let local = work.path("local");
    SyncExecutor::new(service)
        .download_project(&local, ROOT, &ProjectRegistry::new(), &CancelToken::new())
        .await
        .unwrap();
    local
}

#[tokio::test]
async fn download_diverge_sync_verify_roundtrip() {
    let remote = seeded_remote();
    let work = TestProject::new();
    let local = download(&remote, &work).await;
    let service: Arc<dyn RemoteFileService> = remote.clone();

    // Fresh download tracks everything as unchanged
    let mut detector = ChangeDetector::open(&local).unwrap();
    assert_eq!(detector.scan().unwrap(), 0);

    // Local divergence: edit a.txt
    std::fs::write(local.join("a.txt"), "alpha edited").unwrap();
    detector.scan().unwrap();
    assert_eq!(
        detector.changes().files.get("a.txt").map(|c| c.status),
        Some(ChangeStatus::Modified)
    );

    // Remote divergence: new d.txt, b.txt rewritten past tolerance,
    // sub/c.txt deleted
    remote.add_file("data/proj/d.txt", b"delta", t0() + Duration::seconds(10));
    remote.add_file(
        "data/proj/b.txt",
        b"beta rewritten",
        t0() + Duration::seconds(10),
    );
    remote.remove_file("data/proj/sub/c.txt");

    let collector = RemoteDiffCollector::new(Arc::clone(&service));
    let cancel = CancelToken::new();
    let mut config = MappingStore::load(&local).unwrap().unwrap();
    let diff = collector.collect(ROOT, &mut config, &cancel).await.unwrap();
    MappingStore::save(&local, &config).unwrap();

    assert_eq!(diff.new_remote, vec!["data/proj/d.txt".to_string()]);
    assert_eq!(diff.modified_remote, vec!["data/proj/b.txt".to_string()]);
    assert_eq!(diff.removed_remote, vec!["data/proj/sub/c.txt".to_string()]);

    // Incremental reconcile
    let executor = SyncExecutor::new(Arc::clone(&service));
    let report = executor.incremental_sync(&local, &diff, &cancel).await.unwrap();
    assert!(report.success());

    assert_eq!(std::fs::read_to_string(local.join("d.txt")).unwrap(), "delta");
    assert_eq!(
        std::fs::read_to_string(local.join("b.txt")).unwrap(),
        "beta rewritten"
    );
    assert!(!local.join("sub/c.txt").exists());
    // The locally edited file was left alone
    assert_eq!(
        std::fs::read_to_string(local.join("a.txt")).unwrap(),
        "alpha edited"
    );

    // Sync is idempotent: a second collection finds nothing
    let mut config = MappingStore::load(&local).unwrap().unwrap();
    let second = collector.collect(ROOT, &mut config, &cancel).await.unwrap();
    assert!(second.is_empty());

    // The local edit is still the only outstanding change
    let mut detector = ChangeDetector::open(&local).unwrap();
    assert_eq!(detector.scan().unwrap(), 1);

    // Push the edit back to the remote
    let push = executor.push_changes(&local, &cancel).await.unwrap();
    assert_eq!(push.pushed, vec!["a.txt".to_string()]);
    assert_eq!(
        service.read_file("data/proj/a.txt").await.unwrap(),
        b"alpha edited"
    );

    let mut detector = ChangeDetector::open(&local).unwrap();
    assert_eq!(detector.scan().unwrap(), 0);

    // Both sides agree: the verifier finds nothing to escalate
    let verifier = TieredVerifier::new(Arc::clone(&service));
    let verdict = verifier.verify(&local, &cancel).await.unwrap();
    assert_eq!(verdict.status, VerifyStatus::Clean);
    assert!(verdict.findings.is_empty());

    // The uploaded baseline is kept in the backup area for later diffing
    assert_eq!(
        std::fs::read(local.join(".mirror/backups/a.txt")).unwrap(),
        b"alpha edited"
    );
}

#[tokio::test]
async fn listing_failures_degrade_to_partial_results() {
    let remote = seeded_remote();
    let work = TestProject::new();
    let local = download(&remote, &work).await;
    let service: Arc<dyn RemoteFileService> = remote.clone();

    // The sub folder stops listing; its mapped file must not be reported
    // as removed, and the rest of the tree still diffs
    remote.fail_listing("data/proj/sub");
    remote.add_file("data/proj/fresh.txt", b"new", t0() + Duration::seconds(10));

    let collector = RemoteDiffCollector::new(Arc::clone(&service));
    let mut config = MappingStore::load(&local).unwrap().unwrap();
    let diff = collector
        .collect(ROOT, &mut config, &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(diff.new_remote, vec!["data/proj/fresh.txt".to_string()]);
    // sub/c.txt is only missing because its branch failed to list; a dead
    // branch contributes nothing, so it must not be reported as removed
    assert!(diff.removed_remote.is_empty());
    assert!(config.find("sub/c.txt").is_some());
}

#[tokio::test]
async fn blocked_resync_keeps_local_edits() {
    let remote = seeded_remote();
    let work = TestProject::new();
    let local = download(&remote, &work).await;
    let service: Arc<dyn RemoteFileService> = remote.clone();

    std::fs::write(local.join("a.txt"), "precious local work").unwrap();

    let executor = SyncExecutor::new(service);
    let registry = ProjectRegistry::new();
    let blocked = executor
        .full_resync(&local, &registry, &SyncOptions::default(), &CancelToken::new())
        .await;

    assert!(matches!(
        blocked,
        Err(mirror_core::Error::DirtyWorkingTree { .. })
    ));
    assert_eq!(
        std::fs::read_to_string(local.join("a.txt")).unwrap(),
        "precious local work"
    );
}
