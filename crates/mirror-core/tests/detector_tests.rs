use chrono::Utc;
use mirror_core::mapping::{MappingStore, PathMapping};
use mirror_core::{ChangeDetector, ChangeStatus, ChangeWatcher};
use mirror_fs::checksum;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const ROOT: &str = "/srv/proj";

fn tracked(root: &Path, local: &str, content: &[u8]) -> PathMapping {
    let abs = root.join(local);
    if let Some(parent) = abs.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&abs, content).unwrap();
    PathMapping {
        local_path: local.to_string(),
        remote_path: format!("{}/{}", ROOT, local),
        last_updated: Utc::now(),
        content_hash: Some(checksum::compute_checksum(content)),
        server_modified: Some(Utc::now()),
        local_modified_at_download: Some(Utc::now()),
        is_binary: false,
    }
}

#[test]
fn scan_classifies_modified_added_deleted() {
    let temp = TempDir::new().unwrap();
    let entries = vec![
        tracked(temp.path(), "unchanged.txt", b"same"),
        tracked(temp.path(), "edited.txt", b"before"),
        tracked(temp.path(), "gone.txt", b"bye"),
    ];
    MappingStore::create(temp.path(), ROOT, entries).unwrap();

    // Diverge the working tree
    std::fs::write(temp.path().join("edited.txt"), "after").unwrap();
    std::fs::remove_file(temp.path().join("gone.txt")).unwrap();
    std::fs::write(temp.path().join("new.txt"), "hello").unwrap();

    let mut detector = ChangeDetector::open(temp.path()).unwrap();
    let count = detector.scan().unwrap();

    assert_eq!(count, 3);
    let changes = detector.changes();
    assert_eq!(
        changes.files.get("edited.txt").unwrap().status,
        ChangeStatus::Modified
    );
    assert_eq!(
        changes.files.get("gone.txt").unwrap().status,
        ChangeStatus::Deleted
    );
    assert_eq!(
        changes.files.get("new.txt").unwrap().status,
        ChangeStatus::Added
    );
    assert!(!changes.files.contains_key("unchanged.txt"));
}

#[test]
fn mtime_churn_does_not_flag_when_hash_matches() {
    let temp = TempDir::new().unwrap();
    let entries = vec![tracked(temp.path(), "stable.txt", b"content")];
    MappingStore::create(temp.path(), ROOT, entries).unwrap();

    let mut detector = ChangeDetector::open(temp.path()).unwrap();
    detector.scan().unwrap();
    assert!(detector.changes().is_empty());

    // Rewrite identical bytes: mtime moves, content does not
    std::thread::sleep(Duration::from_millis(20));
    std::fs::write(temp.path().join("stable.txt"), "content").unwrap();

    detector.scan().unwrap();
    assert!(detector.changes().is_empty());
}

#[test]
fn modified_then_reverted_clears_the_change() {
    let temp = TempDir::new().unwrap();
    let entries = vec![tracked(temp.path(), "a.txt", b"original")];
    MappingStore::create(temp.path(), ROOT, entries).unwrap();

    let mut detector = ChangeDetector::open(temp.path()).unwrap();
    std::fs::write(temp.path().join("a.txt"), "edited").unwrap();
    assert_eq!(
        detector.reevaluate("a.txt").unwrap(),
        Some(ChangeStatus::Modified)
    );

    std::fs::write(temp.path().join("a.txt"), "original").unwrap();
    assert_eq!(detector.reevaluate("a.txt").unwrap(), None);
    assert!(detector.changes().is_empty());
}

#[test]
fn ignored_paths_are_never_tracked() {
    let temp = TempDir::new().unwrap();
    MappingStore::create(temp.path(), ROOT, vec![]).unwrap();
    std::fs::create_dir_all(temp.path().join(".git")).unwrap();
    std::fs::write(temp.path().join(".git/HEAD"), "ref").unwrap();
    std::fs::write(temp.path().join("archive.zip"), "zip").unwrap();

    let mut detector = ChangeDetector::open(temp.path()).unwrap();
    detector.scan().unwrap();

    assert!(detector.changes().is_empty());
    assert_eq!(detector.reevaluate("archive.zip").unwrap(), None);
}

#[test]
fn change_state_survives_reopen_and_reset() {
    let temp = TempDir::new().unwrap();
    MappingStore::create(temp.path(), ROOT, vec![]).unwrap();
    std::fs::write(temp.path().join("new.txt"), "hello").unwrap();

    {
        let mut detector = ChangeDetector::open(temp.path()).unwrap();
        detector.scan().unwrap();
        assert_eq!(detector.changes().len(), 1);
    }

    let mut detector = ChangeDetector::open(temp.path()).unwrap();
    assert_eq!(detector.changes().len(), 1);

    detector.reset().unwrap();
    let detector = ChangeDetector::open(temp.path()).unwrap();
    assert!(detector.changes().is_empty());
}

#[test]
fn opening_outside_a_project_fails() {
    let temp = TempDir::new().unwrap();
    assert!(ChangeDetector::open(temp.path()).is_err());
}

#[tokio::test(flavor = "multi_thread")]
async fn watcher_coalesces_events_into_one_notification() {
    let temp = TempDir::new().unwrap();
    let entries = vec![tracked(temp.path(), "a.txt", b"original")];
    MappingStore::create(temp.path(), ROOT, entries).unwrap();

    let detector = Arc::new(Mutex::new(ChangeDetector::open(temp.path()).unwrap()));
    let mut watcher = ChangeWatcher::with_debounce(
        Arc::clone(&detector),
        Duration::from_millis(20),
        Duration::from_millis(50),
    )
    .unwrap();

    std::fs::write(temp.path().join("a.txt"), "edit one").unwrap();
    std::fs::write(temp.path().join("b.txt"), "brand new").unwrap();

    let update = tokio::time::timeout(Duration::from_secs(5), watcher.updates().recv())
        .await
        .expect("timed out waiting for change notification")
        .expect("watcher channel closed");
    assert_eq!(update.project_root, temp.path().canonicalize().unwrap());

    let det = detector.lock().unwrap();
    assert_eq!(
        det.changes().files.get("a.txt").map(|c| c.status),
        Some(ChangeStatus::Modified)
    );
    assert_eq!(
        det.changes().files.get("b.txt").map(|c| c.status),
        Some(ChangeStatus::Added)
    );
}
