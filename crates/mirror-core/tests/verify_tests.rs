use chrono::Duration;
use mirror_core::mapping::MappingStore;
use mirror_core::remote::RemoteFileService;
use mirror_core::{
    CancelToken, ContentOutcome, DirRemote, FlagReason, ProjectRegistry, SyncExecutor,
    TieredVerifier, VerifyStatus,
};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn seed_remote(base: &Path) {
    std::fs::create_dir_all(base.join("proj/docs")).unwrap();
    std::fs::write(base.join("proj/readme.md"), "hello").unwrap();
    std::fs::write(base.join("proj/docs/guide.md"), "guide").unwrap();
}

async fn downloaded_project(
    remote: &Path,
    work: &Path,
) -> (Arc<dyn RemoteFileService>, std::path::PathBuf) {
    let service: Arc<dyn RemoteFileService> = Arc::new(DirRemote::new(remote));
    let local = work.join("local");
    SyncExecutor::new(Arc::clone(&service))
        .download_project(&local, "proj", &ProjectRegistry::new(), &CancelToken::new())
        .await
        .unwrap();
    (service, local)
}

fn assert_no_temp_residue(work: &Path) {
    let residue: Vec<_> = std::fs::read_dir(work)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(residue.is_empty(), "temp residue: {:?}", residue);
}

#[tokio::test]
async fn unchanged_project_verifies_clean_without_content_comparison() {
    let remote = TempDir::new().unwrap();
    seed_remote(remote.path());
    let work = TempDir::new().unwrap();
    let (service, local) = downloaded_project(remote.path(), work.path()).await;

    let verifier = TieredVerifier::new(service);
    let report = verifier.verify(&local, &CancelToken::new()).await.unwrap();

    assert_eq!(report.status, VerifyStatus::Clean);
    assert!(report.flags.is_empty());
    assert!(report.findings.is_empty());
    assert_no_temp_residue(work.path());
}

#[tokio::test]
async fn new_server_file_is_flagged_and_confirmed() {
    let remote = TempDir::new().unwrap();
    seed_remote(remote.path());
    let work = TempDir::new().unwrap();
    let (service, local) = downloaded_project(remote.path(), work.path()).await;

    std::fs::write(remote.path().join("proj/fresh.md"), "surprise").unwrap();

    let verifier = TieredVerifier::new(service);
    let report = verifier.verify(&local, &CancelToken::new()).await.unwrap();

    assert_eq!(report.status, VerifyStatus::Flagged);
    assert_eq!(report.flags.len(), 1);
    assert_eq!(report.flags[0].reason, FlagReason::NewOnServer);
    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].path, "fresh.md");
    assert_eq!(report.findings[0].outcome, ContentOutcome::OnlyInServer);
    assert_no_temp_residue(work.path());
}

#[tokio::test]
async fn file_removed_on_server_resolves_to_only_in_local() {
    let remote = TempDir::new().unwrap();
    seed_remote(remote.path());
    let work = TempDir::new().unwrap();
    let (service, local) = downloaded_project(remote.path(), work.path()).await;

    std::fs::remove_file(remote.path().join("proj/docs/guide.md")).unwrap();

    let verifier = TieredVerifier::new(service);
    let report = verifier.verify(&local, &CancelToken::new()).await.unwrap();

    assert_eq!(report.status, VerifyStatus::Flagged);
    assert_eq!(report.flags[0].reason, FlagReason::RemovedFromServer);
    assert_eq!(report.findings[0].path, "docs/guide.md");
    assert_eq!(report.findings[0].outcome, ContentOutcome::OnlyInLocal);
}

#[tokio::test]
async fn changed_server_content_resolves_to_different() {
    let remote = TempDir::new().unwrap();
    seed_remote(remote.path());
    let work = TempDir::new().unwrap();
    let (service, local) = downloaded_project(remote.path(), work.path()).await;

    std::fs::write(remote.path().join("proj/readme.md"), "rewritten upstream").unwrap();

    let verifier = TieredVerifier::new(service);
    let report = verifier.verify(&local, &CancelToken::new()).await.unwrap();

    assert_eq!(report.status, VerifyStatus::Flagged);
    assert_eq!(report.flags.len(), 1);
    assert_eq!(report.flags[0].path, "readme.md");
    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].outcome, ContentOutcome::Different);
}

#[tokio::test]
async fn metadata_drift_with_matching_content_is_dropped_silently() {
    let remote = TempDir::new().unwrap();
    seed_remote(remote.path());
    let work = TempDir::new().unwrap();
    let (service, local) = downloaded_project(remote.path(), work.path()).await;

    // Baseline drifts far beyond tolerance, content stays identical
    let mut config = MappingStore::load(&local).unwrap().unwrap();
    let mut entry = config.find("readme.md").unwrap().clone();
    entry.server_modified = entry.server_modified.map(|t| t - Duration::seconds(30));
    config.upsert(entry);
    MappingStore::save(&local, &config).unwrap();

    let verifier = TieredVerifier::new(service);
    let report = verifier.verify(&local, &CancelToken::new()).await.unwrap();

    assert_eq!(report.status, VerifyStatus::Flagged);
    assert_eq!(report.flags[0].reason, FlagReason::ModifiedOnServer);
    // Content matched: the flag does not survive Tier 2
    assert!(report.findings.is_empty());
}

#[tokio::test]
async fn legacy_mapping_is_backfilled_then_verifies_clean() {
    let remote = TempDir::new().unwrap();
    seed_remote(remote.path());
    let work = TempDir::new().unwrap();
    let (service, local) = downloaded_project(remote.path(), work.path()).await;

    // Strip every baseline: an old-format document
    let mut config = MappingStore::load(&local).unwrap().unwrap();
    for entry in &mut config.mappings {
        entry.server_modified = None;
    }
    MappingStore::save(&local, &config).unwrap();

    let verifier = TieredVerifier::new(service);
    let first = verifier.verify(&local, &CancelToken::new()).await.unwrap();
    assert_eq!(first.status, VerifyStatus::RerunRequired);

    let config = MappingStore::load(&local).unwrap().unwrap();
    assert!(config.mappings.iter().all(|m| m.server_modified.is_some()));

    let second = verifier.verify(&local, &CancelToken::new()).await.unwrap();
    assert_eq!(second.status, VerifyStatus::Clean);
    assert_no_temp_residue(work.path());
}
