//! Sync and resync command implementations

use super::resolve_project;
use crate::error::Result;
use colored::Colorize;
use mirror_core::{
    CancelToken, ChangeDetector, DirRemote, MappingStore, ProjectRegistry, RemoteDiffCollector,
    SyncExecutor, SyncOptions,
};
use std::path::Path;
use std::sync::Arc;

/// Run the sync command: collect the remote diff and apply it
/// incrementally.
pub async fn run_sync(remote_base: &Path, path: &Path, dry_run: bool) -> Result<()> {
    let root = resolve_project(path)?;
    let mut config = MappingStore::load(&root)?.ok_or_else(|| {
        crate::error::CliError::user(format!("No mapping document under {}", root.display()))
    })?;
    let remote_root = config.root_remote_path.clone();

    println!(
        "{} Collecting remote differences for {}...",
        "=>".blue().bold(),
        remote_root.cyan()
    );

    let service = Arc::new(DirRemote::new(remote_base));
    let cancel = CancelToken::new();
    let collector = RemoteDiffCollector::new(service.clone());
    let diff = collector.collect(&remote_root, &mut config, &cancel).await?;
    MappingStore::save(&root, &config)?;

    if diff.is_empty() {
        println!("{} Nothing to sync.", "OK".green().bold());
        return Ok(());
    }

    if dry_run {
        for path in &diff.new_remote {
            println!("   {} {}", "+".green(), path);
        }
        for path in &diff.modified_remote {
            println!("   {} {}", "~".yellow(), path);
        }
        for path in &diff.removed_remote {
            println!("   {} {}", "-".red(), path);
        }
        return Ok(());
    }

    let executor = SyncExecutor::new(service);
    let report = executor.incremental_sync(&root, &diff, &cancel).await?;

    let marker = if report.success() {
        "OK".green().bold()
    } else {
        "PARTIAL".yellow().bold()
    };
    println!("{} {}", marker, report.summary());
    for failure in &report.failed {
        println!("   {} {}", "!".red(), failure);
    }
    Ok(())
}

/// Run the push command: upload outstanding local changes.
pub async fn run_push(remote_base: &Path, path: &Path) -> Result<()> {
    let root = resolve_project(path)?;
    println!("{} Pushing local changes...", "=>".blue().bold());

    let service = Arc::new(DirRemote::new(remote_base));
    let executor = SyncExecutor::new(service);
    let report = executor.push_changes(&root, &CancelToken::new()).await?;

    if report.pushed.is_empty() && report.removed.is_empty() && report.failed.is_empty() {
        println!("{} Nothing to push.", "OK".green().bold());
        return Ok(());
    }
    let marker = if report.success() {
        "OK".green().bold()
    } else {
        "PARTIAL".yellow().bold()
    };
    println!("{} {}", marker, report.summary());
    for failure in &report.failed {
        println!("   {} {}", "!".red(), failure);
    }
    Ok(())
}

/// Run the resync command: full atomic replace of the working tree.
pub async fn run_resync(remote_base: &Path, path: &Path, force: bool) -> Result<()> {
    let root = resolve_project(path)?;
    let service = Arc::new(DirRemote::new(remote_base));
    let executor = SyncExecutor::new(service);
    let registry = ProjectRegistry::new();

    let mut options = SyncOptions { allow_dirty: force };
    if !force {
        // Surface the precondition up front so the prompt can name the count
        let mut detector = ChangeDetector::open(&root)?;
        let outstanding = detector.evaluate()?;
        if outstanding > 0 {
            let proceed = dialoguer::Confirm::new()
                .with_prompt(format!(
                    "{} outstanding local change(s) will be discarded. Proceed?",
                    outstanding
                ))
                .default(false)
                .interact()?;
            if !proceed {
                println!("{} Resync aborted.", "ABORT".yellow().bold());
                return Ok(());
            }
            options.allow_dirty = true;
        }
    }

    println!("{} Replacing working tree from remote...", "=>".blue().bold());
    let report = executor
        .full_resync(&root, &registry, &options, &CancelToken::new())
        .await?;
    println!(
        "{} Resynced {} file(s).",
        "OK".green().bold(),
        report.fetched.len()
    );
    Ok(())
}
