//! Download command implementation

use crate::error::Result;
use colored::Colorize;
use mirror_core::{CancelToken, DirRemote, ProjectRegistry, SyncExecutor};
use std::path::Path;
use std::sync::Arc;

/// Run the download command: first bulk download creating a project.
pub async fn run_download(remote_base: &Path, remote_root: &str, dest: &Path) -> Result<()> {
    println!(
        "{} Downloading {} into {}...",
        "=>".blue().bold(),
        remote_root.cyan(),
        dest.display()
    );

    let service = Arc::new(DirRemote::new(remote_base));
    let executor = SyncExecutor::new(service);
    let registry = ProjectRegistry::new();

    let report = executor
        .download_project(dest, remote_root, &registry, &CancelToken::new())
        .await?;

    println!(
        "{} Downloaded {} file(s).",
        "OK".green().bold(),
        report.fetched.len()
    );
    Ok(())
}
