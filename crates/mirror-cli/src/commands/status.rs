//! Status and reset command implementations

use super::resolve_project;
use crate::error::Result;
use colored::Colorize;
use mirror_core::{ChangeDetector, ChangeStatus};
use std::path::Path;

/// Run the status command: scan the project and list outstanding changes.
pub fn run_status(path: &Path, json: bool) -> Result<()> {
    let root = resolve_project(path)?;
    let mut detector = ChangeDetector::open(&root)?;
    detector.scan()?;
    let changes = detector.changes();

    if json {
        println!("{}", serde_json::to_string_pretty(changes).map_err(mirror_core::Error::Json)?);
        return Ok(());
    }

    if changes.is_empty() {
        println!(
            "{} Working copy matches the last synced state.",
            "OK".green().bold()
        );
        return Ok(());
    }

    println!(
        "{} {} outstanding change(s):",
        "=>".blue().bold(),
        changes.len()
    );
    let mut files: Vec<_> = changes.files.values().collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));
    for change in files {
        match change.status {
            ChangeStatus::Modified => println!("   {} {}", "M".yellow().bold(), change.path),
            ChangeStatus::Added => println!("   {} {}", "A".green().bold(), change.path),
            ChangeStatus::Deleted => println!("   {} {}", "D".red().bold(), change.path),
        }
    }
    Ok(())
}

/// Run the reset command: clear the recorded change state.
pub fn run_reset(path: &Path) -> Result<()> {
    let root = resolve_project(path)?;
    let mut detector = ChangeDetector::open(&root)?;
    detector.reset()?;
    println!("{} Change state cleared.", "OK".green().bold());
    Ok(())
}
