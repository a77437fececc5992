//! Verify command implementation

use super::resolve_project;
use crate::error::Result;
use colored::Colorize;
use mirror_core::{
    CancelToken, ContentOutcome, DirRemote, FlagReason, TieredVerifier, VerifyStatus,
};
use std::path::Path;
use std::sync::Arc;

/// Run the verify command: tiered integrity check against the remote.
pub async fn run_verify(remote_base: &Path, path: &Path) -> Result<()> {
    let root = resolve_project(path)?;
    println!("{} Verifying working copy...", "=>".blue().bold());

    let service = Arc::new(DirRemote::new(remote_base));
    let verifier = TieredVerifier::new(service);
    let report = verifier.verify(&root, &CancelToken::new()).await?;

    match report.status {
        VerifyStatus::Clean => {
            println!("{} Working copy matches the remote.", "OK".green().bold());
        }
        VerifyStatus::RerunRequired => {
            println!(
                "{} Old mapping format detected; metadata was backfilled.",
                "NOTE".yellow().bold()
            );
            println!("Run {} again to verify.", "mirror verify".cyan());
        }
        VerifyStatus::Flagged => {
            println!(
                "{} {} file(s) flagged, {} confirmed:",
                "DRIFT".red().bold(),
                report.flags.len(),
                report.findings.len()
            );
            for finding in &report.findings {
                let label = match finding.outcome {
                    ContentOutcome::OnlyInLocal => "only-local".yellow(),
                    ContentOutcome::OnlyInServer => "only-server".yellow(),
                    ContentOutcome::Different => "different".red(),
                };
                println!("   {} {}", label, finding.path.cyan());
            }
            let silent = report.flags.iter().filter(|f| {
                !report.findings.iter().any(|d| d.path == f.path)
            });
            for flag in silent {
                let reason = match flag.reason {
                    FlagReason::RemovedFromServer => "removed-from-server",
                    FlagReason::NewOnServer => "new-on-server",
                    FlagReason::ModifiedOnServer => "modified-on-server",
                    FlagReason::ContentChanged => "content-changed",
                };
                println!(
                    "   {} {} ({}; content matched)",
                    "=".dimmed(),
                    flag.path.dimmed(),
                    reason
                );
            }
        }
    }
    Ok(())
}
