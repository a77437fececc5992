//! remote-mirror CLI
//!
//! The command-line interface for mirroring a remote file tree into a
//! local working copy.

mod cli;
mod commands;
mod error;

use clap::{CommandFactory, Parser};
use colored::Colorize;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use cli::{Cli, Commands};
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing if verbose
    if cli.verbose {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(Level::DEBUG)
            .with_target(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)
            .expect("Failed to set tracing subscriber");
        tracing::debug!("Verbose mode enabled");
    }

    match cli.command {
        Some(cmd) => execute_command(cmd),
        None => {
            println!("{} remote-mirror CLI", "mirror".green().bold());
            println!();
            println!("Run {} for available commands.", "mirror --help".cyan());
            Ok(())
        }
    }
}

fn execute_command(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "mirror", &mut std::io::stdout());
            return Ok(());
        }
        Commands::Status { ref path, json } => {
            return commands::run_status(path, json);
        }
        Commands::Reset { ref path } => {
            return commands::run_reset(path);
        }
        _ => {}
    }

    // Remote-facing commands run on the async runtime
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        match cmd {
            Commands::Download {
                remote_base,
                remote_root,
                dest,
            } => commands::run_download(&remote_base, &remote_root, &dest).await,
            Commands::Sync {
                remote_base,
                path,
                dry_run,
            } => commands::run_sync(&remote_base, &path, dry_run).await,
            Commands::Push { remote_base, path } => {
                commands::run_push(&remote_base, &path).await
            }
            Commands::Resync {
                remote_base,
                path,
                force,
            } => commands::run_resync(&remote_base, &path, force).await,
            Commands::Verify { remote_base, path } => {
                commands::run_verify(&remote_base, &path).await
            }
            _ => unreachable!("handled above"),
        }
    })
}
