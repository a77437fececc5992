//! CLI argument parsing using clap derive

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// remote-mirror - Keep a local working copy in sync with a remote tree
#[derive(Parser, Debug)]
#[command(name = "mirror")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Download a remote subtree into a new local project
    ///
    /// Examples:
    ///   mirror download -r /srv/mirror data/proj ./proj
    Download {
        /// Base directory served as the remote side
        #[arg(short, long, env = "MIRROR_REMOTE_BASE")]
        remote_base: PathBuf,

        /// Remote subtree to mirror
        remote_root: String,

        /// Local destination directory
        dest: PathBuf,
    },

    /// Show outstanding local changes
    Status {
        /// Project directory (defaults to the current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Apply remote changes incrementally
    Sync {
        /// Base directory served as the remote side
        #[arg(short, long, env = "MIRROR_REMOTE_BASE")]
        remote_base: PathBuf,

        /// Project directory (defaults to the current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Preview the plan without applying it
        #[arg(long)]
        dry_run: bool,
    },

    /// Upload outstanding local changes to the remote
    Push {
        /// Base directory served as the remote side
        #[arg(short, long, env = "MIRROR_REMOTE_BASE")]
        remote_base: PathBuf,

        /// Project directory (defaults to the current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Replace the working tree with a fresh copy of the remote
    Resync {
        /// Base directory served as the remote side
        #[arg(short, long, env = "MIRROR_REMOTE_BASE")]
        remote_base: PathBuf,

        /// Project directory (defaults to the current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Discard outstanding local changes without asking
        #[arg(long)]
        force: bool,
    },

    /// Verify working-copy integrity against the remote
    Verify {
        /// Base directory served as the remote side
        #[arg(short, long, env = "MIRROR_REMOTE_BASE")]
        remote_base: PathBuf,

        /// Project directory (defaults to the current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Clear the recorded change state for a project
    Reset {
        /// Project directory (defaults to the current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}
