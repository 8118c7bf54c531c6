//! CLI argument parsing for sitelock.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Sitelock: filesystem-backed site lock for serializing maintenance
/// operations against request handling.
///
/// Mutual exclusion crosses process boundaries through two files in the
/// lock directory: an advisory-lockable lock file (the real primitive) and
/// a flag file whose existence and age answer "is the site locked" cheaply.
#[derive(Parser, Debug)]
#[command(name = "sitelock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Application root path whose lock namespace is used (default: cwd).
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// Directory holding the lock artifacts (default: <root>/.sitelock).
    #[arg(long, global = true)]
    pub lock_dir: Option<PathBuf>,

    /// Maximum flag-file age in seconds before a lock is considered stale.
    #[arg(long, global = true)]
    pub max_age: Option<u64>,

    /// Path to a config YAML file (default: <lock-dir>/config.yaml if present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for sitelock.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the current lock state.
    ///
    /// Reports whether the site is flagged as locked, the flag file age,
    /// staleness against the configured maximum age, and resolved paths.
    /// Read-only: performs no reclamation.
    Status,

    /// Exit with code 4 if the site is locked, 0 otherwise.
    ///
    /// Reclaims a stale lock first, then answers via the flag file alone,
    /// no lock syscall.
    Check,

    /// Run a command while holding the site lock.
    ///
    /// Reclaims a stale lock, acquires the site lock (exiting with code 4
    /// on contention), runs the command, and releases the lock afterwards.
    Run(RunArgs),

    /// Delete the lock artifacts unconditionally.
    ///
    /// Requires --force to prevent accidental clearing.
    Clear(ClearArgs),
}

/// Arguments for the `run` command.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Command line to execute while the site lock is held.
    pub command: String,
}

/// Arguments for the `clear` command.
#[derive(Parser, Debug)]
pub struct ClearArgs {
    /// Force clearing the lock artifacts (required for safety).
    #[arg(long)]
    pub force: bool,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
