//! CLI argument parsing for session-lock.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Session-lock: cross-process write locks for file-backed session transcripts.
///
/// A session file `<name>.jsonl` is locked by exclusively creating
/// `<name>.jsonl.lock` next to it, holding the owning pid and creation time.
#[derive(Parser, Debug)]
#[command(name = "session-lock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// YAML config file with lock timings (defaults apply when omitted).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging on stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for session-lock.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Report lock files in a sessions directory.
    ///
    /// Lists every `*.lock` file with its holder, age, and staleness.
    /// Dry-run by default; pass `--clean` to delete stale locks.
    Scan(ScanArgs),

    /// Acquire a session lock and hold it.
    ///
    /// Holds until the hold duration elapses or a termination signal
    /// arrives, then releases the lock.
    Hold(HoldArgs),

    /// Print the watchdog hold derived from an operation timeout.
    MaxHold(MaxHoldArgs),

    /// Print the effective configuration as YAML.
    Config,
}

/// Arguments for the `scan` command.
#[derive(Parser, Debug)]
pub struct ScanArgs {
    /// Directory containing session files.
    pub dir: PathBuf,

    /// Staleness threshold in milliseconds (defaults to the configured value).
    #[arg(long)]
    pub stale_ms: Option<u64>,

    /// Delete stale lock files.
    #[arg(long)]
    pub clean: bool,

    /// Treat this pid as the calling process when checking for orphaned locks.
    #[arg(long)]
    pub own_pid: Option<u32>,

    /// Output JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `hold` command.
#[derive(Parser, Debug)]
pub struct HoldArgs {
    /// Session file to lock.
    pub session_file: PathBuf,

    /// How long to wait for a contended lock, in milliseconds.
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// How long to hold the lock once acquired, in milliseconds.
    /// Holds until signalled when omitted.
    #[arg(long)]
    pub hold_ms: Option<u64>,

    /// Watchdog limit for this hold, in milliseconds.
    #[arg(long)]
    pub max_hold_ms: Option<u64>,

    /// On a termination signal, release the lock and then let the signal
    /// take its default action instead of exiting normally.
    #[arg(long)]
    pub signal_default: bool,
}

/// Arguments for the `max-hold` command.
#[derive(Parser, Debug)]
pub struct MaxHoldArgs {
    /// Operation timeout in milliseconds.
    #[arg(long)]
    pub timeout_ms: u64,

    /// Lower bound for the result, in milliseconds.
    #[arg(long)]
    pub min_ms: Option<u64>,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
