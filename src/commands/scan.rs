//! Implementation of the `session-lock scan` command.
//!
//! Reports every lock file in a sessions directory.
//!
//! # Safety
//!
//! - Default behavior is dry-run (prints what is stale)
//! - Requires `--clean` to actually delete stale lock files
//! - Locks this process holds are never flagged

use crate::cli::ScanArgs;
use crate::config::LockConfig;
use crate::error::{LockError, Result};
use crate::locks::{LockManager, ScanOptions, ScanReport};
use std::path::Path;
use std::time::Duration;

pub fn cmd_scan(config: LockConfig, args: ScanArgs) -> Result<()> {
    let stale = args
        .stale_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| config.stale());
    let manager = LockManager::new(config);

    let mut options = ScanOptions::new(&args.dir, stale).remove_stale(args.clean);
    if let Some(pid) = args.own_pid {
        options = options.own_pid(pid);
    }

    let report = manager.scan_directory(&options)?;

    if args.json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| LockError::Io(format!("failed to serialize scan report: {}", e)))?;
        println!("{}", json);
    } else {
        print_report(&report, &args.dir, args.clean);
    }

    Ok(())
}

fn print_report(report: &ScanReport, dir: &Path, cleaned: bool) {
    if report.locks.is_empty() {
        println!("No lock files found in {}.", dir.display());
        return;
    }

    println!("Lock files ({}):", report.locks.len());
    for entry in &report.locks {
        println!("  - {}", entry);
    }

    let stale = report.stale_count();
    if cleaned {
        println!();
        println!("Removed: {} stale lock(s)", report.cleaned.len());
        for entry in &report.cleaned {
            println!("  - {}", entry.lock_file_path.display());
        }
    } else if stale > 0 {
        println!();
        println!("Dry-run mode: no changes made.");
        println!("Run with --clean to remove {} stale lock(s).", stale);
    }
}
