//! Implementation of the `session-lock hold` command.
//!
//! Acquires a session lock, holds it, and releases it. Termination signals
//! release the lock early and end the hold normally, or with
//! `--signal-default` go on to the signal's default action. The watchdog
//! releases the lock once its maximum hold passes.

use crate::cli::HoldArgs;
use crate::config::LockConfig;
use crate::error::{LockError, Result};
use crate::locks::{AcquireOptions, LockManager};
use crate::shutdown::{AfterSignal, ShutdownHooks, TerminationHandler};
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub fn cmd_hold(config: LockConfig, args: HoldArgs) -> Result<()> {
    let manager = LockManager::new(config);

    let stop = Arc::new(AtomicBool::new(false));
    let hooks = ShutdownHooks::new();
    hooks.register("session-locks", manager.shutdown_hook());
    let after = if args.signal_default {
        AfterSignal::DefaultAction
    } else {
        let stop_flag = Arc::clone(&stop);
        hooks.register("stop-hold", move || stop_flag.store(true, Ordering::SeqCst));
        AfterSignal::Continue
    };
    let handler = TerminationHandler::install_with(hooks, after)?;
    let _watchdog = manager.start_watchdog()?;

    let mut options = AcquireOptions::default();
    if let Some(ms) = args.timeout_ms {
        options = options.timeout(Duration::from_millis(ms));
    }
    if let Some(ms) = args.max_hold_ms {
        options = options.max_hold(Duration::from_millis(ms));
    }

    let mut handle = manager.acquire(&args.session_file, options)?;
    println!("acquired {}", handle.lock_path().display());
    std::io::stdout()
        .flush()
        .map_err(|e| LockError::Io(format!("failed to write to stdout: {}", e)))?;

    let deadline = args
        .hold_ms
        .map(|ms| Instant::now() + Duration::from_millis(ms));
    while !stop.load(Ordering::SeqCst) {
        let step = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                remaining.min(POLL_INTERVAL)
            }
            None => POLL_INTERVAL,
        };
        thread::sleep(step);
    }

    handle.release()?;
    println!("released");
    handler.on_exit();
    Ok(())
}
