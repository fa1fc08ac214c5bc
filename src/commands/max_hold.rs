//! Implementation of the `session-lock max-hold` command.

use crate::cli::MaxHoldArgs;
use crate::config::LockConfig;
use crate::error::Result;

pub fn cmd_max_hold(config: &LockConfig, args: MaxHoldArgs) -> Result<()> {
    let hold_ms = config
        .max_hold_policy()
        .resolve_max_hold(args.timeout_ms, args.min_ms);
    println!("{}", hold_ms);
    Ok(())
}
