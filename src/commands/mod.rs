//! Command implementations for session-lock.
//!
//! This module loads the configuration and routes CLI commands to their
//! implementations.

mod hold;
mod max_hold;
mod scan;

use crate::cli::{Cli, Command};
use crate::config::LockConfig;
use crate::error::Result;

/// Dispatch a command to its implementation.
pub fn dispatch(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => LockConfig::load(path)?,
        None => LockConfig::default(),
    };

    match cli.command {
        Command::Scan(args) => scan::cmd_scan(config, args),
        Command::Hold(args) => hold::cmd_hold(config, args),
        Command::MaxHold(args) => max_hold::cmd_max_hold(&config, args),
        Command::Config => cmd_config(&config),
    }
}

fn cmd_config(config: &LockConfig) -> Result<()> {
    print!("{}", config.to_yaml()?);
    Ok(())
}
