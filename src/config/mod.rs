//! Configuration model for session-lock.
//!
//! This module defines the `LockConfig` struct that can be loaded from a YAML
//! file. It supports forward-compatible YAML parsing (unknown fields are
//! ignored), sensible defaults for every field, and validation of values.

mod model;
mod operations;
pub mod types;

#[cfg(test)]
mod tests;

pub use model::LockConfig;
