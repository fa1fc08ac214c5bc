//! Filesystem primitives for lock files.
//!
//! Lock files are only ever created with exclusive-create semantics or
//! replaced wholesale through a temp file + rename, so a reader never sees a
//! half-written record from a claimant that reached the rename.

pub mod atomic;

pub use atomic::{atomic_write, create_exclusive};
