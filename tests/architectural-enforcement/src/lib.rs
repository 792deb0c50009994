//! Architectural Enforcement Integration Tests
//!
//! Source-level checks on the assistant crates:
//! - No blocking sleeps in production code
//! - No terminal UI dependencies in the core library
//!
//! The checks live in `tests/`; this library only locates the workspace.

use std::path::PathBuf;

/// Workspace root (two levels above this crate)
#[must_use]
pub fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .canonicalize()
        .unwrap_or_else(|_| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../.."))
}
