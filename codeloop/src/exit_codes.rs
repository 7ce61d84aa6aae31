//! Stable exit codes for codeloop CLI commands.

/// Command succeeded; for `run`, the workflow finished with all tests passing.
pub const OK: i32 = 0;
/// Command failed due to invalid config/input or an internal error.
pub const ERROR: i32 = 1;
/// `check` found blocking issues, or `run` ended without success.
pub const REJECTED: i32 = 2;
