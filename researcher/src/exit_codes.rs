//! Stable exit codes for `researcher` commands.

/// Command succeeded; for `run`, every subject produced a report.
pub const OK: i32 = 0;
/// Invalid config, subject list, or environment, or any other fatal error.
pub const INVALID: i32 = 1;
/// `run` finished but at least one subject failed.
pub const PARTIAL: i32 = 2;
