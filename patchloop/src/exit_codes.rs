//! Stable exit codes for patchloop CLI commands.

/// Command succeeded; for `verify`/`round`, the requirement is fulfilled.
pub const OK: i32 = 0;
/// Invalid input, configuration, or an internal error.
pub const INVALID: i32 = 1;
/// The requirement was checked and is not fulfilled.
pub const UNFULFILLED: i32 = 2;
/// `apply` finished but at least one entry was not applied.
pub const PARTIAL: i32 = 3;
