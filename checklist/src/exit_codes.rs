//! Stable exit codes for checklist CLI commands.

/// Command succeeded (graceful exit).
pub const OK: i32 = 0;
/// Command failed due to invalid layout/config/document or other errors.
pub const INVALID: i32 = 1;
/// Operation refused: push lock engaged or step incomplete.
pub const BLOCKED: i32 = 2;
/// Process terminated while halted with unresolved blockers.
pub const HALTED: i32 = 3;
