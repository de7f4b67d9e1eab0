//! I/O helpers for checklist commands.

pub mod config;
pub mod expected;
pub mod git;
pub mod ledger;
pub mod lockfile;
pub mod paths;
pub mod process;
pub mod scratchpad;
pub mod store;
