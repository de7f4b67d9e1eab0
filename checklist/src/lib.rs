//! Disciplined stepwise execution over a hierarchical checklist tree.
//!
//! This crate drives an operator (human or agent) through a tree of checklist
//! documents one step at a time, refusing premature completion claims,
//! skipped steps, and out-of-band edits. The architecture enforces a strict
//! separation:
//!
//! - **[`core`]**: Pure, deterministic logic (parsing, status computation,
//!   lock derivation, outcome validation). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (document store, hash ledger, lock
//!   files, process execution, git). Isolated to enable mocking in tests.
//!
//! Orchestration modules ([`advance`], [`verify`], [`push`], [`exec`],
//! [`report`], [`shell`]) coordinate core logic with I/O to implement CLI
//! commands.

pub mod advance;
pub mod core;
pub mod exec;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod push;
pub mod report;
pub mod shell;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tree;
pub mod verify;
