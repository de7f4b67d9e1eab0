//! Pure, deterministic core logic.
//!
//! Nothing in this module performs I/O. Every function is total over its
//! inputs and recomputes results from scratch; snapshots of persisted state
//! (ledger, validation state) are passed in as values.

pub mod document;
pub mod lock;
pub mod outcome;
pub mod status;
