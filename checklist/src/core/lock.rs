//! Push-lock derivation.
//!
//! The lock is a pure, total function of the resolved tree, a ledger
//! snapshot, and the outcome validation snapshot. It is recomputed from
//! scratch on every query; there is no incremental or cached lock state.

use std::fmt;

use crate::core::outcome::OutcomeStatus;
use crate::tree::StepTree;

/// Ledger verdict for one document path, as observed at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerStatus {
    /// Recorded digest matches current content.
    Match,
    /// Recorded digest differs from current content.
    TamperDetected { recorded: String, current: String },
    /// No entry recorded yet (first encounter; not an error).
    Unrecorded,
}

/// One document's ledger verdict, keyed by path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerReport {
    pub path: String,
    pub status: LedgerStatus,
}

/// Validation snapshot for one expected outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeReport {
    pub id: String,
    pub status: OutcomeStatus,
}

/// A single reason the push lock is engaged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    UncheckedTask { path: String, text: String },
    PendingMarker { path: String, text: String },
    OutcomeUnvalidated { id: String },
    OutcomeMismatched { id: String },
    LedgerMismatch { path: String },
    /// Open question in the scratchpad thought log.
    PendingThought { text: String },
    /// Unresolved validation inconsistency in the scratchpad log.
    UnresolvedInconsistency { text: String },
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::UncheckedTask { path, text } => {
                write!(f, "unchecked task at {path}: '{text}'")
            }
            BlockReason::PendingMarker { path, text } => {
                write!(f, "pending marker at {path}: '{text}'")
            }
            BlockReason::OutcomeUnvalidated { id } => {
                write!(f, "expected outcome '{id}' has not been validated")
            }
            BlockReason::OutcomeMismatched { id } => {
                write!(f, "expected outcome '{id}' mismatched on last validation")
            }
            BlockReason::LedgerMismatch { path } => {
                write!(f, "ledger digest mismatch for {path}")
            }
            BlockReason::PendingThought { text } => {
                write!(f, "pending question in thought log: '{text}'")
            }
            BlockReason::UnresolvedInconsistency { text } => {
                write!(f, "unresolved inconsistency: '{text}'")
            }
        }
    }
}

/// Derived lock state. `push_blocked` is true iff `reasons` is non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockState {
    pub push_blocked: bool,
    pub reasons: Vec<BlockReason>,
}

/// Derive the push lock from the injected state snapshot.
///
/// Push is blocked if any checklist document has an unchecked task or
/// unresolved pending marker, any expected outcome lacks a matching
/// validation, or the ledger reports a mismatch for any document. A ledger
/// mismatch blocks regardless of every other condition.
pub fn compute_lock(
    tree: &StepTree,
    ledger: &[LedgerReport],
    outcomes: &[OutcomeReport],
) -> LockState {
    let mut reasons = Vec::new();
    collect_tree_reasons(tree, &tree.doc.id.clone(), &mut reasons);

    for outcome in outcomes {
        match outcome.status {
            OutcomeStatus::Matched => {}
            OutcomeStatus::Unrun => reasons.push(BlockReason::OutcomeUnvalidated {
                id: outcome.id.clone(),
            }),
            OutcomeStatus::Mismatched => reasons.push(BlockReason::OutcomeMismatched {
                id: outcome.id.clone(),
            }),
        }
    }

    for report in ledger {
        if matches!(report.status, LedgerStatus::TamperDetected { .. }) {
            reasons.push(BlockReason::LedgerMismatch {
                path: report.path.clone(),
            });
        }
    }

    LockState {
        push_blocked: !reasons.is_empty(),
        reasons,
    }
}

fn collect_tree_reasons(tree: &StepTree, path: &str, reasons: &mut Vec<BlockReason>) {
    for task in &tree.doc.tasks {
        if !task.checked {
            reasons.push(BlockReason::UncheckedTask {
                path: path.to_string(),
                text: task.text.clone(),
            });
        }
    }
    for marker in &tree.doc.pending_markers {
        reasons.push(BlockReason::PendingMarker {
            path: path.to_string(),
            text: marker.clone(),
        });
    }
    for child in &tree.children {
        let child_path = format!("{path}/{}", child.doc.id);
        collect_tree_reasons(child, &child_path, reasons);
    }
}
