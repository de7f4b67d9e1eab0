//! Step status computation.
//!
//! Status is derived, never stored: every query recomputes bottom-up from
//! tasks, resolved children, and pending markers. This keeps the filesystem
//! as the single source of truth and eliminates staleness bugs from cached
//! status fields.

use std::fmt;

use crate::tree::StepTree;

/// Derived status of a checklist node.
///
/// `Blocked` is not terminal: it reverts to `InProgress` once its cause
/// clears on re-parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    NotStarted,
    InProgress,
    Blocked,
    Verified,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Status::NotStarted => "not started",
            Status::InProgress => "in progress",
            Status::Blocked => "blocked",
            Status::Verified => "verified",
        };
        f.write_str(label)
    }
}

/// Compute the status of a node bottom-up.
///
/// A node is `Verified` only if every task is checked, every child is
/// `Verified`, and no pending marker exists. A node with zero tasks and zero
/// children is vacuously `Verified`.
pub fn status(tree: &StepTree) -> Status {
    let children: Vec<Status> = tree.children.iter().map(status).collect();
    let all_children_verified = children.iter().all(|child| *child == Status::Verified);
    let markers_clear = tree.doc.pending_markers.is_empty();

    if tree.doc.all_tasks_checked() && all_children_verified && markers_clear {
        return Status::Verified;
    }

    let untouched = tree.doc.tasks.iter().all(|task| !task.checked)
        && children.iter().all(|child| *child == Status::NotStarted);
    if untouched && markers_clear {
        return Status::NotStarted;
    }

    if !markers_clear || !all_children_verified {
        return Status::Blocked;
    }

    Status::InProgress
}

/// Enumerate every blocking reason in the subtree, labeled with id paths.
///
/// Pure and side-effect free: used for display when `verify` returns
/// `Blocked`, without mutating any file.
pub fn blocking_reasons(tree: &StepTree) -> Vec<String> {
    let mut reasons = Vec::new();
    collect_reasons(tree, &tree.doc.id.clone(), &mut reasons);
    reasons
}

fn collect_reasons(tree: &StepTree, path: &str, reasons: &mut Vec<String>) {
    for task in &tree.doc.tasks {
        if !task.checked {
            reasons.push(format!("{path}: unchecked task '{}'", task.text));
        }
    }
    for marker in &tree.doc.pending_markers {
        reasons.push(format!("{path}: pending marker '{marker}'"));
    }
    for child in &tree.children {
        let child_path = format!("{path}/{}", child.doc.id);
        collect_reasons(child, &child_path, reasons);
    }
}

/// Select the active step: the leftmost node (depth-first, document order)
/// that is not yet `Verified`, descending into unverified children first.
///
/// Returns `None` when the whole tree is `Verified`.
pub fn select_active(tree: &StepTree) -> Option<&StepTree> {
    if status(tree) == Status::Verified {
        return None;
    }
    for child in &tree.children {
        if let Some(active) = select_active(child) {
            return Some(active);
        }
    }
    Some(tree)
}
